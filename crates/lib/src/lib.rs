//! nestack-lib: split, stage and deploy oversized infrastructure templates
//!
//! A deployment service caps the number of resources a single template may
//! declare. This crate works around the cap:
//! - `template`: the template document model
//! - `split`: classifies resources and moves hot ones into nested templates
//! - `staging`: uploads every produced template and releases them afterwards
//! - `deploy`: decides between creating a stack and proposing a change to it

pub mod config;
pub mod consts;
pub mod deploy;
pub mod platform;
pub mod split;
pub mod staging;
pub mod store;
pub mod template;
pub mod util;
