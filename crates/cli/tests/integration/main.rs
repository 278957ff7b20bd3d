//! CLI integration tests.
//!
//! Each test runs the `nestack` binary against the local backends in an
//! isolated state directory.

mod common;
mod deploy_tests;
mod plan_tests;
mod status_tests;
