mod deploy;
mod plan;
mod status;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};

use nestack_lib::deploy::StackName;
use nestack_lib::template::Template;

pub use deploy::cmd_deploy;
pub use plan::cmd_plan;
pub use status::cmd_status;

/// Read a template from a file, or from stdin when `source` is `-`.
fn read_template(source: &str) -> Result<Template> {
  if source == "-" {
    Template::from_reader(io::stdin().lock()).context("Failed to read template from stdin")
  } else {
    Template::from_path(Path::new(source)).with_context(|| format!("Failed to read template: {}", source))
  }
}

fn stack_name(name: Option<String>) -> Result<StackName> {
  Ok(StackName::new(name.unwrap_or_default())?)
}
