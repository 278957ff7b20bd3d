//! Implementation of the `nestack plan` command.
//!
//! Runs the splitter only and reports which resources move where. With
//! `--out`, the root and nested templates are written to a directory, with
//! each stack reference pointing at its nested template's file name.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use nestack_lib::config::DeployConfig;
use nestack_lib::consts::ROOT_TEMPLATE_KEY;
use nestack_lib::deploy::validate_template;
use nestack_lib::split::{SplitTemplates, split};

use super::read_template;
use crate::output::{self, OutputFormat, format_size, print_info, print_json, print_stat, print_success};

pub fn cmd_plan(
  template: &str,
  config: &DeployConfig,
  out: Option<&Path>,
  output: OutputFormat,
  verbose: bool,
) -> Result<()> {
  let template = read_template(template)?;
  validate_template(&template)?;

  let total = template.len();
  let classifier = config.split.classifier();
  let mut split = split(template, classifier.as_ref()).context("Failed to split template")?;

  // Stand-in locations so the written set is self-consistent.
  for key in split.nested.keys() {
    if let Some(reference) = split.root.resources.get_mut(&key.stack_resource_name()) {
      reference.set_template_url(&key.template_key());
    }
  }

  let rendered = render_all(&split)?;

  if output.is_json() {
    let nested: Vec<_> = split
      .nested
      .iter()
      .map(|(key, template)| {
        serde_json::json!({
          "partition": key.as_str(),
          "stack_resource": key.stack_resource_name(),
          "key": key.template_key(),
          "resources": template.resources.keys().collect::<Vec<_>>(),
        })
      })
      .collect();
    print_json(&serde_json::json!({
      "resources": total,
      "root": {
        "key": ROOT_TEMPLATE_KEY,
        "resources": split.root.resources.keys().collect::<Vec<_>>(),
      },
      "nested": nested,
    }))?;
  } else {
    print_success(&format!(
      "{} resources split into {} nested template(s)",
      total,
      split.nested_count()
    ));
    print_stat("Root resources", &split.root.len().to_string());
    for (key, template) in &split.nested {
      println!(
        "  {} {} {} {} ({} resources)",
        output::symbols::ADD,
        key.stack_resource_name(),
        output::symbols::ARROW,
        key.template_key(),
        template.len()
      );
      if verbose {
        for name in template.resources.keys() {
          println!("      {}", name);
        }
      }
    }
    if verbose {
      for (name, body) in &rendered {
        print_stat(name, &format_size(body.len()));
      }
    }
  }

  if let Some(dir) = out {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    for (name, body) in &rendered {
      let path = dir.join(name);
      fs::write(&path, body).with_context(|| format!("Failed to write template: {}", path.display()))?;
    }
    if !output.is_json() {
      print_info(&format!("Wrote {} template(s) to {}", rendered.len(), dir.display()));
    }
  }

  Ok(())
}

/// Nested templates first, then the root, as they would be uploaded.
fn render_all(split: &SplitTemplates) -> Result<Vec<(String, String)>> {
  let mut rendered = Vec::with_capacity(split.nested.len() + 1);
  for (key, template) in &split.nested {
    let name = key.template_key();
    let body = template
      .to_yaml()
      .with_context(|| format!("Failed to render {}", name))?;
    rendered.push((name, body));
  }
  let root = split
    .root
    .to_yaml()
    .with_context(|| format!("Failed to render {}", ROOT_TEMPLATE_KEY))?;
  rendered.push((ROOT_TEMPLATE_KEY.to_string(), root));
  Ok(rendered)
}
