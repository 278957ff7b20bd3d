mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nestack_lib::config::{DeployConfig, SplitStrategy};

use crate::output::OutputFormat;

/// nestack - split oversized templates into nested stacks and deploy them
#[derive(Parser)]
#[command(name = "nestack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Config file (default: <config dir>/nestack/config.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Options that change how resources are split.
#[derive(Args, Debug, Clone, Default)]
pub struct SplitArgs {
  /// Additional resource type to move into its own nested template (repeatable)
  #[arg(long = "split-type", value_name = "TYPE")]
  pub split_types: Vec<String>,

  /// Move every resource type into its own nested template
  #[arg(long)]
  pub per_type: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Split, stage and deploy a template
  Deploy {
    /// Template file, or `-` for stdin
    #[arg(default_value = "-")]
    template: String,

    /// Name of the stack to create or update
    #[arg(long, env = "NESTACK_STACK_NAME")]
    stack_name: Option<String>,

    #[command(flatten)]
    split: SplitArgs,

    /// Abandon the attempt after this long, e.g. `10m` (default: from config)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// State directory for staged artifacts and the stack ledger
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show how a template would be split, without deploying
  Plan {
    /// Template file, or `-` for stdin
    #[arg(default_value = "-")]
    template: String,

    #[command(flatten)]
    split: SplitArgs,

    /// Write the root and nested templates to this directory
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the recorded state of a stack
  Status {
    /// Name of the stack
    #[arg(long, env = "NESTACK_STACK_NAME")]
    stack_name: Option<String>,

    /// State directory for staged artifacts and the stack ledger
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli) {
    output::print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let mut config = DeployConfig::load_or_default(cli.config.as_deref()).context("Failed to load config")?;

  match cli.command {
    Commands::Deploy {
      template,
      stack_name,
      split,
      timeout,
      state_dir,
      output,
    } => {
      apply_split_args(&mut config, &split);
      if let Some(timeout) = timeout {
        config.set_attempt_timeout(timeout);
      }
      cmd::cmd_deploy(&template, stack_name, state_dir, config, output)
    }
    Commands::Plan {
      template,
      split,
      out,
      output,
    } => {
      apply_split_args(&mut config, &split);
      cmd::cmd_plan(&template, &config, out.as_deref(), output, cli.verbose)
    }
    Commands::Status {
      stack_name,
      state_dir,
      output,
    } => cmd::cmd_status(stack_name, state_dir, output, cli.verbose),
  }
}

/// Command-line split options take precedence over the config file.
fn apply_split_args(config: &mut DeployConfig, args: &SplitArgs) {
  if args.per_type {
    config.split.strategy = SplitStrategy::PerType;
  }
  config.split.extra_types.extend(args.split_types.iter().cloned());
}
