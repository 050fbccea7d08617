mod cmd;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::SettingsArgs;
use output::{OutputFormat, print_error};

/// Recursive build orchestrator for definition-driven software stacks
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format for summaries
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Assemble a component and everything it depends on
  Build {
    /// Name of the component to assemble
    target: String,

    #[command(flatten)]
    settings: SettingsArgs,
  },

  /// Print the cache key of a component
  Key {
    /// Name of the component
    target: String,

    #[command(flatten)]
    settings: SettingsArgs,
  },

  /// Show platform and effective settings
  Info {
    #[command(flatten)]
    settings: SettingsArgs,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build { target, settings } => cmd::cmd_build(&target, &settings, cli.output),
    Commands::Key { target, settings } => cmd::cmd_key(&target, &settings, cli.output),
    Commands::Info { settings } => cmd::cmd_info(&settings, cli.output),
  };

  if let Err(err) = result {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}
