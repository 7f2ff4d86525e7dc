//! vadimage CLI - responsive image variants with a content-addressed cache.
//!
//! Renders every image under the configured images path into a matrix of
//! widths, pixel ratios and formats, optionally publishing the results to
//! S3-compatible storage.
//!
//! # Usage
//!
//! ```bash
//! # Generate all missing variants
//! vadimage optimize
//!
//! # See what would be generated
//! vadimage optimize --dry-run
//!
//! # View configuration
//! vadimage config show
//!
//! # Inspect or reset the cache
//! vadimage cache stats
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// vadimage - generate responsive image variants.
#[derive(Parser, Debug)]
#[command(name = "vadimage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ./vadimage.toml)
    #[arg(short, long, global = true, env = "VADIMAGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate missing variants (and upload them when enabled)
    Optimize(cli::optimize::OptimizeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// Inspect or reset the variant cache
    Cache(cli::cache::CacheArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    // Commands reload the config strictly and fail on errors.
    let config = match vadimage_core::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load config for logging setup: {e}");
            vadimage_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("vadimage v{}", vadimage_core::VERSION);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Optimize(args) => cli::optimize::execute(args, config_path).await,
        Commands::Config(args) => cli::config::execute(args, config_path).await,
        Commands::Cache(args) => cli::cache::execute(args, config_path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optimize_flags() {
        let parsed = Cli::try_parse_from([
            "vadimage",
            "optimize",
            "--dry-run",
            "--concurrency",
            "3",
            "--config",
            "site/vadimage.toml",
        ])
        .unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("site/vadimage.toml")));
        match parsed.command {
            Commands::Optimize(args) => {
                assert!(args.dry_run);
                assert!(!args.no_cache);
                assert_eq!(args.concurrency, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_cache_clear() {
        let parsed = Cli::try_parse_from(["vadimage", "-v", "cache", "clear"]).unwrap();
        assert!(parsed.verbose);
        assert!(matches!(
            parsed.command,
            Commands::Cache(cli::cache::CacheArgs {
                command: cli::cache::CacheCommand::Clear
            })
        ));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["vadimage"]).is_err());
    }
}
