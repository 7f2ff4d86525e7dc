//! The `vadimage cache` command.

use clap::{Args, Subcommand};
use std::path::Path;
use vadimage_core::{CacheError, Config, ContentCache};

/// Arguments for the `cache` command.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Subcommands for the variant cache.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show the cache location and entry count
    Stats,

    /// Remove every entry so the next run rebuilds all variants
    Clear,
}

/// Execute the cache command.
pub async fn execute(args: CacheArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let path = config.cache_path();

    match args.command {
        CacheCommand::Stats => match ContentCache::load(&path) {
            Ok(cache) => {
                println!("Cache file: {}", path.display());
                println!("Entries:    {}", cache.len());
            }
            Err(CacheError::Corrupt { source, .. }) => {
                println!("Cache file: {}", path.display());
                println!("Entries:    unreadable ({source}); next run rebuilds everything");
            }
            Err(e) => return Err(e.into()),
        },

        CacheCommand::Clear => {
            let removed = clear(&path)?;
            tracing::info!("Cleared {removed} cache entries");
            println!("Cleared {removed} entries from {}", path.display());
        }
    }

    Ok(())
}

/// Empty the cache document at `path`, returning how many entries it held.
fn clear(path: &Path) -> anyhow::Result<usize> {
    let cache = ContentCache::load_or_empty(path);
    let removed = cache.len();
    cache.clear();
    cache.save()?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_empties_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vadimage-cache.json");
        std::fs::write(&path, r#"["a","b","c"]"#).unwrap();

        assert_eq!(clear(&path).unwrap(), 3);
        assert!(ContentCache::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_clear_recovers_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".vadimage-cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(clear(&path).unwrap(), 0);
        assert!(ContentCache::load(&path).unwrap().is_empty());
    }
}
