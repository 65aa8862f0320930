mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be greater than zero");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be greater than zero");
        }
        if self.embedding.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be greater than zero");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.chunker.generic_chunk_size == 0 {
            bail!("chunker.generic_chunk_size must be greater than zero");
        }
        if self.ingest.extensions.is_empty() {
            bail!("ingest.extensions must list at least one extension");
        }
        if self.ingest.max_file_size == 0 {
            bail!("ingest.max_file_size must be greater than zero");
        }
        if self.ingest.fetch_timeout_secs == 0 {
            bail!("ingest.fetch_timeout_secs must be greater than zero");
        }
        match self.store.backend {
            StoreBackend::Flat if self.store.path.as_os_str().is_empty() => {
                bail!("store.path must be set for the flat backend");
            }
            StoreBackend::Qdrant if self.store.collection.trim().is_empty() => {
                bail!("store.collection must be set for the qdrant backend");
            }
            _ => {}
        }
        if self.embedding.provider == ProviderKind::Mock && !cfg!(feature = "mock") {
            bail!("the mock embedding provider requires the `mock` feature");
        }
        Ok(())
    }
}

/// Config path from `--config`, then `FORKLIFT_CONFIG`, then `forklift.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("FORKLIFT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("forklift.toml")
}
