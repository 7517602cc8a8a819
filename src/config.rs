use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;

use crate::embedding::{is_minilm, HASHING_MODEL, MINILM_DIMENSIONS, MINILM_MODEL};

pub type Number = f32;

pub const EPSILON: f32 = 1e-6;

const DEFAULT_PATH: &str = "./data/vector_store";
const DEFAULT_DATA_DIR: &str = "./data/client_docs";
const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_CHUNK_OVERLAP: usize = 50;
const DEFAULT_TOP_K: usize = 3;

#[derive(Deserialize)]
pub struct GroundingConfig {
    pub path: Option<String>,
    pub data_dir: Option<String>,
    pub embedding_model: Option<String>,
    pub dimensions: Option<usize>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub verbose: Option<bool>,
}

impl GroundingConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(GroundingConfig {
            path: config.get("path").ok(),
            data_dir: config.get("data_dir").ok(),
            embedding_model: config.get("embedding_model").ok(),
            dimensions: config.get("dimensions").ok(),
            chunk_size: config.get("chunk_size").ok(),
            chunk_overlap: config.get("chunk_overlap").ok(),
            top_k: config.get("top_k").ok(),
            verbose: config.get("verbose").ok(),
        })
    }
}

/// Effective runtime settings, resolved from `grounding_config.*` and
/// `GROUNDING_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub path: String,
    pub data_dir: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            embedding_model: MINILM_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            verbose: false,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self> {
        let mut config = Config::default();
        #[allow(deprecated)]
        {
            config.merge(ConfigFile::with_name("grounding_config").required(false))?;
            config.merge(Environment::with_prefix("GROUNDING"))?;
        }

        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let grounding_config =
            GroundingConfig::try_from(config).context("Failed to read grounding configuration")?;
        let defaults = Settings::default();

        let verbose = grounding_config
            .verbose
            .or_else(|| env::var("GROUNDING_VERBOSE").ok().map(|s| s == "true"))
            .unwrap_or(defaults.verbose);

        let settings = Self {
            path: grounding_config.path.unwrap_or(defaults.path),
            data_dir: grounding_config.data_dir.unwrap_or(defaults.data_dir),
            embedding_model: grounding_config
                .embedding_model
                .unwrap_or(defaults.embedding_model),
            dimensions: grounding_config.dimensions.unwrap_or(defaults.dimensions),
            chunk_size: grounding_config.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: grounding_config
                .chunk_overlap
                .unwrap_or(defaults.chunk_overlap),
            top_k: grounding_config.top_k.unwrap_or(defaults.top_k),
            verbose,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings that would break the chunker or the index before
    /// anything touches disk.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            anyhow::bail!("GROUNDING_DIMENSIONS must be greater than zero.");
        }
        if self.chunk_size == 0 {
            anyhow::bail!("GROUNDING_CHUNK_SIZE must be greater than zero.");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "GROUNDING_CHUNK_OVERLAP ({}) must be smaller than GROUNDING_CHUNK_SIZE ({}).",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            anyhow::bail!("GROUNDING_TOP_K must be at least 1.");
        }
        if is_minilm(&self.embedding_model) {
            if self.dimensions != MINILM_DIMENSIONS {
                anyhow::bail!(
                    "{} produces {}-dimensional vectors; GROUNDING_DIMENSIONS is {}.",
                    self.embedding_model,
                    MINILM_DIMENSIONS,
                    self.dimensions
                );
            }
        } else if self.embedding_model != HASHING_MODEL {
            anyhow::bail!(
                "Unknown embedding model '{}' (supported: {}, {}).",
                self.embedding_model,
                MINILM_MODEL,
                HASHING_MODEL
            );
        }
        Ok(())
    }

    pub fn print_config(&self) {
        println!("path={}", self.path);
        println!("data_dir={}", self.data_dir);
        println!("embedding_model={}", self.embedding_model);
        println!("dimensions={}", self.dimensions);
        println!("chunk_size={}", self.chunk_size);
        println!("chunk_overlap={}", self.chunk_overlap);
        println!("top_k={}", self.top_k);
        println!("verbose={}", self.verbose);
    }
}

/// Installs the process logger. `verbose` lowers the default filter to
/// `debug`; `RUST_LOG` still wins when set.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    if let Err(e) =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .try_init()
    {
        log::debug!("Logger already installed: {}", e);
    }
}
