use std::path::PathBuf;

use thiserror::Error;

/// Rejections raised while building a `MinerConfig`.
#[derive( Debug, Error, Clone, PartialEq )]
pub enum ConfigError {
    #[error( "minimum support must be positive, got {0}" )]
    MinimumSupport( i64 ),

    #[error( "score threshold must lie in (0, 1], got {0}" )]
    ScoreThreshold( f64 ),

    #[error( "approximate pruning alpha must lie in [0, 1], got {0}" )]
    Alpha( f64 ),

    #[error( "minimum average weight must be finite and non-negative, got {0}" )]
    MinAverageWeight( f64 ),

    #[error( "maximum itemset size must be positive" )]
    MaxItemsetSize,

    #[error( "default probability must lie in [0, 1], got {0}" )]
    DefaultProbability( f64 ),
}

#[derive( Debug, Error )]
pub enum Error {
    #[error( "invalid configuration: {0}" )]
    Config( #[from] ConfigError ),

    #[error( "item {item} has negative weight {weight}" )]
    NegativeWeight { item: String, weight: f64 },

    #[error( "{path}: {source}" )]
    Io {
	path: PathBuf,
	#[source]
	source: std::io::Error,
    },

    #[error( "line {line}: {message}" )]
    Parse { line: usize, message: String },

    #[error( "json: {0}" )]
    Json( #[from] serde_json::Error ),
}

impl Error {
    pub fn io( path: impl Into<PathBuf>, source: std::io::Error ) -> Error {
	Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
