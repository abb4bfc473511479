use std::path::Path;
use std::fs::File;
use std::io::BufReader;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// How the final verification computes P(support >= msup).
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum Mode {
    Exact,
    Approximate,
}

/// Distribution used to approximate the support in approximate mode.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum ApproxFamily {
    Poisson,
    Normal,
}

/// Switches for the pruning rules that never lose a result.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
#[serde( default )]
pub struct PruningFlags {
    pub weight: bool,
    pub mu_hat: bool,
    pub upper_bound: bool,
}

impl Default for PruningFlags {
    fn default() -> PruningFlags {
	PruningFlags { weight: true, mu_hat: true, upper_bound: true }
    }
}

impl PruningFlags {
    pub fn none() -> PruningFlags {
	PruningFlags { weight: false, mu_hat: false, upper_bound: false }
    }
}

/// Validated, immutable parameters of a mining run.
#[derive( Debug, Clone, PartialEq, Serialize )]
pub struct MinerConfig {
    minimum_support: usize,
    score_threshold: f64,
    approx_prune_alpha: f64,
    mode: Mode,
    approx_family: ApproxFamily,
    min_average_weight: f64,
    max_itemset_size: Option<usize>,
    pruning: PruningFlags,
    use_support_index: bool,
}

/// Unvalidated parameters. Also the shape of a JSON configuration file.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default, rename_all = "camelCase" )]
pub struct MinerConfigBuilder {
    pub minimum_support: i64,
    pub score_threshold: f64,
    pub approx_prune_alpha: f64,
    pub mode: Mode,
    pub approx_family: ApproxFamily,
    pub min_average_weight: f64,
    pub max_itemset_size: Option<usize>,
    pub pruning: PruningFlags,
    pub use_support_index: bool,
}

impl Default for MinerConfigBuilder {
    fn default() -> MinerConfigBuilder {
	MinerConfigBuilder {
	    minimum_support: 2,
	    score_threshold: 0.2,
	    approx_prune_alpha: 0.0,
	    mode: Mode::Exact,
	    approx_family: ApproxFamily::Poisson,
	    min_average_weight: 0.0,
	    max_itemset_size: None,
	    pruning: PruningFlags::default(),
	    use_support_index: true,
	}
    }
}

impl MinerConfigBuilder {
    pub fn new( minimum_support: i64, score_threshold: f64 ) -> MinerConfigBuilder {
	MinerConfigBuilder {
	    minimum_support,
	    score_threshold,
	    ..MinerConfigBuilder::default()
	}
    }

    /// Reads a builder from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file( path: &str ) -> Result<MinerConfigBuilder> {
	let path = Path::new( path );
	let file = File::open( path ).map_err( |e| Error::io( path, e ))?;
	let builder = serde_json::from_reader( BufReader::new( file ))?;
	Ok( builder )
    }

    pub fn alpha( mut self, alpha: f64 ) -> MinerConfigBuilder {
	self.approx_prune_alpha = alpha;
	self
    }

    pub fn mode( mut self, mode: Mode ) -> MinerConfigBuilder {
	self.mode = mode;
	self
    }

    pub fn approximate( mut self, family: ApproxFamily ) -> MinerConfigBuilder {
	self.mode = Mode::Approximate;
	self.approx_family = family;
	self
    }

    pub fn min_average_weight( mut self, weight: f64 ) -> MinerConfigBuilder {
	self.min_average_weight = weight;
	self
    }

    pub fn max_itemset_size( mut self, size: Option<usize> ) -> MinerConfigBuilder {
	self.max_itemset_size = size;
	self
    }

    pub fn pruning( mut self, flags: PruningFlags ) -> MinerConfigBuilder {
	self.pruning = flags;
	self
    }

    pub fn support_index( mut self, enabled: bool ) -> MinerConfigBuilder {
	self.use_support_index = enabled;
	self
    }

    /// Validates every parameter and freezes the configuration.
    pub fn build( self ) -> std::result::Result<MinerConfig, ConfigError> {
	if self.minimum_support <= 0 {
	    return Err( ConfigError::MinimumSupport( self.minimum_support ));
	}
	if !( self.score_threshold > 0.0 && self.score_threshold <= 1.0 ) {
	    return Err( ConfigError::ScoreThreshold( self.score_threshold ));
	}
	if !( 0.0 ..= 1.0 ).contains( &self.approx_prune_alpha ) {
	    return Err( ConfigError::Alpha( self.approx_prune_alpha ));
	}
	if !( self.min_average_weight.is_finite() && self.min_average_weight >= 0.0 ) {
	    return Err( ConfigError::MinAverageWeight( self.min_average_weight ));
	}
	if self.max_itemset_size == Some( 0 ) {
	    return Err( ConfigError::MaxItemsetSize );
	}
	Ok( MinerConfig {
	    minimum_support: self.minimum_support as usize,
	    score_threshold: self.score_threshold,
	    approx_prune_alpha: self.approx_prune_alpha,
	    mode: self.mode,
	    approx_family: self.approx_family,
	    min_average_weight: self.min_average_weight,
	    max_itemset_size: self.max_itemset_size,
	    pruning: self.pruning,
	    use_support_index: self.use_support_index,
	})
    }
}

impl MinerConfig {
    pub fn builder( minimum_support: i64, score_threshold: f64 ) -> MinerConfigBuilder {
	MinerConfigBuilder::new( minimum_support, score_threshold )
    }

    pub fn minimum_support( &self ) -> usize { self.minimum_support }
    pub fn score_threshold( &self ) -> f64 { self.score_threshold }
    pub fn approx_prune_alpha( &self ) -> f64 { self.approx_prune_alpha }
    pub fn mode( &self ) -> Mode { self.mode }
    pub fn approx_family( &self ) -> ApproxFamily { self.approx_family }
    pub fn min_average_weight( &self ) -> f64 { self.min_average_weight }
    pub fn max_itemset_size( &self ) -> Option<usize> { self.max_itemset_size }
    pub fn pruning( &self ) -> PruningFlags { self.pruning }
    pub fn use_support_index( &self ) -> bool { self.use_support_index }
}
