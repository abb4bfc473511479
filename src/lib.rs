
#[cfg(test)]
macro_rules! assert_approx {
    ($real:expr, $expected:expr, $delta:expr) => {
	if $real < $expected - $delta || $real > $expected + $delta {
	    panic!( "Violate {:.6} == {:.6} (+-{:.6})", $real, $expected, $delta );
	}
    }
}

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod miner;
pub mod model;

use tracing::*;

pub use config::{ApproxFamily, MinerConfig, MinerConfigBuilder, Mode, PruningFlags};
pub use data::{DatabaseBuilder, FrequentItemset, Item, Itemset, UncertainDatabase};
pub use error::{ConfigError, Error};
pub use miner::{LevelwiseMiner, Miner, MiningResult};

/// Objects that can be recorded in the log
pub trait Loggable {
    fn log( &self, message: &str, level: tracing::Level );
}
