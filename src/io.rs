
use std::collections::BTreeMap;
use std::path::Path;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufRead, BufWriter, Write};

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::MinerConfig;
use crate::data::{DatabaseBuilder, FrequentItemset, Probability, UncertainDatabase};
use crate::error::{ConfigError, Error, Result};
use crate::miner::MiningResult;
use crate::miner::pruning::Rule;

/// Probability of a dataset token without an explicit `:probability`
pub const DEFAULT_PROBABILITY: Probability = 0.8;

/// Converts a structure into a string
pub trait PrettyFormatter<T> {
    fn format_pretty( &self, object: &T ) -> String;
}

/// Receives frequent itemsets as each level completes.
pub trait ResultSink {
    fn already_emitted( &self, key: &str ) -> bool;

    fn emit( &mut self, key: &str, itemset: &FrequentItemset ) -> Result<()>;
}

/// Appends one itemset key per line. Keys already in the file are not written again,
/// so an interrupted run can be resumed into the same file.
pub struct FileSink {
    emitted: FxHashSet<String>,
    writer: BufWriter<File>,
    path: String,
}

impl PrettyFormatter<FrequentItemset> for UncertainDatabase {
    fn format_pretty( &self, object: &FrequentItemset ) -> String {
	format!( "{} avg weight {:.4}, mu {:.4}, P {:.4}, score {:.4}",
		 self.describe( object.itemset() ), object.avg_weight(), object.mu(), object.probability(), object.score() )
    }
}

/// Hands every line that is neither blank nor a `#` comment to `parse`, with its 1-based line number.
fn read_records<F>( path: &str, mut parse: F ) -> Result<()> where
    F: FnMut( usize, &str ) -> Result<()>,
{
    let file = File::open( Path::new( path )).map_err( |e| Error::io( path, e ))?;
    let reader = BufReader::new( file );
    for (number, line) in reader.lines().enumerate() {
	let line = line.map_err( |e| Error::io( path, e ))?;
	let line = line.trim();
	if line.is_empty() || line.starts_with( '#' ) {
	    continue;
	}
	parse( number + 1, line )?;
    }
    Ok( () )
}

/// Parses whitespace separated `name` or `name:probability` tokens.
pub fn parse_transaction( line: &str, line_number: usize, default_probability: Probability ) -> Result<Vec<(&str, Probability)>> {
    let mut entries = Vec::new();
    for token in line.split_whitespace() {
	let entry = match token.rsplit_once( ':' ) {
	    Some( (name, probability) ) => {
		let probability: Probability = probability.parse().map_err( |_| Error::Parse {
		    line: line_number,
		    message: format!( "invalid probability in '{token}'" ),
		})?;
		(name, probability)
	    },
	    None => (token, default_probability),
	};
	if entry.0.is_empty() {
	    return Err( Error::Parse { line: line_number, message: format!( "missing item name in '{token}'" ) } );
	}
	entries.push( entry );
    }
    Ok( entries )
}

fn check_default_probability( default_probability: Probability ) -> Result<()> {
    if ( 0.0 ..= 1.0 ).contains( &default_probability ) {
	Ok( () )
    } else {
	Err( ConfigError::DefaultProbability( default_probability ).into() )
    }
}

/// Adds the transactions of a dataset file to the builder.
pub fn read_transactions( path: &str, default_probability: Probability, builder: &mut DatabaseBuilder ) -> Result<()> {
    check_default_probability( default_probability )?;
    read_records( path, |number, line| {
	builder.add_transaction( parse_transaction( line, number, default_probability )? );
	Ok( () )
    })
}

/// Reads a dataset file into a database with default weights.
pub fn read_dataset( path: &str, default_probability: Probability ) -> Result<UncertainDatabase> {
    let mut builder = DatabaseBuilder::default();
    read_transactions( path, default_probability, &mut builder )?;
    Ok( builder.build() )
}

/// Reads `name weight` lines into the builder's weight table.
pub fn read_weights( path: &str, builder: &mut DatabaseBuilder ) -> Result<()> {
    read_records( path, |number, line| {
	let tokens: Vec<&str> = line.split_whitespace().collect();
	let (name, weight) = match tokens.as_slice() {
	    [name, weight] => (*name, *weight),
	    _ => return Err( Error::Parse { line: number, message: format!( "expected 'name weight', got '{line}'" ) } ),
	};
	let weight = weight.parse().map_err( |_| Error::Parse {
	    line: number,
	    message: format!( "invalid weight '{weight}' for item {name}" ),
	})?;
	builder.set_weight( name, weight )
    })
}

impl FileSink {

    /// Opens the file for appending, remembering the keys it already holds.
    pub fn open( path: &str ) -> Result<FileSink> {
	let mut emitted = FxHashSet::default();
	if Path::new( path ).exists() {
	    read_records( path, |_, line| {
		emitted.insert( line.to_string() );
		Ok( () )
	    })?;
	}
	let file = OpenOptions::new()
	    .create( true )
	    .append( true )
	    .open( path )
	    .map_err( |e| Error::io( path, e ))?;
	Ok( FileSink { emitted, writer: BufWriter::new( file ), path: path.to_string() } )
    }

    pub fn number_emitted( &self ) -> usize {
	self.emitted.len()
    }
}

impl ResultSink for FileSink {
    fn already_emitted( &self, key: &str ) -> bool {
	self.emitted.contains( key )
    }

    fn emit( &mut self, key: &str, _itemset: &FrequentItemset ) -> Result<()> {
	writeln!( self.writer, "{key}" ).map_err( |e| Error::io( &self.path, e ))?;
	// flushed per itemset so an interrupted run leaves only complete lines
	self.writer.flush().map_err( |e| Error::io( &self.path, e ))?;
	self.emitted.insert( key.to_string() );
	Ok( () )
    }
}

#[derive( Debug, Serialize )]
pub struct ItemsetReport {
    pub items: Vec<String>,
    pub avg_weight: f64,
    pub mu: f64,
    pub probability: f64,
    pub score: f64,
}

#[derive( Debug, Serialize )]
pub struct LevelReport {
    pub size: usize,
    pub pruned: usize,
    pub candidates: usize,
    pub itemsets: Vec<ItemsetReport>,
}

/// Serializable summary of a mining run, with item names instead of ids.
#[derive( Debug, Serialize )]
pub struct Report<'a> {
    pub config: &'a MinerConfig,
    pub number_transactions: usize,
    pub number_items: usize,
    pub mu_hat: Option<f64>,
    pub levels: Vec<LevelReport>,
    pub pruned: BTreeMap<&'static str, usize>,
    pub elapsed_ms: u64,
}

impl <'a> Report<'a> {

    pub fn new( result: &MiningResult, database: &UncertainDatabase, config: &'a MinerConfig ) -> Report<'a> {
	let stats = result.stats();
	let levels = stats.levels.iter()
	    .filter( |level| level.retained > 0 )
	    .map( |level| LevelReport {
		size: level.size,
		pruned: level.pruned,
		candidates: level.candidates,
		itemsets: result.level( level.size ).iter()
		    .map( |frequent| ItemsetReport {
			items: frequent.items().iter().map( |item| database.items().name( *item ).to_string() ).collect(),
			avg_weight: frequent.avg_weight(),
			mu: frequent.mu(),
			probability: frequent.probability(),
			score: frequent.score(),
		    })
		    .collect(),
	    })
	    .collect();
	Report {
	    config,
	    number_transactions: database.len(),
	    number_items: database.items().len(),
	    mu_hat: stats.mu_hat,
	    levels,
	    pruned: Rule::ALL.iter().map( |rule| (rule.name(), stats.pruned.get( *rule )) ).collect(),
	    elapsed_ms: stats.elapsed.as_millis() as u64,
	}
    }
}

/// Writes a serializeable object to a file as JSON
pub fn write_json<M: Serialize>( object: &M, path: &str ) -> Result<()> {
    let json = serde_json::to_string_pretty( object )?;
    let mut file = File::create( Path::new( path )).map_err( |e| Error::io( path, e ))?;
    writeln!( file, "{json}" ).map_err( |e| Error::io( path, e ))
}
