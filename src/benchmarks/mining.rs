use tracing::{info, debug};
use tracing_subscriber;

use rand::prelude::*;
use statrs::distribution::{Beta, DiscreteUniform};

use std::time::*;

use wpfimine::*;
use wpfimine::data::Weight;

fn main() -> Result<(), String> {
    prepare_logging();

    let database = generate_database( 2000, 40, 12, 7 )?;
    info!( "Generated {} transactions over {} items", database.len(), database.items().len() );

    for mode in [Mode::Exact, Mode::Approximate] {
	for use_index in [false, true] {
	    benchmark_mining( &database, mode, use_index )?;
	}
    }

    Result::Ok( () )
}

/// Random database: transaction lengths uniform in 1..=max_length, probabilities Beta(2, 2),
/// item weights Beta(5, 2).
fn generate_database( number_transactions: usize, number_items: usize, max_length: usize, seed: u64 ) -> Result<UncertainDatabase, String> {
    let mut gen = StdRng::seed_from_u64( seed );
    let length_distribution = DiscreteUniform::new( 1, max_length as i64 ).map_err( |e| e.to_string() )?;
    let probability_distribution = Beta::new( 2.0, 2.0 ).map_err( |e| e.to_string() )?;
    let weight_distribution = Beta::new( 5.0, 2.0 ).map_err( |e| e.to_string() )?;

    let names: Vec<String> = ( 0 .. number_items ).map( |i| format!( "i{i:03}" )).collect();
    let mut builder = DatabaseBuilder::default();
    for name in &names {
	let weight: Weight = weight_distribution.sample( &mut gen );
	builder.set_weight( name, weight ).map_err( |e| e.to_string() )?;
    }

    let mut universe: Vec<usize> = ( 0 .. number_items ).collect();
    for _ in 0 .. number_transactions {
	let length = length_distribution.sample( &mut gen ) as usize;
	let length = length.min( number_items );
	// partial Fisher-Yates: the first `length` slots hold the sample
	for sample_count in 0 .. length {
	    let i = gen.gen_range( sample_count .. number_items );
	    universe.swap( sample_count, i );
	}
	let transaction: Vec<(&str, f64)> = universe[.. length].iter()
	    .map( |i| (names[*i].as_str(), probability_distribution.sample( &mut gen )) )
	    .collect();
	builder.add_transaction( transaction );
    }
    Ok( builder.build() )
}

fn benchmark_mining( database: &UncertainDatabase, mode: Mode, use_index: bool ) -> Result<(), String> {
    let config = MinerConfig::builder( 40, 0.3 )
	.mode( mode )
	.support_index( use_index )
	.build()
	.map_err( |e| e.to_string() )?;
    info!( "Start benchmark: {mode:?} mode, index {use_index}" );

    let start = Instant::now();
    let result = LevelwiseMiner::new( config ).mine( database );
    let time_spent = Instant::now().duration_since( start );

    for level in &result.stats().levels {
	debug!( "level {}: {} pruned, {} candidates, {} frequent", level.size, level.pruned, level.candidates, level.retained );
    }
    info!( "Result: {} frequent itemsets took {}ms", result.len(), time_spent.as_millis() );
    Ok( () )
}

fn prepare_logging() {
    let tracer = tracing_subscriber::fmt::fmt()
	.with_max_level( tracing_subscriber::filter::LevelFilter::INFO )
	.finish();
    if let Err( err ) = tracing::subscriber::set_global_default( tracer ) {
	eprintln!( "logging unavailable: {err}" );
    }
}
