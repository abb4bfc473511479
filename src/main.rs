
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use wpfimine::*;
use wpfimine::io::{self, FileSink, PrettyFormatter, Report};

#[derive( Debug, Clone, Copy, ValueEnum )]
enum ModeArg {
    Exact,
    Approximate,
}

#[derive( Debug, Clone, Copy, ValueEnum )]
enum FamilyArg {
    Poisson,
    Normal,
}

/// Mines weighted probabilistic frequent itemsets from an uncertain database.
#[derive( Parser, Debug )]
#[command( name = "miner" )]
struct Args {
    /// Dataset: one transaction per line, tokens `name` or `name:probability`
    dataset: String,

    /// Weight table: lines `name weight`
    #[arg( long )]
    weights: Option<String>,

    /// JSON configuration; flags given on the command line take precedence
    #[arg( long )]
    config: Option<String>,

    /// Minimum support
    #[arg( long )]
    msup: Option<i64>,

    /// Score threshold in (0, 1]
    #[arg( long )]
    threshold: Option<f64>,

    /// Approximate mu pruning factor; 0 disables it, larger values may lose results
    #[arg( long )]
    alpha: Option<f64>,

    #[arg( long, value_enum )]
    mode: Option<ModeArg>,

    /// Distribution of the approximate mode
    #[arg( long, value_enum )]
    family: Option<FamilyArg>,

    #[arg( long )]
    min_avg_weight: Option<f64>,

    /// Largest itemset size to mine
    #[arg( long )]
    max_size: Option<usize>,

    #[arg( long, default_value_t = io::DEFAULT_PROBABILITY )]
    default_probability: f64,

    /// Weight of items missing from the weight table
    #[arg( long, default_value_t = wpfimine::data::DEFAULT_WEIGHT )]
    default_weight: f64,

    /// Scan transactions instead of building the support index
    #[arg( long )]
    no_index: bool,

    /// Resumable output file, one itemset per line
    #[arg( long )]
    output: Option<String>,

    /// JSON report of the run
    #[arg( long )]
    report: Option<String>,

    #[arg( short, long )]
    verbose: bool,
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    prepare_logging( args.verbose );

    let config = build_config( &args ).map_err( |e| e.to_string() )?;
    let database = load_database( &args ).map_err( |e| e.to_string() )?;
    info!( "Loaded {} transactions over {} items", database.len(), database.items().len() );

    let miner = LevelwiseMiner::new( config );
    let result = match &args.output {
	Some( path ) => {
	    let mut sink = FileSink::open( path ).map_err( |e| e.to_string() )?;
	    info!( "Resuming into {path} with {} itemsets already written", sink.number_emitted() );
	    miner.mine_into( &database, &mut sink ).map_err( |e| e.to_string() )?
	},
	None => miner.mine( &database ),
    };

    for (size, level) in result.levels() {
	println!( "level {size}: {} frequent itemsets", level.len() );
	for frequent in level {
	    println!( "  {}", database.format_pretty( frequent ));
	}
    }

    if let Some( path ) = &args.report {
	let report = Report::new( &result, &database, miner.config() );
	io::write_json( &report, path ).map_err( |e| e.to_string() )?;
	info!( "Wrote report to {path}" );
    }

    Ok( () )
}

fn build_config( args: &Args ) -> Result<MinerConfig, Error> {
    let mut builder = match &args.config {
	Some( path ) => MinerConfigBuilder::from_json_file( path )?,
	None => MinerConfigBuilder::default(),
    };
    if let Some( msup ) = args.msup {
	builder.minimum_support = msup;
    }
    if let Some( threshold ) = args.threshold {
	builder.score_threshold = threshold;
    }
    if let Some( alpha ) = args.alpha {
	builder.approx_prune_alpha = alpha;
    }
    if let Some( mode ) = args.mode {
	builder.mode = match mode {
	    ModeArg::Exact => Mode::Exact,
	    ModeArg::Approximate => Mode::Approximate,
	};
    }
    if let Some( family ) = args.family {
	builder.approx_family = match family {
	    FamilyArg::Poisson => ApproxFamily::Poisson,
	    FamilyArg::Normal => ApproxFamily::Normal,
	};
    }
    if let Some( weight ) = args.min_avg_weight {
	builder.min_average_weight = weight;
    }
    if args.max_size.is_some() {
	builder.max_itemset_size = args.max_size;
    }
    if args.no_index {
	builder.use_support_index = false;
    }
    Ok( builder.build()? )
}

fn load_database( args: &Args ) -> Result<UncertainDatabase, Error> {
    let mut builder = DatabaseBuilder::new( args.default_weight );
    if let Some( path ) = &args.weights {
	io::read_weights( path, &mut builder )?;
    }
    io::read_transactions( &args.dataset, args.default_probability, &mut builder )?;
    Ok( builder.build() )
}

fn prepare_logging( verbose: bool ) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let tracer = tracing_subscriber::fmt::fmt()
	.with_max_level( level )
	.with_writer( std::io::stderr )
	.finish();
    if let Err( err ) = tracing::subscriber::set_global_default( tracer ) {
	eprintln!( "logging unavailable: {err}" );
    }
}
