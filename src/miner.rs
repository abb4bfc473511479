
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::time::{Duration, Instant};

use bit_set::BitSet;
use rayon::prelude::*;

use crate::*;
use crate::config::MinerConfig;
use crate::data::{FrequentItemset, Item, Itemset, UncertainDatabase};
use crate::io::ResultSink;
use crate::model::{Frequentness, solve_mu_hat_threshold};

pub mod pruning;

use pruning::{Extension, PruneCounts, Pruner, PruningContext, Rule};

pub trait Miner {
    /// Mines all weighted probabilistic frequent itemsets of the database.
    fn mine( &self, database: &UncertainDatabase ) -> MiningResult;

    /// Mines like `mine` and hands every frequent itemset not yet emitted to the sink.
    fn mine_into( &self, database: &UncertainDatabase, sink: &mut dyn ResultSink ) -> crate::error::Result<MiningResult>;
}

/// Apriori-style miner: verifies levels 1, 2, ... and extends each frequent itemset by one item.
pub struct LevelwiseMiner {
    config: MinerConfig,
}

#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct LevelStats {
    pub size: usize,
    /// extensions removed by pruning before verification
    pub pruned: usize,
    pub candidates: usize,
    pub retained: usize,
}

#[derive( Debug, Clone, Default, PartialEq )]
pub struct MiningStats {
    /// None when mining stopped at level 1
    pub mu_hat: Option<f64>,
    pub levels: Vec<LevelStats>,
    pub pruned: PruneCounts,
    pub elapsed: Duration,
}

/// Frequent itemsets partitioned by size.
#[derive( Debug, Clone, Default )]
pub struct MiningResult {
    levels: BTreeMap<usize, Vec<FrequentItemset>>,
    stats: MiningStats,
}

/// State that only exists once level 1 has produced frequent itemsets.
struct Extender<'a> {
    database: &'a UncertainDatabase,
    universe: Vec<Item>,
    item_mus: Vec<f64>,
    /// items of every frequent itemset found so far
    i0: BitSet,
    pruner: Pruner,
}

impl Miner for LevelwiseMiner {

    fn mine( &self, database: &UncertainDatabase ) -> MiningResult {
	match self.run::<Infallible, _>( database, |_| Ok( () )) {
	    Ok( result ) => result,
	    Err( never ) => match never {},
	}
    }

    fn mine_into( &self, database: &UncertainDatabase, sink: &mut dyn ResultSink ) -> crate::error::Result<MiningResult> {
	self.run( database, |level| {
	    for frequent in level {
		let key = database.describe( frequent.itemset() );
		if !sink.already_emitted( &key ) {
		    sink.emit( &key, frequent )?;
		}
	    }
	    Ok( () )
	})
    }
}

impl LevelwiseMiner {

    pub fn new( config: MinerConfig ) -> LevelwiseMiner {
	LevelwiseMiner { config }
    }

    pub fn config( &self ) -> &MinerConfig {
	&self.config
    }

    /// Runs the level-wise search. `on_level` sees each level's frequent itemsets once.
    fn run<E, F>( &self, database: &UncertainDatabase, mut on_level: F ) -> Result<MiningResult, E> where
	F: FnMut( &[FrequentItemset] ) -> Result<(), E>,
    {
	let start = Instant::now();
	let calculator = Frequentness::from_config( database, &self.config );
	let mut result = MiningResult::default();
	info!( "Mining {} transactions over {} items ({:?})", database.len(), database.items().len(), calculator.estimator() );

	let universe = database.create_universe();
	let singletons: Vec<Itemset> = universe.iter()
	    .map( |item| Itemset::singleton( *item, database.items() ))
	    .collect();
	let level_one = {
	    let _span = info_span!( "level", k = 1 ).entered();
	    self.verify( &calculator, singletons, &mut result.stats, 1, 0 )
	};
	if level_one.is_empty() {
	    result.stats.elapsed = start.elapsed();
	    info!( "No frequent items" );
	    return Ok( result );
	}
	on_level( &level_one )?;
	result.levels.insert( 1, level_one );
	if self.config.max_itemset_size() == Some( 1 ) {
	    result.stats.elapsed = start.elapsed();
	    result.log( "mining finished", Level::INFO );
	    return Ok( result );
	}

	let mut extender = Extender::new( database, universe, &calculator, &self.config );
	extender.absorb( &result.levels[&1] );
	result.stats.mu_hat = Some( extender.pruner.context().mu_hat );
	debug!( "mu-hat {:.6}, active rules {:?}", extender.pruner.context().mu_hat, extender.pruner.rules() );

	let mut k = 2;
	while self.config.max_itemset_size().map_or( true, |max| k <= max ) {
	    let _span = info_span!( "level", k ).entered();
	    let (candidates, pruned) = extender.generate( &result.levels[&( k - 1 )] );
	    result.stats.pruned = result.stats.pruned.merge( pruned );
	    debug!( "{} candidates, {} pruned", candidates.len(), pruned.total() );
	    if candidates.is_empty() {
		break;
	    }

	    let level = self.verify( &calculator, candidates, &mut result.stats, k, pruned.total() );
	    if level.is_empty() {
		break;
	    }
	    on_level( &level )?;
	    extender.absorb( &level );
	    result.levels.insert( k, level );
	    k += 1;
	}

	result.stats.elapsed = start.elapsed();
	result.log( "mining finished", Level::INFO );
	Ok( result )
    }

    /// Scores the candidates in parallel and keeps those reaching the threshold, in candidate order.
    fn verify( &self, calculator: &Frequentness, candidates: Vec<Itemset>, stats: &mut MiningStats, size: usize, pruned: usize ) -> Vec<FrequentItemset> {
	let threshold = self.config.score_threshold();
	let number_candidates = candidates.len();
	let frequent: Vec<FrequentItemset> = candidates.into_par_iter()
	    .filter_map( |candidate| calculator.verify( candidate, threshold ))
	    .collect();

	info!( "{} of {} candidates are frequent", frequent.len(), number_candidates );
	stats.levels.push( LevelStats { size, pruned, candidates: number_candidates, retained: frequent.len() } );
	frequent
    }
}

impl <'a> Extender<'a> {

    fn new( database: &'a UncertainDatabase, universe: Vec<Item>, calculator: &Frequentness, config: &MinerConfig ) -> Extender<'a> {
	let max_weight = database.items().max_weight();
	let minimum_support = config.minimum_support() as i64;
	let context = PruningContext {
	    mu_hat: solve_mu_hat_threshold( minimum_support, config.score_threshold() / max_weight ),
	    number_transactions: database.len(),
	    alpha: config.approx_prune_alpha(),
	    min_average_weight: config.min_average_weight(),
	    threshold: config.score_threshold(),
	    max_weight,
	    minimum_support,
	};
	Extender {
	    database,
	    universe,
	    item_mus: calculator.item_mus(),
	    i0: BitSet::with_capacity( database.items().len() ),
	    pruner: Pruner::new( context, config ),
	}
    }

    /// Adds the items of a new level to I0.
    fn absorb( &mut self, level: &[FrequentItemset] ) {
	for frequent in level {
	    for item in frequent.items() {
		self.i0.insert( *item );
	    }
	}
    }

    /// Candidates of the next level as a set, plus how many extensions each rule pruned.
    fn generate( &self, previous: &[FrequentItemset] ) -> (Vec<Itemset>, PruneCounts) {
	let per_base: Vec<(Vec<Itemset>, PruneCounts)> = previous.par_iter()
	    .map( |base| self.extend( base ))
	    .collect();

	let mut candidates: BTreeSet<Itemset> = BTreeSet::new();
	let mut pruned = PruneCounts::default();
	for (extensions, counts) in per_base {
	    candidates.extend( extensions );
	    pruned = pruned.merge( counts );
	}
	(candidates.into_iter().collect(), pruned)
    }

    fn extend( &self, base: &FrequentItemset ) -> (Vec<Itemset>, PruneCounts) {
	let mut counts = PruneCounts::default();
	if self.pruner.prune_branch( base ) {
	    trace!( "prune branch {} by {}", self.database.describe( base.itemset() ), Rule::UpperBound );
	    counts.add( Rule::UpperBound );
	    return (Vec::new(), counts);
	}

	let items = self.database.items();
	let mut extensions = Vec::new();
	for item in &self.universe {
	    if base.itemset().contains( *item ) {
		continue;
	    }
	    let extension = Extension {
		base,
		item: *item,
		weight: items.weight( *item ),
		mu: self.item_mus[*item],
		in_i0: self.i0.contains( *item ),
	    };
	    match self.pruner.check( &extension ) {
		Some( rule ) => {
		    trace!( "prune {} + {} by {}", self.database.describe( base.itemset() ), items.name( *item ), rule );
		    counts.add( rule );
		}
		None => extensions.push( base.itemset().extend( *item, extension.weight )),
	    }
	}
	(extensions, counts)
    }
}

impl MiningResult {

    pub fn levels( &self ) -> &BTreeMap<usize, Vec<FrequentItemset>> {
	&self.levels
    }

    /// Frequent itemsets of the given size; empty if there are none.
    pub fn level( &self, size: usize ) -> &[FrequentItemset] {
	self.levels.get( &size ).map( |level| level.as_slice() ).unwrap_or( &[] )
    }

    pub fn iter( &self ) -> impl Iterator<Item = &FrequentItemset> {
	self.levels.values().flat_map( |level| level.iter() )
    }

    /// Total number of frequent itemsets
    pub fn len( &self ) -> usize {
	self.levels.values().map( |level| level.len() ).sum()
    }

    pub fn is_empty( &self ) -> bool {
	self.levels.is_empty()
    }

    pub fn stats( &self ) -> &MiningStats {
	&self.stats
    }

    pub fn find( &self, itemset: &Itemset ) -> Option<&FrequentItemset> {
	self.level( itemset.len() ).iter().find( |frequent| frequent.itemset() == itemset )
    }

    /// Item vectors per level, for comparing runs.
    pub fn itemsets( &self ) -> BTreeMap<usize, Vec<Vec<Item>>> {
	self.levels.iter()
	    .map( |(size, level)| (*size, level.iter().map( |f| f.items().to_vec() ).collect()) )
	    .collect()
    }
}

impl Loggable for MiningResult {
    fn log( &self, message: &str, level: Level ) {
	let stats = &self.stats;
	let pruned: Vec<String> = Rule::ALL.iter()
	    .filter( |rule| stats.pruned.get( **rule ) > 0 )
	    .map( |rule| format!( "{rule}={}", stats.pruned.get( *rule )))
	    .collect();
	let summary = format!( "{message}: {} frequent itemsets in {} levels, pruned [{}], {}ms",
			       self.len(), self.levels.len(), pruned.join( " " ), stats.elapsed.as_millis() );
	match level {
	    Level::ERROR => error!( "{summary}" ),
	    Level::WARN => warn!( "{summary}" ),
	    Level::INFO => info!( "{summary}" ),
	    Level::DEBUG => debug!( "{summary}" ),
	    _ => trace!( "{summary}" ),
	}
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::config::{ApproxFamily, PruningFlags};
    use crate::data::{milk_fruit, DatabaseBuilder};
    use crate::error::Result;
    use crate::io::ResultSink;
    use crate::model::{poisson_tail_at_least, normal_tail_at_least};

    /// Five items over five transactions. Item e is rare.
    fn grocery( weights: [f64; 5] ) -> UncertainDatabase {
	let mut builder = DatabaseBuilder::default();
	for (name, weight) in ["a", "b", "c", "d", "e"].iter().zip( weights.iter() ) {
	    builder.set_weight( name, *weight ).unwrap();
	}
	builder.add_transaction( vec!( ("a", 0.9), ("b", 0.8), ("c", 0.7), ("e", 0.1) ));
	builder.add_transaction( vec!( ("a", 0.8), ("b", 0.9), ("d", 0.5) ));
	builder.add_transaction( vec!( ("a", 1.0), ("c", 0.6), ("d", 0.4) ));
	builder.add_transaction( vec!( ("b", 0.7), ("c", 0.9), ("e", 0.2) ));
	builder.add_transaction( vec!( ("a", 0.6), ("b", 0.6), ("c", 0.5), ("d", 0.3) ));
	builder.build()
    }

    fn poisson( msup: i64, threshold: f64 ) -> crate::config::MinerConfigBuilder {
	MinerConfig::builder( msup, threshold ).approximate( ApproxFamily::Poisson )
    }

    fn mine( db: &UncertainDatabase, config: crate::config::MinerConfigBuilder ) -> MiningResult {
	LevelwiseMiner::new( config.build().unwrap() ).mine( db )
    }

    #[test]
    fn test_scenario_poisson() {
	let db = milk_fruit();
	let fruit = db.items().lookup( "Fruit" ).unwrap();
	let milk = db.items().lookup( "Milk" ).unwrap();
	let result = mine( &db, poisson( 2, 0.2 ).alpha( 0.6 ));

	// Milk alone scores 0.4 * P(Poisson(1.4) >= 2) < 0.2
	assert_eq!( result.itemsets().get( &1 ), Some( &vec!( vec!( fruit ))));
	let single = &result.level( 1 )[0];
	assert_approx!( single.mu(), 1.8, 1e-12 );
	assert_approx!( single.score(), 0.9 * poisson_tail_at_least( 2, 1.8 ), 1e-12 );

	assert_eq!( result.level( 2 ).len(), 1 );
	let pair = &result.level( 2 )[0];
	assert_eq!( pair.items(), &[fruit, milk] );
	assert_approx!( pair.mu(), 1.2, 1e-12 );
	assert_approx!( pair.avg_weight(), 0.65, 1e-12 );
	assert_approx!( pair.score(), 0.65 * poisson_tail_at_least( 2, 1.2 ), 1e-12 );
	assert_eq!( result.len(), 2 );
	assert!( result.level( 3 ).is_empty() );
	assert!( result.stats().mu_hat.is_some() );
    }

    #[test]
    fn test_scenario_exact() {
	let db = milk_fruit();
	let result = mine( &db, MinerConfig::builder( 2, 0.2 ));
	assert_eq!( result.level( 1 ).len(), 1 );
	assert_approx!( result.level( 1 )[0].probability(), 0.8, 1e-12 );
	// P(both present twice) = 0.4 * 0.8
	assert_eq!( result.level( 2 ).len(), 1 );
	assert_approx!( result.level( 2 )[0].probability(), 0.32, 1e-12 );
	assert_approx!( result.level( 2 )[0].score(), 0.65 * 0.32, 1e-12 );
    }

    #[test]
    fn test_scenario_normal() {
	let db = milk_fruit();
	let result = mine( &db, MinerConfig::builder( 2, 0.2 ).approximate( ApproxFamily::Normal ));
	assert_eq!( result.level( 2 ).len(), 1 );
	assert_approx!( result.level( 2 )[0].probability(), normal_tail_at_least( 2, 1.2, 0.4 ), 1e-12 );
    }

    #[test]
    fn test_empty_inputs() {
	let empty = DatabaseBuilder::default().build();
	let result = mine( &empty, MinerConfig::builder( 1, 0.1 ));
	assert!( result.is_empty() );
	assert_eq!( result.len(), 0 );
	assert_eq!( result.stats().mu_hat, None );

	// transactions without items
	let mut builder = DatabaseBuilder::default();
	builder.add_transaction( Vec::<(&str, f64)>::new() );
	let result = mine( &builder.build(), MinerConfig::builder( 1, 0.1 ));
	assert!( result.is_empty() );

	// nothing frequent
	let result = mine( &milk_fruit(), MinerConfig::builder( 2, 1.0 ));
	assert!( result.is_empty() );
    }

    #[test]
    fn test_max_itemset_size() {
	let db = grocery( [0.8; 5] );
	let unbounded = mine( &db, poisson( 2, 0.3 ));
	assert!( !unbounded.level( 2 ).is_empty() );

	let bounded = mine( &db, poisson( 2, 0.3 ).max_itemset_size( Some( 1 )));
	assert_eq!( bounded.levels().len(), 1 );
	assert_eq!( bounded.stats().mu_hat, None );
	assert_eq!( bounded.level( 1 ), unbounded.level( 1 ));

	let bounded = mine( &db, poisson( 2, 0.3 ).max_itemset_size( Some( 2 )));
	assert!( bounded.level( 3 ).is_empty() );
	assert_eq!( bounded.level( 2 ), unbounded.level( 2 ));
    }

    #[test]
    fn test_levels_are_partitioned_by_size() {
	let db = grocery( [1.0, 0.6, 0.9, 0.4, 0.7] );
	let result = mine( &db, MinerConfig::builder( 2, 0.3 ));
	for (size, level) in result.levels() {
	    assert!( !level.is_empty() );
	    for frequent in level {
		assert_eq!( frequent.len(), *size );
		assert!( frequent.score() >= 0.3 );
	    }
	}
    }

    #[test]
    fn test_sound_rules_keep_results_uniform_weights() {
	// with equal weights, an item outside I0 cannot raise the score of any superset
	let db = grocery( [0.8; 5] );
	let pruned = mine( &db, poisson( 2, 0.3 ));
	let unpruned = mine( &db, poisson( 2, 0.3 ).pruning( PruningFlags::none() ));

	assert!( pruned.stats().pruned.get( Rule::Weight ) > 0 );
	assert!( !pruned.level( 2 ).is_empty() );
	assert_eq!( pruned.itemsets(), unpruned.itemsets() );
	assert_eq!( unpruned.stats().pruned.total(), 0 );
    }

    #[test]
    fn test_sound_rules_keep_results_mixed_weights() {
	let db = grocery( [1.0, 0.6, 0.9, 0.4, 0.7] );
	let flags = PruningFlags { weight: false, mu_hat: true, upper_bound: true };
	let pruned = mine( &db, poisson( 2, 0.3 ).pruning( flags ));
	let unpruned = mine( &db, poisson( 2, 0.3 ).pruning( PruningFlags::none() ));

	// e has mu 0.3, far below mu-hat
	assert!( pruned.stats().pruned.get( Rule::MuHat ) > 0 );
	assert_eq!( pruned.itemsets(), unpruned.itemsets() );
    }

    #[test]
    fn test_approx_pruning_only_loses_results() {
	let db = grocery( [1.0, 0.6, 0.9, 0.4, 0.7] );
	let unpruned = mine( &db, poisson( 2, 0.3 ).pruning( PruningFlags::none() ));
	let lossy = mine( &db, poisson( 2, 0.3 ).pruning( PruningFlags::none() ).alpha( 0.9 ));

	let all: BTreeSet<Vec<Item>> = unpruned.iter().map( |f| f.items().to_vec() ).collect();
	for frequent in lossy.iter() {
	    assert!( all.contains( frequent.items() ));
	}
	assert!( lossy.len() <= unpruned.len() );
    }

    #[test]
    fn test_large_support_is_not_frequent() {
	// mu = 800 stays far below msup = 900 under every estimator
	let mut builder = DatabaseBuilder::default();
	for _ in 0 .. 1000 {
	    builder.add_transaction( vec!( ("a", 0.8) ));
	}
	let db = builder.build();
	assert!( mine( &db, poisson( 900, 0.5 )).is_empty() );
	assert!( mine( &db, MinerConfig::builder( 900, 0.5 )).is_empty() );

	// below the mean it is frequent
	let result = mine( &db, poisson( 700, 0.5 ));
	assert_eq!( result.len(), 1 );
	assert!( result.level( 1 )[0].probability() > 0.99 );
    }

    #[test]
    fn test_levels_hold_distinct_itemsets() {
	// {a, b, c} is reachable from three different pairs
	let db = grocery( [0.8; 5] );
	let result = mine( &db, poisson( 1, 0.3 ).pruning( PruningFlags::none() ));
	assert!( !result.level( 3 ).is_empty() );
	for (size, level) in result.levels() {
	    let distinct: BTreeSet<Vec<Item>> = level.iter().map( |f| f.items().to_vec() ).collect();
	    assert_eq!( distinct.len(), level.len(), "duplicate itemsets at level {size}" );
	}
	for level in &result.stats().levels {
	    assert!( level.retained <= level.candidates );
	}
	assert!( result.stats().levels[2].candidates <= 10 );
    }

    #[test]
    fn test_idempotent() {
	let db = grocery( [1.0, 0.6, 0.9, 0.4, 0.7] );
	let miner = LevelwiseMiner::new( MinerConfig::builder( 2, 0.3 ).build().unwrap() );
	let first = miner.mine( &db );
	let second = miner.mine( &db );
	assert_eq!( first.levels(), second.levels() );
    }

    #[test]
    fn test_index_matches_scan() {
	let db = grocery( [1.0, 0.6, 0.9, 0.4, 0.7] );
	for mode in [MinerConfig::builder( 2, 0.3 ), poisson( 2, 0.3 )] {
	    let indexed = mine( &db, mode.clone().support_index( true ));
	    let scanned = mine( &db, mode.support_index( false ));
	    assert_eq!( indexed.itemsets(), scanned.itemsets() );
	    for (left, right) in indexed.iter().zip( scanned.iter() ) {
		assert_approx!( left.mu(), right.mu(), 1e-12 );
		assert_approx!( left.score(), right.score(), 1e-12 );
	    }
	}
    }

    #[derive( Default )]
    struct RecordingSink {
	seen: Vec<String>,
	written: Vec<String>,
    }

    impl ResultSink for RecordingSink {
	fn already_emitted( &self, key: &str ) -> bool {
	    self.seen.iter().any( |k| k == key )
	}

	fn emit( &mut self, key: &str, _itemset: &FrequentItemset ) -> Result<()> {
	    self.seen.push( key.to_string() );
	    self.written.push( key.to_string() );
	    Ok( () )
	}
    }

    #[test]
    fn test_sink_receives_each_itemset_once() {
	let db = milk_fruit();
	let miner = LevelwiseMiner::new( poisson( 2, 0.2 ).build().unwrap() );
	let mut sink = RecordingSink::default();
	let result = miner.mine_into( &db, &mut sink ).unwrap();
	assert_eq!( sink.written, vec!( "{Fruit}".to_string(), "{Fruit, Milk}".to_string() ));
	assert_eq!( result.len(), 2 );

	// a second run skips what is already there
	let mut sink = RecordingSink { seen: vec!( "{Fruit}".to_string() ), written: Vec::new() };
	miner.mine_into( &db, &mut sink ).unwrap();
	assert_eq!( sink.written, vec!( "{Fruit, Milk}".to_string() ));
    }
}
