use tracing::debug;

use crate::config::{ApproxFamily, MinerConfig, Mode};
use crate::data::{FrequentItemset, Item, Itemset, TidIndex, UncertainDatabase};

use super::probability::{dp_tail_at_least, normal_tail_at_least, poisson_tail_at_least};

/// Backend computing P(support >= msup), fixed at configuration time.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Estimator {
    /// Poisson-Binomial dynamic program
    Exact,
    Poisson,
    /// Normal with continuity correction
    Normal,
}

/// Support statistics of one itemset, derived from a single pass over its presence probabilities.
#[derive( Debug, Clone, Copy, PartialEq )]
pub struct Evaluation {
    pub mu: f64,
    pub variance: f64,
    pub probability: f64,
}

/// Scores itemsets against a database, optionally through a `TidIndex`.
pub struct Frequentness<'a> {
    database: &'a UncertainDatabase,
    index: Option<TidIndex>,
    estimator: Estimator,
    minimum_support: i64,
}

impl Estimator {

    pub fn from_config( config: &MinerConfig ) -> Estimator {
	match (config.mode(), config.approx_family()) {
	    (Mode::Exact, _) => Estimator::Exact,
	    (Mode::Approximate, ApproxFamily::Poisson) => Estimator::Poisson,
	    (Mode::Approximate, ApproxFamily::Normal) => Estimator::Normal,
	}
    }

    /// Tail probability given the non-zero presence probabilities and their moments.
    pub fn tail_at_least( &self, msup: i64, presence: &[f64], mu: f64, variance: f64 ) -> f64 {
	match self {
	    Estimator::Exact => dp_tail_at_least( msup, presence ),
	    Estimator::Poisson => poisson_tail_at_least( msup, mu ),
	    Estimator::Normal => normal_tail_at_least( msup, mu, variance ),
	}
    }
}

impl <'a> Frequentness<'a> {

    pub fn new( database: &'a UncertainDatabase, estimator: Estimator, minimum_support: i64, use_index: bool ) -> Frequentness<'a> {
	let index = if use_index {
	    let index = TidIndex::new( database );
	    debug!( "Built support index over {} items", database.items().len() );
	    Some( index )
	} else { None };

	Frequentness { database, index, estimator, minimum_support }
    }

    pub fn from_config( database: &'a UncertainDatabase, config: &MinerConfig ) -> Frequentness<'a> {
	Frequentness::new( database, Estimator::from_config( config ), config.minimum_support() as i64, config.use_support_index() )
    }

    pub fn estimator( &self ) -> Estimator {
	self.estimator
    }

    /// Non-zero probabilities that the itemset is present, one per supporting transaction.
    pub fn presence( &self, itemset: &Itemset ) -> Vec<f64> {
	match &self.index {
	    Some( index ) => index.presence( itemset.items() ).into_iter().map( |(_, p)| p ).collect(),
	    None => self.database.transactions().iter()
		.map( |t| t.presence( itemset.items() ))
		.filter( |p| *p > 0.0 )
		.collect(),
	}
    }

    /// Expected support: sum over transactions of the presence probability.
    pub fn mu( &self, itemset: &Itemset ) -> f64 {
	self.presence( itemset ).iter().sum()
    }

    pub fn variance( &self, itemset: &Itemset ) -> f64 {
	self.presence( itemset ).iter().map( |p| p * ( 1.0 - p )).sum()
    }

    pub fn prob_at_least( &self, itemset: &Itemset ) -> f64 {
	self.evaluate( itemset ).probability
    }

    pub fn evaluate( &self, itemset: &Itemset ) -> Evaluation {
	let presence = self.presence( itemset );
	let mu: f64 = presence.iter().sum();
	// only the normal approximation needs the variance
	let variance: f64 = presence.iter().map( |p| p * ( 1.0 - p )).sum();
	let probability = self.estimator.tail_at_least( self.minimum_support, &presence, mu, variance );
	Evaluation { mu, variance, probability }
    }

    /// Weighted frequentness: average weight times P(support >= msup).
    pub fn score( &self, itemset: &Itemset ) -> f64 {
	itemset.avg_weight() * self.prob_at_least( itemset )
    }

    /// Evaluates the itemset and keeps it if its score reaches the threshold.
    pub fn verify( &self, itemset: Itemset, threshold: f64 ) -> Option<FrequentItemset> {
	let evaluation = self.evaluate( &itemset );
	let score = itemset.avg_weight() * evaluation.probability;
	if score >= threshold {
	    Some( FrequentItemset::new( itemset, evaluation.mu, evaluation.probability, score ))
	} else {
	    None
	}
    }

    /// Expected support of every item of the table, indexed by item.
    pub fn item_mus( &self ) -> Vec<f64> {
	let items = self.database.items();
	match &self.index {
	    Some( index ) => items.iter()
		.map( |item| index.posting( item ).iter().map( |(_, p)| p ).sum::<f64>() )
		.collect(),
	    None => {
		let mut mus = vec!( 0.0; items.len() );
		for transaction in self.database.transactions() {
		    for (item, p) in transaction.entries() {
			mus[*item] += p;
		    }
		}
		mus
	    }
	}
    }

    /// Expected support of a single item.
    pub fn item_mu( &self, item: Item ) -> f64 {
	self.mu( &Itemset::singleton( item, self.database.items() ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::milk_fruit;
    use crate::model::probability::poisson_tail_at_least;

    #[test]
    fn test_scenario_statistics() {
	let db = milk_fruit();
	let fruit = db.items().lookup( "Fruit" ).unwrap();
	let milk = db.items().lookup( "Milk" ).unwrap();
	for use_index in [false, true] {
	    let calculator = Frequentness::new( &db, Estimator::Poisson, 2, use_index );
	    let both = Itemset::new( vec!( milk, fruit ), db.items() );
	    assert_approx!( calculator.item_mu( milk ), 1.4, 1e-12 );
	    assert_approx!( calculator.item_mu( fruit ), 1.8, 1e-12 );
	    assert_approx!( calculator.mu( &both ), 1.2, 1e-12 );
	    assert_approx!( calculator.variance( &both ), 0.4 * 0.6 + 0.8 * 0.2, 1e-12 );

	    let mus = calculator.item_mus();
	    assert_approx!( mus[milk], 1.4, 1e-12 );
	    assert_approx!( mus[fruit], 1.8, 1e-12 );

	    // scores are reproduced exactly from the Poisson tail
	    let milk_set = Itemset::singleton( milk, db.items() );
	    assert_eq!( calculator.score( &milk_set ), 0.4 * poisson_tail_at_least( 2, calculator.mu( &milk_set )));
	    assert_approx!( calculator.score( &milk_set ), 0.4 * poisson_tail_at_least( 2, 1.4 ), 1e-12 );
	    let fruit_set = Itemset::singleton( fruit, db.items() );
	    assert_eq!( calculator.score( &fruit_set ), 0.9 * poisson_tail_at_least( 2, calculator.mu( &fruit_set )));
	    assert_approx!( calculator.score( &fruit_set ), 0.9 * poisson_tail_at_least( 2, 1.8 ), 1e-12 );
	}
    }

    #[test]
    fn test_estimators() {
	let db = milk_fruit();
	let milk = db.items().lookup( "Milk" ).unwrap();
	let fruit = db.items().lookup( "Fruit" ).unwrap();
	let both = Itemset::new( vec!( milk, fruit ), db.items() );

	let exact = Frequentness::new( &db, Estimator::Exact, 2, true );
	assert_approx!( exact.prob_at_least( &both ), 0.4 * 0.8, 1e-12 );
	assert_approx!( exact.prob_at_least( &Itemset::singleton( milk, db.items() )), 0.4, 1e-12 );

	let normal = Frequentness::new( &db, Estimator::Normal, 2, false );
	let evaluation = normal.evaluate( &both );
	assert_approx!( evaluation.probability, normal_tail_at_least( 2, 1.2, 0.4 ), 1e-12 );

	// beyond the number of transactions nothing is frequent
	let too_high = Frequentness::new( &db, Estimator::Exact, 3, true );
	assert_eq!( too_high.prob_at_least( &both ), 0.0 );
    }

    #[test]
    fn test_verify_threshold() {
	let db = milk_fruit();
	let milk = db.items().lookup( "Milk" ).unwrap();
	let fruit = db.items().lookup( "Fruit" ).unwrap();
	let calculator = Frequentness::new( &db, Estimator::Exact, 2, true );

	assert!( calculator.verify( Itemset::singleton( milk, db.items() ), 0.2 ).is_none() );
	let accepted = calculator.verify( Itemset::singleton( fruit, db.items() ), 0.2 ).unwrap();
	assert_approx!( accepted.mu(), 1.8, 1e-12 );
	assert_approx!( accepted.probability(), 0.8, 1e-12 );
	assert_approx!( accepted.score(), 0.72, 1e-12 );
    }

    #[test]
    fn test_estimator_from_config() {
	let exact = MinerConfig::builder( 2, 0.2 ).build().unwrap();
	assert_eq!( Estimator::from_config( &exact ), Estimator::Exact );
	let normal = MinerConfig::builder( 2, 0.2 ).approximate( ApproxFamily::Normal ).build().unwrap();
	assert_eq!( Estimator::from_config( &normal ), Estimator::Normal );
	let poisson = MinerConfig::builder( 2, 0.2 ).approximate( ApproxFamily::Poisson ).build().unwrap();
	assert_eq!( Estimator::from_config( &poisson ), Estimator::Poisson );
    }
}
