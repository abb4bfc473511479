//! Vertical layout of the database: one posting list of (tid, probability) per item.

use super::{Item, Probability, Tid, UncertainDatabase};

pub type Posting = (Tid, Probability);

/// Per-item posting lists sorted by transaction id. Built once, read-only afterwards.
#[derive( Debug, Clone, Default )]
pub struct TidIndex {
    postings: Vec<Vec<Posting>>,
    number_transactions: usize,
}

impl TidIndex {

    pub fn new( database: &UncertainDatabase ) -> TidIndex {
	let mut postings: Vec<Vec<Posting>> = vec!( Vec::new(); database.items().len() );
	for (tid, transaction) in database.transactions().iter().enumerate() {
	    for (item, p) in transaction.entries() {
		if *p > 0.0 {
		    postings[*item].push( (tid, *p) );
		}
	    }
	}
	// tids are visited in ascending order, so every list is sorted already
	TidIndex {
	    postings,
	    number_transactions: database.len(),
	}
    }

    pub fn posting( &self, item: Item ) -> &[Posting] {
	self.postings.get( item ).map( |list| list.as_slice() ).unwrap_or( &[] )
    }

    pub fn number_transactions( &self ) -> usize {
	self.number_transactions
    }

    /// Presence probability of the itemset in every transaction containing all its items.
    ///
    /// The shortest posting list drives the intersection; the others are binary searched.
    pub fn presence( &self, items: &[Item] ) -> Vec<Posting> {
	let lists: Vec<&[Posting]> = items.iter().map( |item| self.posting( *item )).collect();
	let driver = match lists.iter().enumerate().min_by_key( |(_, list)| list.len() ) {
	    Some( (index, _) ) => index,
	    None => return Vec::new(),
	};

	let mut presence = Vec::with_capacity( lists[driver].len() );
	'driver: for (tid, p_driver) in lists[driver] {
	    let mut p = *p_driver;
	    for (index, list) in lists.iter().enumerate() {
		if index == driver {
		    continue;
		}
		match list.binary_search_by_key( tid, |(t, _)| *t ) {
		    Ok( position ) => p *= list[position].1,
		    Err( _ ) => continue 'driver,
		}
	    }
	    presence.push( (*tid, p) );
	}
	presence
    }

    /// Expected support of the itemset.
    pub fn mu( &self, items: &[Item] ) -> f64 {
	self.presence( items ).iter().map( |(_, p)| p ).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::{DatabaseBuilder, Itemset};
    use crate::model::{Estimator, Frequentness};

    fn sparse_database() -> UncertainDatabase {
	let mut builder = DatabaseBuilder::default();
	builder.add_transaction( vec!( ("a", 0.5), ("b", 0.9) ));
	builder.add_transaction( vec!( ("a", 0.25), ("c", 0.3) ));
	builder.add_transaction( vec!( ("a", 1.0), ("b", 0.4), ("c", 0.6) ));
	builder.add_transaction( vec!( ("b", 0.7), ("c", 0.0) ));
	builder.add_transaction( vec!() );
	builder.add_transaction( vec!( ("a", 0.8), ("b", 0.1), ("c", 0.2) ));
	builder.build()
    }

    #[test]
    fn test_postings() {
	let db = sparse_database();
	let index = TidIndex::new( &db );
	assert_eq!( index.number_transactions(), 6 );
	assert_eq!( index.posting( 0 ), &[(0, 0.5), (1, 0.25), (2, 1.0), (5, 0.8)] );
	// zero probabilities are not indexed
	assert_eq!( index.posting( 2 ), &[(1, 0.3), (2, 0.6), (5, 0.2)] );
	assert!( index.posting( 17 ).is_empty() );
    }

    #[test]
    fn test_intersection() {
	let db = sparse_database();
	let index = TidIndex::new( &db );
	let presence = index.presence( &[0, 1, 2] );
	assert_eq!( presence.len(), 2 );
	assert_eq!( presence[0].0, 2 );
	assert_approx!( presence[0].1, 1.0 * 0.4 * 0.6, 1e-12 );
	assert_eq!( presence[1].0, 5 );
	assert_approx!( presence[1].1, 0.8 * 0.1 * 0.2, 1e-12 );
	assert!( index.presence( &[] ).is_empty() );
    }

    #[test]
    fn test_matches_scan() {
	let db = sparse_database();
	let index = TidIndex::new( &db );
	let scan = Frequentness::new( &db, Estimator::Exact, 1, false );
	let candidates = vec!( vec!( 0 ), vec!( 1 ), vec!( 2 ), vec!( 0, 1 ), vec!( 0, 2 ), vec!( 1, 2 ), vec!( 0, 1, 2 ));
	for items in candidates {
	    let itemset = Itemset::new( items.clone(), db.items() );
	    assert_approx!( index.mu( &items ), scan.mu( &itemset ), 1e-12 );
	}
	// singleton mu is the plain sum of probabilities
	assert_approx!( index.mu( &[0] ), 0.5 + 0.25 + 1.0 + 0.8, 1e-12 );
    }
}
