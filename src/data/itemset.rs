use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use super::{Item, ItemTable, Weight};

/// Non-empty set of items in canonical (ascending id) order.
///
/// Average and minimum weight are derived once at construction. Equality,
/// hashing and ordering only look at the items.
#[derive( Debug, Clone )]
pub struct Itemset {
    items: Vec<Item>,
    avg_weight: Weight,
    min_weight: Weight,
}

/// An itemset that passed verification, together with the statistics it was accepted on.
#[derive( Debug, Clone, PartialEq )]
pub struct FrequentItemset {
    itemset: Itemset,
    /// expected support
    mu: f64,
    /// P(support >= msup) under the configured estimator
    probability: f64,
    score: f64,
}

impl Itemset {

    /// Creates an itemset from arbitrary items. Duplicates collapse.
    pub fn new( mut items: Vec<Item>, table: &ItemTable ) -> Itemset {
	assert!( !items.is_empty(), "itemsets are non-empty" );
	items.sort_unstable();
	items.dedup();
	let weights = items.iter().map( |item| table.weight( *item ));
	let (sum, min) = weights.fold( (0.0, f64::INFINITY), |(sum, min), w| (sum + w, min.min( w )));
	Itemset {
	    avg_weight: sum / items.len() as f64,
	    min_weight: min,
	    items,
	}
    }

    pub fn singleton( item: Item, table: &ItemTable ) -> Itemset {
	Itemset::new( vec!( item ), table )
    }

    /// X with one more item. Returns a copy of X if the item is already present.
    pub fn extend( &self, item: Item, weight: Weight ) -> Itemset {
	let mut items = self.items.clone();
	match items.binary_search( &item ) {
	    Ok( _ ) => return self.clone(),
	    Err( position ) => items.insert( position, item ),
	}
	Itemset {
	    avg_weight: self.avg_weight_with( weight ),
	    min_weight: self.min_weight.min( weight ),
	    items,
	}
    }

    /// Average weight of X after adding an item of the given weight.
    pub fn avg_weight_with( &self, weight: Weight ) -> Weight {
	let sum = self.avg_weight * self.items.len() as f64 + weight;
	sum / ( self.items.len() + 1 ) as f64
    }

    pub fn items( &self ) -> &[Item] {
	&self.items
    }

    pub fn contains( &self, item: Item ) -> bool {
	self.items.binary_search( &item ).is_ok()
    }

    pub fn len( &self ) -> usize {
	self.items.len()
    }

    pub fn avg_weight( &self ) -> Weight {
	self.avg_weight
    }

    pub fn min_weight( &self ) -> Weight {
	self.min_weight
    }
}

impl PartialEq for Itemset {
    fn eq( &self, other: &Itemset ) -> bool {
	self.items == other.items
    }
}

impl Eq for Itemset {}

impl Hash for Itemset {
    fn hash<H: Hasher>( &self, state: &mut H ) {
	self.items.hash( state );
    }
}

impl PartialOrd for Itemset {
    fn partial_cmp( &self, other: &Itemset ) -> Option<Ordering> {
	Some( self.cmp( other ))
    }
}

impl Ord for Itemset {
    fn cmp( &self, other: &Itemset ) -> Ordering {
	self.items.cmp( &other.items )
    }
}

impl FrequentItemset {

    pub fn new( itemset: Itemset, mu: f64, probability: f64, score: f64 ) -> FrequentItemset {
	FrequentItemset { itemset, mu, probability, score }
    }

    pub fn itemset( &self ) -> &Itemset { &self.itemset }
    pub fn items( &self ) -> &[Item] { self.itemset.items() }
    pub fn avg_weight( &self ) -> Weight { self.itemset.avg_weight() }
    pub fn min_weight( &self ) -> Weight { self.itemset.min_weight() }
    pub fn mu( &self ) -> f64 { self.mu }
    pub fn probability( &self ) -> f64 { self.probability }
    pub fn score( &self ) -> f64 { self.score }
    pub fn len( &self ) -> usize { self.itemset.len() }
}
