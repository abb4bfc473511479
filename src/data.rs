
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::model::probability::{sanitize_probability, DEGENERATE_VALUE};

mod itemset;
pub mod tid_index;

pub use itemset::{Itemset, FrequentItemset};
pub use tid_index::TidIndex;

/// Interned item. Ids follow the lexicographic order of item names.
pub type Item = usize;
/// Position of a transaction in the database
pub type Tid = usize;
pub type Probability = f64;
pub type Weight = f64;

/// Weight given to items that are missing from the weight table
pub const DEFAULT_WEIGHT: Weight = 1.0;

/// Name and weight of every item in the universe, indexed by `Item`.
#[derive( Debug, Clone, Default )]
pub struct ItemTable {
    names: Vec<String>,
    weights: Vec<Weight>,
    by_name: FxHashMap<String, Item>,
}

/// Uncertain transaction: existential probability per item, sorted by item.
#[derive( Debug, Clone, PartialEq, Default )]
pub struct Transaction {
    entries: Vec<(Item, Probability)>,
}

/// Ordered, immutable sequence of uncertain transactions over an item table.
#[derive( Debug, Clone, Default )]
pub struct UncertainDatabase {
    items: ItemTable,
    transactions: Vec<Transaction>,
}

/// Collects named transactions and weights, then interns the items.
#[derive( Debug, Clone )]
pub struct DatabaseBuilder {
    weights: FxHashMap<String, Weight>,
    default_weight: Weight,
    transactions: Vec<Vec<(String, Probability)>>,
}

/// Maps a weight into [epsilon, inf). NaN, infinite and zero weights become epsilon.
pub fn sanitize_weight( weight: Weight ) -> Weight {
    if !weight.is_finite() || weight <= 0.0 {
	DEGENERATE_VALUE
    } else {
	weight
    }
}

impl ItemTable {

    pub fn len( &self ) -> usize {
	self.names.len()
    }

    pub fn is_empty( &self ) -> bool {
	self.names.is_empty()
    }

    pub fn name( &self, item: Item ) -> &str {
	&self.names[item]
    }

    pub fn weight( &self, item: Item ) -> Weight {
	self.weights[item]
    }

    pub fn lookup( &self, name: &str ) -> Option<Item> {
	self.by_name.get( name ).copied()
    }

    /// Largest item weight, or 1.0 for an empty universe.
    pub fn max_weight( &self ) -> Weight {
	let max = self.weights.iter().copied().fold( 0.0, f64::max );
	if max > 0.0 { max } else { 1.0 }
    }

    pub fn iter( &self ) -> impl Iterator<Item = Item> {
	0 .. self.names.len()
    }
}

impl Transaction {

    /// Creates a transaction from (item, probability) pairs. The last occurrence of an item wins.
    pub fn new <I> ( entries: I ) -> Transaction where I: IntoIterator<Item = (Item, Probability)> {
	let mut unique: FxHashMap<Item, Probability> = FxHashMap::default();
	for (item, p) in entries {
	    unique.insert( item, sanitize_probability( p ));
	}
	let mut entries: Vec<(Item, Probability)> = unique.into_iter().collect();
	entries.sort_unstable_by_key( |(item, _)| *item );
	Transaction { entries }
    }

    /// Existential probability of the item; 0 if absent.
    pub fn probability( &self, item: Item ) -> Probability {
	match self.entries.binary_search_by_key( &item, |(i, _)| *i ) {
	    Ok( index ) => self.entries[index].1,
	    Err( _ ) => 0.0,
	}
    }

    /// Probability that all items are present, assuming independence.
    pub fn presence( &self, items: &[Item] ) -> Probability {
	let mut p = 1.0;
	for item in items {
	    let p_item = self.probability( *item );
	    if p_item == 0.0 {
		return 0.0;
	    }
	    p *= p_item;
	}
	p
    }

    pub fn entries( &self ) -> &[(Item, Probability)] {
	&self.entries
    }

    pub fn len( &self ) -> usize {
	self.entries.len()
    }

    pub fn is_empty( &self ) -> bool {
	self.entries.is_empty()
    }
}

impl UncertainDatabase {

    pub fn new( items: ItemTable, transactions: Vec<Transaction> ) -> UncertainDatabase {
	UncertainDatabase { items, transactions }
    }

    pub fn items( &self ) -> &ItemTable {
	&self.items
    }

    pub fn transactions( &self ) -> &[Transaction] {
	&self.transactions
    }

    /// Number of transactions
    pub fn len( &self ) -> usize {
	self.transactions.len()
    }

    pub fn is_empty( &self ) -> bool {
	self.transactions.is_empty()
    }

    /// Creates a vector that contains all items occurring in any transaction, in id order
    pub fn create_universe( &self ) -> Vec<Item> {
	let occurring: BTreeSet<Item> = self.transactions.iter()
	    .flat_map( |t| t.entries().iter().map( |(item, _)| *item ))
	    .collect();
	occurring.into_iter().collect()
    }

    /// Renders an itemset as `{A, B}` using item names.
    pub fn describe( &self, itemset: &Itemset ) -> String {
	let names: Vec<&str> = itemset.items().iter().map( |item| self.items.name( *item )).collect();
	format!( "{{{}}}", names.join( ", " ))
    }
}

impl Default for DatabaseBuilder {
    fn default() -> DatabaseBuilder {
	DatabaseBuilder::new( DEFAULT_WEIGHT )
    }
}

impl DatabaseBuilder {

    pub fn new( default_weight: Weight ) -> DatabaseBuilder {
	DatabaseBuilder {
	    weights: FxHashMap::default(),
	    default_weight: sanitize_weight( default_weight ),
	    transactions: Vec::new(),
	}
    }

    /// Registers the weight of an item. Negative weights are rejected.
    pub fn set_weight( &mut self, name: &str, weight: Weight ) -> Result<()> {
	if weight < 0.0 && weight.is_finite() {
	    return Err( Error::NegativeWeight { item: name.to_string(), weight } );
	}
	self.weights.insert( name.to_string(), sanitize_weight( weight ));
	Ok( () )
    }

    pub fn add_transaction <'a, I> ( &mut self, entries: I ) where I: IntoIterator<Item = (&'a str, Probability)> {
	let transaction = entries.into_iter()
	    .map( |(name, p)| (name.to_string(), p) )
	    .collect();
	self.transactions.push( transaction );
    }

    pub fn number_transactions( &self ) -> usize {
	self.transactions.len()
    }

    /// Interns the items in name order and maps every transaction onto the ids.
    pub fn build( self ) -> UncertainDatabase {
	let names: BTreeSet<&String> = self.transactions.iter()
	    .flat_map( |t| t.iter().map( |(name, _)| name ))
	    .collect();

	let mut table = ItemTable::default();
	for (item, name) in names.into_iter().enumerate() {
	    let weight = self.weights.get( name ).copied().unwrap_or( self.default_weight );
	    table.names.push( name.clone() );
	    table.weights.push( weight );
	    table.by_name.insert( name.clone(), item );
	}

	let transactions = self.transactions.iter()
	    .map( |t| Transaction::new( t.iter().map( |(name, p)| (table.by_name[name], *p) )))
	    .collect();
	UncertainDatabase::new( table, transactions )
    }
}


#[cfg(test)]
pub(crate) use test::milk_fruit;
