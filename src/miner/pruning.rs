//! Rules that skip candidate extensions Y = X + {I} before they are verified.
//!
//! Every rule is a pure predicate over a shared `PruningContext`; `Pruner`
//! keeps the ordered list of rules enabled by the configuration. Weight,
//! mu-hat and upper-bound pruning never drop a result under the Poisson score;
//! approximate-mu pruning (alpha > 0) trades recall for speed.

use std::fmt;

use crate::config::MinerConfig;
use crate::data::{FrequentItemset, Item, Weight};
use crate::model::poisson_tail_at_least;

#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum Rule {
    Weight,
    AverageWeight,
    MuHat,
    ApproxMu,
    /// branch-level: prunes every extension of X at once
    UpperBound,
}

/// Per-run constants the rules compare against.
#[derive( Debug, Clone, PartialEq )]
pub struct PruningContext {
    pub mu_hat: f64,
    pub number_transactions: usize,
    pub alpha: f64,
    pub min_average_weight: f64,
    pub threshold: f64,
    pub max_weight: Weight,
    pub minimum_support: i64,
}

/// Candidate Y = X + {item} under consideration.
#[derive( Debug, Clone )]
pub struct Extension<'a> {
    pub base: &'a FrequentItemset,
    pub item: Item,
    pub weight: Weight,
    /// expected support of the single item
    pub mu: f64,
    /// whether the item already occurred in a frequent itemset
    pub in_i0: bool,
}

const NUMBER_RULES: usize = 5;

pub type Predicate = fn( &PruningContext, &Extension ) -> bool;

/// Ordered list of active rules.
#[derive( Clone )]
pub struct Pruner {
    context: PruningContext,
    rules: Vec<(Rule, Predicate)>,
    upper_bound: bool,
}

/// Number of pruned candidates per rule.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct PruneCounts {
    counts: [usize; NUMBER_RULES],
}

impl Rule {
    pub const ALL: [Rule; NUMBER_RULES] = [Rule::Weight, Rule::AverageWeight, Rule::MuHat, Rule::ApproxMu, Rule::UpperBound];

    fn index( self ) -> usize {
	match self {
	    Rule::Weight => 0,
	    Rule::AverageWeight => 1,
	    Rule::MuHat => 2,
	    Rule::ApproxMu => 3,
	    Rule::UpperBound => 4,
	}
    }

    pub fn name( self ) -> &'static str {
	match self {
	    Rule::Weight => "weight",
	    Rule::AverageWeight => "average-weight",
	    Rule::MuHat => "mu-hat",
	    Rule::ApproxMu => "approx-mu",
	    Rule::UpperBound => "upper-bound",
	}
    }
}

impl fmt::Display for Rule {
    fn fmt( &self, f: &mut fmt::Formatter ) -> fmt::Result {
	write!( f, "{}", self.name() )
    }
}

fn clean_mu( mu: f64 ) -> f64 {
    if mu.is_nan() || mu < 0.0 { 0.0 } else { mu }
}

/// Items outside I0 must be strictly lighter than every item of X.
pub fn prune_by_weight( _context: &PruningContext, extension: &Extension ) -> bool {
    !extension.in_i0 && extension.weight >= extension.base.min_weight()
}

pub fn prune_by_average_weight( context: &PruningContext, extension: &Extension ) -> bool {
    extension.base.itemset().avg_weight_with( extension.weight ) < context.min_average_weight
}

/// mu(Y) <= min(mu(X), mu(I)), so Y cannot reach the threshold below mu-hat.
pub fn prune_by_mu_hat( context: &PruningContext, extension: &Extension ) -> bool {
    f64::min( clean_mu( extension.base.mu() ), clean_mu( extension.mu )) < context.mu_hat
}

/// Lossy: estimates mu(Y) by mu(X) * mu(I) / n.
pub fn prune_by_approx_mu( context: &PruningContext, extension: &Extension ) -> bool {
    if context.alpha <= 0.0 {
	return false;
    }
    let left = clean_mu( extension.base.mu() ) * clean_mu( extension.mu );
    left < context.alpha * context.number_transactions as f64 * context.mu_hat
}

/// No extension of X can score above max weight times the Poisson tail of mu(X).
pub fn prune_branch_by_upper_bound( context: &PruningContext, base: &FrequentItemset ) -> bool {
    let bound = context.max_weight * poisson_tail_at_least( context.minimum_support, clean_mu( base.mu() ));
    bound < context.threshold
}

impl Pruner {

    pub fn new( context: PruningContext, config: &MinerConfig ) -> Pruner {
	let flags = config.pruning();
	let mut rules: Vec<(Rule, Predicate)> = Vec::new();
	if flags.weight {
	    rules.push( (Rule::Weight, prune_by_weight as Predicate) );
	}
	if context.min_average_weight > 0.0 {
	    rules.push( (Rule::AverageWeight, prune_by_average_weight as Predicate) );
	}
	if flags.mu_hat {
	    rules.push( (Rule::MuHat, prune_by_mu_hat as Predicate) );
	}
	if context.alpha > 0.0 {
	    rules.push( (Rule::ApproxMu, prune_by_approx_mu as Predicate) );
	}
	Pruner { context, rules, upper_bound: flags.upper_bound }
    }

    pub fn context( &self ) -> &PruningContext {
	&self.context
    }

    /// Active rules in evaluation order, the branch-level rule last.
    pub fn rules( &self ) -> Vec<Rule> {
	let mut rules: Vec<Rule> = self.rules.iter().map( |(rule, _)| *rule ).collect();
	if self.upper_bound {
	    rules.push( Rule::UpperBound );
	}
	rules
    }

    /// Returns the first rule that prunes the extension, if any.
    pub fn check( &self, extension: &Extension ) -> Option<Rule> {
	self.rules.iter()
	    .find( |(_, predicate)| predicate( &self.context, extension ))
	    .map( |(rule, _)| *rule )
    }

    /// Whether no extension of `base` needs to be generated.
    pub fn prune_branch( &self, base: &FrequentItemset ) -> bool {
	self.upper_bound && prune_branch_by_upper_bound( &self.context, base )
    }
}

impl PruneCounts {

    pub fn add( &mut self, rule: Rule ) {
	self.counts[rule.index()] += 1;
    }

    pub fn get( &self, rule: Rule ) -> usize {
	self.counts[rule.index()]
    }

    pub fn merge( mut self, other: PruneCounts ) -> PruneCounts {
	for (count, more) in self.counts.iter_mut().zip( other.counts.iter() ) {
	    *count += more;
	}
	self
    }

    pub fn total( &self ) -> usize {
	self.counts.iter().sum()
    }
}
