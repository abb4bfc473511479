//! Tail probabilities of a sum of independent Bernoulli trials.
//!
//! The exact tail is a Poisson-Binomial dynamic program. The approximations
//! use a Poisson distribution with the same mean or a Normal distribution with
//! the same mean and variance.

use statrs::function::gamma::ln_gamma;

/// Replacement for NaN and infinite inputs
pub const DEGENERATE_VALUE: f64 = 1e-6;

const BISECTION_STEPS: usize = 60;
const MAX_BRACKET_DOUBLINGS: usize = 64;

/// Maps a probability into [0, 1]. NaN and infinities become `DEGENERATE_VALUE`.
pub fn sanitize_probability( p: f64 ) -> f64 {
    if !p.is_finite() {
	DEGENERATE_VALUE
    } else {
	p.clamp( 0.0, 1.0 )
    }
}

fn ln_poisson_pmf( i: i64, mu: f64 ) -> f64 {
    -mu + i as f64 * mu.ln() - ln_gamma( i as f64 + 1.0 )
}

/// P(X <= k) for k below the mean, summed downward from k.
fn poisson_lower( k: i64, mu: f64 ) -> f64 {
    // terms relative to P(X = k), shrinking away from the mode
    let mut ratio = 1.0;
    let mut sum = 1.0;
    for i in ( 1 ..= k ).rev() {
	ratio *= i as f64 / mu;
	sum += ratio;
	if ratio < 1e-16 * sum {
	    break;
	}
    }
    ( ln_poisson_pmf( k, mu ).exp() * sum ).clamp( 0.0, 1.0 )
}

/// P(X > k) for k at or above the mean, summed upward from k + 1.
fn poisson_upper( k: i64, mu: f64 ) -> f64 {
    let mut ratio = 1.0;
    let mut sum = 1.0;
    let mut i = k + 1;
    loop {
	i += 1;
	ratio *= mu / i as f64;
	sum += ratio;
	if ratio < 1e-16 * sum {
	    break;
	}
    }
    ( ln_poisson_pmf( k + 1, mu ).exp() * sum ).clamp( 0.0, 1.0 )
}

/// P(X <= k) for X ~ Poisson(mu).
///
/// Terms are anchored in log space, so large means do not underflow.
pub fn poisson_cdf( k: i64, mu: f64 ) -> f64 {
    if k < 0 {
	return 0.0;
    }
    let mu = if mu.is_nan() { DEGENERATE_VALUE } else { mu };
    if mu <= 0.0 {
	// all mass at 0
	return 1.0;
    }
    if mu.is_infinite() {
	return 0.0;
    }
    if ( k as f64 ) < mu {
	poisson_lower( k, mu )
    } else {
	( 1.0 - poisson_upper( k, mu )).clamp( 0.0, 1.0 )
    }
}

/// P(X >= msup) for X ~ Poisson(mu).
pub fn poisson_tail_at_least( msup: i64, mu: f64 ) -> f64 {
    if msup <= 0 {
	return 1.0;
    }
    let mu = if mu.is_nan() { DEGENERATE_VALUE } else { mu };
    if mu <= 0.0 {
	return 0.0;
    }
    if mu.is_infinite() {
	return 1.0;
    }
    let k = msup - 1;
    if ( k as f64 ) < mu {
	( 1.0 - poisson_lower( k, mu )).clamp( 0.0, 1.0 )
    } else {
	poisson_upper( k, mu )
    }
}

/// Standard normal CDF by the Abramowitz-Stegun 26.2.17 approximation (error < 7.5e-8).
pub fn standard_normal_cdf( z: f64 ) -> f64 {
    let t = 1.0 / ( 1.0 + 0.2316419 * z.abs() );
    let density = f64::exp( -0.5 * z * z ) / f64::sqrt( 2.0 * std::f64::consts::PI );
    let polynomial = t * ( 0.319381530
	+ t * ( -0.356563782
	+ t * ( 1.781477937
	+ t * ( -1.821255978
	+ t * 1.330274429 ))));
    let upper = 1.0 - density * polynomial;
    if z >= 0.0 { upper } else { 1.0 - upper }
}

/// P(X >= msup) for X ~ Normal(mu, variance) with continuity correction.
pub fn normal_tail_at_least( msup: i64, mu: f64, variance: f64 ) -> f64 {
    if msup <= 0 {
	return 1.0;
    }
    if !( variance > 0.0 ) {
	return if mu >= msup as f64 { 1.0 } else { 0.0 };
    }
    let z = ( msup as f64 - 0.5 - mu ) / variance.sqrt();
    ( 1.0 - standard_normal_cdf( z )).clamp( 0.0, 1.0 )
}

/// Rolling Poisson-Binomial DP over `probs`.
///
/// Cell `s < msup` holds P(S = s), the last cell holds P(S >= msup).
/// Requires `msup >= 1`.
pub fn truncated_distribution( msup: usize, probs: &[f64] ) -> Vec<f64> {
    debug_assert!( msup >= 1 );
    let mut dp = vec!( 0.0; msup + 1 );
    dp[0] = 1.0;

    for p in probs {
	let p = sanitize_probability( *p );
	if p <= 0.0 {
	    continue;
	}
	// fold the mass crossing msup - 1 into the tail before it is overwritten
	dp[msup] += dp[msup - 1] * p;
	for s in ( 1 .. msup ).rev() {
	    dp[s] = dp[s] * ( 1.0 - p ) + dp[s - 1] * p;
	}
	dp[0] *= 1.0 - p;
    }
    dp
}

/// Exact P(sum of Bernoulli(probs[t]) >= msup).
pub fn dp_tail_at_least( msup: i64, probs: &[f64] ) -> f64 {
    if msup <= 0 {
	return 1.0;
    }
    let msup = msup as usize;
    if msup > probs.len() {
	return 0.0;
    }
    let dp = truncated_distribution( msup, probs );
    dp[msup].clamp( 0.0, 1.0 )
}

/// Full distribution P(S = s) for s in 0 ..= probs.len().
pub fn poisson_binomial_pmf( probs: &[f64] ) -> Vec<f64> {
    let mut pmf = vec!( 0.0; probs.len() + 1 );
    pmf[0] = 1.0;
    for (processed, p) in probs.iter().enumerate() {
	let p = sanitize_probability( *p );
	for s in ( 1 ..= processed + 1 ).rev() {
	    pmf[s] = pmf[s] * ( 1.0 - p ) + pmf[s - 1] * p;
	}
	pmf[0] *= 1.0 - p;
    }
    pmf
}

/// Finds mu such that `poisson_tail_at_least( msup, mu ) == rhs`.
///
/// The tail is non-decreasing in mu, so the bracket is doubled until the tail
/// reaches rhs and then bisected.
pub fn solve_mu_hat_threshold( msup: i64, rhs: f64 ) -> f64 {
    let rhs = if rhs.is_nan() { DEGENERATE_VALUE } else { rhs.clamp( 1e-12, 1.0 ) };
    let mut low = 0.0;
    let mut high = f64::max( 1.0, 2.0 * msup as f64 );

    let mut doublings = 0;
    while poisson_tail_at_least( msup, high ) < rhs && doublings < MAX_BRACKET_DOUBLINGS {
	high *= 2.0;
	doublings += 1;
    }

    for _ in 0 .. BISECTION_STEPS {
	let mid = 0.5 * ( low + high );
	if poisson_tail_at_least( msup, mid ) >= rhs {
	    high = mid;
	} else {
	    low = mid;
	}
    }
    0.5 * ( low + high )
}
