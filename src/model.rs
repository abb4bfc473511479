
pub mod probability;
mod frequentness;

pub use frequentness::{Estimator, Evaluation, Frequentness};
pub use probability::{
    poisson_cdf, poisson_tail_at_least, normal_tail_at_least, standard_normal_cdf,
    dp_tail_at_least, solve_mu_hat_threshold,
};
