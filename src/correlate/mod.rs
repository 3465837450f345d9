//! Pairwise correlation utilities shared by feature selection and consensus.

mod pairwise;

pub use pairwise::{
    correlation_between, correlation_matrix, pairwise_correlations, rank_average,
    CorrelationMethod, CorrelationPair,
};
