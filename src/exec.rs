//! Association engine: column resolution, grouped aggregation and result assembly.

pub mod primitives;     // aggregate trait, correlation/covariance, matrix helpers
pub mod temp_scope;     // per-invocation temporary relations
pub mod df_utils;       // dataframe helpers (typed column reads, JSON rendering)
pub mod corr_stages;
pub mod exec_correlate; // compute_association entry point

pub use exec_correlate::{compute_association, compute_association_using, compute_association_with, read_matrices, AssociationRequest, AssociationResult, GroupMatrix, Method};
