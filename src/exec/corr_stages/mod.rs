//! Staged association execution modules

pub mod classify;
pub mod resolve;
pub mod center;
pub mod aggregate;
pub mod deconstruct;
pub mod assemble;
