pub mod error;
pub mod ident;
pub mod system;
pub mod config;
pub mod storage;
pub mod exec;

pub use exec::{compute_association, compute_association_using, compute_association_with, read_matrices, AssociationRequest, AssociationResult, GroupMatrix, Method};

// Stage-timing print helper: expands to eprintln! in test and debug builds.
// Usage: tprintln!("[STAGE] rows={} took={:?}", n, t0.elapsed());
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
