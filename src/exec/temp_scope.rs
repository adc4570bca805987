//! Per-invocation scope for temporary relations.
//!
//! Every name handed out carries a fresh UUID, so concurrent invocations never collide.
//! Relations created through the scope are dropped by `release`, or by `Drop` on any
//! early-return path.

use polars::prelude::DataFrame;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::storage::SharedStore;

pub const TEMP_PREFIX: &str = "__corr_tmp_";

pub struct TempScope {
    store: SharedStore,
    tag: String,
    created: Vec<String>,
}

impl TempScope {
    pub fn new(store: &SharedStore) -> Self {
        Self { store: store.clone(), tag: Uuid::new_v4().simple().to_string(), created: Vec::new() }
    }

    /// Name for a temporary relation of the given purpose within this scope.
    pub fn name_for(&self, purpose: &str) -> String {
        format!("{}{}_{}", TEMP_PREFIX, self.tag, purpose)
    }

    /// Write `df` as a temporary relation and register it for cleanup.
    pub fn materialize(&mut self, purpose: &str, df: DataFrame) -> AppResult<String> {
        let name = self.name_for(purpose);
        if self.store.table_exists(&name) {
            return Err(AppError::internal("temp_collision".to_string(), format!("temporary relation '{}' already exists", name)));
        }
        // Register before writing so a half-written relation is still cleaned up.
        self.created.push(name.clone());
        self.store.create_table_df(&name, df)?;
        debug!(target: "corrmatrix::exec", "materialized temporary relation '{}'", name);
        Ok(name)
    }

    pub fn created(&self) -> &[String] { &self.created }

    /// Drop every registered relation; reports the first failure after attempting all.
    pub fn release(mut self) -> AppResult<()> {
        let mut first_err: Option<AppError> = None;
        for name in std::mem::take(&mut self.created) {
            if let Err(e) = self.store.delete_table(&name) {
                warn!(target: "corrmatrix::exec", "failed to drop temporary relation '{}': {}", name, e);
                if first_err.is_none() { first_err = Some(e.into()); }
            }
        }
        match first_err { Some(e) => Err(e), None => Ok(()) }
    }
}

impl Drop for TempScope {
    fn drop(&mut self) {
        for name in self.created.drain(..) {
            if let Err(e) = self.store.delete_table(&name) {
                warn!(target: "corrmatrix::exec", "failed to drop temporary relation '{}' on unwind: {}", name, e);
            }
        }
    }
}
