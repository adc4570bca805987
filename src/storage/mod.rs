//!
//! corrmatrix storage module
//! -------------------------
//! This module implements the relation store the association engine runs against, using a
//! three-level directory layout: `database/schema/table`. Each table directory contains a
//! single `data.parquet` file and a `schema.json` that records the ordered column list with
//! each column's declared type.
//!
//! Key responsibilities:
//! - Schema introspection: ordered `(name, declared type)` pairs for a relation.
//! - Whole-relation persistence to Parquet and read-back into a Polars DataFrame.
//! - Existence checks and drops, used for output collision checks and temporary cleanup.
//!
//! The public API centers around the `Store` type, which is usually wrapped in a
//! thread-safe `SharedStore` (`Arc<Mutex<Store>>`) elsewhere in the codebase.

use std::{fs, path::{Path, PathBuf}};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use polars::prelude::*;
use tracing::{debug, warn};

mod paths;
pub mod schema;
mod io;

pub use schema::{ColumnEntry, TableSchema};

/// Core on-disk storage handle for a corrmatrix table directory tree.
///
/// It operates under a configured root folder and resolves logical names like
/// "corrmatrix/public/weather" (or partial names qualified with the current
/// defaults) into real directories.
#[derive(Clone)]
pub struct Store {
    /// Root folder for all databases/schemas/tables.
    root: PathBuf,
}

impl Store {
    /// Create a new Store rooted at the given filesystem path.
    /// The directory is created if it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Return the configured root folder for this Store.
    pub fn root_path(&self) -> &PathBuf { &self.root }

    /// A relation exists when its `schema.json` is present.
    pub fn table_exists(&self, table: &str) -> bool { self.schema_path(table).exists() }

    /// Create a relation from a DataFrame. Fails if the relation already exists.
    /// A failed write removes whatever part of the table directory it left behind.
    pub fn create_table_df(&self, table: &str, df: DataFrame) -> Result<()> {
        if self.table_exists(table) {
            anyhow::bail!("relation '{}' already exists", table);
        }
        debug!(target: "corrmatrix::storage", "create_table_df: table='{}' rows={} cols={}", table, df.height(), df.width());
        if let Err(e) = self.rewrite_table_df(table, df) {
            if let Err(cleanup) = self.delete_table(table) {
                warn!(target: "corrmatrix::storage", "create_table_df: cleanup of '{}' failed: {}", table, cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Ordered `(name, declared type)` pairs for a relation.
    pub fn describe(&self, table: &str) -> Result<Vec<(String, String)>> {
        let schema = schema::load_table_schema(self, table)?;
        Ok(schema.columns.into_iter().map(|c| (c.name, c.declared_type)).collect())
    }

    /// Delete a logical table (table directory) and all its files if it exists.
    pub fn delete_table(&self, table: &str) -> Result<()> {
        let dir = self.db_dir(table);
        debug!(target: "corrmatrix::storage", "delete_table: deleting table='{}'", dir.display());
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Store::new(root)?))))
    }
    pub fn root_path(&self) -> PathBuf {
        self.0.lock().root.clone()
    }
    pub fn table_exists(&self, table: &str) -> bool { self.0.lock().table_exists(table) }
    pub fn describe(&self, table: &str) -> Result<Vec<(String, String)>> { self.0.lock().describe(table) }
    pub fn read_df(&self, table: &str) -> Result<DataFrame> { self.0.lock().read_df(table) }
    pub fn read_columns(&self, table: &str, cols: &[String]) -> Result<DataFrame> { self.0.lock().read_columns(table, cols) }
    pub fn create_table_df(&self, table: &str, df: DataFrame) -> Result<()> { self.0.lock().create_table_df(table, df) }
    pub fn delete_table(&self, table: &str) -> Result<()> { self.0.lock().delete_table(table) }
}
