use std::fs;
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

use super::Store;
use crate::tprintln;

impl Store {
    /// Read a whole relation. Fails if the relation does not exist.
    pub fn read_df(&self, table: &str) -> Result<DataFrame> {
        let schema = super::schema::load_table_schema(self, table)?;
        let file = self.db_file(table);
        if !file.exists() {
            // Schema without data: synthesize an empty frame with the declared column names.
            let cols: Vec<Column> = schema
                .columns
                .iter()
                .map(|c| Series::new(c.name.as_str().into(), Vec::<Option<f64>>::new()).into())
                .collect();
            return Ok(DataFrame::new(cols)?);
        }
        let f = fs::File::open(&file)?;
        let df = ParquetReader::new(f).finish()?;
        debug!(target: "corrmatrix::storage", "read_df: table='{}' rows={} cols={}", table, df.height(), df.width());
        Ok(df)
    }

    /// Read a relation projected onto `cols`, in the requested order.
    pub fn read_columns(&self, table: &str, cols: &[String]) -> Result<DataFrame> {
        let df = self.read_df(table)?;
        let present: std::collections::HashSet<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        for c in cols {
            if !present.contains(c) {
                anyhow::bail!("column '{}' does not exist in relation '{}'", c, table);
            }
        }
        Ok(df.select(cols.iter().map(|c| c.as_str()))?)
    }

    /// Rewrite the entire relation from the provided DataFrame.
    ///
    /// The previous data file is replaced and `schema.json` is regenerated from the
    /// DataFrame's column order and dtypes. The schema is written last: a relation only
    /// becomes visible to `table_exists` once its data file is complete.
    pub fn rewrite_table_df(&self, table: &str, mut df: DataFrame) -> Result<()> {
        let __t0 = std::time::Instant::now();
        let dir = self.db_dir(table);
        fs::create_dir_all(&dir)?;
        let file = self.db_file(table);
        if file.exists() {
            fs::remove_file(&file)?;
        }
        let mut out = fs::File::create(&file)?;
        ParquetWriter::new(&mut out).finish(&mut df)?;
        super::schema::save_table_schema(self, table, &df)?;
        tprintln!("[STORAGE] rewrite_table_df: table='{}' rows={} took={:?}", table, df.height(), __t0.elapsed());
        Ok(())
    }
}
