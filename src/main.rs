use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use corrmatrix::config::EngineSettings;
use corrmatrix::storage::SharedStore;
use corrmatrix::system::set_query_defaults;
use corrmatrix::{compute_association_with, AssociationRequest, Method};

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let settings = match std::env::var("CORRMATRIX_SETTINGS") {
        Ok(path) => {
            let mut s = EngineSettings::load(std::path::Path::new(&path))?;
            s.apply_env()?;
            s
        }
        Err(_) => EngineSettings::from_env()?,
    };
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "corrmatrix",
        "corrmatrix starting: RUST_LOG='{}', db_root='{}', database='{}', schema='{}', batch_rows={}",
        rust_log, settings.db_root.display(), settings.default_database, settings.default_schema, settings.partial_batch_rows
    );
    set_query_defaults(settings.query_defaults());

    let method: Method = std::env::var("CORRMATRIX_METHOD").unwrap_or_else(|_| "correlation".to_string()).parse()?;
    let mut req = AssociationRequest::new(required("CORRMATRIX_SOURCE")?, required("CORRMATRIX_OUTPUT")?, method);
    if let Ok(t) = std::env::var("CORRMATRIX_TARGET_COLS") { req = req.with_targets(t); }
    if let Ok(g) = std::env::var("CORRMATRIX_GROUP_COLS") { req = req.with_grouping(g); }

    let store = SharedStore::new(&settings.db_root)?;
    let result = compute_association_with(&store, &req, &settings)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
