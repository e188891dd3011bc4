#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use planning_validator::{CsvMasterStore, ValidatorConfig, http_api};

    env_logger::init();

    let config = ValidatorConfig::from_env()?;
    let addr: SocketAddr = config.http_addr.parse()?;
    if config.admin_secret.is_none() {
        log::warn!("no admin secret configured; master-table edits are disabled");
    }

    let store = CsvMasterStore::from_config(&config);
    http_api::serve(addr, http_api::AppState::new(store, config)).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
