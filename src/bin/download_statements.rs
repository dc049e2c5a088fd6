//! Refresh the cached IDA and IBRD statements, ignoring any existing cache.

use anyhow::Result;
use debtscraper::{fetch::DataCatalogClient, logging, wb, Config};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let config = Config::load()?;
    let client = DataCatalogClient::new(&config.datacatalog.base_url)?;

    let ida = wb::download_ida_interest(&client, &config)?;
    let ibrd = wb::download_ibrd_interest(&client, &config)?;
    info!(ida, ibrd, "statement lines cached");
    Ok(())
}
