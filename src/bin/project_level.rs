use anyhow::Result;
use debtscraper::{
    fetch::DataCatalogClient, logging, lookup::CountryTable, project_level, wb, Config,
};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let config = Config::load()?;
    let countries = CountryTable::from_csv(&config.countries_path())?;

    let client = DataCatalogClient::new(&config.datacatalog.base_url)?;
    wb::download_missing_statements(&client, &config)?;

    let rec = project_level::get_project_level_interest(&config, &countries)?;
    let path = project_level::write_project_level_interest(&config, &rec)?;
    info!(
        path = %path.display(),
        projects = rec.projects.len(),
        still_missing_pct = rec.report.still_missing_pct(),
        "project level interest written"
    );
    Ok(())
}
