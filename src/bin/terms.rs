use anyhow::{Context, Result};
use debtscraper::{
    ids::terms::write_terms_tables, ids::IdsFile, logging, lookup::CountryTable, Config,
};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let config = Config::load()?;
    let years = config
        .ids
        .years()
        .context("ids.start_year and ids.end_year must both be set")?;
    let countries = CountryTable::from_csv(&config.countries_path())?;
    let ids = IdsFile::new(config.ids_path());

    let paths = write_terms_tables(&config, &ids, &countries, *years.start(), *years.end())?;
    for p in paths {
        info!(path = %p.display(), "written");
    }
    Ok(())
}
