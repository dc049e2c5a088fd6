use anyhow::Result;
use debtscraper::{country_level, ids::IdsFile, logging, lookup::CountryTable, Config};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let config = Config::load()?;
    let countries = CountryTable::from_csv(&config.countries_path())?;
    let ids = IdsFile::new(config.ids_path());

    let africa =
        country_level::download_interest_data_per_african_country(&config, &ids, &countries);
    let emde = country_level::download_interest_data_per_emde_country(&config, &ids, &countries);
    info!(africa = africa.len(), emde = emde.len(), "country files written");
    Ok(())
}
