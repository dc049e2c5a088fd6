use anyhow::Result;
use debtscraper::{
    country_level, fetch::DataCatalogClient, ids::terms::write_terms_tables, ids::IdsFile,
    logging, lookup::CountryTable, project_level, viz, wb, Config,
};
use std::time::Instant;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init();
    info!("startup");
    let started = Instant::now();

    // ─── 2) config and lookups ───────────────────────────────────────
    let config = Config::load()?;
    let countries = CountryTable::from_csv(&config.countries_path())?;
    let ids = IdsFile::new(config.ids_path());

    // ─── 3) WB statements, downloaded once then read from cache ──────
    let client = DataCatalogClient::new(&config.datacatalog.base_url)?;
    let fetched = wb::download_missing_statements(&client, &config)?;
    info!(fetched, "statement datasets downloaded");

    // ─── 4) project level: WB rates backfilled from CRS ──────────────
    let rec = project_level::get_project_level_interest(&config, &countries)?;
    project_level::write_project_level_interest(&config, &rec)?;

    // ─── 5) country level, one file per country ──────────────────────
    let africa =
        country_level::download_interest_data_per_african_country(&config, &ids, &countries);
    let emde = country_level::download_interest_data_per_emde_country(&config, &ids, &countries);
    info!(africa = africa.len(), emde = emde.len(), "country level tables saved");

    // ─── 6) terms, only with a configured year window ────────────────
    match config.ids.years() {
        Some(years) => {
            if let Err(e) =
                write_terms_tables(&config, &ids, &countries, *years.start(), *years.end())
            {
                error!(error = %format!("{e:#}"), "terms tables failed");
            }
        }
        None => warn!("no ids year window configured; skipping terms tables"),
    }

    // ─── 7) visualisation export ─────────────────────────────────────
    viz::line_chart_explore_interest(&config)?;

    info!(elapsed = ?started.elapsed(), "done");
    Ok(())
}
