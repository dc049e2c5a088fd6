// src/country_level.rs
//
// Average interest rate per country and counterpart, one CSV per country.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::ids::series::{get_average_interest, SeriesRequest, PRIVATE_INTEREST_RATE};
use crate::ids::IndicatorSource;
use crate::lookup::CountryLookup;
use crate::model::{CountryInterestRow, IndicatorObservation};
use crate::output::write_csv;

pub const COLUMNS: [&str; 5] = [
    "entity_name",
    "counterpart_name",
    "year",
    "indicator_code",
    "value",
];

/// Interest rates for one country, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryInterestTable {
    pub country: String,
    pub rows: Vec<CountryInterestRow>,
}

impl CountryInterestTable {
    pub fn years(&self) -> Option<(i32, i32)> {
        let min = self.rows.iter().map(|r| r.year).min()?;
        let max = self.rows.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// `{country}_{start}_{end}.csv`, with `na` for both years when the table is empty.
    pub fn file_name(&self) -> String {
        match self.years() {
            Some((start, end)) => format!("{}_{}_{}.csv", self.country, start, end),
            None => format!("{}_na_na.csv", self.country),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        write_csv(&path, &COLUMNS, &self.rows)?;
        Ok(path)
    }
}

fn counterpart_label(obs: &IndicatorObservation) -> String {
    if obs.indicator_code == PRIVATE_INTEREST_RATE {
        format!("{} (private)", obs.counterpart_name)
    } else {
        format!("{} (official)", obs.counterpart_name)
    }
}

fn to_rows(data: Vec<IndicatorObservation>) -> Vec<CountryInterestRow> {
    let mut rows: Vec<CountryInterestRow> = data
        .into_iter()
        .filter_map(|obs| {
            let value = obs.value.filter(|v| *v != 0.0)?;
            Some(CountryInterestRow {
                counterpart_name: counterpart_label(&obs),
                entity_name: obs.entity_name,
                year: obs.year,
                indicator_code: obs.indicator_code,
                value,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.counterpart_name
            .cmp(&b.counterpart_name)
            .then(b.year.cmp(&a.year))
    });
    rows
}

/// Official and private average interest rates for `country` (ISO3 code or name).
///
/// A failed fetch is logged and yields an empty table.
#[instrument(level = "info", skip(source, lookup))]
pub fn download_and_clean_interest_data(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    country: &str,
) -> CountryInterestTable {
    let countries = [country.to_string()];
    let req = SeriesRequest {
        countries: Some(&countries[..]),
        ..Default::default()
    };
    let rows = match get_average_interest(source, lookup, &req) {
        Ok(data) => to_rows(data),
        Err(e) => {
            warn!(country, error = %format!("{e:#}"), "failed to download interest data");
            Vec::new()
        }
    };
    CountryInterestTable {
        country: country.to_string(),
        rows,
    }
}

/// Download and write each country in turn. A country that fails to write is
/// logged and skipped.
fn download_batch(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    countries: &[String],
    dir: &Path,
) -> Vec<PathBuf> {
    let mut written = Vec::with_capacity(countries.len());
    for country in countries {
        let table = download_and_clean_interest_data(source, lookup, country);
        match table.write(dir) {
            Ok(path) => {
                info!(country = %country, rows = table.rows.len(), path = %path.display(), "saved");
                written.push(path);
            }
            Err(e) => warn!(country = %country, error = %format!("{e:#}"), "failed to save"),
        }
    }
    written
}

pub fn download_interest_data_per_african_country(
    config: &Config,
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
) -> Vec<PathBuf> {
    let countries = lookup.african_countries();
    let dir = config.interest_rates_dir().join("africa");
    info!(countries = countries.len(), "downloading african interest rates");
    download_batch(source, lookup, &countries, &dir)
}

/// EMDE countries outside Africa.
pub fn emde_non_african_countries(lookup: &dyn CountryLookup) -> Vec<String> {
    let africa = lookup.african_countries();
    let mut countries: Vec<String> = lookup
        .emde_countries()
        .into_iter()
        .filter(|c| !africa.contains(c))
        .collect();
    countries.sort();
    countries.dedup();
    countries
}

pub fn download_interest_data_per_emde_country(
    config: &Config,
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
) -> Vec<PathBuf> {
    let countries = emde_non_african_countries(lookup);
    let dir = config.interest_rates_dir().join("emde_non_african");
    info!(countries = countries.len(), "downloading non-african emde interest rates");
    download_batch(source, lookup, &countries, &dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::ids::clean::tests::{lookup, obs, FakeSource};
    use crate::ids::IdsQuery;
    use crate::model::RawObservation;
    use std::fs;
    use tempfile::tempdir;

    struct BrokenSource;

    impl IndicatorSource for BrokenSource {
        fn fetch(&self, _query: &IdsQuery) -> Result<Vec<RawObservation>> {
            anyhow::bail!("connection reset")
        }
    }

    fn source() -> FakeSource {
        FakeSource::new(vec![
            obs("Kenya", "France", "DT.INR.OFFT", 2019, 1.5),
            obs("Kenya", "France", "DT.INR.OFFT", 2021, 1.0),
            obs("Kenya", "Bondholders", "DT.INR.PRVT", 2020, 7.5),
            obs("Kenya", "China\u{a0}", "DT.INR.OFFT", 2020, 0.0),
            obs("Ghana", "France", "DT.INR.OFFT", 2020, 2.0),
            obs("India", "France", "DT.INR.OFFT", 2020, 3.0),
        ])
    }

    fn config(root: &Path) -> Config {
        Config {
            paths: Paths {
                raw_data: root.join("raw_data"),
                output: root.join("output"),
            },
            ..Default::default()
        }
    }

    #[test]
    fn labels_drops_zeros_and_sorts() {
        let table = download_and_clean_interest_data(&source(), &lookup(), "KEN");
        let got: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.counterpart_name.as_str(), r.year, r.value))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Bondholders (private)", 2020, 7.5),
                ("France (official)", 2021, 1.0),
                ("France (official)", 2019, 1.5),
            ]
        );
        assert!(table.rows.iter().all(|r| r.entity_name == "Kenya"));
        assert_eq!(table.file_name(), "KEN_2019_2021.csv");
    }

    #[test]
    fn failed_fetch_yields_header_only_csv() {
        let tmp = tempdir().unwrap();
        let table = download_and_clean_interest_data(&BrokenSource, &lookup(), "KEN");
        assert!(table.rows.is_empty());
        let path = table.write(tmp.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "KEN_na_na.csv");
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "entity_name,counterpart_name,year,indicator_code,value\n"
        );
    }

    #[test]
    fn african_batch_writes_one_file_per_country() {
        let tmp = tempdir().unwrap();
        let cfg = config(tmp.path());
        let written = download_interest_data_per_african_country(&cfg, &source(), &lookup());
        let mut names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["GHA_2020_2020.csv", "KEN_2019_2021.csv"]);
        assert!(written
            .iter()
            .all(|p| p.starts_with(tmp.path().join("output/interest_rates/africa"))));
    }

    #[test]
    fn failing_source_does_not_stop_the_batch() {
        let tmp = tempdir().unwrap();
        let cfg = config(tmp.path());
        let written = download_interest_data_per_african_country(&cfg, &BrokenSource, &lookup());
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn emde_batch_excludes_africa() {
        assert_eq!(
            emde_non_african_countries(&lookup()),
            vec!["ATA", "CHN", "IND"]
        );
        let tmp = tempdir().unwrap();
        let cfg = config(tmp.path());
        let written = download_interest_data_per_emde_country(&cfg, &source(), &lookup());
        assert_eq!(written.len(), 3);
        assert!(written
            .iter()
            .any(|p| p.ends_with("emde_non_african/IND_2020_2020.csv")));
    }
}
