// src/viz.rs
//
// Wide table of the per-country interest rate CSVs for line charts.

use anyhow::{bail, Context, Result};
use glob::glob;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

use crate::config::Config;
use crate::output::write_csv;

#[derive(Debug, Deserialize)]
struct InterestRecord {
    entity_name: String,
    counterpart_name: String,
    year: i32,
    value: f64,
}

fn read_interest_csvs(dir: &Path) -> Result<Vec<InterestRecord>> {
    let mut out = Vec::new();
    for entry in glob(&format!("{}/**/*.csv", dir.display()))? {
        let path = entry?;
        let file = File::open(&path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        let mut rdr = csv::Reader::from_reader(file);
        for rec in rdr.deserialize::<InterestRecord>() {
            out.push(rec.with_context(|| format!("parsing `{}`", path.display()))?);
        }
    }
    Ok(out)
}

/// One row per (counterpart_name, year), one column per entity holding `value`.
fn pivot(records: Vec<InterestRecord>) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let entities: BTreeSet<String> = records.iter().map(|r| r.entity_name.clone()).collect();
    let mut cells: BTreeMap<(String, i32), BTreeMap<String, f64>> = BTreeMap::new();
    for r in records {
        let row = cells.entry((r.counterpart_name.clone(), r.year)).or_default();
        if row.insert(r.entity_name.clone(), r.value).is_some() {
            bail!(
                "duplicate value for {} / {} / {}",
                r.entity_name,
                r.counterpart_name,
                r.year
            );
        }
    }

    let mut header = vec!["counterpart_name".to_string(), "year".to_string()];
    header.extend(entities.iter().cloned());
    let rows = cells
        .into_iter()
        .map(|((counterpart, year), values)| {
            let mut line = vec![counterpart, year.to_string()];
            line.extend(
                entities
                    .iter()
                    .map(|e| values.get(e).map(f64::to_string).unwrap_or_default()),
            );
            line
        })
        .collect();
    Ok((header, rows))
}

#[instrument(level = "info", skip_all)]
pub fn line_chart_explore_interest(config: &Config) -> Result<PathBuf> {
    let records = read_interest_csvs(&config.interest_rates_dir())?;
    let (header, rows) = pivot(records)?;
    let path = config.visualisations_dir().join("interest_rates.csv");
    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    write_csv(&path, &header, &rows)?;
    info!(path = %path.display(), rows = rows.len(), "line chart data saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "entity_name,counterpart_name,year,indicator_code,value\n";

    fn setup(root: &Path) -> Config {
        let cfg = Config {
            paths: Paths {
                raw_data: root.join("raw_data"),
                output: root.join("output"),
            },
            ..Default::default()
        };
        let africa = cfg.interest_rates_dir().join("africa");
        let emde = cfg.interest_rates_dir().join("emde_non_african");
        fs::create_dir_all(&africa).unwrap();
        fs::create_dir_all(&emde).unwrap();
        fs::write(
            africa.join("KEN_2019_2020.csv"),
            format!(
                "{HEADER}Kenya,France (official),2020,DT.INR.OFFT,1.5\n\
                 Kenya,France (official),2019,DT.INR.OFFT,2\n"
            ),
        )
        .unwrap();
        fs::write(africa.join("GHA_na_na.csv"), HEADER).unwrap();
        fs::write(
            emde.join("IND_2020_2020.csv"),
            format!("{HEADER}India,France (official),2020,DT.INR.OFFT,3.25\n"),
        )
        .unwrap();
        cfg
    }

    #[test]
    fn pivots_entities_into_columns() {
        let tmp = tempdir().unwrap();
        let cfg = setup(tmp.path());
        let path = line_chart_explore_interest(&cfg).unwrap();
        assert!(path.ends_with("output/visualisations/interest_rates.csv"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "counterpart_name,year,India,Kenya\n\
             France (official),2019,,2\n\
             France (official),2020,3.25,1.5\n"
        );
    }

    #[test]
    fn duplicate_cells_are_rejected() {
        let tmp = tempdir().unwrap();
        let cfg = setup(tmp.path());
        fs::write(
            cfg.interest_rates_dir().join("africa/KEN_copy.csv"),
            format!("{HEADER}Kenya,France (official),2020,DT.INR.OFFT,9\n"),
        )
        .unwrap();
        let err = line_chart_explore_interest(&cfg).unwrap_err();
        assert!(err.to_string().contains("duplicate value"));
    }
}
