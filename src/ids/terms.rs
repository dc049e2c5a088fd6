// src/ids/terms.rs
//
// Left-joins rate, grace, maturity and payment series onto commitments.

use anyhow::Result;
use std::{collections::HashMap, path::PathBuf};
use tracing::{info, instrument};

use super::clean::Counterparts;
use super::series::{
    get_average_interest, get_commitments, get_grace, get_interest_payments, get_maturities,
    SeriesRequest,
};
use super::source::IndicatorSource;
use crate::config::Config;
use crate::lookup::CountryLookup;
use crate::model::{IndicatorObservation, PaymentsRow, TermsRow};
use crate::output::write_csv;

pub const TERMS_COLUMNS: [&str; 9] = [
    "year",
    "entity_name",
    "counterpart_name",
    "continent",
    "income_level",
    "value_commitments",
    "value_rate",
    "value_grace",
    "value_maturities",
];

pub const PAYMENTS_COLUMNS: [&str; 8] = [
    "year",
    "entity_name",
    "counterpart_name",
    "continent",
    "income_level",
    "value_commitments",
    "value_rate",
    "value_payments",
];

/// (year, entity, counterpart, continent, income level)
type JoinKey = (i32, String, String, Option<String>, String);

fn join_key(o: &IndicatorObservation) -> JoinKey {
    (
        o.year,
        o.entity_name.clone(),
        o.counterpart_name.clone(),
        o.continent.clone(),
        o.income_level.clone(),
    )
}

/// Right side of a left join: every value observed per key.
fn index(rows: &[IndicatorObservation]) -> HashMap<JoinKey, Vec<Option<f64>>> {
    let mut map: HashMap<JoinKey, Vec<Option<f64>>> = HashMap::new();
    for r in rows {
        map.entry(join_key(r)).or_default().push(r.value);
    }
    map
}

/// Values for `key`, or a single missing value when unmatched.
fn matches(idx: &HashMap<JoinKey, Vec<Option<f64>>>, key: &JoinKey) -> Vec<Option<f64>> {
    idx.get(key).cloned().unwrap_or_else(|| vec![None])
}

/// Commitments with a positive value; rows without a commitment are not real exposures.
fn positive_commitments(rows: Vec<IndicatorObservation>) -> Vec<(JoinKey, f64)> {
    rows.into_iter()
        .filter_map(|r| match r.value {
            Some(v) if v > 0.0 => Some((join_key(&r), v)),
            _ => None,
        })
        .collect()
}

fn request(start_year: i32, end_year: i32, counterparts: &Counterparts) -> SeriesRequest<'static> {
    SeriesRequest {
        start_year: Some(start_year),
        end_year: Some(end_year),
        countries: None,
        counterparts: counterparts.clone(),
    }
}

/// Interest rate (`value_rate`), commitments (`value_commitments`), grace period
/// (`value_grace`) and maturities (`value_maturities`) per country/counterpart/year.
#[instrument(level = "info", skip(source, lookup, counterparts))]
pub fn get_merged_rates_commitments_grace_maturities_data(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    start_year: i32,
    end_year: i32,
    counterparts: &Counterparts,
) -> Result<Vec<TermsRow>> {
    let req = request(start_year, end_year, counterparts);
    let rate = index(&get_average_interest(source, lookup, &req)?);
    let commitments = get_commitments(source, lookup, &req)?;
    let grace = index(&get_grace(source, lookup, &req)?);
    let maturities = index(&get_maturities(source, lookup, &req)?);

    let mut out = Vec::new();
    for (key, value_commitments) in positive_commitments(commitments) {
        for value_rate in matches(&rate, &key) {
            for value_grace in matches(&grace, &key) {
                for value_maturities in matches(&maturities, &key) {
                    let (year, entity_name, counterpart_name, continent, income_level) =
                        key.clone();
                    out.push(TermsRow {
                        year,
                        entity_name,
                        counterpart_name,
                        continent,
                        income_level,
                        value_commitments,
                        value_rate,
                        value_grace,
                        value_maturities,
                    });
                }
            }
        }
    }

    info!(rows = out.len(), "merged rates, commitments, grace and maturities");
    Ok(out)
}

/// Interest rate, commitments and interest payments (`value_payments`).
#[instrument(level = "info", skip(source, lookup, counterparts))]
pub fn get_merged_rates_commitments_payments_data(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    start_year: i32,
    end_year: i32,
    counterparts: &Counterparts,
) -> Result<Vec<PaymentsRow>> {
    let req = request(start_year, end_year, counterparts);
    let rate = index(&get_average_interest(source, lookup, &req)?);
    let commitments = get_commitments(source, lookup, &req)?;
    let payments = index(&get_interest_payments(source, lookup, &req)?);

    let mut out = Vec::new();
    for (key, value_commitments) in positive_commitments(commitments) {
        for value_rate in matches(&rate, &key) {
            for value_payments in matches(&payments, &key) {
                let (year, entity_name, counterpart_name, continent, income_level) = key.clone();
                out.push(PaymentsRow {
                    year,
                    entity_name,
                    counterpart_name,
                    continent,
                    income_level,
                    value_commitments,
                    value_rate,
                    value_payments,
                });
            }
        }
    }

    info!(rows = out.len(), "merged rates, commitments and payments");
    Ok(out)
}

/// Both merged tables for every counterpart, written under `output/terms/`.
pub fn write_terms_tables(
    config: &Config,
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    start_year: i32,
    end_year: i32,
) -> Result<Vec<PathBuf>> {
    let dir = config.terms_dir();
    let all = Counterparts::All;

    let terms = get_merged_rates_commitments_grace_maturities_data(
        source, lookup, start_year, end_year, &all,
    )?;
    let terms_path = dir.join(format!(
        "rates_commitments_grace_maturities_{start_year}_{end_year}.csv"
    ));
    write_csv(&terms_path, &TERMS_COLUMNS, &terms)?;

    let payments =
        get_merged_rates_commitments_payments_data(source, lookup, start_year, end_year, &all)?;
    let payments_path = dir.join(format!(
        "rates_commitments_payments_{start_year}_{end_year}.csv"
    ));
    write_csv(&payments_path, &PAYMENTS_COLUMNS, &payments)?;

    info!(dir = %dir.display(), "terms tables saved");
    Ok(vec![terms_path, payments_path])
}
