// src/ids/clean.rs

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use super::series::Indicators;
use super::source::{IdsQuery, IndicatorSource};
use crate::lookup::CountryLookup;
use crate::model::{zero_to_none, IndicatorObservation, RawObservation};

/// Which counterparts to keep.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Counterparts {
    #[default]
    All,
    Named(Vec<String>),
    /// Counterpart name → lender kind ("Official", "Bilateral", ...). For typed
    /// indicator sets only the codes of that kind are kept for the counterpart.
    Typed(BTreeMap<String, String>),
}

impl Counterparts {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Counterparts::Named(names.into_iter().map(Into::into).collect())
    }

    fn keeps(&self, name: &str) -> bool {
        match self {
            Counterparts::All => true,
            Counterparts::Named(list) => list.iter().any(|n| n == name),
            Counterparts::Typed(map) => map.contains_key(name),
        }
    }

    fn keeps_indicator(&self, indicators: Indicators, obs: &IndicatorObservation) -> bool {
        match (self, indicators) {
            (Counterparts::Typed(map), Indicators::Typed(_)) => {
                let wanted = map.get(&obs.counterpart_name).map(String::as_str);
                wanted.is_some() && indicators.kind_of(&obs.indicator_code) == wanted
            }
            _ => true,
        }
    }
}

/// Strip non-breaking spaces, then use the harmonised short name where the lookup knows one.
fn clean_counterpart(lookup: &dyn CountryLookup, raw: &str) -> String {
    let cleaned = raw.replace('\u{a0}', "");
    lookup.short_name(&cleaned).unwrap_or(cleaned)
}

fn clean_row(lookup: &dyn CountryLookup, raw: RawObservation) -> Option<IndicatorObservation> {
    let income_level = lookup.income_level(&raw.entity_name)?;
    let continent = lookup.continent(&raw.entity_name);
    Some(IndicatorObservation {
        counterpart_name: clean_counterpart(lookup, &raw.counterpart_name),
        entity_code: raw.entity_code,
        entity_name: raw.entity_name,
        income_level,
        continent,
        indicator_code: raw.indicator_code,
        year: raw.year,
        value: zero_to_none(raw.value),
    })
}

/// Keep one observation per (entity, counterpart, year, indicator); later rows win.
fn dedupe(rows: Vec<IndicatorObservation>) -> Vec<IndicatorObservation> {
    let mut out: Vec<IndicatorObservation> = Vec::with_capacity(rows.len());
    let mut seen: HashMap<(String, String, i32, String), usize> = HashMap::new();
    for row in rows {
        let key = (
            row.entity_name.clone(),
            row.counterpart_name.clone(),
            row.year,
            row.indicator_code.clone(),
        );
        match seen.get(&key) {
            Some(&pos) => out[pos] = row,
            None => {
                seen.insert(key, out.len());
                out.push(row);
            }
        }
    }
    out
}

/// Fetch `indicators` and clean them for each country/counterpart pair.
///
/// Rows whose entity has no income level are dropped. The year window only
/// applies when both ends are given.
#[instrument(level = "debug", skip(source, lookup, countries, counterparts))]
pub fn get_clean_data(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    start_year: Option<i32>,
    end_year: Option<i32>,
    indicators: Indicators,
    countries: Option<&[String]>,
    counterparts: &Counterparts,
) -> Result<Vec<IndicatorObservation>> {
    let query = IdsQuery {
        series: indicators.codes(),
        years: match (start_year, end_year) {
            (Some(s), Some(e)) => Some(s..=e),
            _ => None,
        },
        economies: countries.map(<[String]>::to_vec),
    };
    let raw = source.fetch(&query)?;
    let fetched = raw.len();

    let rows: Vec<IndicatorObservation> = raw
        .into_iter()
        .filter_map(|r| clean_row(lookup, r))
        .filter(|r| counterparts.keeps(&r.counterpart_name))
        .collect();

    let rows: Vec<IndicatorObservation> = dedupe(rows)
        .into_iter()
        .filter(|r| counterparts.keeps_indicator(indicators, r))
        .collect();

    debug!(fetched, kept = rows.len(), "cleaned ids data");
    Ok(rows)
}
