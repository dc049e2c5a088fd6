// src/ids/series.rs

use anyhow::Result;

use super::clean::{get_clean_data, Counterparts};
use super::source::IndicatorSource;
use crate::lookup::CountryLookup;
use crate::model::IndicatorObservation;

/// Series to request: a single code, or codes tagged with the lender kind they report on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indicators {
    Single(&'static str),
    Typed(&'static [(&'static str, &'static str)]),
}

impl Indicators {
    pub fn codes(&self) -> Vec<String> {
        match self {
            Indicators::Single(code) => vec![code.to_string()],
            Indicators::Typed(pairs) => pairs.iter().map(|(c, _)| c.to_string()).collect(),
        }
    }

    pub fn kind_of(&self, code: &str) -> Option<&'static str> {
        match self {
            Indicators::Single(_) => None,
            Indicators::Typed(pairs) => pairs.iter().find(|(c, _)| *c == code).map(|(_, k)| *k),
        }
    }
}

pub const INTEREST_RATE_INDICATORS: Indicators = Indicators::Typed(&[
    ("DT.INR.OFFT", "Official"),
    ("DT.INR.PRVT", "Private"),
]);

pub const PRIVATE_INTEREST_RATE: &str = "DT.INR.PRVT";

pub const INTEREST_PAYMENTS_INDICATORS: Indicators = Indicators::Typed(&[
    ("DT.INT.BLAT.CD", "Bilateral"),
    ("DT.INT.MLAT.CD", "Multilateral"),
    ("DT.INT.PBND.CD", "Private"),
    ("DT.INT.PCBK.CD", "Private"),
    ("DT.INT.PROP.CD", "Private"),
]);

pub const COMMITMENTS_INDICATORS: Indicators = Indicators::Typed(&[
    ("DT.COM.BLAT.CD", "Bilateral"),
    ("DT.COM.MLAT.CD", "Multilateral"),
    ("DT.COM.PRVT.CD", "Private"),
]);

pub const GRACE_PERIOD_INDICATOR: Indicators = Indicators::Single("DT.GPA.DPPG");

pub const MATURITY_INDICATOR: Indicators = Indicators::Single("DT.MAT.DPPG");

/// Common arguments of the per-series getters.
#[derive(Debug, Clone, Default)]
pub struct SeriesRequest<'a> {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub countries: Option<&'a [String]>,
    pub counterparts: Counterparts,
}

fn get(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    req: &SeriesRequest<'_>,
    indicators: Indicators,
) -> Result<Vec<IndicatorObservation>> {
    get_clean_data(
        source,
        lookup,
        req.start_year,
        req.end_year,
        indicators,
        req.countries,
        &req.counterparts,
    )
}

/// Weighted average interest rate per country/counterpart pair.
pub fn get_average_interest(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    req: &SeriesRequest<'_>,
) -> Result<Vec<IndicatorObservation>> {
    get(source, lookup, req, INTEREST_RATE_INDICATORS)
}

pub fn get_interest_payments(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    req: &SeriesRequest<'_>,
) -> Result<Vec<IndicatorObservation>> {
    get(source, lookup, req, INTEREST_PAYMENTS_INDICATORS)
}

pub fn get_commitments(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    req: &SeriesRequest<'_>,
) -> Result<Vec<IndicatorObservation>> {
    get(source, lookup, req, COMMITMENTS_INDICATORS)
}

pub fn get_grace(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    req: &SeriesRequest<'_>,
) -> Result<Vec<IndicatorObservation>> {
    get(source, lookup, req, GRACE_PERIOD_INDICATOR)
}

pub fn get_maturities(
    source: &dyn IndicatorSource,
    lookup: &dyn CountryLookup,
    req: &SeriesRequest<'_>,
) -> Result<Vec<IndicatorObservation>> {
    get(source, lookup, req, MATURITY_INDICATOR)
}
