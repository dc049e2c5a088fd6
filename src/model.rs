// src/model.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// World Bank lending arm a statement row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LendingArm {
    #[serde(rename = "IDA")]
    Ida,
    #[serde(rename = "IBRD")]
    Ibrd,
}

impl LendingArm {
    pub fn as_str(&self) -> &'static str {
        match self {
            LendingArm::Ida => "IDA",
            LendingArm::Ibrd => "IBRD",
        }
    }
}

impl fmt::Display for LendingArm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which dataset supplied a reconciled interest rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    #[serde(rename = "WB")]
    WorldBank,
    #[serde(rename = "CRS")]
    Crs,
}

/// Composite key joining WB statement projects to CRS projects.
///
/// Fields are optional; an absent field only equals another absent field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey {
    pub project_id: Option<String>,
    pub loan_or_credit_number: Option<String>,
    pub iso3: Option<String>,
    pub board_approval_date: Option<NaiveDate>,
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_na<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "<na>".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "({}, {}, {}, {})",
            or_na(&self.project_id),
            or_na(&self.loan_or_credit_number),
            or_na(&self.iso3),
            or_na(&self.board_approval_date)
        )
    }
}

/// A raw IDS observation as delivered by an `IndicatorSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(default)]
    pub entity_code: Option<String>,
    pub entity_name: String,
    pub counterpart_name: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// An IDS observation after cleaning. Zero values are stored as `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorObservation {
    pub entity_code: Option<String>,
    pub entity_name: String,
    pub counterpart_name: String,
    pub income_level: String,
    pub continent: Option<String>,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// One row of a per-country interest-rate table.
///
/// Field order is the canonical column order of those tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryInterestRow {
    pub entity_name: String,
    pub counterpart_name: String,
    pub year: i32,
    pub indicator_code: String,
    pub value: f64,
}

/// Merged rate/commitment/grace/maturity observation for one country, counterpart and year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermsRow {
    pub year: i32,
    pub entity_name: String,
    pub counterpart_name: String,
    pub continent: Option<String>,
    pub income_level: String,
    pub value_commitments: f64,
    pub value_rate: Option<f64>,
    pub value_grace: Option<f64>,
    pub value_maturities: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentsRow {
    pub year: i32,
    pub entity_name: String,
    pub counterpart_name: String,
    pub continent: Option<String>,
    pub income_level: String,
    pub value_commitments: f64,
    pub value_rate: Option<f64>,
    pub value_payments: Option<f64>,
}

/// A CRS project after splitting and deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsProject {
    pub project_id: Option<String>,
    pub loan_or_credit_number: Option<String>,
    pub recipient_code: Option<i64>,
    pub board_approval_date: Option<NaiveDate>,
    pub interest_rate: Option<f64>,
    pub usd_commitment: f64,
    pub usd_disbursement: f64,
    pub usd_received: f64,
    pub usd_interest: f64,
}

/// A CRS project ready to be matched against WB projects: keyed by ISO3 and
/// always carrying a rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsReportedProject {
    pub project_id: Option<String>,
    pub loan_or_credit_number: Option<String>,
    pub iso3: Option<String>,
    pub board_approval_date: Option<NaiveDate>,
    pub interest_rate: f64,
}

impl CrsReportedProject {
    pub fn key(&self) -> ProjectKey {
        ProjectKey {
            project_id: self.project_id.clone(),
            loan_or_credit_number: self.loan_or_credit_number.clone(),
            iso3: self.iso3.clone(),
            board_approval_date: self.board_approval_date,
        }
    }
}

/// One WB loan or credit, summarised from the IDA or IBRD statements.
#[derive(Debug, Clone, PartialEq)]
pub struct WbProject {
    pub project_id: Option<String>,
    pub loan_or_credit_number: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub iso3: Option<String>,
    pub project_name: Option<String>,
    pub loan_type: Option<String>,
    pub board_approval_date: Option<NaiveDate>,
    /// IBRD interest rate or IDA service charge rate; zero is stored as `None`.
    pub interest_rate: Option<f64>,
    pub original_principal_amount: Option<f64>,
    pub source: LendingArm,
}

impl WbProject {
    pub fn key(&self) -> ProjectKey {
        ProjectKey {
            project_id: self.project_id.clone(),
            loan_or_credit_number: self.loan_or_credit_number.clone(),
            iso3: self.iso3.clone(),
            board_approval_date: self.board_approval_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledProject {
    pub project_id: Option<String>,
    pub loan_or_credit_number: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub iso3: Option<String>,
    pub project_name: Option<String>,
    pub loan_type: Option<String>,
    pub board_approval_date: Option<NaiveDate>,
    pub interest_rate: f64,
    pub interest_rate_source: RateSource,
    pub original_principal_amount: Option<f64>,
    pub source: LendingArm,
}

impl ReconciledProject {
    pub const COLUMNS: [&'static str; 12] = [
        "project_id",
        "loan_or_credit_number",
        "country_code",
        "country",
        "iso3",
        "project_name",
        "loan_type",
        "board_approval_date",
        "interest_rate",
        "interest_rate_source",
        "original_principal_amount",
        "source",
    ];

    pub fn from_wb(p: WbProject, interest_rate: f64, interest_rate_source: RateSource) -> Self {
        Self {
            project_id: p.project_id,
            loan_or_credit_number: p.loan_or_credit_number,
            country_code: p.country_code,
            country: p.country,
            iso3: p.iso3,
            project_name: p.project_name,
            loan_type: p.loan_type,
            board_approval_date: p.board_approval_date,
            interest_rate,
            interest_rate_source,
            original_principal_amount: p.original_principal_amount,
            source: p.source,
        }
    }
}

/// Treat zero (and NaN) as missing.
pub fn zero_to_none(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x != 0.0 && !x.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_nan_become_missing() {
        assert_eq!(zero_to_none(Some(0.0)), None);
        assert_eq!(zero_to_none(Some(f64::NAN)), None);
        assert_eq!(zero_to_none(Some(1.25)), Some(1.25));
        assert_eq!(zero_to_none(None), None);
    }

    #[test]
    fn project_key_display_marks_missing_fields() {
        let key = ProjectKey {
            project_id: Some("P0001".into()),
            loan_or_credit_number: None,
            iso3: Some("KEN".into()),
            board_approval_date: NaiveDate::from_ymd_opt(2015, 3, 1),
        };
        assert_eq!(key.to_string(), "(P0001, <na>, KEN, 2015-03-01)");
    }
}
