// src/crs.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::{collections::HashMap, path::Path};
use tracing::{info, instrument};

use crate::cache::{date_column, f64_column, i64_column, read_parquet, utf8_column};
use crate::model::CrsProject;

/// World Bank donor codes in the CRS (IDA, IBRD and the IFC).
pub const DEFAULT_DONOR_CODES: [i64; 3] = [901, 903, 905];

pub const DEFAULT_COLUMNS: &[&str] = &[
    "year",
    "donor_code",
    "donor_name",
    "recipient_code",
    "recipient_name",
    "project_number",
    "usd_commitment",
    "usd_disbursement",
    "usd_received",
    "project_title",
    "purpose_code",
    "purpose_name",
    "commitment_date",
    "type_repayment",
    "number_repayment",
    "interest1",
    "interest2",
    "repaydate1",
    "repaydate2",
    "usd_interest",
    "usd_outstanding",
    "usd_arrears_principal",
    "usd_arrears_interest",
];

/// The CRS fields the pipeline consumes, one per bulk-file row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrsRow {
    pub donor_code: Option<i64>,
    pub recipient_code: Option<i64>,
    pub project_number: Option<String>,
    pub project_id: Option<String>,
    pub loan_or_credit_number: Option<String>,
    pub commitment_date: Option<NaiveDate>,
    pub interest1: Option<f64>,
    pub interest2: Option<f64>,
    pub usd_commitment: Option<f64>,
    pub usd_disbursement: Option<f64>,
    pub usd_received: Option<f64>,
    pub usd_interest: Option<f64>,
}

fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<CrsRow>> {
    let donor = i64_column(batch, "donor_code")?;
    let recipient = i64_column(batch, "recipient_code")?;
    let number = utf8_column(batch, "project_number")?;
    let date = date_column(batch, "commitment_date")?;
    let i1 = f64_column(batch, "interest1")?;
    let i2 = f64_column(batch, "interest2")?;
    let commitment = f64_column(batch, "usd_commitment")?;
    let disbursement = f64_column(batch, "usd_disbursement")?;
    let received = f64_column(batch, "usd_received")?;
    let interest = f64_column(batch, "usd_interest")?;

    Ok((0..batch.num_rows())
        .map(|i| CrsRow {
            donor_code: donor[i],
            recipient_code: recipient[i],
            project_number: number[i].clone(),
            project_id: None,
            loan_or_credit_number: None,
            commitment_date: date[i],
            interest1: i1[i],
            interest2: i2[i],
            usd_commitment: commitment[i],
            usd_disbursement: disbursement[i],
            usd_received: received[i],
            usd_interest: interest[i],
        })
        .collect())
}

/// Read the CRS bulk Parquet file, keeping only rows from `donor_codes`.
#[instrument(level = "info", skip(path, donor_codes), fields(path = %path.display()))]
pub fn read_crs(path: &Path, donor_codes: &[i64]) -> Result<Vec<CrsRow>> {
    info!("reading CRS data");
    let mut rows = Vec::new();
    for batch in read_parquet(path, Some(DEFAULT_COLUMNS))? {
        let batch_rows =
            rows_from_batch(&batch).with_context(|| format!("CRS file {:?}", path))?;
        rows.extend(
            batch_rows
                .into_iter()
                .filter(|r| r.donor_code.is_some_and(|d| donor_codes.contains(&d))),
        );
    }
    info!(rows = rows.len(), "read CRS rows");
    Ok(rows)
}

/// Split `project_number` ("P123456.IDA12340.1") into project id and loan/credit
/// number; the trailing CRS entry component is discarded.
pub fn split_project_number(rows: &mut [CrsRow]) {
    info!("splitting project_number into components");
    for row in rows.iter_mut() {
        let mut parts = row
            .project_number
            .as_deref()
            .map(|n| n.split('.').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();
        row.project_id = parts.next();
        row.loan_or_credit_number = parts.next();
    }
}

fn fmax(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

type CrsKey = (Option<String>, Option<String>, Option<i64>, Option<NaiveDate>);

/// One row per (project id, loan/credit number, recipient, board approval date);
/// missing key values form their own group.
///
/// Flows are summed. The rate is the larger of the two interest fields,
/// scaled down by 1000.
pub fn deduplicate_crs_data(rows: Vec<CrsRow>) -> Vec<CrsProject> {
    info!("deduplicating CRS data");

    #[derive(Default)]
    struct Acc {
        interest1: Option<f64>,
        interest2: Option<f64>,
        usd_interest: f64,
        usd_received: f64,
        usd_commitment: f64,
        usd_disbursement: f64,
    }

    let mut order: Vec<CrsKey> = Vec::new();
    let mut groups: HashMap<CrsKey, Acc> = HashMap::new();
    for r in rows {
        let key: CrsKey = (
            r.project_id,
            r.loan_or_credit_number,
            r.recipient_code,
            r.commitment_date,
        );
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Acc::default()
        });
        acc.interest1 = fmax(acc.interest1, r.interest1);
        acc.interest2 = fmax(acc.interest2, r.interest2);
        acc.usd_interest += r.usd_interest.unwrap_or(0.0);
        acc.usd_received += r.usd_received.unwrap_or(0.0);
        acc.usd_commitment += r.usd_commitment.unwrap_or(0.0);
        acc.usd_disbursement += r.usd_disbursement.unwrap_or(0.0);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let acc = groups.remove(&key)?;
            let (project_id, loan_or_credit_number, recipient_code, board_approval_date) = key;
            Some(CrsProject {
                project_id,
                loan_or_credit_number,
                recipient_code,
                board_approval_date,
                interest_rate: fmax(acc.interest1, acc.interest2).map(|v| v / 1000.0),
                usd_commitment: acc.usd_commitment,
                usd_disbursement: acc.usd_disbursement,
                usd_received: acc.usd_received,
                usd_interest: acc.usd_interest,
            })
        })
        .collect()
}

pub fn drop_missing_interest(rows: Vec<CrsProject>) -> Vec<CrsProject> {
    info!("dropping rows with missing interest rates");
    rows.into_iter()
        .filter(|r| r.interest_rate.is_some())
        .collect()
}

/// Read, split, deduplicate and drop rate-less rows.
pub fn load_and_process_crs_data(path: &Path, donor_codes: &[i64]) -> Result<Vec<CrsProject>> {
    info!("loading and processing CRS data");
    let mut rows = read_crs(path, donor_codes)?;
    split_project_number(&mut rows);
    let projects = drop_missing_interest(deduplicate_crs_data(rows));
    info!(projects = projects.len(), "CRS projects with interest data");
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{schema_of, write_parquet};
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn row(number: &str, recipient: i64, date: &str, i1: Option<f64>, i2: Option<f64>) -> CrsRow {
        CrsRow {
            donor_code: Some(905),
            recipient_code: Some(recipient),
            project_number: Some(number.to_string()),
            commitment_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            interest1: i1,
            interest2: i2,
            usd_commitment: Some(10.0),
            usd_disbursement: Some(4.0),
            usd_received: Some(1.0),
            usd_interest: Some(0.5),
            ..CrsRow::default()
        }
    }

    #[test]
    fn splits_project_number() {
        let mut rows = vec![
            row("P123.IDA456.1", 248, "2015-03-01", None, None),
            row("P999", 248, "2015-03-01", None, None),
        ];
        rows.push(CrsRow::default());
        split_project_number(&mut rows);

        assert_eq!(rows[0].project_id.as_deref(), Some("P123"));
        assert_eq!(rows[0].loan_or_credit_number.as_deref(), Some("IDA456"));
        assert_eq!(rows[1].project_id.as_deref(), Some("P999"));
        assert_eq!(rows[1].loan_or_credit_number, None);
        assert_eq!(rows[2].project_id, None);
    }

    #[test]
    fn duplicates_sum_flows_and_take_max_interest() {
        let mut rows = vec![
            row("P1.L1.1", 248, "2015-03-01", Some(750.0), None),
            row("P1.L1.2", 248, "2015-03-01", Some(500.0), Some(1250.0)),
            row("P1.L1.3", 248, "2015-03-01", None, Some(1000.0)),
            row("P2.L2.1", 248, "2016-01-01", None, None),
        ];
        split_project_number(&mut rows);
        let out = deduplicate_crs_data(rows);

        assert_eq!(out.len(), 2);
        let p1 = &out[0];
        assert_eq!(p1.project_id.as_deref(), Some("P1"));
        assert_eq!(p1.usd_commitment, 30.0);
        assert_eq!(p1.usd_disbursement, 12.0);
        assert_eq!(p1.usd_received, 3.0);
        assert_eq!(p1.usd_interest, 1.5);
        assert_eq!(p1.interest_rate, Some(1.25));
        assert_eq!(out[1].interest_rate, None);

        let kept = drop_missing_interest(out);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn missing_key_values_group_together() {
        let mut rows = vec![
            row("P1.L1.1", 248, "2015-03-01", Some(1000.0), None),
            row("P1.L1.2", 248, "2015-03-01", Some(1000.0), None),
        ];
        rows[0].commitment_date = None;
        rows[1].commitment_date = None;
        split_project_number(&mut rows);
        let out = deduplicate_crs_data(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].board_approval_date, None);
        assert_eq!(out[0].usd_commitment, 20.0);
    }

    #[test]
    fn loads_parquet_and_filters_donors() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("CRS.parquet");
        let f = |n: &str, t: DataType| Field::new(n, t, true);
        let schema = schema_of(vec![
            f("donor_code", DataType::Int64),
            f("recipient_code", DataType::Int64),
            f("project_number", DataType::Utf8),
            f("commitment_date", DataType::Utf8),
            f("interest1", DataType::Float64),
            f("interest2", DataType::Float64),
            f("usd_commitment", DataType::Float64),
            f("usd_disbursement", DataType::Float64),
            f("usd_received", DataType::Float64),
            f("usd_interest", DataType::Float64),
        ]);
        let floats = |v: Vec<Option<f64>>| Arc::new(Float64Array::from(v));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![905, 905, 1])),
                Arc::new(Int64Array::from(vec![248, 248, 248])),
                Arc::new(StringArray::from(vec!["P1.L1.1", "P1.L1.2", "P9.L9.1"])),
                Arc::new(StringArray::from(vec![
                    "2015-03-01 00:00:00",
                    "2015-03-01 00:00:00",
                    "2015-03-01 00:00:00",
                ])),
                floats(vec![Some(1000.0), Some(2000.0), Some(9000.0)]),
                floats(vec![None, None, None]),
                floats(vec![Some(1.0), Some(2.0), Some(3.0)]),
                floats(vec![Some(1.0), Some(1.0), Some(1.0)]),
                floats(vec![None, None, None]),
                floats(vec![None, Some(0.25), None]),
            ],
        )
        .unwrap();
        write_parquet(&path, &batch).unwrap();

        let out = load_and_process_crs_data(&path, &DEFAULT_DONOR_CODES).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].interest_rate, Some(2.0));
        assert_eq!(out[0].usd_commitment, 3.0);
        assert_eq!(out[0].usd_interest, 0.25);
        assert_eq!(out[0].board_approval_date, NaiveDate::from_ymd_opt(2015, 3, 1));
    }
}
