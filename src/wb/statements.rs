// src/wb/statements.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray},
    datatypes::{DataType, Field},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::{
    cmp::Ordering,
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, instrument};

use crate::cache::{date_column, f64_column, read_parquet, schema_of, utf8_column, write_parquet};
use crate::config::Config;
use crate::fetch::{DataCatalogClient, JsonTable, PageRequest};
use crate::model::{zero_to_none, LendingArm, WbProject};

/// Date layout used by the statements API ("01-Sep-2024").
const STATEMENT_DATE_FORMAT: &str = "%d-%b-%Y";

/// A statements dataset and the source field names it uses.
#[derive(Debug, Clone, Copy)]
pub struct StatementDataset {
    pub arm: LendingArm,
    pub dataset_id: &'static str,
    pub resource_id: &'static str,
    pub cache_file: &'static str,
    pub number_field: &'static str,
    pub name_field: &'static str,
    pub rate_field: &'static str,
    pub principal_field: &'static str,
    pub disbursed_field: &'static str,
    pub repaid_field: &'static str,
    pub loan_type_field: Option<&'static str>,
}

pub const IDA: StatementDataset = StatementDataset {
    arm: LendingArm::Ida,
    dataset_id: "DS00976",
    resource_id: "RS00906",
    cache_file: "ida_interest.parquet",
    number_field: "credit_number",
    name_field: "project_name",
    rate_field: "service_charge_rate",
    principal_field: "original_principal_amount_us_",
    disbursed_field: "disbursed_amount_us_",
    repaid_field: "repaid_to_ida_us_",
    loan_type_field: None,
};

pub const IBRD: StatementDataset = StatementDataset {
    arm: LendingArm::Ibrd,
    dataset_id: "DS00975",
    resource_id: "RS00905",
    cache_file: "ibrd_interest.parquet",
    number_field: "loan_number",
    name_field: "project_name_",
    rate_field: "interest_rate",
    principal_field: "original_principal_amount",
    disbursed_field: "disbursed_amount",
    repaid_field: "repaid_to_ibrd",
    loan_type_field: Some("loan_type"),
};

/// Statement line after cleaning: dates parsed, period and repayment columns unified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementRow {
    pub loan_or_credit_number: Option<String>,
    pub board_approval_date: Option<NaiveDate>,
    pub period: Option<NaiveDate>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub loan_type: Option<String>,
    pub interest_rate: Option<f64>,
    pub original_principal_amount: Option<f64>,
    pub disbursed_amount: Option<f64>,
    pub repayment: Option<f64>,
}

fn json_str(row: &Map<String, Value>, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers may arrive as JSON numbers or as strings ("1,234.5").
fn json_f64(row: &Map<String, Value>, field: &str) -> Option<f64> {
    match row.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn json_date(row: &Map<String, Value>, field: &str) -> Option<NaiveDate> {
    json_str(row, field).and_then(|s| NaiveDate::parse_from_str(&s, STATEMENT_DATE_FORMAT).ok())
}

/// Map a raw API response onto [`StatementRow`]s. Unparseable dates become `None`.
pub fn clean_ida_ibrd_response(table: &JsonTable, ds: &StatementDataset) -> Vec<StatementRow> {
    table
        .rows
        .iter()
        .map(|r| StatementRow {
            loan_or_credit_number: json_str(r, ds.number_field),
            board_approval_date: json_date(r, "board_approval_date"),
            period: json_date(r, "end_of_period"),
            country_code: json_str(r, "country_code"),
            country: json_str(r, "country"),
            project_id: json_str(r, "project_id"),
            project_name: json_str(r, ds.name_field),
            loan_type: ds.loan_type_field.and_then(|f| json_str(r, f)),
            interest_rate: json_f64(r, ds.rate_field),
            original_principal_amount: json_f64(r, ds.principal_field),
            disbursed_amount: json_f64(r, ds.disbursed_field),
            repayment: json_f64(r, ds.repaid_field),
        })
        .collect()
}

const CACHE_COLUMNS: [(&str, DataType); 12] = [
    ("loan_or_credit_number", DataType::Utf8),
    ("board_approval_date", DataType::Date32),
    ("period", DataType::Date32),
    ("country_code", DataType::Utf8),
    ("country", DataType::Utf8),
    ("project_id", DataType::Utf8),
    ("project_name", DataType::Utf8),
    ("loan_type", DataType::Utf8),
    ("interest_rate", DataType::Float64),
    ("original_principal_amount", DataType::Float64),
    ("disbursed_amount", DataType::Float64),
    ("repayment", DataType::Float64),
];

fn statements_to_batch(rows: &[StatementRow]) -> Result<RecordBatch> {
    let schema = schema_of(
        CACHE_COLUMNS
            .iter()
            .map(|(name, ty)| Field::new(*name, ty.clone(), true))
            .collect(),
    );
    let strs = |f: fn(&StatementRow) -> &Option<String>| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|r| f(r).as_deref()).collect::<Vec<_>>(),
        ))
    };
    let dates = |f: fn(&StatementRow) -> Option<NaiveDate>| -> ArrayRef {
        Arc::new(Date32Array::from(
            rows.iter()
                .map(|r| f(r).map(date32_from_naive))
                .collect::<Vec<_>>(),
        ))
    };
    let floats = |f: fn(&StatementRow) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    RecordBatch::try_new(
        schema,
        vec![
            strs(|r| &r.loan_or_credit_number),
            dates(|r| r.board_approval_date),
            dates(|r| r.period),
            strs(|r| &r.country_code),
            strs(|r| &r.country),
            strs(|r| &r.project_id),
            strs(|r| &r.project_name),
            strs(|r| &r.loan_type),
            floats(|r| r.interest_rate),
            floats(|r| r.original_principal_amount),
            floats(|r| r.disbursed_amount),
            floats(|r| r.repayment),
        ],
    )
    .context("building statements batch")
}

fn date32_from_naive(d: NaiveDate) -> i32 {
    // days since the Unix epoch
    (d - NaiveDate::default()).num_days() as i32
}

pub fn write_statements(path: &Path, rows: &[StatementRow]) -> Result<()> {
    write_parquet(path, &statements_to_batch(rows)?)
}

pub fn read_statements(path: &Path) -> Result<Vec<StatementRow>> {
    let mut out = Vec::new();
    for batch in read_parquet(path, None)? {
        let number = utf8_column(&batch, "loan_or_credit_number")?;
        let approval = date_column(&batch, "board_approval_date")?;
        let period = date_column(&batch, "period")?;
        let code = utf8_column(&batch, "country_code")?;
        let country = utf8_column(&batch, "country")?;
        let project = utf8_column(&batch, "project_id")?;
        let name = utf8_column(&batch, "project_name")?;
        let loan_type = utf8_column(&batch, "loan_type")?;
        let rate = f64_column(&batch, "interest_rate")?;
        let principal = f64_column(&batch, "original_principal_amount")?;
        let disbursed = f64_column(&batch, "disbursed_amount")?;
        let repayment = f64_column(&batch, "repayment")?;
        for i in 0..batch.num_rows() {
            out.push(StatementRow {
                loan_or_credit_number: number[i].clone(),
                board_approval_date: approval[i],
                period: period[i],
                country_code: code[i].clone(),
                country: country[i].clone(),
                project_id: project[i].clone(),
                project_name: name[i].clone(),
                loan_type: loan_type[i].clone(),
                interest_rate: rate[i],
                original_principal_amount: principal[i],
                disbursed_amount: disbursed[i],
                repayment: repayment[i],
            });
        }
    }
    Ok(out)
}

/// Fetch a statements dataset page by page, clean it and cache it as Parquet.
#[instrument(level = "info", skip(client, select, filter, output_path), fields(dataset = ds.dataset_id))]
pub fn download_and_save_data(
    client: &DataCatalogClient,
    ds: &StatementDataset,
    select: Option<Vec<String>>,
    filter: Option<String>,
    page_size: usize,
    output_path: &Path,
) -> Result<usize> {
    let mut req = PageRequest::new(ds.dataset_id, ds.resource_id).page_size(page_size);
    if let Some(fields) = select {
        req = req.select(fields);
    }
    if let Some(expr) = filter {
        req = req.filter(expr);
    }
    let table = client
        .fetch_paginated(&req)
        .with_context(|| format!("downloading {} statements", ds.arm))?;
    let rows = clean_ida_ibrd_response(&table, ds);
    write_statements(output_path, &rows)?;
    Ok(rows.len())
}

fn cache_path(config: &Config, ds: &StatementDataset) -> PathBuf {
    config.paths.raw_data.join(ds.cache_file)
}

fn download(client: &DataCatalogClient, config: &Config, ds: &StatementDataset) -> Result<usize> {
    let path = cache_path(config, ds);
    download_and_save_data(client, ds, None, None, config.datacatalog.page_size, &path)
}

pub fn download_ida_interest(client: &DataCatalogClient, config: &Config) -> Result<usize> {
    download(client, config, &IDA)
}

pub fn download_ibrd_interest(client: &DataCatalogClient, config: &Config) -> Result<usize> {
    download(client, config, &IBRD)
}

/// Download whichever statement datasets are not cached yet. Returns how many were fetched.
pub fn download_missing_statements(client: &DataCatalogClient, config: &Config) -> Result<usize> {
    let mut fetched = 0;
    for ds in [&IDA, &IBRD] {
        let path = cache_path(config, ds);
        if path.exists() {
            info!(arm = %ds.arm, path = %path.display(), "statements cached; skipping download");
            continue;
        }
        download(client, config, ds)?;
        fetched += 1;
    }
    Ok(fetched)
}

/// Orders `None` after every value, as a sorted group-by does with missing keys.
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn max_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Collapse statement lines into one project per (number, country code, project id).
///
/// Lines are grouped by number, approval date, country code, project id, name and
/// loan type, taking the max of country, rate and principal. Groups are visited
/// in sorted key order and the last group per project wins. Zero rates become `None`.
pub fn summarise_statements(rows: Vec<StatementRow>, arm: LendingArm) -> Vec<WbProject> {
    let mut sorted = rows;
    sorted.sort_by(|a, b| {
        nulls_last(&a.loan_or_credit_number, &b.loan_or_credit_number)
            .then_with(|| nulls_last(&a.board_approval_date, &b.board_approval_date))
            .then_with(|| nulls_last(&a.country_code, &b.country_code))
            .then_with(|| nulls_last(&a.project_id, &b.project_id))
            .then_with(|| nulls_last(&a.project_name, &b.project_name))
            .then_with(|| nulls_last(&a.loan_type, &b.loan_type))
    });

    let mut groups: Vec<WbProject> = Vec::new();
    for r in sorted {
        let same_group = groups.last().is_some_and(|g| {
            g.loan_or_credit_number == r.loan_or_credit_number
                && g.board_approval_date == r.board_approval_date
                && g.country_code == r.country_code
                && g.project_id == r.project_id
                && g.project_name == r.project_name
                && g.loan_type == r.loan_type
        });
        match groups.last_mut() {
            Some(g) if same_group => {
                g.country = g.country.take().max(r.country);
                g.interest_rate = max_f64(g.interest_rate, r.interest_rate);
                g.original_principal_amount =
                    max_f64(g.original_principal_amount, r.original_principal_amount);
            }
            _ => groups.push(WbProject {
                project_id: r.project_id,
                loan_or_credit_number: r.loan_or_credit_number,
                country_code: r.country_code,
                country: r.country,
                iso3: None,
                project_name: r.project_name,
                loan_type: r.loan_type,
                board_approval_date: r.board_approval_date,
                interest_rate: r.interest_rate,
                original_principal_amount: r.original_principal_amount,
                source: arm,
            }),
        }
    }

    // keep the last group per (number, country code, project id), in group order
    let mut keep = vec![true; groups.len()];
    let mut seen = HashMap::new();
    for (i, g) in groups.iter().enumerate().rev() {
        let key = (
            g.loan_or_credit_number.clone(),
            g.country_code.clone(),
            g.project_id.clone(),
        );
        if seen.insert(key, i).is_some() {
            keep[i] = false;
        }
    }

    groups
        .into_iter()
        .zip(keep)
        .filter_map(|(mut g, k)| {
            if !k {
                return None;
            }
            g.interest_rate = zero_to_none(g.interest_rate);
            Some(g)
        })
        .collect()
}

fn load_summary(config: &Config, ds: &StatementDataset) -> Result<Vec<WbProject>> {
    let path = cache_path(config, ds);
    let rows = read_statements(&path)
        .with_context(|| format!("loading cached {} statements", ds.arm))?;
    let summary = summarise_statements(rows, ds.arm);
    info!(arm = %ds.arm, projects = summary.len(), "summarised statements");
    Ok(summary)
}

/// IDA credits with their service charge rate, from the local cache.
pub fn get_ida_interest(config: &Config) -> Result<Vec<WbProject>> {
    load_summary(config, &IDA)
}

/// IBRD loans with their interest rate, from the local cache.
pub fn get_ibrd_interest(config: &Config) -> Result<Vec<WbProject>> {
    load_summary(config, &IBRD)
}
