// src/project_level.rs
//
// Backfill missing WB statement interest rates from CRS-reported projects.

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf};
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::crs::load_and_process_crs_data;
use crate::error::ReconcileError;
use crate::lookup::CountryLookup;
use crate::model::{CrsReportedProject, ProjectKey, RateSource, ReconciledProject, WbProject};
use crate::output::write_csv;
use crate::wb::{get_ibrd_interest, get_ida_interest};

/// Project coverage before and after the CRS backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageReport {
    pub total: usize,
    pub originally_missing: usize,
    pub backfilled: usize,
    pub with_interest: usize,
}

impl CoverageReport {
    pub fn still_missing(&self) -> usize {
        self.total - self.with_interest
    }

    /// Share still missing, in percent, rounded to one decimal. Zero when there are no projects.
    pub fn still_missing_pct(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (1000.0 * self.still_missing() as f64 / self.total as f64).round() / 10.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub projects: Vec<ReconciledProject>,
    pub report: CoverageReport,
}

/// Split into (rate reported, rate missing), preserving order.
pub fn partition_by_interest(data: Vec<WbProject>) -> (Vec<WbProject>, Vec<WbProject>) {
    data.into_iter().partition(|p| p.interest_rate.is_some())
}

/// Fill missing WB rates from CRS rows sharing the composite key.
///
/// WB rates are never overwritten. Projects without a WB rate and without a
/// CRS match are dropped and only show up in the report. A key matched by more
/// than one CRS row is an error rather than a fan-out.
pub fn reconcile(
    wb: Vec<WbProject>,
    crs: &[CrsReportedProject],
) -> Result<Reconciliation, ReconcileError> {
    let total = wb.len();
    let (present, missing) = partition_by_interest(wb);
    let originally_missing = missing.len();
    info!(
        missing = originally_missing,
        "total number of projects with missing interest rates"
    );

    let mut index: HashMap<ProjectKey, Vec<f64>> = HashMap::new();
    for c in crs {
        index.entry(c.key()).or_default().push(c.interest_rate);
    }

    let mut backfilled = Vec::with_capacity(missing.len());
    for p in missing {
        let key = p.key();
        match index.get(&key).map(Vec::as_slice) {
            None | Some([]) => {}
            Some([rate]) => {
                backfilled.push(ReconciledProject::from_wb(p, *rate, RateSource::Crs))
            }
            Some(rates) => {
                return Err(ReconcileError::AmbiguousKey {
                    key,
                    matches: rates.len(),
                })
            }
        }
    }

    let mut projects: Vec<ReconciledProject> = present
        .into_iter()
        .filter_map(|p| {
            let rate = p.interest_rate?;
            Some(ReconciledProject::from_wb(p, rate, RateSource::WorldBank))
        })
        .collect();
    let n_backfilled = backfilled.len();
    projects.extend(backfilled);

    let report = CoverageReport {
        total,
        originally_missing,
        backfilled: n_backfilled,
        with_interest: projects.len(),
    };
    info!(
        with_interest = report.with_interest,
        "total number of projects with interest data"
    );
    info!(
        "still missing {} ({}%) out of {} projects after merging CRS data",
        report.still_missing(),
        report.still_missing_pct(),
        report.total
    );

    Ok(Reconciliation { projects, report })
}

/// CRS projects with a rate, keyed by ISO3 instead of DAC recipient code.
#[instrument(level = "info", skip_all)]
pub fn get_crs_reported_projects(
    config: &Config,
    lookup: &dyn CountryLookup,
) -> Result<Vec<CrsReportedProject>> {
    let crs = load_and_process_crs_data(&config.crs_path(), &config.crs.donor_codes)?;
    let mut unmapped = 0usize;
    let out: Vec<CrsReportedProject> = crs
        .into_iter()
        .filter_map(|c| {
            let interest_rate = c.interest_rate?;
            let iso3 = c.recipient_code.and_then(|code| lookup.iso3_from_dac(code));
            if iso3.is_none() {
                unmapped += 1;
            }
            Some(CrsReportedProject {
                project_id: c.project_id,
                loan_or_credit_number: c.loan_or_credit_number,
                iso3,
                board_approval_date: c.board_approval_date,
                interest_rate,
            })
        })
        .collect();
    if unmapped > 0 {
        warn!(unmapped, "CRS recipients without an ISO3 code");
    }
    Ok(out)
}

/// Add ISO3 codes from the statement country names.
pub fn add_iso3(data: &mut [WbProject], lookup: &dyn CountryLookup) {
    for p in data.iter_mut() {
        p.iso3 = p.country.as_deref().and_then(|c| lookup.iso3_from_name(c));
    }
}

/// IDA and IBRD project summaries combined, with ISO3 codes.
#[instrument(level = "info", skip_all)]
pub fn get_project_level_data(config: &Config, lookup: &dyn CountryLookup) -> Result<Vec<WbProject>> {
    let mut data = get_ida_interest(config)?;
    data.extend(get_ibrd_interest(config)?);
    add_iso3(&mut data, lookup);
    Ok(data)
}

/// WB project rates, with gaps filled from the CRS where possible.
pub fn get_project_level_interest(
    config: &Config,
    lookup: &dyn CountryLookup,
) -> Result<Reconciliation> {
    let project_level_data = get_project_level_data(config, lookup)?;
    let crs_project_data = get_crs_reported_projects(config, lookup)?;
    let rec = reconcile(project_level_data, &crs_project_data)
        .context("reconciling WB and CRS projects")?;
    Ok(rec)
}

pub fn write_project_level_interest(config: &Config, rec: &Reconciliation) -> Result<PathBuf> {
    let path = config.projects_dir().join("wb_projects_interest.csv");
    write_csv(&path, &ReconciledProject::COLUMNS, &rec.projects)?;
    info!(path = %path.display(), "project level interest data saved");
    Ok(path)
}
