// src/ids/source.rs

use anyhow::{Context, Result};
use std::{fs::File, ops::RangeInclusive, path::PathBuf};
use tracing::{debug, instrument};

use crate::model::RawObservation;

/// What to pull from an IDS provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdsQuery {
    pub series: Vec<String>,
    pub years: Option<RangeInclusive<i32>>,
    /// Entity codes or names; `None` means every economy.
    pub economies: Option<Vec<String>>,
}

impl IdsQuery {
    fn wants(&self, obs: &RawObservation) -> bool {
        if !self.series.iter().any(|s| s == &obs.indicator_code) {
            return false;
        }
        if let Some(years) = &self.years {
            if !years.contains(&obs.year) {
                return false;
            }
        }
        match &self.economies {
            None => true,
            Some(list) => list.iter().any(|e| {
                e.eq_ignore_ascii_case(&obs.entity_name)
                    || obs
                        .entity_code
                        .as_deref()
                        .is_some_and(|c| e.eq_ignore_ascii_case(c))
            }),
        }
    }
}

/// Provider of raw International Debt Statistics series.
pub trait IndicatorSource {
    fn fetch(&self, query: &IdsQuery) -> Result<Vec<RawObservation>>;
}

/// Bulk IDS export on disk.
#[derive(Debug, Clone)]
pub struct IdsFile {
    path: PathBuf,
}

impl IdsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IndicatorSource for IdsFile {
    #[instrument(level = "debug", skip(self, query), fields(path = %self.path.display()))]
    fn fetch(&self, query: &IdsQuery) -> Result<Vec<RawObservation>> {
        let file = File::open(&self.path).with_context(|| format!("opening {:?}", self.path))?;
        let mut rdr = csv::Reader::from_reader(file);
        let mut out = Vec::new();
        for (idx, rec) in rdr.deserialize::<RawObservation>().enumerate() {
            let obs = rec.with_context(|| format!("{:?} record {}", self.path, idx))?;
            if query.wants(&obs) {
                out.push(obs);
            }
        }
        debug!(rows = out.len(), "ids rows matched");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn applies_series_year_and_economy_filters() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(
            b"entity_code,entity_name,counterpart_name,indicator_code,year,value\n\
KEN,Kenya,China,DT.INR.OFFT,2020,2.5\n\
KEN,Kenya,China,DT.INR.OFFT,2010,1.5\n\
GHA,Ghana,China,DT.INR.OFFT,2020,3.0\n\
KEN,Kenya,China,DT.COM.BLAT.CD,2020,100\n\
KEN,Kenya,World,DT.INR.PRVT,2021,\n",
        )
        .unwrap();

        let src = IdsFile::new(f.path());
        let rows = src
            .fetch(&IdsQuery {
                series: vec!["DT.INR.OFFT".into(), "DT.INR.PRVT".into()],
                years: Some(2015..=2021),
                economies: Some(vec!["ken".into()]),
            })
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(2.5));
        assert_eq!(rows[1].indicator_code, "DT.INR.PRVT");
        assert_eq!(rows[1].value, None);
    }
}
