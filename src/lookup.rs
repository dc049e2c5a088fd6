// src/lookup.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs::File, path::Path};
use tracing::info;

/// Country code, naming and classification lookups.
pub trait CountryLookup {
    /// ISO3 code for a country name, alias or code.
    fn iso3_from_name(&self, name: &str) -> Option<String>;
    /// ISO3 code for an OECD DAC recipient code.
    fn iso3_from_dac(&self, dac_code: i64) -> Option<String>;
    /// Harmonised short name for a country, if the name is known.
    fn short_name(&self, name: &str) -> Option<String>;
    fn continent(&self, name: &str) -> Option<String>;
    fn income_level(&self, name: &str) -> Option<String>;
    /// ISO3 codes of every African country.
    fn african_countries(&self) -> Vec<String>;
    /// ISO3 codes of every emerging market and developing economy.
    fn emde_countries(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryRecord {
    pub iso3: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub dac_code: Option<i64>,
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default)]
    pub income_level: Option<String>,
    #[serde(default)]
    pub emde: bool,
    /// `;`-separated alternative names.
    #[serde(default)]
    pub aliases: String,
}

/// `CountryLookup` backed by a country metadata CSV.
#[derive(Debug, Default)]
pub struct CountryTable {
    records: Vec<CountryRecord>,
    by_name: HashMap<String, usize>,
    by_dac: HashMap<i64, usize>,
}

fn normalise(name: &str) -> String {
    name.replace('\u{a0}', " ").trim().to_lowercase()
}

impl CountryTable {
    pub fn from_records(records: Vec<CountryRecord>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_dac = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_name.insert(normalise(&r.iso3), i);
            by_name.insert(normalise(&r.name), i);
            if let Some(short) = &r.short_name {
                by_name.insert(normalise(short), i);
            }
            for alias in r.aliases.split(';').filter(|a| !a.trim().is_empty()) {
                by_name.insert(normalise(alias), i);
            }
            if let Some(dac) = r.dac_code {
                by_dac.insert(dac, i);
            }
        }
        Self {
            records,
            by_name,
            by_dac,
        }
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
        let mut rdr = csv::Reader::from_reader(file);
        let records = rdr
            .deserialize()
            .collect::<Result<Vec<CountryRecord>, _>>()
            .with_context(|| format!("parsing {:?}", path))?;
        info!(path = %path.display(), countries = records.len(), "loaded country table");
        Ok(Self::from_records(records))
    }

    fn find(&self, name: &str) -> Option<&CountryRecord> {
        self.by_name
            .get(&normalise(name))
            .map(|&i| &self.records[i])
    }
}

impl CountryLookup for CountryTable {
    fn iso3_from_name(&self, name: &str) -> Option<String> {
        self.find(name).map(|r| r.iso3.clone())
    }

    fn iso3_from_dac(&self, dac_code: i64) -> Option<String> {
        self.by_dac
            .get(&dac_code)
            .map(|&i| self.records[i].iso3.clone())
    }

    fn short_name(&self, name: &str) -> Option<String> {
        self.find(name)
            .map(|r| r.short_name.clone().unwrap_or_else(|| r.name.clone()))
    }

    fn continent(&self, name: &str) -> Option<String> {
        self.find(name).and_then(|r| r.continent.clone())
    }

    fn income_level(&self, name: &str) -> Option<String> {
        self.find(name).and_then(|r| r.income_level.clone())
    }

    fn african_countries(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.continent.as_deref() == Some("Africa"))
            .map(|r| r.iso3.clone())
            .collect()
    }

    fn emde_countries(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.emde)
            .map(|r| r.iso3.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "\
iso3,name,short_name,dac_code,continent,income_level,emde,aliases
KEN,Republic of Kenya,Kenya,248,Africa,Lower middle income,true,Kenya Rep.
IND,India,,645,Asia,Lower middle income,true,
DEU,Germany,,,Europe,High income,false,Federal Republic of Germany;FRG
";

    fn table() -> CountryTable {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(CSV.as_bytes()).unwrap();
        CountryTable::from_csv(f.path()).unwrap()
    }

    #[test]
    fn resolves_names_aliases_and_codes() {
        let t = table();
        assert_eq!(t.iso3_from_name("Kenya").as_deref(), Some("KEN"));
        assert_eq!(t.iso3_from_name(" kenya rep. ").as_deref(), Some("KEN"));
        assert_eq!(t.iso3_from_name("FRG").as_deref(), Some("DEU"));
        assert_eq!(t.iso3_from_name("ind").as_deref(), Some("IND"));
        assert_eq!(t.iso3_from_name("Atlantis"), None);
        assert_eq!(t.iso3_from_dac(645).as_deref(), Some("IND"));
        assert_eq!(t.iso3_from_dac(1), None);
    }

    #[test]
    fn short_name_falls_back_to_name() {
        let t = table();
        assert_eq!(t.short_name("Republic of Kenya").as_deref(), Some("Kenya"));
        assert_eq!(t.short_name("India").as_deref(), Some("India"));
        assert_eq!(t.short_name("World Bank-IDA"), None);
    }

    #[test]
    fn classifications() {
        let t = table();
        assert_eq!(t.african_countries(), vec!["KEN"]);
        assert_eq!(t.emde_countries(), vec!["KEN", "IND"]);
        assert_eq!(t.income_level("Germany").as_deref(), Some("High income"));
        assert_eq!(t.continent("India").as_deref(), Some("Asia"));
    }
}
