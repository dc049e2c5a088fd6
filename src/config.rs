// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "DEBTSCRAPER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "debtscraper.yaml";

pub const DATACATALOG_BASE_URL: &str =
    "https://datacatalogapi.worldbank.org/dexapps/fone/api/apiservice";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    pub datacatalog: DataCatalogConfig,
    pub crs: CrsConfig,
    pub ids: IdsConfig,
    /// Country lookup CSV, relative to `paths.raw_data`.
    pub countries_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            datacatalog: DataCatalogConfig::default(),
            crs: CrsConfig::default(),
            ids: IdsConfig::default(),
            countries_file: "countries.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub raw_data: PathBuf,
    pub output: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("raw_data"),
            output: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCatalogConfig {
    pub base_url: String,
    pub page_size: usize,
}

impl Default for DataCatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DATACATALOG_BASE_URL.to_string(),
            page_size: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrsConfig {
    pub file: String,
    pub donor_codes: Vec<i64>,
}

impl Default for CrsConfig {
    fn default() -> Self {
        Self {
            file: "CRS.parquet".to_string(),
            donor_codes: crate::crs::DEFAULT_DONOR_CODES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdsConfig {
    pub file: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            file: "ids.csv".to_string(),
            start_year: None,
            end_year: None,
        }
    }
}

impl IdsConfig {
    /// Year window, only when both ends are configured.
    pub fn years(&self) -> Option<RangeInclusive<i32>> {
        match (self.start_year, self.end_year) {
            (Some(start), Some(end)) => Some(start..=end),
            _ => None,
        }
    }
}

impl Config {
    /// Load from `$DEBTSCRAPER_CONFIG`, else `debtscraper.yaml`, else defaults.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("no config file; using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let cfg: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {:?}", path))?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn crs_path(&self) -> PathBuf {
        self.paths.raw_data.join(&self.crs.file)
    }

    pub fn ids_path(&self) -> PathBuf {
        self.paths.raw_data.join(&self.ids.file)
    }

    pub fn countries_path(&self) -> PathBuf {
        self.paths.raw_data.join(&self.countries_file)
    }

    pub fn interest_rates_dir(&self) -> PathBuf {
        self.paths.output.join("interest_rates")
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.paths.output.join("projects")
    }

    pub fn terms_dir(&self) -> PathBuf {
        self.paths.output.join("terms")
    }

    pub fn visualisations_dir(&self) -> PathBuf {
        self.paths.output.join("visualisations")
    }
}
