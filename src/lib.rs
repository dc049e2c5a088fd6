pub mod cache;
pub mod config;
pub mod country_level;
pub mod crs;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod logging;
pub mod lookup;
pub mod model;
pub mod output;
pub mod project_level;
pub mod viz;
pub mod wb;

pub use config::Config;
pub use error::{FetchError, ReconcileError};
