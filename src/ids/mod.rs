//! International Debt Statistics: provider seam, cleaning, series getters and the terms merger.

pub mod clean;
pub mod series;
pub mod source;
pub mod terms;

pub use clean::{get_clean_data, Counterparts};
pub use source::{IdsFile, IdsQuery, IndicatorSource};
