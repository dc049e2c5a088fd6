//! World Bank IDA/IBRD loan and credit statements from the DataCatalog API.

pub mod statements;

pub use statements::{
    download_ibrd_interest, download_ida_interest, download_missing_statements, get_ibrd_interest,
    get_ida_interest, StatementDataset, IBRD, IDA,
};
