// src/cache.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray},
    compute::cast,
    datatypes::{DataType, Date32Type, Float64Type, Int64Type, Schema},
    record_batch::RecordBatch,
};
use chrono::{NaiveDate, NaiveDateTime};
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{fs::File, io::BufWriter, path::Path, sync::Arc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Date layouts seen in cached and bulk-downloaded string columns.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a date in any of the known layouts, ignoring time-of-day.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Write a single batch to `path` (SNAPPY), via a temp file in the same directory.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;

    let tmp = NamedTempFile::new_in(dir).with_context(|| format!("temp file in {:?}", dir))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    {
        let mut writer =
            ArrowWriter::try_new(BufWriter::new(tmp.as_file()), batch.schema(), Some(props))
                .context("creating Arrow writer")?;
        writer.write(batch).context("writing batch")?;
        writer.close().context("closing writer")?;
    }
    tmp.persist(path)
        .with_context(|| format!("renaming into {:?}", path))?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

/// Read every batch from `path`, optionally projecting to the named leaf columns.
pub fn read_parquet(path: &Path, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {:?}", path))?;
    if let Some(cols) = columns {
        let mask = ProjectionMask::columns(builder.parquet_schema(), cols.iter().copied());
        builder = builder.with_projection(mask);
    }
    let reader = builder.with_batch_size(8192).build()?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("decoding {:?}", path))?;
    debug!(path = %path.display(), batches = batches.len(), "read parquet");
    Ok(batches)
}

pub fn schema_of(fields: Vec<arrow::datatypes::Field>) -> Arc<Schema> {
    Arc::new(Schema::new(fields))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| anyhow!("missing column `{}`", name))?;
    Ok(batch.column(idx))
}

/// Column `name` as strings, whatever its physical type.
pub fn utf8_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    let arr = cast(column(batch, name)?, &DataType::Utf8)
        .with_context(|| format!("casting `{}` to Utf8", name))?;
    Ok(arr
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Column `name` as floats; NaN and unparseable values are `None`.
pub fn f64_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<f64>>> {
    let arr = cast(column(batch, name)?, &DataType::Float64)
        .with_context(|| format!("casting `{}` to Float64", name))?;
    Ok(arr
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

pub fn i64_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    let src = column(batch, name)?;
    // float codes ("901.0") go through Float64 first
    let arr = match src.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            let f = cast(src, &DataType::Float64)?;
            cast(&f, &DataType::Int64)?
        }
        _ => cast(src, &DataType::Int64)?,
    };
    Ok(arr.as_primitive::<Int64Type>().iter().collect())
}

/// Column `name` as dates. String columns are parsed with [`parse_date`].
pub fn date_column(batch: &RecordBatch, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let src = column(batch, name)?;
    match src.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => Ok(utf8_column(batch, name)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_date))
            .collect()),
        _ => {
            let arr = cast(src, &DataType::Date32)
                .with_context(|| format!("casting `{}` to Date32", name))?;
            let dates = arr.as_primitive::<Date32Type>();
            Ok((0..dates.len())
                .map(|i| {
                    if dates.is_null(i) {
                        None
                    } else {
                        dates.value_as_date(i)
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::Field;
    use tempfile::tempdir;

    #[test]
    fn parses_known_date_layouts() {
        let d = NaiveDate::from_ymd_opt(2019, 6, 30);
        assert_eq!(parse_date("2019-06-30"), d);
        assert_eq!(parse_date("30-Jun-2019"), d);
        assert_eq!(parse_date("2019-06-30 00:00:00"), d);
        assert_eq!(parse_date("2019-06-30T12:00:00"), d);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn columns_are_cast_on_read() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("t.parquet");
        let schema = schema_of(vec![
            Field::new("code", DataType::Utf8, true),
            Field::new("rate", DataType::Int64, true),
            Field::new("when", DataType::Utf8, true),
            Field::new("amount", DataType::Float64, true),
        ]);
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("901"), None])),
                Arc::new(Int64Array::from(vec![Some(2), Some(3)])),
                Arc::new(StringArray::from(vec![Some("01-Mar-2015"), Some("garbage")])),
                Arc::new(Float64Array::from(vec![Some(f64::NAN), Some(1.5)])),
            ],
        )
        .unwrap();
        write_parquet(&path, &batch).unwrap();

        let batches = read_parquet(&path, Some(&["code", "rate", "when", "amount"])).unwrap();
        let b = &batches[0];
        assert_eq!(i64_column(b, "code").unwrap(), vec![Some(901), None]);
        assert_eq!(f64_column(b, "rate").unwrap(), vec![Some(2.0), Some(3.0)]);
        assert_eq!(
            date_column(b, "when").unwrap(),
            vec![NaiveDate::from_ymd_opt(2015, 3, 1), None]
        );
        assert_eq!(f64_column(b, "amount").unwrap(), vec![None, Some(1.5)]);

        let err = utf8_column(b, "nope").unwrap_err();
        assert!(err.to_string().contains("missing column `nope`"));
    }
}
