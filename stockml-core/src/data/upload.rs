//! Uploaded-file ingest: CSV through the `csv` crate, Parquet through polars.
//!
//! CSV cells arrive as text and are coerced per column:
//! 1. every present cell parses as a date → date column;
//! 2. every present cell parses as a number once stray characters
//!    (anything but digits, `.` and `-`) are stripped → numeric column;
//! 3. otherwise → text column.
//! Empty cells and common NA markers are missing.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::info;

use super::provider::DataError;
use crate::table::{Column, Table};

const NA_TOKENS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Parquet,
}

impl UploadFormat {
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(UploadFormat::Csv),
            "parquet" | "pq" => Ok(UploadFormat::Parquet),
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Read an uploaded file, picking the reader from the extension.
pub fn load_upload(path: &Path) -> Result<Table, DataError> {
    let format = UploadFormat::from_path(path)?;
    let io_err = |e: std::io::Error| DataError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let table = match format {
        UploadFormat::Csv => read_csv(File::open(path).map_err(io_err)?)?,
        UploadFormat::Parquet => read_parquet(File::open(path).map_err(io_err)?)?,
    };
    info!(
        path = %path.display(),
        rows = table.n_rows(),
        cols = table.n_cols(),
        "upload loaded"
    );
    Ok(table)
}

/// Parse CSV with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<Table, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| DataError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(DataError::Csv("file has no header row".into()));
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record.map_err(|e| DataError::Csv(e.to_string()))?;
        for (col, raw) in cells.iter_mut().zip(record.iter()) {
            col.push((!NA_TOKENS.contains(&raw)).then(|| raw.to_string()));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| coerce_column(name, values))
        .collect();
    Ok(Table::new(columns)?)
}

/// Keep only digits, `.` and `-`.
pub fn strip_numeric(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

fn parse_number(raw: &str) -> Option<f64> {
    let stripped = strip_numeric(raw);
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    // Timestamps with an offset, e.g. "2024-01-02 00:00:00-05:00".
    if raw.len() > 10 && raw.is_char_boundary(10) {
        let (head, tail) = raw.split_at(10);
        if tail.starts_with([' ', 'T']) {
            return NaiveDate::parse_from_str(head, "%Y-%m-%d").ok();
        }
    }
    None
}

fn coerce_column(name: String, values: Vec<Option<String>>) -> Column {
    let present = || values.iter().flatten();
    let any_present = present().next().is_some();

    if any_present && present().all(|v| parse_date(v).is_some()) {
        let dates = values.iter().map(|v| v.as_deref().and_then(parse_date)).collect();
        return Column::date(name, dates);
    }
    if present().all(|v| parse_number(v).is_some()) {
        let nums = values.iter().map(|v| v.as_deref().and_then(parse_number)).collect();
        return Column::numeric(name, nums);
    }
    Column::text(name, values)
}

/// Parse a Parquet file. Date columns stay dates, numeric columns become
/// f64, everything else is cast to text.
pub fn read_parquet(file: File) -> Result<Table, DataError> {
    let pq = |e: PolarsError| DataError::Parquet(e.to_string());
    let df = ParquetReader::new(file).finish().map_err(pq)?;

    let mut columns = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let name = col.name().to_string();
        let series = col.as_materialized_series();
        let column = match series.dtype() {
            DataType::Date => {
                let days = series.cast(&DataType::Int32).map_err(pq)?;
                let values = days
                    .i32()
                    .map_err(pq)?
                    .into_iter()
                    .map(|d| d.and_then(days_to_date))
                    .collect();
                Column::date(name, values)
            }
            DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => {
                let floats = series.cast(&DataType::Float64).map_err(pq)?;
                let values = floats
                    .f64()
                    .map_err(pq)?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect();
                Column::numeric(name, values)
            }
            _ => {
                let text = series.cast(&DataType::String).map_err(pq)?;
                let values: Vec<Option<String>> = text
                    .str()
                    .map_err(pq)?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect();
                coerce_column(name, values)
            }
        };
        columns.push(column);
    }
    Ok(Table::new(columns)?)
}

/// Days since 1970-01-01 to a calendar date.
fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnKind;

    #[test]
    fn strips_currency_and_thousands_separators() {
        let csv = "Date,Close,Volume,Ticker\n\
                   2024-01-02,$185.64,\"82,488,700\",AAPL\n\
                   2024-01-03,$184.25,\"58,414,500\",AAPL\n";
        let t = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(t.kind_of("Date"), Some(ColumnKind::Date));
        assert_eq!(t.kind_of("Close"), Some(ColumnKind::Numeric));
        assert_eq!(t.kind_of("Ticker"), Some(ColumnKind::Text));
        assert_eq!(t.numeric("Close").unwrap()[0], Some(185.64));
        assert_eq!(t.numeric("Volume").unwrap()[1], Some(58_414_500.0));
    }

    #[test]
    fn empty_and_na_cells_are_missing() {
        let csv = "Close,Open\n1.5,2\n,NA\n3.5,N/A\n";
        let t = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(t.numeric("Close").unwrap(), &[Some(1.5), None, Some(3.5)]);
        assert_eq!(t.numeric("Open").unwrap(), &[Some(2.0), None, None]);
    }

    #[test]
    fn datetime_with_offset_parses_as_date() {
        let csv = "Date,Close\n2024-01-02 00:00:00-05:00,1\n2024-01-03 00:00:00-05:00,2\n";
        let t = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(
            t.dates("Date").unwrap()[1],
            NaiveDate::from_ymd_opt(2024, 1, 3)
        );
    }

    #[test]
    fn mixed_column_stays_text() {
        let csv = "Signal\nbuy\n12\n";
        let t = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(t.kind_of("Signal"), Some(ColumnKind::Text));
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(matches!(
            UploadFormat::from_path(Path::new("prices.xlsx")),
            Err(DataError::UnsupportedFormat(_))
        ));
        assert_eq!(
            UploadFormat::from_path(Path::new("PRICES.CSV")).unwrap(),
            UploadFormat::Csv
        );
    }

    #[test]
    fn loads_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "Date,Close\n2024-01-02,10\n2024-01-03,11\n").unwrap();
        let t = load_upload(&path).unwrap();
        assert_eq!(t.n_rows(), 2);
    }

    #[test]
    fn epoch_day_conversion() {
        assert_eq!(days_to_date(0), NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(days_to_date(19_724), NaiveDate::from_ymd_opt(2024, 1, 2));
    }
}
