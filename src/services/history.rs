use crate::error::{GasScopeError, Result};
use crate::models::PriceRecord;
use csv::StringRecord;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const PRICE_COLUMN: &str = "Gas_Price_Gwei";

/// Append-only log of observed gas prices.
///
/// Rows without a usable price are kept in the log but never returned by the
/// read side.
pub trait HistoryLog: Send + Sync {
    /// Appends one record. Either the whole row is written or nothing is.
    fn append(&self, record: &PriceRecord) -> Result<()>;

    /// The last `limit` valid prices, oldest first.
    fn recent_prices(&self, limit: usize) -> Result<Vec<f64>>;

    /// The last `rows` valid records, oldest first.
    fn tail(&self, rows: usize) -> Result<Vec<PriceRecord>>;

    /// Total row count, including rows without a price.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// CSV-backed history log. Columns other than `Timestamp` and
/// `Gas_Price_Gwei` are preserved and left empty on appended rows.
pub struct CsvHistory {
    path: PathBuf,
}

struct CsvContents {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    timestamp_idx: usize,
    price_idx: usize,
}

impl CsvHistory {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(GasScopeError::HistoryStore(format!(
                "history file {} not found",
                path.display()
            )));
        }

        let history = Self { path };
        let contents = history.read_all()?;
        tracing::info!(
            path = %history.path.display(),
            rows = contents.rows.len(),
            columns = contents.headers.len(),
            "History log opened"
        );
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<CsvContents> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                GasScopeError::HistoryStore(format!(
                    "{} is missing the {} column",
                    self.path.display(),
                    name
                ))
            })
        };
        let timestamp_idx = column(TIMESTAMP_COLUMN)?;
        let price_idx = column(PRICE_COLUMN)?;

        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CsvContents {
            headers,
            rows,
            timestamp_idx,
            price_idx,
        })
    }

    fn valid_records(&self) -> Result<Vec<PriceRecord>> {
        let contents = self.read_all()?;
        let mut records = Vec::with_capacity(contents.rows.len());

        for (line, row) in contents.rows.iter().enumerate() {
            let raw = row.get(contents.price_idx).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            let price: f64 = raw.parse().map_err(|_| {
                GasScopeError::HistoryStore(format!(
                    "row {}: invalid {} value {:?}",
                    line + 1,
                    PRICE_COLUMN,
                    raw
                ))
            })?;
            if !price.is_finite() {
                continue;
            }
            records.push(PriceRecord {
                timestamp: row.get(contents.timestamp_idx).unwrap_or("").to_string(),
                price_gwei: price,
            });
        }

        Ok(records)
    }
}

impl HistoryLog for CsvHistory {
    fn append(&self, record: &PriceRecord) -> Result<()> {
        let contents = self.read_all()?;

        let mut row = vec![String::new(); contents.headers.len()];
        row[contents.timestamp_idx] = record.timestamp.clone();
        row[contents.price_idx] = record.price_gwei.to_string();

        // Rewrite next to the real file and swap it in, so readers never see
        // a partially written row. Symlinks stay in place and the file keeps
        // its mode.
        let target = std::fs::canonicalize(&self.path)
            .map_err(|e| GasScopeError::HistoryStore(e.to_string()))?;
        let permissions = std::fs::metadata(&target)
            .map_err(|e| GasScopeError::HistoryStore(e.to_string()))?
            .permissions();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| GasScopeError::HistoryStore(e.to_string()))?;
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(tmp.as_file_mut());
            writer.write_record(&contents.headers)?;
            for existing in &contents.rows {
                writer.write_record(existing)?;
            }
            writer.write_record(&row)?;
            writer
                .flush()
                .map_err(|e| GasScopeError::HistoryStore(e.to_string()))?;
        }
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| GasScopeError::HistoryStore(e.to_string()))?;
        tmp.persist(&target)
            .map_err(|e| GasScopeError::HistoryStore(e.to_string()))?;

        tracing::debug!(
            timestamp = %record.timestamp,
            price_gwei = record.price_gwei,
            rows = contents.rows.len() + 1,
            "History row appended"
        );
        Ok(())
    }

    fn recent_prices(&self, limit: usize) -> Result<Vec<f64>> {
        Ok(self
            .tail(limit)?
            .into_iter()
            .map(|record| record.price_gwei)
            .collect())
    }

    fn tail(&self, rows: usize) -> Result<Vec<PriceRecord>> {
        let mut records = self.valid_records()?;
        let skip = records.len().saturating_sub(rows);
        Ok(records.split_off(skip))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.rows.len())
    }
}

/// In-memory history log, for dry runs and tests.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<PriceRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the log with `prices`, one record per value.
    pub fn with_prices<I>(prices: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let records = prices
            .into_iter()
            .enumerate()
            .map(|(i, price_gwei)| PriceRecord {
                timestamp: format!("seed-{}", i),
                price_gwei,
            })
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<PriceRecord>>> {
        self.records
            .lock()
            .map_err(|_| GasScopeError::HistoryStore("history lock poisoned".into()))
    }
}

impl HistoryLog for MemoryHistory {
    fn append(&self, record: &PriceRecord) -> Result<()> {
        self.lock()?.push(record.clone());
        Ok(())
    }

    fn recent_prices(&self, limit: usize) -> Result<Vec<f64>> {
        Ok(self
            .tail(limit)?
            .into_iter()
            .map(|record| record.price_gwei)
            .collect())
    }

    fn tail(&self, rows: usize) -> Result<Vec<PriceRecord>> {
        let records = self.lock()?;
        let valid: Vec<PriceRecord> = records
            .iter()
            .filter(|r| r.price_gwei.is_finite())
            .cloned()
            .collect();
        let skip = valid.len().saturating_sub(rows);
        Ok(valid[skip..].to_vec())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}
