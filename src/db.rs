// src/db.rs
use crate::error::{PortfolioError, Result};
use crate::models::{Lot, NewLot, NewPriceBar, PriceBar};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{error, info};
use rusqlite::{params, Connection, OpenFlags};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stocks (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol  TEXT NOT NULL,
    date    TEXT NOT NULL,
    open    REAL NOT NULL,
    high    REAL NOT NULL,
    low     REAL NOT NULL,
    close   REAL NOT NULL,
    volume  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS portfolio (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol         TEXT NOT NULL,
    shares         INTEGER NOT NULL,
    purchase_price REAL NOT NULL,
    purchase_date  TEXT NOT NULL
);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Owner of the price history and purchase lot tables.
pub struct Store {
    connection: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Store {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::init(conn, path)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        if let Err(e) = conn.execute_batch(SCHEMA) {
            error!("Failed to create schema: {}", e);
            return Err(e.into());
        }
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn health_check(&self) -> Result<()> {
        let conn = self.connection.lock().await;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Closes the underlying connection, reporting any error SQLite raises.
    pub async fn close(self) -> Result<()> {
        let conn = match Arc::try_unwrap(self.connection) {
            Ok(mutex) => mutex.into_inner(),
            Err(_) => {
                return Err(PortfolioError::InvalidData(
                    "database connection is still shared".to_string(),
                ))
            }
        };
        conn.close().map_err(|(_, e)| e)?;
        info!("Closed database at: {:?}", self.path);
        Ok(())
    }

    async fn with_connection<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.connection.lock().await;
        f(&mut *conn)
    }

    /// Reads every record first and inserts them in one transaction, so a
    /// bad row leaves the table untouched. Returns the number of rows added.
    pub async fn import_prices<R: Read>(&self, source: R) -> Result<usize> {
        let bars = read_bars(source)?;

        let inserted = self
            .with_connection(|conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO stocks (symbol, date, open, high, low, close, volume)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )?;
                    for bar in &bars {
                        stmt.execute(params![
                            bar.symbol,
                            bar.date.format(DATE_FORMAT).to_string(),
                            bar.open,
                            bar.high,
                            bar.low,
                            bar.close,
                            bar.volume
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(bars.len())
            })
            .await?;

        info!("Imported {} price rows", inserted);
        Ok(inserted)
    }

    pub async fn import_prices_from_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            error!("Error importing CSV from {:?}: {}", path, e);
            e
        })?;
        let count = self.import_prices(file).await?;
        info!("Successfully imported data from {:?}", path);
        Ok(count)
    }

    /// Writes the whole price table in storage order. Returns rows written.
    pub async fn export_prices<W: Write>(&self, destination: W) -> Result<usize> {
        let bars = self.all_bars().await?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(destination);
        for bar in &bars {
            writer.serialize(bar)?;
        }
        if bars.is_empty() {
            writer.write_record(["ID", "Symbol", "Date", "Open", "High", "Low", "Close", "Volume"])?;
        }
        writer.flush()?;
        Ok(bars.len())
    }

    pub async fn export_prices_to_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let count = self.export_prices(file).await?;
        info!("Exported {} rows to {:?}", count, path);
        Ok(count)
    }

    pub async fn all_bars(&self) -> Result<Vec<PriceBar>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, date, open, high, low, close, volume
                 FROM stocks ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, f64>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, symbol, date, open, high, low, close, volume)| {
                    Ok(PriceBar {
                        id,
                        symbol,
                        date: parse_date(&date)?,
                        open,
                        high,
                        low,
                        close,
                        volume,
                    })
                })
                .collect()
        })
        .await
    }

    pub async fn bar_count(&self) -> Result<i64> {
        self.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM stocks", [], |row| row.get(0))?)
        })
        .await
    }

    /// Closing prices for a symbol, oldest first.
    pub async fn price_history(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let symbol = symbol.to_uppercase();
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date, close FROM stocks
                 WHERE symbol = ?1
                 ORDER BY date",
            )?;
            let rows = stmt
                .query_map([&symbol], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(date, close)| Ok((parse_date(&date)?, close)))
                .collect()
        })
        .await
    }

    pub async fn add_lot(&self, lot: NewLot) -> Result<Lot> {
        let symbol = lot.symbol.to_uppercase();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO portfolio (symbol, shares, purchase_price, purchase_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![symbol, lot.shares, lot.purchase_price, lot.purchase_date],
            )?;
            let id = conn.last_insert_rowid();
            info!("Added {} shares of {} to portfolio", lot.shares, symbol);
            Ok(Lot {
                id,
                symbol,
                shares: lot.shares,
                purchase_price: lot.purchase_price,
                purchase_date: lot.purchase_date,
            })
        })
        .await
    }

    /// All lots in insertion order.
    pub async fn list_lots(&self) -> Result<Vec<Lot>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, shares, purchase_price, purchase_date
                 FROM portfolio ORDER BY id",
            )?;
            let lots = stmt
                .query_map([], |row| {
                    Ok(Lot {
                        id: row.get(0)?,
                        symbol: row.get(1)?,
                        shares: row.get(2)?,
                        purchase_price: row.get(3)?,
                        purchase_date: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(lots)
        })
        .await
    }

    pub async fn lot_count(&self) -> Result<i64> {
        self.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM portfolio", [], |row| row.get(0))?)
        })
        .await
    }
}

fn read_bars<R: Read>(source: R) -> Result<Vec<NewPriceBar>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(source);

    let mut bars = Vec::new();
    for (index, record) in reader.deserialize::<NewPriceBar>().enumerate() {
        match record {
            Ok(bar) => bars.push(bar),
            Err(e) => {
                error!("Error importing CSV at record {}: {}", index + 1, e);
                return Err(e.into());
            }
        }
    }
    Ok(bars)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| PortfolioError::InvalidData(format!("bad stored date {:?}: {}", value, e)))
}
