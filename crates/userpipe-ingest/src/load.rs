//! Load stage: append a flat batch to PostgreSQL
//!
//! One connection, one transaction, one `INSERT` per record, one commit.
//! Run states are traced at debug level:
//! `connecting -> connected -> schema-ensured -> inserting -> committed`, or
//! `failed` from any of them.

use crate::config::DatabaseConfig;
use chrono::{DateTime, NaiveDateTime};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Postgres, Transaction};
use tracing::{debug, error, info, instrument, warn};
use userpipe_common::{FlatUserRecord, PipelineError, Result};

/// Destination table
pub const TABLE_NAME: &str = "random_user_data";

/// Idempotent DDL for the destination table
pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS random_user_data (
    id SERIAL PRIMARY KEY,
    user_id VARCHAR(255),
    gender VARCHAR(50),
    title VARCHAR(50),
    first_name VARCHAR(100),
    last_name VARCHAR(100),
    email VARCHAR(255),
    phone VARCHAR(50),
    cell VARCHAR(50),
    nat VARCHAR(10),
    dob_date TIMESTAMP,
    dob_age INT,
    registered_date TIMESTAMP,
    registered_age INT,
    city VARCHAR(100),
    state VARCHAR(100),
    country VARCHAR(100),
    street_number INT,
    street_name VARCHAR(255),
    postcode VARCHAR(50),
    latitude VARCHAR(50),
    longitude VARCHAR(50),
    timezone_offset VARCHAR(20),
    timezone_description VARCHAR(255),
    username VARCHAR(100),
    password VARCHAR(100),
    salt VARCHAR(50),
    md5 VARCHAR(100),
    sha1 VARCHAR(100),
    sha256 VARCHAR(100),
    id_name VARCHAR(50),
    id_value VARCHAR(50),
    picture_large TEXT,
    picture_medium TEXT,
    picture_thumbnail TEXT,
    etl_timestamp TIMESTAMP
)
"#;

const INSERT_SQL: &str = r#"
INSERT INTO random_user_data (
    user_id, gender, title, first_name, last_name, email, phone, cell, nat,
    dob_date, dob_age, registered_date, registered_age, city, state, country,
    street_number, street_name, postcode, latitude, longitude,
    timezone_offset, timezone_description, username, password,
    salt, md5, sha1, sha256, id_name, id_value,
    picture_large, picture_medium, picture_thumbnail, etl_timestamp
)
VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9,
    $10, $11, $12, $13, $14, $15, $16,
    $17, $18, $19, $20, $21,
    $22, $23, $24, $25,
    $26, $27, $28, $29, $30, $31,
    $32, $33, $34, $35
)
"#;

/// Result of a load that did not raise
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Transaction committed with this many new rows
    Committed { rows: usize },
    /// A database error was logged and absorbed; nothing was committed
    Failed { reason: String },
}

impl LoadOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, LoadOutcome::Committed { .. })
    }

    pub fn rows(&self) -> usize {
        match self {
            LoadOutcome::Committed { rows } => *rows,
            LoadOutcome::Failed { .. } => 0,
        }
    }
}

/// Writes flat batches into the destination table
pub struct Loader {
    config: DatabaseConfig,
}

impl Loader {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.user)
            .password(&self.config.password)
    }

    /// Append `batch` to the table.
    ///
    /// Database failures (connect, DDL, insert, commit) are logged and
    /// reported as [`LoadOutcome::Failed`] instead of an error. A malformed
    /// date string rolls the batch back and is returned as
    /// [`PipelineError::InvalidTimestamp`].
    #[instrument(skip_all, fields(records = batch.len(), host = %self.config.host, database = %self.config.database))]
    pub async fn load(&self, batch: &[FlatUserRecord]) -> Result<LoadOutcome> {
        match self.try_load(batch).await {
            Ok(rows) => {
                info!(rows, table = TABLE_NAME, "Users inserted");
                Ok(LoadOutcome::Committed { rows })
            },
            Err(e) if e.is_database() => {
                debug!(state = "failed");
                error!(error = %e, "Failed to connect to or insert into destination database");
                Ok(LoadOutcome::Failed {
                    reason: e.to_string(),
                })
            },
            Err(e) => {
                debug!(state = "failed");
                Err(e)
            },
        }
    }

    /// Like [`Loader::load`] but every failure is returned as an error
    pub async fn try_load(&self, batch: &[FlatUserRecord]) -> Result<usize> {
        debug!(state = "connecting");
        let mut conn = PgConnection::connect_with(&self.connect_options()).await?;
        debug!(state = "connected");
        info!("Connected to destination database");

        let result = write_batch(&mut conn, batch).await;

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection cleanly");
        }

        result
    }
}

async fn write_batch(conn: &mut PgConnection, batch: &[FlatUserRecord]) -> Result<usize> {
    let mut tx = conn.begin().await?;

    match write_rows(&mut tx, batch).await {
        Ok(()) => {
            tx.commit().await?;
            debug!(state = "committed");
            Ok(batch.len())
        },
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        },
    }
}

async fn write_rows(tx: &mut Transaction<'_, Postgres>, batch: &[FlatUserRecord]) -> Result<()> {
    ensure_table(tx).await?;
    debug!(state = "inserting");

    for record in batch {
        let times = RowTimestamps::parse(record)?;
        insert_row(tx, record, &times).await?;
    }

    Ok(())
}

/// Create the destination table when it does not exist yet
async fn ensure_table(tx: &mut Transaction<'_, Postgres>) -> Result<()> {
    sqlx::query(CREATE_TABLE_SQL).execute(&mut **tx).await?;
    debug!(state = "schema-ensured", table = TABLE_NAME);
    Ok(())
}

async fn insert_row(
    tx: &mut Transaction<'_, Postgres>,
    record: &FlatUserRecord,
    times: &RowTimestamps,
) -> Result<()> {
    sqlx::query(INSERT_SQL)
        .bind(&record.user_id)
        .bind(&record.gender)
        .bind(&record.title)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.cell)
        .bind(&record.nat)
        .bind(times.dob_date)
        .bind(record.dob_age)
        .bind(times.registered_date)
        .bind(record.registered_age)
        .bind(&record.city)
        .bind(&record.state)
        .bind(&record.country)
        .bind(record.street_number)
        .bind(&record.street_name)
        .bind(&record.postcode)
        .bind(&record.latitude)
        .bind(&record.longitude)
        .bind(&record.timezone_offset)
        .bind(&record.timezone_description)
        .bind(&record.username)
        .bind(&record.password)
        .bind(&record.salt)
        .bind(&record.md5)
        .bind(&record.sha1)
        .bind(&record.sha256)
        .bind(&record.id_name)
        .bind(&record.id_value)
        .bind(&record.picture_large)
        .bind(&record.picture_medium)
        .bind(&record.picture_thumbnail)
        .bind(times.etl_timestamp)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

// ============================================================================
// Temporal fields
// ============================================================================

/// The three text fields stored as `TIMESTAMP`, parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowTimestamps {
    pub dob_date: NaiveDateTime,
    pub registered_date: NaiveDateTime,
    pub etl_timestamp: NaiveDateTime,
}

impl RowTimestamps {
    pub fn parse(record: &FlatUserRecord) -> Result<Self> {
        Ok(Self {
            dob_date: parse_timestamp("dob_date", &record.dob_date)?,
            registered_date: parse_timestamp("registered_date", &record.registered_date)?,
            etl_timestamp: parse_timestamp("etl_timestamp", &record.etl_timestamp)?,
        })
    }
}

/// Parse ISO-8601 text into a `TIMESTAMP` value.
///
/// Offset-free text is taken as-is. Text with an offset (`Z`, `+01:00`) is
/// normalised to UTC before the offset is dropped.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.naive_utc()))
        .map_err(|source| PipelineError::InvalidTimestamp {
            field,
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_milli_opt(h, min, s, ms)
            .unwrap()
    }

    #[test]
    fn test_parse_upstream_dates() {
        assert_eq!(
            parse_timestamp("dob_date", "1993-07-20T09:44:18.674Z").unwrap(),
            at(1993, 7, 20, 9, 44, 18, 674)
        );
        assert_eq!(
            parse_timestamp("registered_date", "2012-03-01T10:22:41.350+02:00").unwrap(),
            at(2012, 3, 1, 8, 22, 41, 350)
        );
        assert_eq!(
            parse_timestamp("dob_date", "1993-07-20T23:30:00-03:00").unwrap(),
            at(1993, 7, 21, 2, 30, 0, 0)
        );
    }

    #[test]
    fn test_parse_etl_timestamp() {
        assert_eq!(
            parse_timestamp("etl_timestamp", "2026-10-19T06:30:00.125000").unwrap(),
            at(2026, 10, 19, 6, 30, 0, 125)
        );
        assert_eq!(
            parse_timestamp("etl_timestamp", "2026-10-19T06:30:00").unwrap(),
            at(2026, 10, 19, 6, 30, 0, 0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("dob_date", "20/07/1993").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTimestamp { field: "dob_date", ref value, .. } if value == "20/07/1993"
        ));
    }

    #[test]
    fn test_insert_has_one_placeholder_per_column() {
        let columns = INSERT_SQL
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(cols, _)| cols.split(',').count())
            .unwrap();
        let placeholders = INSERT_SQL.matches('$').count();

        assert_eq!(columns, FlatUserRecord::MAPPED_FIELDS + 1);
        assert_eq!(placeholders, columns);
    }

    #[test]
    fn test_ddl_declares_every_inserted_column() {
        let (_, after_into) = INSERT_SQL.split_once('(').unwrap();
        let (cols, _) = after_into.split_once(')').unwrap();

        for column in cols.split(',').map(str::trim) {
            assert!(
                CREATE_TABLE_SQL.contains(&format!("\n    {column} ")),
                "column {column} missing from DDL"
            );
        }
        assert!(CREATE_TABLE_SQL.contains("IF NOT EXISTS"));
    }

    #[test]
    fn test_outcome_rows() {
        assert_eq!(LoadOutcome::Committed { rows: 3 }.rows(), 3);
        let failed = LoadOutcome::Failed {
            reason: "connection refused".to_string(),
        };
        assert_eq!(failed.rows(), 0);
        assert!(!failed.is_committed());
    }
}
