//! Load stage against a real PostgreSQL
//!
//! Tests marked `requires Docker` start a container through testcontainers:
//!
//! ```bash
//! cargo test -p userpipe-ingest --test load_tests -- --include-ignored
//! ```

mod common;

use chrono::{NaiveDate, NaiveDateTime};
use common::{init_tracing, raw_user, TestPostgres};
use userpipe_common::{FlatUserRecord, PipelineError};
use userpipe_ingest::config::DatabaseConfig;
use userpipe_ingest::load::{LoadOutcome, Loader, RowTimestamps};
use userpipe_ingest::transform::transform_batch_at;

/// One stored row, minus the serial `id`
#[derive(Debug, PartialEq, sqlx::FromRow)]
struct StoredUser {
    user_id: String,
    gender: String,
    title: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    cell: String,
    nat: String,
    dob_date: NaiveDateTime,
    dob_age: i32,
    registered_date: NaiveDateTime,
    registered_age: i32,
    city: String,
    state: String,
    country: String,
    street_number: i32,
    street_name: String,
    postcode: String,
    latitude: String,
    longitude: String,
    timezone_offset: String,
    timezone_description: String,
    username: String,
    password: String,
    salt: String,
    md5: String,
    sha1: String,
    sha256: String,
    id_name: String,
    id_value: Option<String>,
    picture_large: String,
    picture_medium: String,
    picture_thumbnail: String,
    etl_timestamp: NaiveDateTime,
}

impl StoredUser {
    fn expected(record: &FlatUserRecord) -> Self {
        let times = RowTimestamps::parse(record).unwrap();
        let record = record.clone();

        Self {
            user_id: record.user_id,
            gender: record.gender,
            title: record.title,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            phone: record.phone,
            cell: record.cell,
            nat: record.nat,
            dob_date: times.dob_date,
            dob_age: record.dob_age,
            registered_date: times.registered_date,
            registered_age: record.registered_age,
            city: record.city,
            state: record.state,
            country: record.country,
            street_number: record.street_number,
            street_name: record.street_name,
            postcode: record.postcode,
            latitude: record.latitude,
            longitude: record.longitude,
            timezone_offset: record.timezone_offset,
            timezone_description: record.timezone_description,
            username: record.username,
            password: record.password,
            salt: record.salt,
            md5: record.md5,
            sha1: record.sha1,
            sha256: record.sha256,
            id_name: record.id_name,
            id_value: record.id_value,
            picture_large: record.picture_large,
            picture_medium: record.picture_medium,
            picture_thumbnail: record.picture_thumbnail,
            etl_timestamp: times.etl_timestamp,
        }
    }
}

fn flat_batch(seeds: std::ops::Range<u32>) -> Vec<FlatUserRecord> {
    let now = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_micro_opt(0, 5, 0, 250_000)
        .unwrap();
    transform_batch_at(seeds.map(raw_user).collect(), now).unwrap()
}

#[tokio::test]
async fn test_connection_failure_is_absorbed() {
    init_tracing();
    let loader = Loader::new(DatabaseConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        database: "airflow".to_string(),
        user: "airflow".to_string(),
        password: "airflow".to_string(),
    });

    let outcome = loader
        .load(&flat_batch(0..2))
        .await
        .expect("connection failures must not propagate");

    assert!(matches!(outcome, LoadOutcome::Failed { .. }));
    assert_eq!(outcome.rows(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_load_into_fresh_database() {
    init_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    assert_eq!(pg.row_count().await.unwrap(), 0);

    let batch = flat_batch(0..3);
    let outcome = Loader::new(pg.config()).load(&batch).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Committed { rows: 3 });
    assert_eq!(pg.row_count().await.unwrap(), 3);

    let stored: Vec<StoredUser> = sqlx::query_as("SELECT * FROM random_user_data ORDER BY id")
        .fetch_all(pg.pool())
        .await
        .unwrap();
    let expected: Vec<StoredUser> = batch.iter().map(StoredUser::expected).collect();

    assert_eq!(stored, expected);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_offset_dates_are_stored_as_utc() {
    init_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");

    Loader::new(pg.config()).load(&flat_batch(0..1)).await.unwrap();

    let (dob, registered): (NaiveDateTime, NaiveDateTime) =
        sqlx::query_as("SELECT dob_date, registered_date FROM random_user_data")
            .fetch_one(pg.pool())
            .await
            .unwrap();

    assert_eq!(
        dob,
        NaiveDate::from_ymd_opt(1990, 1, 15).unwrap().and_hms_opt(8, 30, 0).unwrap()
    );
    // 12:00:00.500+02:00
    assert_eq!(
        registered,
        NaiveDate::from_ymd_opt(2015, 6, 1)
            .unwrap()
            .and_hms_milli_opt(10, 0, 0, 500)
            .unwrap()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_second_load_appends() {
    init_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let loader = Loader::new(pg.config());

    loader.load(&flat_batch(0..2)).await.unwrap();
    loader.load(&flat_batch(0..2)).await.unwrap();

    // Same users twice: no dedup, no upsert
    assert_eq!(pg.row_count().await.unwrap(), 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_malformed_date_rolls_back_whole_batch() {
    init_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");

    let mut batch = flat_batch(0..3);
    batch[2].dob_date = "15/01/1990".to_string();

    let err = Loader::new(pg.config()).load(&batch).await.unwrap_err();

    assert!(matches!(err, PipelineError::InvalidTimestamp { field: "dob_date", .. }));
    assert_eq!(pg.row_count().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_oversized_value_is_absorbed_and_nothing_committed() {
    init_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");

    let mut batch = flat_batch(0..2);
    batch[1].nat = "X".repeat(11);

    let outcome = Loader::new(pg.config()).load(&batch).await.unwrap();

    assert!(matches!(outcome, LoadOutcome::Failed { .. }));
    assert_eq!(pg.row_count().await.unwrap(), 0);
}
