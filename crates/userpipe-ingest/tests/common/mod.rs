//! Shared helpers for userpipe integration tests
//!
//! - [`raw_user`]: a complete upstream user object in the randomuser.me shape
//! - [`TestPostgres`]: a throwaway PostgreSQL container plus a verification pool
//! - [`init_tracing`]: test-writer subscriber, safe to call from every test

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use userpipe_ingest::config::DatabaseConfig;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,userpipe_ingest=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A complete raw user. Every field holds a value unique to the field and to
/// `seed`, so a swapped column shows up after loading.
pub fn raw_user(seed: u32) -> Value {
    json!({
        "gender": if seed % 2 == 0 { "female" } else { "male" },
        "name": {"title": format!("Title{seed}"), "first": format!("First{seed}"), "last": format!("Last{seed}")},
        "location": {
            "street": {"number": 100 + seed, "name": format!("Street {seed}")},
            "city": format!("City{seed}"),
            "state": format!("State{seed}"),
            "country": format!("Country{seed}"),
            "postcode": if seed % 2 == 0 { json!(1000 + seed) } else { json!(format!("{seed}-PT")) },
            "coordinates": {"latitude": format!("38.{seed:04}"), "longitude": format!("-9.{seed:04}")},
            "timezone": {"offset": format!("+{seed}:00"), "description": format!("Zone {seed}")}
        },
        "email": format!("user{seed}@example.com"),
        "login": {
            "uuid": format!("00000000-0000-4000-8000-{seed:012}"),
            "username": format!("user{seed}"),
            "password": format!("password{seed}"),
            "salt": format!("salt{seed}"),
            "md5": format!("md5-{seed:028}"),
            "sha1": format!("sha1-{seed:035}"),
            "sha256": format!("sha256-{seed:057}")
        },
        "dob": {"date": "1990-01-15T08:30:00.000Z", "age": 30 + seed},
        "registered": {"date": "2015-06-01T12:00:00.500+02:00", "age": 10 + seed},
        "phone": format!("555-01{seed:02}"),
        "cell": format!("555-02{seed:02}"),
        "id": {"name": format!("IDN{seed}"), "value": format!("ID{seed}")},
        "picture": {
            "large": format!("https://randomuser.me/api/portraits/men/{seed}.jpg"),
            "medium": format!("https://randomuser.me/api/portraits/med/men/{seed}.jpg"),
            "thumbnail": format!("https://randomuser.me/api/portraits/thumb/men/{seed}.jpg")
        },
        "nat": format!("N{seed}")
    })
}

/// API response body wrapping `users`
pub fn api_page(users: Vec<Value>) -> Value {
    let count = users.len();
    json!({
        "results": users,
        "info": {"seed": "userpipe", "results": count, "page": 1, "version": "1.4"}
    })
}

/// PostgreSQL container for loader tests
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    config: DatabaseConfig,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = DatabaseConfig {
            host: host.to_string(),
            port,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
        };

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&format!("postgresql://postgres:postgres@{host}:{port}/postgres"))
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
            config,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> DatabaseConfig {
        self.config.clone()
    }

    /// Rows in the destination table, or 0 when it does not exist yet
    pub async fn row_count(&self) -> Result<i64> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass('random_user_data') IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Ok(0);
        }

        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM random_user_data")
            .fetch_one(&self.pool)
            .await?)
    }
}
