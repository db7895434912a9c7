//! Transform stage: raw API users to flat table rows
//!
//! Each raw record is deserialized into a typed view of the upstream shape and
//! then projected field by field. Any absent key fails the whole batch; there
//! is no per-record isolation and no defaulting.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info};
use userpipe_common::{FlatUserRecord, PipelineError, RawUserRecord, Result};

/// Rendering of `etl_timestamp` (ISO-8601, local time, no offset)
pub const ETL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// ============================================================================
// Upstream shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawUser {
    gender: String,
    name: Name,
    location: Location,
    email: String,
    login: Login,
    dob: Dated,
    registered: Dated,
    phone: String,
    cell: String,
    id: Identity,
    picture: Picture,
    nat: String,
}

#[derive(Debug, Deserialize)]
struct Name {
    title: String,
    first: String,
    last: String,
}

#[derive(Debug, Deserialize)]
struct Location {
    street: Street,
    city: String,
    state: String,
    country: String,
    #[serde(deserialize_with = "scalar_text")]
    postcode: String,
    coordinates: Coordinates,
    timezone: Timezone,
}

#[derive(Debug, Deserialize)]
struct Street {
    number: i32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    latitude: String,
    longitude: String,
}

#[derive(Debug, Deserialize)]
struct Timezone {
    offset: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct Login {
    uuid: String,
    username: String,
    password: String,
    salt: String,
    md5: String,
    sha1: String,
    sha256: String,
}

#[derive(Debug, Deserialize)]
struct Dated {
    date: String,
    age: i32,
}

#[derive(Debug, Deserialize)]
struct Identity {
    name: String,
    // Present-but-null is allowed; a missing key is still an error because
    // `deserialize_with` disables serde's implicit `None` for Option fields.
    #[serde(deserialize_with = "nullable_scalar_text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Picture {
    large: String,
    medium: String,
    thumbnail: String,
}

/// Accept a JSON string or number and keep it as text.
fn scalar_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

fn nullable_scalar_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string, number or null, found {other}"
        ))),
    }
}

impl RawUser {
    fn flatten(self, etl_timestamp: String) -> FlatUserRecord {
        FlatUserRecord {
            user_id: self.login.uuid,
            gender: self.gender,
            title: self.name.title,
            first_name: self.name.first,
            last_name: self.name.last,
            email: self.email,
            phone: self.phone,
            cell: self.cell,
            nat: self.nat,
            dob_date: self.dob.date,
            dob_age: self.dob.age,
            registered_date: self.registered.date,
            registered_age: self.registered.age,
            street_number: self.location.street.number,
            street_name: self.location.street.name,
            city: self.location.city,
            state: self.location.state,
            country: self.location.country,
            postcode: self.location.postcode,
            latitude: self.location.coordinates.latitude,
            longitude: self.location.coordinates.longitude,
            timezone_offset: self.location.timezone.offset,
            timezone_description: self.location.timezone.description,
            username: self.login.username,
            password: self.login.password,
            salt: self.login.salt,
            md5: self.login.md5,
            sha1: self.login.sha1,
            sha256: self.login.sha256,
            id_name: self.id.name,
            id_value: self.id.value,
            picture_large: self.picture.large,
            picture_medium: self.picture.medium,
            picture_thumbnail: self.picture.thumbnail,
            etl_timestamp,
        }
    }
}

// ============================================================================
// Stage entry points
// ============================================================================

/// Flatten a batch, stamping every record with the current local time
pub fn transform_batch(raw: Vec<RawUserRecord>) -> Result<Vec<FlatUserRecord>> {
    transform_batch_at(raw, Local::now().naive_local())
}

/// Flatten a batch with an explicit `etl_timestamp`.
///
/// Output has the same length and order as the input. The first malformed
/// record aborts the batch with [`PipelineError::MalformedRecord`].
pub fn transform_batch_at(
    raw: Vec<RawUserRecord>,
    now: NaiveDateTime,
) -> Result<Vec<FlatUserRecord>> {
    let stamp = now.format(ETL_TIMESTAMP_FORMAT).to_string();
    debug!(records = raw.len(), etl_timestamp = %stamp, "Transforming raw batch");

    let flat = raw
        .iter()
        .enumerate()
        .map(|(index, record)| {
            transform_record(record, &stamp)
                .map_err(|source| PipelineError::MalformedRecord { index, source })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(records = flat.len(), "Transformed batch");
    Ok(flat)
}

/// Flatten a single raw record
pub fn transform_record(
    raw: &RawUserRecord,
    etl_timestamp: &str,
) -> std::result::Result<FlatUserRecord, serde_json::Error> {
    let user = RawUser::deserialize(raw)?;
    Ok(user.flatten(etl_timestamp.to_string()))
}
