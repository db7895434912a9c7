//! User record types flowing between pipeline stages

use serde::{Deserialize, Serialize};

/// One user object exactly as the upstream API returned it.
///
/// The fetch stage does not interpret it; the transform stage is the only
/// place that knows its shape.
pub type RawUserRecord = serde_json::Value;

/// Flat projection (34 mapped fields plus `etl_timestamp`) of one [`RawUserRecord`].
///
/// `dob_date`, `registered_date` and `etl_timestamp` are kept as text and are
/// only parsed into timestamps by the loader, right before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatUserRecord {
    pub user_id: String,
    pub gender: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub cell: String,
    pub nat: String,

    /// RFC 3339 text, e.g. `1993-07-20T09:44:18.674Z`
    pub dob_date: String,
    pub dob_age: i32,
    /// RFC 3339 text, e.g. `2012-03-01T10:22:41.350Z`
    pub registered_date: String,
    pub registered_age: i32,

    pub street_number: i32,
    pub street_name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    /// Always text; upstream sends either a number or a string
    pub postcode: String,
    pub latitude: String,
    pub longitude: String,
    pub timezone_offset: String,
    pub timezone_description: String,

    pub username: String,
    pub password: String,
    pub salt: String,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,

    pub id_name: String,
    /// `None` when upstream sends `"value": null` (the key itself is required)
    pub id_value: Option<String>,

    pub picture_large: String,
    pub picture_medium: String,
    pub picture_thumbnail: String,

    /// Local wall-clock time of the transform, `YYYY-MM-DDTHH:MM:SS.ffffff`
    pub etl_timestamp: String,
}

impl FlatUserRecord {
    /// Fields projected from the upstream object; `etl_timestamp` is computed on top.
    pub const MAPPED_FIELDS: usize = 34;
}
