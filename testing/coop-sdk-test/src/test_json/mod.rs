//! Test data for the cooperative client crates.
//!
//! Exporting each static allows all the test data to have a single source of
//! truth.

use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};

pub mod api_responses;

pub use api_responses::{
    LOANS, LOGIN, LOGIN_ADMIN, LOGIN_RESPONSE_ERR, LOGOUT, REFRESH_TOKEN, REFRESH_TOKEN_MALFORMED,
    SESSION_EXPIRED, VALIDATE, VALIDATE_WITH_USER,
};

/// The access token every pre-populated test session starts with.
pub const ACCESS_TOKEN: &str = "1234";

/// The access token returned by [`REFRESH_TOKEN`].
pub const REFRESHED_ACCESS_TOKEN: &str = "5678";

/// The access token returned by [`LOGIN`] and [`LOGIN_ADMIN`].
pub const LOGIN_ACCESS_TOKEN: &str = "abc123";

/// An empty response.
pub static EMPTY: Lazy<JsonValue> = Lazy::new(|| json!({}));

/// A regular cooperative member.
pub static MEMBER: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "id": "64f1c2a9e8b1",
        "fullName": "Adaeze Okafor",
        "email": "adaeze@example.org",
        "role": "member",
        "active": true,
        "membershipNumber": "COOP-0042",
    })
});

/// A back-office administrator.
pub static ADMIN: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "id": "64f1c2a9e8b2",
        "fullName": "Tunde Bakare",
        "email": "tunde@example.org",
        "role": "admin",
        "active": true,
    })
});
