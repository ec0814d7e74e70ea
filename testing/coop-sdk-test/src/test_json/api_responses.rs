//! Responses of the authentication and domain endpoints.

use once_cell::sync::Lazy;
use serde_json::{json, Value as JsonValue};

use super::{ADMIN, MEMBER};

/// Successful call to `POST /login` by a member.
pub static LOGIN: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "accessToken": "abc123",
        "user": MEMBER.clone(),
        "message": "Login successful",
    })
});

/// Successful call to `POST /login` by an administrator.
pub static LOGIN_ADMIN: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "accessToken": "abc123",
        "user": ADMIN.clone(),
        "message": "Login successful",
    })
});

/// Failed call to `POST /login`.
pub static LOGIN_RESPONSE_ERR: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "message": "Invalid email or password",
    })
});

/// Successful call to `POST /logout`.
pub static LOGOUT: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "message": "Logged out",
    })
});

/// Successful call to `GET /refresh-token`.
pub static REFRESH_TOKEN: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "accessToken": "5678",
    })
});

/// A `GET /refresh-token` response without a token.
pub static REFRESH_TOKEN_MALFORMED: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "message": "ok",
    })
});

/// Successful call to `GET /validate` without an identity.
pub static VALIDATE: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "valid": true,
    })
});

/// Successful call to `GET /validate` with a newer identity.
pub static VALIDATE_WITH_USER: Lazy<JsonValue> = Lazy::new(|| {
    let mut user = MEMBER.clone();
    user["fullName"] = json!("Adaeze Okafor-Eze");
    json!({
        "valid": true,
        "user": user,
    })
});

/// A 401 body for an expired access token.
pub static SESSION_EXPIRED: Lazy<JsonValue> = Lazy::new(|| {
    json!({
        "message": "Token expired",
    })
});

/// `GET /api/loan` listing for the signed-in member.
pub static LOANS: Lazy<JsonValue> = Lazy::new(|| {
    json!([
        {
            "id": "loan-1",
            "amount": 250000,
            "status": "pending",
        },
        {
            "id": "loan-2",
            "amount": 100000,
            "status": "approved",
        },
    ])
});
