//! Request signing for the broker's publish API.
//!
//! Every publish request carries `auth_key`, `auth_timestamp`, `auth_version`, `body_md5` and an
//! `auth_signature` computed as `hex(HMAC-SHA256(secret, "POST\n{path}\n{sorted query}"))`.

use crate::{BrokerError, BrokerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const AUTH_VERSION: &str = "1.0";

/// Lower-case hex MD5 of the request body.
pub fn body_md5(body: &str) -> String {
    format!("{:x}", md5::compute(body.as_bytes()))
}

/// Lower-case hex HMAC-SHA256 of `message` under `secret`.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> BrokerResult<String> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| BrokerError::InvalidKey)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Builds the signed query parameters for a `POST` to `path` with `body`.
///
/// Parameters are returned in the sorted order they were signed in.
pub fn signed_query(
    key: &str,
    secret: &str,
    path: &str,
    body: &str,
    timestamp: i64,
) -> BrokerResult<Vec<(&'static str, String)>> {
    let mut params = vec![
        ("auth_key", key.to_string()),
        ("auth_timestamp", timestamp.to_string()),
        ("auth_version", AUTH_VERSION.to_string()),
        ("body_md5", body_md5(body)),
    ];
    params.sort_by(|a, b| a.0.cmp(b.0));

    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let signature = hmac_sha256_hex(secret, &format!("POST\n{path}\n{query}"))?;

    params.push(("auth_signature", signature));
    Ok(params)
}
