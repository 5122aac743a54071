use super::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_KEY: &[u8] = b"WebAppData";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(super) enum AuthError {
    #[error("authorization header is required")]
    MissingHeader,
    #[error("hash parameter is missing")]
    MissingHash,
    #[error("invalid hash")]
    InvalidHash,
    #[error("user parameter is missing")]
    MissingUser,
    #[error("failed to parse user data: {0}")]
    InvalidUser(String),
}

/// The `user` field of a mini-app launch payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct WebAppUser {
    pub(super) id: i64,
    #[serde(default)]
    pub(super) first_name: String,
    #[serde(default)]
    pub(super) last_name: Option<String>,
    #[serde(default)]
    pub(super) username: Option<String>,
}

/// Checks a WebApp `initData` query string against the bot token and returns
/// the user it was issued for.
pub(super) fn validate_init_data(init_data: &str, bot_token: &str) -> Result<WebAppUser, AuthError> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(init_data.as_bytes()) {
        fields.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }

    let received = fields.remove("hash").ok_or(AuthError::MissingHash)?;
    let received = hex::decode(received).map_err(|_| AuthError::InvalidHash)?;

    init_data_mac(&fields, bot_token)
        .verify_slice(&received)
        .map_err(|_| AuthError::InvalidHash)?;

    let user = fields.get("user").ok_or(AuthError::MissingUser)?;
    serde_json::from_str(user).map_err(|err| AuthError::InvalidUser(err.to_string()))
}

/// Hex signature Telegram would attach to these fields.
#[cfg(test)]
pub(super) fn sign_init_data(fields: &BTreeMap<String, String>, bot_token: &str) -> String {
    hex::encode(init_data_mac(fields, bot_token).finalize().into_bytes())
}

fn init_data_mac(fields: &BTreeMap<String, String>, bot_token: &str) -> HmacSha256 {
    let check_string = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n");

    let secret = hmac_sha256(WEB_APP_KEY, bot_token.as_bytes());
    let mut mac = new_mac(&secret);
    mac.update(check_string.as_bytes());
    mac
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length")
}

/// Pulls `initData` out of an `Authorization` header value, with or without
/// a `Bearer ` prefix.
pub(super) fn init_data_from_header(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingHeader)?;
    Ok(header.strip_prefix("Bearer ").unwrap_or(header))
}
