// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::Deserialize;
use thiserror::Error;

/// Default endpoint of the dstack quoting daemon (simulator port).
pub const DEFAULT_TAPPD_ENDPOINT: &str = "http://127.0.0.1:8090";

#[derive(Error, Debug)]
pub enum TappdError {
    #[error("http error")]
    Http(#[from] Box<ureq::Error>),
    #[error("failed to read HTTP response")]
    Io(#[from] std::io::Error),
    #[error("hex decode error")]
    Hex(#[from] hex::FromHexError),
}

/// Interface to the hardware quoting primitive.
///
/// Both operations are served by the TEE's quoting daemon and are treated as
/// a trusted black box: key derivation is deterministic for a given purpose
/// string, and a quote binds the submitted data to a hardware-signed report.
pub trait QuotingService: Send + Sync {
    /// Derive symmetric key material scoped by a purpose string.
    fn derive_key(&self, purpose: &str) -> Result<Vec<u8>, TappdError>;

    /// Obtain a hardware-signed attestation report over `data`.
    fn quote(&self, data: &[u8]) -> Result<Vec<u8>, TappdError>;
}

/// HTTP client for the dstack quoting daemon.
pub struct TappdClient {
    base_url: String,
}

impl TappdClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_TAPPD_ENDPOINT)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for TappdClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct DeriveKeyResponse {
    key: String,
}

#[derive(Clone, Debug, Deserialize)]
struct TdxQuoteResponse {
    quote: String,
}

fn strip_hex_prefix(hex_str: &str) -> &str {
    hex_str.strip_prefix("0x").unwrap_or(hex_str)
}

impl QuotingService for TappdClient {
    fn derive_key(&self, purpose: &str) -> Result<Vec<u8>, TappdError> {
        let url = format!("{}/prpc/Tappd.DeriveKey?json", self.base_url);
        let response: DeriveKeyResponse = ureq::post(&url)
            .send_json(ureq::json!({
                "path": purpose,
            }))
            .map_err(Box::new)?
            .into_json()?;
        let key = hex::decode(strip_hex_prefix(&response.key))?;
        Ok(key)
    }

    fn quote(&self, data: &[u8]) -> Result<Vec<u8>, TappdError> {
        let url = format!("{}/prpc/Tappd.TdxQuote?json", self.base_url);
        let response: TdxQuoteResponse = ureq::post(&url)
            .send_json(ureq::json!({
                "report_data": hex::encode(data),
                "hash_algorithm": "sha256",
            }))
            .map_err(Box::new)?
            .into_json()?;
        let quote = hex::decode(strip_hex_prefix(&response.quote))?;
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prefix_is_optional() {
        assert_eq!(strip_hex_prefix("0xdeadbeef"), "deadbeef");
        assert_eq!(strip_hex_prefix("deadbeef"), "deadbeef");
    }
}
