// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Default base URL of the Wise API.
pub const DEFAULT_WISE_API_URL: &str = "https://api.transferwise.com";

/// Status assigned to provider records that could not be parsed. Records
/// carrying it never match a claim.
pub const ERROR_STATUS: &str = "ERROR";

#[derive(Error, Debug)]
pub enum WiseError {
    #[error("http error")]
    Http(#[from] Box<ureq::Error>),
    #[error("failed to read HTTP response")]
    Io(#[from] std::io::Error),
    #[error("no profile associated with this credential")]
    NoProfile,
}

/// A normalized Wise transaction as consumed by the matcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTransaction {
    pub payment_id: String,
    pub amount: String,
    pub currency: String,
    pub date: String,
    pub status: String,
    pub r#type: String,
    pub recipient_id: String,
}

impl ProviderTransaction {
    /// Sentinel record standing in for a raw transaction that did not fit
    /// the expected shape. One malformed record must not abort matching
    /// against the rest of the batch.
    fn placeholder() -> Self {
        Self {
            payment_id: String::new(),
            amount: String::new(),
            currency: String::new(),
            date: String::new(),
            status: ERROR_STATUS.to_string(),
            r#type: String::new(),
            recipient_id: String::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.status == ERROR_STATUS
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    id: String,
    amount: String,
    currency: String,
    date: String,
    status: String,
    r#type: String,
    #[serde(default)]
    recipient_id: String,
}

impl From<RawActivity> for ProviderTransaction {
    fn from(raw: RawActivity) -> Self {
        Self {
            payment_id: raw.id,
            amount: raw.amount,
            currency: raw.currency,
            date: raw.date,
            status: raw.status,
            r#type: raw.r#type,
            recipient_id: raw.recipient_id,
        }
    }
}

/// Map a raw provider record into a transaction, downgrading parse failures
/// to a placeholder instead of propagating them.
fn normalize(raw: serde_json::Value) -> ProviderTransaction {
    match serde_json::from_value::<RawActivity>(raw) {
        Ok(activity) => activity.into(),
        Err(err) => {
            warn!("skipping malformed provider transaction: {err}");
            ProviderTransaction::placeholder()
        }
    }
}

/// Source of candidate transactions for payment verification.
pub trait TransactionSource: Send + Sync {
    fn transactions(&self, credential: &str) -> Result<Vec<ProviderTransaction>, WiseError>;
}

/// HTTP client for the Wise API.
pub struct WiseClient {
    base_url: String,
}

#[derive(Clone, Debug, Deserialize)]
struct Profile {
    id: u64,
}

#[derive(Clone, Debug, Deserialize)]
struct ActivityList {
    #[serde(default)]
    activities: Vec<serde_json::Value>,
}

impl WiseClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_WISE_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Resolve the profile id the transaction query is scoped to.
    fn profile_id(&self, credential: &str) -> Result<u64, WiseError> {
        let url = format!("{}/v1/profiles", self.base_url);
        let profiles: Vec<Profile> = ureq::get(&url)
            .set("Authorization", &format!("Bearer {credential}"))
            .call()
            .map_err(Box::new)?
            .into_json()?;
        let profile = profiles.first().ok_or(WiseError::NoProfile)?;
        Ok(profile.id)
    }
}

impl Default for WiseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionSource for WiseClient {
    fn transactions(&self, credential: &str) -> Result<Vec<ProviderTransaction>, WiseError> {
        let profile_id = self.profile_id(credential)?;
        let url = format!("{}/v1/profiles/{profile_id}/activities", self.base_url);
        let list: ActivityList = ureq::get(&url)
            .set("Authorization", &format!("Bearer {credential}"))
            .call()
            .map_err(Box::new)?
            .into_json()?;
        let transactions = list.activities.into_iter().map(normalize).collect();
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_well_formed_activity() {
        let tx = normalize(json!({
            "id": "tx-1",
            "amount": "100.00",
            "currency": "USD",
            "date": "2024-01-02T00:00:00Z",
            "status": "COMPLETED",
            "type": "received",
            "recipientId": "acct-9",
        }));
        assert_eq!(tx.payment_id, "tx-1");
        assert_eq!(tx.recipient_id, "acct-9");
        assert!(!tx.is_placeholder());
    }

    #[test]
    fn missing_recipient_defaults_to_empty() {
        let tx = normalize(json!({
            "id": "tx-1",
            "amount": "100.00",
            "currency": "USD",
            "date": "2024-01-02T00:00:00Z",
            "status": "COMPLETED",
            "type": "received",
        }));
        assert_eq!(tx.recipient_id, "");
        assert!(!tx.is_placeholder());
    }

    #[test]
    fn malformed_activity_becomes_placeholder() {
        let tx = normalize(json!({ "id": 42, "amount": ["not", "a", "string"] }));
        assert!(tx.is_placeholder());
        assert_eq!(tx.status, ERROR_STATUS);
    }
}
