// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::tappd::{QuotingService, TappdError};
use crate::wise::ProviderTransaction;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttestError {
    #[error("quoting service error")]
    Quoting(#[from] TappdError),
    #[error("quote serialization error")]
    Serialize(#[from] serde_json::Error),
    #[error("quoting service returned an empty report")]
    EmptyReport,
}

/// The statement an attestation report is requested over. Derived from a
/// matched transaction; `verified_at` is the only field not reproducible
/// from the transaction itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub platform: String,
    pub payment_id: String,
    pub amount: String,
    pub currency: String,
    pub date: String,
    pub status: String,
    pub recipient_id: String,
    pub verified_at: String,
}

impl Quote {
    pub fn for_transaction(tx: &ProviderTransaction, platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
            payment_id: tx.payment_id.clone(),
            amount: tx.amount.clone(),
            currency: tx.currency.clone(),
            date: tx.date.clone(),
            status: tx.status.clone(),
            recipient_id: tx.recipient_id.clone(),
            verified_at: Utc::now().to_rfc3339(),
        }
    }

    /// Canonical encoding submitted to the quoting primitive: compact JSON
    /// with the fields in declared order (platform, paymentId, amount,
    /// currency, date, status, recipientId, verifiedAt). A relying party
    /// must recompute exactly these bytes to check the report binding.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// SHA-256 of the canonical encoding, as reflected in the report's
    /// report_data field.
    pub fn payload_sha256(&self) -> Result<[u8; 32], serde_json::Error> {
        let bytes = self.canonical_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }
}

/// Request a hardware-signed report over the canonical encoding of `quote`.
pub fn attest(quoting: &dyn QuotingService, quote: &Quote) -> Result<Vec<u8>, AttestError> {
    let payload = quote.canonical_bytes()?;
    attest_bytes(quoting, &payload)
}

/// Request a hardware-signed report over arbitrary bytes.
pub fn attest_bytes(quoting: &dyn QuotingService, data: &[u8]) -> Result<Vec<u8>, AttestError> {
    let report = quoting.quote(data)?;
    if report.is_empty() {
        return Err(AttestError::EmptyReport);
    }
    Ok(report)
}
