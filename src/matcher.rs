// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::wise::ProviderTransaction;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Only inbound transactions can substantiate a payment claim.
pub const INBOUND_TYPE: &str = "received";

/// A caller's assertion of an off-chain payment, to be substantiated
/// against provider transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentClaim {
    pub amount: String,
    pub currency: String,
    pub timestamp: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "COMPLETED".to_string()
}

impl PaymentClaim {
    pub fn new(amount: impl Into<String>, currency: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
            timestamp: timestamp.into(),
            status: default_status(),
        }
    }
}

/// Find the first transaction substantiating `claim`, in provider-returned
/// order. No ranking is performed; ties go to the earlier list position.
///
/// An unparseable claim amount or timestamp yields no match rather than an
/// error: there is no valid claim to match against.
pub fn find_match<'a>(
    claim: &PaymentClaim,
    candidates: &'a [ProviderTransaction],
) -> Option<&'a ProviderTransaction> {
    let claim_amount: f64 = claim.amount.trim().parse().ok()?;
    let claim_time = DateTime::parse_from_rfc3339(&claim.timestamp).ok()?;

    candidates.iter().find(|tx| {
        tx.currency == claim.currency
            && tx.status == claim.status
            && tx.r#type == INBOUND_TYPE
            && amount_covers(&tx.amount, claim_amount)
            && occurred_at_or_after(&tx.date, claim_time)
    })
}

// The credited amount is a lower bound, not an exact figure: provider-side
// fee handling and currency-precision drift can leave the inbound amount
// above the claimed one. There is no upper tolerance; a transaction for far
// more than the claim still matches.
fn amount_covers(amount: &str, claimed: f64) -> bool {
    amount
        .trim()
        .parse::<f64>()
        .map(|credited| credited >= claimed)
        .unwrap_or(false)
}

// Lower bound only; no upper bound is enforced on the transaction date.
fn occurred_at_or_after(date: &str, claim_time: DateTime<chrono::FixedOffset>) -> bool {
    DateTime::parse_from_rfc3339(date)
        .map(|tx_time| tx_time >= claim_time)
        .unwrap_or(false)
}
