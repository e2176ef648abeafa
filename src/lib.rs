// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! TEE-rooted verification of off-chain Wise payments.
//!
//! A provider API credential is encrypted under a key that is only derivable
//! inside the TEE, decrypted transiently to query the provider, and the
//! verification outcome is bound to a hardware-signed attestation report.
//! A relying party can therefore trust the result without trusting the
//! operator: the report covers the canonical bytes of the [`quote::Quote`]
//! and is only ever produced for a successful match.
//!
//! #
//! ```no_run
//! use wise_tee_validator::matcher::PaymentClaim;
//! use wise_tee_validator::service::ValidatorService;
//! use wise_tee_validator::tappd::TappdClient;
//! use wise_tee_validator::wise::WiseClient;
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!   let service = ValidatorService::new(Arc::new(TappdClient::new()), Box::new(WiseClient::new()));
//!
//!   let encrypted = service.encrypt_credentials("wise-api-token")?;
//!   let ciphertext = hex::decode(&encrypted.ciphertext)?;
//!   let iv = hex::decode(&encrypted.iv)?;
//!
//!   let claim = PaymentClaim::new("100.00", "USD", "2024-01-01T00:00:00Z");
//!   let outcome = service.verify_payment(&ciphertext, &iv, &claim)?;
//!   if outcome.verified {
//!     println!("report: {}", outcome.report.unwrap_or_default());
//!   }
//!
//!   Ok(())
//! }
//! ```

pub mod appkey;
pub mod cipher;
pub mod matcher;
pub mod quote;
pub mod service;
pub mod tappd;
pub mod wise;
