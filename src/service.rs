// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::appkey::{AppKeyProvider, KeyError};
use crate::cipher::{self, CipherError};
use crate::matcher::{self, PaymentClaim};
use crate::quote::{self, AttestError, Quote};
use crate::tappd::QuotingService;
use crate::wise::{TransactionSource, WiseError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Platform tag stamped into quotes produced by this service.
pub const PLATFORM: &str = "wise";

/// Pipeline failure, tagged with the stage it originated from. No stage is
/// retried; the first failure short-circuits the pipeline.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("key derivation failed")]
    KeyDerivation(#[source] KeyError),
    #[error("credential encryption failed")]
    Encryption(#[source] CipherError),
    #[error("credential decryption failed")]
    Decryption(#[source] CipherError),
    #[error("provider fetch failed")]
    ProviderFetch(#[from] WiseError),
    #[error("attestation failed")]
    Attestation(#[from] AttestError),
}

fn cipher_stage(err: CipherError, stage: fn(CipherError) -> ServiceError) -> ServiceError {
    match err {
        CipherError::Key(key_err) => ServiceError::KeyDerivation(key_err),
        other => stage(other),
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptOutcome {
    /// Hex-encoded ciphertext.
    pub ciphertext: String,
    /// Hex-encoded initialization vector, required for decryption.
    pub iv: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    /// Hex-encoded attestation report over the quote's canonical bytes.
    /// Present exactly when `verified` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl VerifyOutcome {
    fn unverified() -> Self {
        Self {
            verified: false,
            quote: None,
            report: None,
        }
    }
}

/// Sequences the verification pipeline:
/// decrypt credential, fetch transactions, match, build quote, attest.
///
/// The quoting primitive is only ever asked for a report after a successful
/// match, so a relying party that validates the report signature transitively
/// trusts only successful verifications.
pub struct ValidatorService {
    keys: AppKeyProvider,
    source: Box<dyn TransactionSource>,
    quoting: Arc<dyn QuotingService>,
}

impl ValidatorService {
    pub fn new(quoting: Arc<dyn QuotingService>, source: Box<dyn TransactionSource>) -> Self {
        Self {
            keys: AppKeyProvider::new(quoting.clone()),
            source,
            quoting,
        }
    }

    /// Encrypt a provider API credential under the TEE app key.
    pub fn encrypt_credentials(&self, credential: &str) -> Result<EncryptOutcome, ServiceError> {
        if credential.is_empty() {
            return Err(ServiceError::InvalidRequest("credential must not be empty"));
        }
        info!("encrypting provider credential");

        let encrypted = cipher::encrypt(&self.keys, credential)
            .map_err(|e| cipher_stage(e, ServiceError::Encryption))?;

        Ok(EncryptOutcome {
            ciphertext: hex::encode(&encrypted.ciphertext),
            iv: hex::encode(encrypted.iv),
        })
    }

    /// Verify a claimed payment against the provider's transaction list.
    pub fn verify_payment(
        &self,
        ciphertext: &[u8],
        iv: &[u8],
        claim: &PaymentClaim,
    ) -> Result<VerifyOutcome, ServiceError> {
        if ciphertext.is_empty() {
            return Err(ServiceError::InvalidRequest("missing encrypted credential"));
        }
        if iv.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "missing encryption initialization vector",
            ));
        }
        info!(
            currency = %claim.currency,
            amount = %claim.amount,
            "verifying payment claim"
        );

        let credential = cipher::decrypt(&self.keys, ciphertext, iv)
            .map_err(|e| cipher_stage(e, ServiceError::Decryption))?;
        debug!("credential decrypted");

        let transactions = self.source.transactions(&credential)?;
        debug!(count = transactions.len(), "fetched provider transactions");

        let Some(matched) = matcher::find_match(claim, &transactions) else {
            info!("no matching transaction found");
            return Ok(VerifyOutcome::unverified());
        };

        let quote = Quote::for_transaction(matched, PLATFORM);
        let report = quote::attest(self.quoting.as_ref(), &quote)?;
        info!(payment_id = %quote.payment_id, "payment verified");

        Ok(VerifyOutcome {
            verified: true,
            quote: Some(quote),
            report: Some(hex::encode(report)),
        })
    }

    /// Generate a standalone attestation report over caller-supplied data,
    /// without any payment context.
    pub fn generate_report(&self, user_data: &str) -> Result<String, ServiceError> {
        info!("generating attestation report");
        let report = quote::attest_bytes(self.quoting.as_ref(), user_data.as_bytes())?;
        Ok(hex::encode(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appkey::KEY_SIZE;
    use crate::tappd::TappdError;
    use crate::wise::ProviderTransaction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockQuoting {
        quote_calls: AtomicUsize,
    }

    impl MockQuoting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                quote_calls: AtomicUsize::new(0),
            })
        }
    }

    impl QuotingService for MockQuoting {
        fn derive_key(&self, _purpose: &str) -> Result<Vec<u8>, TappdError> {
            Ok(vec![9u8; KEY_SIZE])
        }

        fn quote(&self, data: &[u8]) -> Result<Vec<u8>, TappdError> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            let mut report = b"signed:".to_vec();
            report.extend_from_slice(data);
            Ok(report)
        }
    }

    struct StaticSource(Vec<ProviderTransaction>);

    impl TransactionSource for StaticSource {
        fn transactions(&self, _credential: &str) -> Result<Vec<ProviderTransaction>, WiseError> {
            Ok(self.0.clone())
        }
    }

    fn transaction(amount: &str, kind: &str) -> ProviderTransaction {
        ProviderTransaction {
            payment_id: format!("tx-{amount}"),
            amount: amount.to_string(),
            currency: "USD".to_string(),
            date: "2024-01-02T00:00:00Z".to_string(),
            status: "COMPLETED".to_string(),
            r#type: kind.to_string(),
            recipient_id: "acct-9".to_string(),
        }
    }

    fn claim() -> PaymentClaim {
        PaymentClaim::new("100.00", "USD", "2024-01-01T00:00:00Z")
    }

    fn service(
        quoting: Arc<MockQuoting>,
        transactions: Vec<ProviderTransaction>,
    ) -> ValidatorService {
        ValidatorService::new(quoting, Box::new(StaticSource(transactions)))
    }

    fn encrypted(service: &ValidatorService) -> (Vec<u8>, Vec<u8>) {
        let outcome = service.encrypt_credentials("wise-api-token").unwrap();
        (
            hex::decode(outcome.ciphertext).unwrap(),
            hex::decode(outcome.iv).unwrap(),
        )
    }

    #[test]
    fn verifies_first_sufficient_transaction() {
        let quoting = MockQuoting::new();
        let svc = service(
            quoting.clone(),
            vec![transaction("99.00", "received"), transaction("150.00", "received")],
        );
        let (ciphertext, iv) = encrypted(&svc);

        let outcome = svc.verify_payment(&ciphertext, &iv, &claim()).unwrap();
        assert!(outcome.verified);

        let quote = outcome.quote.unwrap();
        assert_eq!(quote.amount, "150.00");
        assert_eq!(quote.platform, PLATFORM);

        let report = hex::decode(outcome.report.unwrap()).unwrap();
        let mut expected = b"signed:".to_vec();
        expected.extend_from_slice(&quote.canonical_bytes().unwrap());
        assert_eq!(report, expected);
    }

    #[test]
    fn outbound_only_candidates_are_unverified_without_attestation() {
        let quoting = MockQuoting::new();
        let svc = service(quoting.clone(), vec![transaction("100.00", "sent")]);
        let (ciphertext, iv) = encrypted(&svc);

        let outcome = svc.verify_payment(&ciphertext, &iv, &claim()).unwrap();
        assert!(!outcome.verified);
        assert!(outcome.quote.is_none());
        assert!(outcome.report.is_none());
        assert_eq!(quoting.quote_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_match_path_never_calls_quoting_primitive() {
        let quoting = MockQuoting::new();
        let svc = service(quoting.clone(), Vec::new());
        let (ciphertext, iv) = encrypted(&svc);

        let outcome = svc.verify_payment(&ciphertext, &iv, &claim()).unwrap();
        assert!(!outcome.verified);
        assert_eq!(quoting.quote_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tampered_ciphertext_is_a_decryption_failure() {
        let quoting = MockQuoting::new();
        let svc = service(quoting.clone(), vec![transaction("150.00", "received")]);
        let (mut ciphertext, iv) = encrypted(&svc);
        ciphertext[0] ^= 0xff;

        let result = svc.verify_payment(&ciphertext, &iv, &claim());
        assert!(matches!(result, Err(ServiceError::Decryption(_))));
        assert_eq!(quoting.quote_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let quoting = MockQuoting::new();
        let svc = service(quoting, Vec::new());

        assert!(matches!(
            svc.encrypt_credentials(""),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            svc.verify_payment(&[], &[1u8; 16], &claim()),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            svc.verify_payment(&[1u8], &[], &claim()),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn generate_report_attests_user_data() {
        let quoting = MockQuoting::new();
        let svc = service(quoting.clone(), Vec::new());

        let report_hex = svc.generate_report("hello").unwrap();
        let report = hex::decode(report_hex).unwrap();
        assert_eq!(report, b"signed:hello");
        assert_eq!(quoting.quote_calls.load(Ordering::SeqCst), 1);
    }
}
