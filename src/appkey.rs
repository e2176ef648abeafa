// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::tappd::{QuotingService, TappdError};
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Symmetric key length (AES-256).
pub const KEY_SIZE: usize = 32;

const KEY_PURPOSE: &str = "wise-credential-encryption";

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("quoting service error")]
    Quoting(#[from] TappdError),
    #[error("derived key material shorter than {KEY_SIZE} bytes")]
    ShortKey,
}

/// Symmetric key derived inside the TEE. The raw bytes never leave this
/// module except through [`AppKey::bytes`], are never serialized and never
/// appear in log output.
#[derive(Clone)]
pub struct AppKey([u8; KEY_SIZE]);

impl AppKey {
    pub(crate) fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppKey(..)")
    }
}

/// Provides the credential-encryption key, deriving it from the quoting
/// primitive on first use and caching it for the process lifetime.
///
/// Rotation requires a process restart; there is no invalidation operation.
pub struct AppKeyProvider {
    quoting: Arc<dyn QuotingService>,
    cached: Mutex<Option<AppKey>>,
}

impl AppKeyProvider {
    pub fn new(quoting: Arc<dyn QuotingService>) -> Self {
        Self {
            quoting,
            cached: Mutex::new(None),
        }
    }

    /// Get the app key, deriving it if this is the first access.
    ///
    /// The lock is held across the derivation call, so concurrent first
    /// accesses invoke the quoting primitive at most once.
    pub fn key(&self) -> Result<AppKey, KeyError> {
        // A poisoned lock means another thread panicked mid-derivation; the
        // cache slot is still either empty or holds a fully derived key.
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let material = self.quoting.derive_key(KEY_PURPOSE)?;
        if material.len() < KEY_SIZE {
            return Err(KeyError::ShortKey);
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&material[..KEY_SIZE]);
        debug!("derived credential-encryption key");

        let key = AppKey(bytes);
        *cached = Some(key.clone());
        Ok(key)
    }
}
