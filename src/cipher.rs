// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::appkey::{AppKeyProvider, KeyError};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Initialization vector length (one AES block).
pub const IV_SIZE: usize = 16;

const DIGEST_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("key derivation failed")]
    Key(#[from] KeyError),
    /// Deliberately carries no detail. Bad padding, a mismatched IV, a
    /// truncated ciphertext and a corrupted plaintext digest all surface as
    /// this same variant so a prober cannot distinguish them.
    #[error("decryption failed")]
    Decrypt,
}

/// A credential encrypted under the TEE app key. The IV is fresh per
/// encryption call and must travel with the ciphertext; decryption without
/// it fails.
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedCredential {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
}

/// Encrypt a plaintext credential with AES-256-CBC under the app key.
///
/// A SHA-256 digest of the plaintext is appended before padding, so any
/// tampering with ciphertext or IV surfaces as a decryption failure instead
/// of silently corrupt plaintext.
pub fn encrypt(keys: &AppKeyProvider, plaintext: &str) -> Result<EncryptedCredential, CipherError> {
    let key = keys.key()?;

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let mut payload = plaintext.as_bytes().to_vec();
    let digest = Sha256::digest(plaintext.as_bytes());
    payload.extend_from_slice(&digest);

    let ciphertext =
        Aes256CbcEnc::new(key.bytes().into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(&payload);

    Ok(EncryptedCredential { ciphertext, iv })
}

/// Decrypt a credential previously produced by [`encrypt`].
pub fn decrypt(keys: &AppKeyProvider, ciphertext: &[u8], iv: &[u8]) -> Result<String, CipherError> {
    let iv: [u8; IV_SIZE] = iv.try_into().map_err(|_| CipherError::Decrypt)?;
    let key = keys.key()?;

    let payload = Aes256CbcDec::new(key.bytes().into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::Decrypt)?;

    if payload.len() < DIGEST_SIZE {
        return Err(CipherError::Decrypt);
    }
    let (plaintext, digest) = payload.split_at(payload.len() - DIGEST_SIZE);
    if Sha256::digest(plaintext).as_slice() != digest {
        return Err(CipherError::Decrypt);
    }

    String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::Decrypt)
}
