//! AES-128-CBC with PKCS#7 padding.

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::CipherError;

type Decryptor = cbc::Decryptor<aes::Aes128>;
type Encryptor = cbc::Encryptor<aes::Aes128>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// AES-128-CBC cipher bound to one key and IV.
#[derive(Clone)]
pub struct Aes128Cbc {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl std::fmt::Debug for Aes128Cbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes128Cbc").finish_non_exhaustive()
    }
}

impl Aes128Cbc {
    /// Bind key and IV. Both are mandatory and must be 16 bytes.
    pub fn new(key: Option<&[u8]>, iv: Option<&[u8]>) -> Result<Self, CipherError> {
        let key = key.ok_or(CipherError::MissingKeyMaterial { material: "key" })?;
        let iv = iv.ok_or(CipherError::MissingKeyMaterial {
            material: "initialization vector",
        })?;

        // Surface length problems here rather than on first use.
        Decryptor::new_from_slices(key, iv).map_err(|_| CipherError::Failed {
            reason: format!(
                "AES-128-CBC needs a {BLOCK_SIZE}-byte key and IV, got {} and {} bytes",
                key.len(),
                iv.len()
            ),
        })?;

        Ok(Self {
            key: key.to_vec(),
            iv: iv.to_vec(),
        })
    }

    /// Decrypt and strip padding. Never returns partial plaintext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let decryptor = Decryptor::new_from_slices(&self.key, &self.iv).map_err(|e| {
            CipherError::Failed {
                reason: e.to_string(),
            }
        })?;

        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::Failed {
                reason: format!(
                    "invalid padding or length ({} bytes of ciphertext)",
                    ciphertext.len()
                ),
            })
    }

    /// Pad and encrypt.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let encryptor = Encryptor::new_from_slices(&self.key, &self.iv).map_err(|e| {
            CipherError::Failed {
                reason: e.to_string(),
            }
        })?;

        Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }
}
