//! RSA-OAEP wrapping of packed key blocks
//!
//! A packed key block is encrypted with the recipient's RSA public key using
//! OAEP padding, then base64-encoded and broken into 64-character lines for
//! the `CipherValue` element of the KDM.
//!
//! The default OAEP digest is SHA-1, matching OpenSSL's
//! `RSA_PKCS1_OAEP_PADDING`. SHA-256 must be selected on both ends.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    traits::PublicKeyParts,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

/// Width of each base64 line in a `CipherValue`
pub const LINE_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key block of {len} bytes exceeds the {max}-byte OAEP limit for this recipient key")]
    BlockTooLarge { len: usize, max: usize },

    #[error("RSA-OAEP encryption failed: {0}")]
    Encrypt(#[source] rsa::Error),

    #[error("Could not decrypt KDM ({source}); cipher length {cipher_len}, RSA key size {modulus_bits} bits")]
    Decrypt {
        #[source]
        source: rsa::Error,
        cipher_len: usize,
        modulus_bits: usize,
    },

    #[error("Cipher value is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Could not read RSA private key: {0}")]
    PrivateKey(String),

    #[error("Could not read RSA public key: {0}")]
    PublicKey(String),
}

/// OAEP digest selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OaepHash {
    #[default]
    Sha1,
    Sha256,
}

impl OaepHash {
    /// Digest output length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            OaepHash::Sha1 => 20,
            OaepHash::Sha256 => 32,
        }
    }

    fn padding(&self) -> Oaep {
        match self {
            OaepHash::Sha1 => Oaep::new::<Sha1>(),
            OaepHash::Sha256 => Oaep::new::<Sha256>(),
        }
    }
}

/// Asymmetric wrapping of key blocks
///
/// Implemented for RSA-OAEP today; the associated types leave room for
/// other key formats without touching the KDM code.
pub trait KeyEncapsulation {
    type PublicKey;
    type PrivateKey;
    type Wrapped;

    /// Encrypt a packed block for the holder of `public_key`
    fn wrap(&self, block: &[u8], public_key: &Self::PublicKey)
        -> Result<Self::Wrapped, CryptoError>;

    /// Recover a packed block with `private_key`
    fn unwrap(
        &self,
        wrapped: &Self::Wrapped,
        private_key: &Self::PrivateKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;
}

/// RSA-OAEP wrapper producing line-wrapped base64 text
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaOaepWrapper {
    pub hash: OaepHash,
}

impl RsaOaepWrapper {
    pub fn new(hash: OaepHash) -> Self {
        RsaOaepWrapper { hash }
    }

    pub fn with_sha1() -> Self {
        Self::new(OaepHash::Sha1)
    }

    pub fn with_sha256() -> Self {
        Self::new(OaepHash::Sha256)
    }

    /// Largest block this wrapper can encrypt under `public_key`
    pub fn max_block_len(&self, public_key: &RsaPublicKey) -> usize {
        public_key
            .size()
            .saturating_sub(2 * self.hash.output_len() + 2)
    }

    /// Encrypt with a caller-supplied RNG
    pub fn wrap_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        block: &[u8],
        public_key: &RsaPublicKey,
    ) -> Result<String, CryptoError> {
        let max = self.max_block_len(public_key);
        if block.len() > max {
            return Err(CryptoError::BlockTooLarge {
                len: block.len(),
                max,
            });
        }

        let ciphertext = public_key
            .encrypt(rng, self.hash.padding(), block)
            .map_err(CryptoError::Encrypt)?;
        debug!(
            block_len = block.len(),
            cipher_len = ciphertext.len(),
            "wrapped key block"
        );

        Ok(wrap_lines(&BASE64.encode(ciphertext)))
    }
}

impl KeyEncapsulation for RsaOaepWrapper {
    type PublicKey = RsaPublicKey;
    type PrivateKey = RsaPrivateKey;
    type Wrapped = String;

    fn wrap(&self, block: &[u8], public_key: &RsaPublicKey) -> Result<String, CryptoError> {
        self.wrap_with_rng(&mut OsRng, block, public_key)
    }

    fn unwrap(
        &self,
        wrapped: &String,
        private_key: &RsaPrivateKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        // Line breaks and indentation from the XML are not part of the data
        let compact: String = wrapped
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let ciphertext = BASE64.decode(compact)?;

        let block = private_key
            .decrypt(self.hash.padding(), &ciphertext)
            .map_err(|source| CryptoError::Decrypt {
                source,
                cipher_len: ciphertext.len(),
                modulus_bits: private_key.size() * 8,
            })?;
        debug!(block_len = block.len(), "unwrapped key block");

        Ok(Zeroizing::new(block))
    }
}

/// Break text into lines of at most 64 characters joined by `\n`
///
/// The final line is left short; no trailing newline is added.
pub fn wrap_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / LINE_LENGTH);
    for (i, c) in text.chars().enumerate() {
        if i > 0 && i % LINE_LENGTH == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out
}

/// Load an RSA private key from PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM
pub fn load_private_key_pem(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    let pem = pem.trim();
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| CryptoError::PrivateKey(e.to_string()))
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::PrivateKey(e.to_string()))
    }
}

/// Load an RSA public key from SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM
pub fn load_public_key_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    let pem = pem.trim();
    if pem.contains("BEGIN RSA PUBLIC KEY") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| CryptoError::PublicKey(e.to_string()))
    } else {
        RsaPublicKey::from_public_key_pem(pem).map_err(|e| CryptoError::PublicKey(e.to_string()))
    }
}
