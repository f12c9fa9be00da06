//! Content key material and key classification
//!
//! Every key delivered by a KDM is a 128-bit AES key. The same length is
//! used by both Interop and SMPTE packaging, so `KeyMaterial` stores a
//! fixed-size array rather than a vector.

use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of every content key (AES-128)
pub const KEY_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid hex key: {0}")]
    InvalidHex(String),

    #[error("Invalid key type '{0}': must be exactly 4 printable ASCII characters")]
    InvalidKeyType(String),
}

/// Symmetric content key that zeroizes on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_LENGTH]);

impl KeyMaterial {
    /// Generate a random key from the operating system RNG
    pub fn random() -> Self {
        Self::random_with(&mut OsRng)
    }

    /// Generate a random key from a caller-supplied RNG
    ///
    /// Tests can pass a seeded RNG here to get reproducible keys.
    pub fn random_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rng.fill_bytes(&mut bytes);
        KeyMaterial(bytes)
    }

    /// Create a key from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LENGTH,
            got: bytes.len(),
        })?;
        Ok(KeyMaterial(bytes))
    }

    /// Create a key from a hex string (case-insensitive, 32 digits)
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Key value as a lowercase hex string
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; KEY_LENGTH]> for KeyMaterial {
    fn from(bytes: [u8; KEY_LENGTH]) -> Self {
        KeyMaterial(bytes)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

impl FromStr for KeyMaterial {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Four-character code naming what kind of essence a key decrypts
///
/// Only SMPTE key blocks carry a key type; Interop blocks omit it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyType([u8; 4]);

impl KeyType {
    /// Main picture
    pub const MDIK: KeyType = KeyType(*b"MDIK");
    /// Main sound
    pub const MDAK: KeyType = KeyType(*b"MDAK");
    /// Subtitles and closed captions
    pub const MDSK: KeyType = KeyType(*b"MDSK");
    /// Auxiliary data such as immersive audio
    pub const MDEK: KeyType = KeyType(*b"MDEK");
    /// Forensic marking, picture
    pub const FMIK: KeyType = KeyType(*b"FMIK");
    /// Forensic marking, audio
    pub const FMAK: KeyType = KeyType(*b"FMAK");

    /// Build a key type from its 4 raw bytes
    pub fn from_bytes(bytes: [u8; 4]) -> Result<Self, KeyError> {
        if bytes.iter().all(|b| b.is_ascii_graphic()) {
            Ok(KeyType(bytes))
        } else {
            Err(KeyError::InvalidKeyType(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // from_bytes only admits printable ASCII
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyType({})", self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| KeyError::InvalidKeyType(s.to_string()))?;
        Self::from_bytes(bytes)
    }
}

impl Serialize for KeyType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Packaging standard, which selects the key block layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Interop,
    Smpte,
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Standard::Interop => f.write_str("Interop"),
            Standard::Smpte => f.write_str("SMPTE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_hex_round_trip() {
        let key = KeyMaterial::from_hex("0123456789abcdef915a9157123ba218").unwrap();
        assert_eq!(key.hex(), "0123456789abcdef915a9157123ba218");

        let key = KeyMaterial::from_hex("AF1A1B061389DDAC62BE8A19BBC52DFF").unwrap();
        assert_eq!(key.hex(), "af1a1b061389ddac62be8a19bbc52dff");
    }

    #[test]
    fn test_hex_wrong_length() {
        let result = KeyMaterial::from_hex("af1a1b061389ddac62be8a");
        assert_eq!(
            result,
            Err(KeyError::InvalidLength {
                expected: 16,
                got: 11
            })
        );
    }

    #[test]
    fn test_hex_invalid_digits() {
        let result = KeyMaterial::from_hex("zz1a1b061389ddac62be8a19bbc52dff");
        assert!(matches!(result, Err(KeyError::InvalidHex(_))));
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(KeyMaterial::from_slice(&[0u8; 15]).is_err());
        assert!(KeyMaterial::from_slice(&[0u8; 17]).is_err());
        assert!(KeyMaterial::from_slice(&[0u8; 16]).is_ok());
    }

    #[test]
    fn test_injected_rng_is_deterministic() {
        let a = KeyMaterial::random_with(&mut StdRng::seed_from_u64(7));
        let b = KeyMaterial::random_with(&mut StdRng::seed_from_u64(7));
        let c = KeyMaterial::random_with(&mut StdRng::seed_from_u64(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(KeyMaterial::random(), KeyMaterial::random());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = KeyMaterial::from_hex("0123456789abcdef915a9157123ba218").unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("0123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_key_type_parse() {
        assert_eq!("MDIK".parse::<KeyType>().unwrap(), KeyType::MDIK);
        assert_eq!(KeyType::MDAK.to_string(), "MDAK");
        assert!("MDI".parse::<KeyType>().is_err());
        assert!("MDIKX".parse::<KeyType>().is_err());
        assert!("MD K".parse::<KeyType>().is_err());
    }

    #[test]
    fn test_key_type_serde() {
        let json = serde_json::to_string(&KeyType::MDSK).unwrap();
        assert_eq!(json, "\"MDSK\"");
        let parsed: KeyType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, KeyType::MDSK);
        assert!(serde_json::from_str::<KeyType>("\"toolong\"").is_err());
    }
}
