//! Unified error type for KDM operations
//!
//! Each module keeps its own error for precise handling (`KeyError`,
//! `TimeError`, `KeyBlockError`, `CryptoError`, `CertificateError`). They all
//! convert into [`KdmError`], which is what the public KDM operations return.
//!
//! # Example
//!
//! ```no_run
//! use dcp_kdm::{DecryptedKdm, EncryptedKdm, KdmError};
//!
//! fn open(kdm: &EncryptedKdm, pem: &str) -> Result<DecryptedKdm, KdmError> {
//!     DecryptedKdm::decrypt_pem(kdm, pem)
//! }
//! ```

use crate::certificate::CertificateError;
use crate::key::KeyError;
use crate::key_block::KeyBlockError;
use crate::local_time::{LocalTime, TimeError};
use crate::wrap::CryptoError;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Which end of the KDM validity window fell outside a signing certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBoundary {
    Before,
    After,
}

impl fmt::Display for DateBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBoundary::Before => f.write_str("starts before the start of"),
            DateBoundary::After => f.write_str("ends after the end of"),
        }
    }
}

/// Unified error type for all KDM operations
///
/// # Error Categories
///
/// - **Format**: a key block has the wrong size or layout
/// - **Crypto**: RSA-OAEP failure, unreadable key or bad base64
/// - **BadDate**: the KDM window is not covered by the signer chain
/// - **NotEncrypted**: the CPL has nothing to deliver keys for
/// - **UnresolvedRef**: an asset was used before it was loaded
#[derive(Debug, Error)]
pub enum KdmError {
    #[error("Format error: {0}")]
    Format(#[from] KeyBlockError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("KDM validity period {boundary} the signing certificate's validity period ({certificate}: KDM {kdm_date}, certificate {certificate_date})")]
    BadDate {
        boundary: DateBoundary,
        /// Subject common name of the certificate that failed the check
        certificate: String,
        kdm_date: NaiveDate,
        certificate_date: NaiveDate,
    },

    #[error("{cpl_id} is not encrypted")]
    NotEncrypted { cpl_id: Uuid },

    #[error("Unresolved reference to asset id {id}")]
    UnresolvedRef { id: String },

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Time error: {0}")]
    Time(#[from] TimeError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("KDM validity window is empty: {not_valid_before} is not before {not_valid_after}")]
    InvalidWindow {
        not_valid_before: LocalTime,
        not_valid_after: LocalTime,
    },

    #[error("KDM validity window not set")]
    MissingWindow,

    #[error("KDM has no keys to encrypt")]
    NoKeys,

    #[error("SMPTE key {key_id} has no key type")]
    MissingKeyType { key_id: Uuid },

    #[error("Interop key {key_id} cannot carry a key type")]
    UnexpectedKeyType { key_id: Uuid },

    #[error("Invalid forensic marking flag '{0}'")]
    InvalidForensicFlag(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KdmError {
    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::BadDate {
                boundary: DateBoundary::Before,
                ..
            } => Some("Start the KDM validity window on or after the signing certificate's not-before date"),
            Self::BadDate {
                boundary: DateBoundary::After,
                ..
            } => Some("End the KDM validity window before the signing certificate expires, or issue from a longer-lived signer chain"),
            Self::Crypto(CryptoError::Decrypt { .. }) => {
                Some("The KDM was probably made for a different device; check that the private key matches the KDM recipient")
            }
            Self::Crypto(CryptoError::BlockTooLarge { .. }) => {
                Some("The recipient certificate's RSA key is too small; 2048-bit keys are required")
            }
            Self::Format(_) | Self::InvalidForensicFlag(_) => {
                Some("The KDM is corrupt or malformed; ask the distributor for a new one")
            }
            Self::NotEncrypted { .. } => Some("The CPL has no encrypted assets, so it needs no KDM"),
            Self::UnresolvedRef { .. } => {
                Some("Load every asset of the DCP and resolve references before reading keys")
            }
            Self::InvalidWindow { .. } => Some("not_valid_before must be earlier than not_valid_after"),
            Self::MissingWindow => Some("Call valid_window() or valid_for_days() on the builder"),
            _ => None,
        }
    }

    /// Returns true if this is a cryptographic error
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Self::Crypto(_) | Self::Key(_))
    }

    /// Returns true if the KDM data itself is malformed
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::InvalidForensicFlag(_) | Self::Json(_))
    }

    /// Returns true if a validity date is at fault
    pub fn is_date_error(&self) -> bool {
        matches!(
            self,
            Self::BadDate { .. } | Self::InvalidWindow { .. } | Self::MissingWindow | Self::Time(_)
        )
    }

    /// The failing boundary of a `BadDate` error
    pub fn date_boundary(&self) -> Option<DateBoundary> {
        match self {
            Self::BadDate { boundary, .. } => Some(*boundary),
            _ => None,
        }
    }
}
