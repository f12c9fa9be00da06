//! Certificates as the KDM code sees them
//!
//! X.509 parsing happens elsewhere. A parser hands over the handful of
//! fields a KDM needs: public key, thumbprint, validity dates and names.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use rsa::RsaPublicKey;
use sha1::{Digest, Sha1};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("Certificate chain is empty")]
    EmptyChain,
}

/// Fields extracted from one X.509 certificate
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateInfo {
    pub public_key: RsaPublicKey,
    /// base64 of the SHA-1 digest of the certificate's to-be-signed DER
    pub thumbprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject_common_name: String,
    pub issuer_common_name: String,
    /// Issuer distinguished name, as written into `X509IssuerName`
    pub issuer: String,
    /// Decimal serial number
    pub serial: String,
    /// Subject distinguished name
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    info: CertificateInfo,
}

impl Certificate {
    pub fn new(info: CertificateInfo) -> Self {
        Certificate { info }
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.info.public_key
    }

    pub fn thumbprint(&self) -> &str {
        &self.info.thumbprint
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.info.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.info.not_after
    }

    /// First day of validity (UTC calendar date)
    pub fn not_before_date(&self) -> NaiveDate {
        self.info.not_before.date_naive()
    }

    /// Last day of validity (UTC calendar date)
    pub fn not_after_date(&self) -> NaiveDate {
        self.info.not_after.date_naive()
    }

    pub fn subject_common_name(&self) -> &str {
        &self.info.subject_common_name
    }

    pub fn issuer_common_name(&self) -> &str {
        &self.info.issuer_common_name
    }

    pub fn issuer(&self) -> &str {
        &self.info.issuer
    }

    pub fn serial(&self) -> &str {
        &self.info.serial
    }

    pub fn subject(&self) -> &str {
        &self.info.subject
    }
}

/// base64(SHA-1(der)), the form in which certificates are referenced
pub fn thumbprint_of(der: &[u8]) -> String {
    BASE64.encode(Sha1::digest(der))
}

/// Signing chain ordered leaf first, root last
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    pub fn new(leaf_to_root: Vec<Certificate>) -> Result<Self, CertificateError> {
        if leaf_to_root.is_empty() {
            return Err(CertificateError::EmptyChain);
        }
        Ok(CertificateChain {
            certificates: leaf_to_root,
        })
    }

    pub fn leaf(&self) -> &Certificate {
        // new() guarantees at least one certificate
        &self.certificates[0]
    }

    pub fn root(&self) -> &Certificate {
        &self.certificates[self.certificates.len() - 1]
    }

    pub fn leaf_to_root(&self) -> &[Certificate] {
        &self.certificates
    }
}
