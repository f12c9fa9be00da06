//! Decrypted KDMs: content keys in the clear plus their validity window
//!
//! A [`DecryptedKdm`] is built either from a CPL and a content key (to issue
//! a KDM) or by decrypting an [`EncryptedKdm`] with the recipient's private
//! key (to play content). [`DecryptedKdm::encrypt`] turns it into the
//! transport form for one recipient certificate.
//!
//! # Example
//!
//! ```no_run
//! use dcp_kdm::prelude::*;
//!
//! # fn example(cpl: &Cpl, signer: &CertificateChain, recipient: &Certificate) -> Result<(), KdmError> {
//! let kdm = DecryptedKdm::builder()
//!     .valid_for_days(7)
//!     .annotation_text("Feature for Screen 1")
//!     .build_for_cpl(cpl, &KeyMaterial::random())?;
//!
//! let encrypted = kdm.encrypt(signer, recipient, &EncryptOptions::default())?;
//! println!("{}", encrypted.to_json()?);
//! # Ok(())
//! # }
//! ```

use crate::asset_ref::Asset;
use crate::certificate::{Certificate, CertificateChain};
use crate::cpl::{Cpl, ReelFileAsset};
use crate::encrypted_kdm::{EncryptOptions, EncryptedKdm, KdmContents, TypedKeyId};
use crate::error::{DateBoundary, KdmError};
use crate::key::{KeyMaterial, KeyType, Standard};
use crate::key_block;
use crate::local_time::LocalTime;
use crate::wrap::{load_private_key_pem, KeyEncapsulation, RsaOaepWrapper};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// One content key and what it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    key_type: Option<KeyType>,
    key_id: Uuid,
    key: KeyMaterial,
    cpl_id: Uuid,
    standard: Standard,
}

impl KeyRecord {
    /// SMPTE records must have a key type and Interop records must not
    pub fn new(
        key_type: Option<KeyType>,
        key_id: Uuid,
        key: KeyMaterial,
        cpl_id: Uuid,
        standard: Standard,
    ) -> Result<Self, KdmError> {
        match (standard, key_type) {
            (Standard::Smpte, None) => Err(KdmError::MissingKeyType { key_id }),
            (Standard::Interop, Some(_)) => Err(KdmError::UnexpectedKeyType { key_id }),
            _ => Ok(Self::from_parts(key_type, key_id, key, cpl_id, standard)),
        }
    }

    /// Caller guarantees the key type matches the standard
    pub(crate) fn from_parts(
        key_type: Option<KeyType>,
        key_id: Uuid,
        key: KeyMaterial,
        cpl_id: Uuid,
        standard: Standard,
    ) -> Self {
        KeyRecord {
            key_type,
            key_id,
            key,
            cpl_id,
            standard,
        }
    }

    pub fn key_type(&self) -> Option<KeyType> {
        self.key_type
    }

    pub fn key_id(&self) -> Uuid {
        self.key_id
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn cpl_id(&self) -> Uuid {
        self.cpl_id
    }

    pub fn standard(&self) -> Standard {
        self.standard
    }
}

/// A key bound to the asset it decrypts
#[derive(Debug, Clone)]
pub struct DecryptionContext {
    pub asset: Arc<dyn Asset>,
    pub key_id: Uuid,
    pub key_type: Option<KeyType>,
    pub key: KeyMaterial,
}

#[derive(Debug, Clone)]
pub struct DecryptedKdm {
    not_valid_before: LocalTime,
    not_valid_after: LocalTime,
    annotation_text: Option<String>,
    content_title_text: String,
    issue_date: LocalTime,
    keys: Vec<KeyRecord>,
}

impl DecryptedKdm {
    /// An empty KDM; add keys with [`add_key`](Self::add_key)
    pub fn new(
        not_valid_before: LocalTime,
        not_valid_after: LocalTime,
        annotation_text: Option<String>,
        content_title_text: impl Into<String>,
        issue_date: LocalTime,
    ) -> Result<Self, KdmError> {
        if not_valid_before >= not_valid_after {
            return Err(KdmError::InvalidWindow {
                not_valid_before,
                not_valid_after,
            });
        }
        Ok(DecryptedKdm {
            not_valid_before,
            not_valid_after,
            annotation_text,
            content_title_text: content_title_text.into(),
            issue_date,
            keys: Vec::new(),
        })
    }

    pub fn builder() -> DecryptedKdmBuilder {
        DecryptedKdmBuilder::new()
    }

    /// One SMPTE key record per encrypted asset of `cpl`, all sharing `key`
    pub fn from_cpl(
        cpl: &Cpl,
        key: &KeyMaterial,
        not_valid_before: LocalTime,
        not_valid_after: LocalTime,
    ) -> Result<Self, KdmError> {
        DecryptedKdmBuilder::new()
            .valid_window(not_valid_before, not_valid_after)
            .build_for_cpl(cpl, key)
    }

    /// One SMPTE key record per (asset, key) pair
    pub fn from_asset_keys<'a, I>(
        cpl_id: Uuid,
        asset_keys: I,
        not_valid_before: LocalTime,
        not_valid_after: LocalTime,
    ) -> Result<Self, KdmError>
    where
        I: IntoIterator<Item = (&'a ReelFileAsset, KeyMaterial)>,
    {
        DecryptedKdmBuilder::new()
            .valid_window(not_valid_before, not_valid_after)
            .build_for_asset_keys(cpl_id, asset_keys)
    }

    /// Decrypt with a PEM private key (PKCS#1 or PKCS#8)
    pub fn decrypt_pem(kdm: &EncryptedKdm, private_key_pem: &str) -> Result<Self, KdmError> {
        let private_key = load_private_key_pem(private_key_pem)?;
        Self::decrypt(kdm, &private_key)
    }

    /// Decrypt with the recipient's private key, using SHA-1 OAEP
    pub fn decrypt(kdm: &EncryptedKdm, private_key: &RsaPrivateKey) -> Result<Self, KdmError> {
        Self::decrypt_with(kdm, private_key, &RsaOaepWrapper::default())
    }

    /// Decrypt every key block; the first failure aborts the whole KDM
    pub fn decrypt_with(
        kdm: &EncryptedKdm,
        private_key: &RsaPrivateKey,
        wrapper: &RsaOaepWrapper,
    ) -> Result<Self, KdmError> {
        let mut keys = Vec::with_capacity(kdm.cipher_values().len());
        let mut window: Option<(LocalTime, LocalTime)> = None;

        for (index, cipher_value) in kdm.cipher_values().iter().enumerate() {
            let block = wrapper.unwrap(cipher_value, private_key)?;
            let block = key_block::unpack(&block)?;
            debug!(
                index,
                key_id = %block.key_id(),
                standard = %block.standard(),
                "decrypted key block"
            );

            let block_window = (block.not_valid_before(), block.not_valid_after());
            match window {
                None => window = Some(block_window),
                Some(first) if first != block_window => {
                    warn!(
                        index,
                        key_id = %block.key_id(),
                        "key block validity window differs from the first block; using the first"
                    );
                }
                Some(_) => {}
            }
            if block.cpl_id() != kdm.cpl_id() {
                warn!(
                    index,
                    block_cpl_id = %block.cpl_id(),
                    kdm_cpl_id = %kdm.cpl_id(),
                    "key block names a different CPL"
                );
            }

            keys.push(block.to_record());
        }

        let (not_valid_before, not_valid_after) =
            window.unwrap_or((kdm.not_valid_before(), kdm.not_valid_after()));
        let mut decrypted = DecryptedKdm::new(
            not_valid_before,
            not_valid_after,
            kdm.annotation_text().map(str::to_string),
            kdm.content_title_text(),
            kdm.issue_date(),
        )?;
        decrypted.keys = keys;

        info!(
            cpl_id = %kdm.cpl_id(),
            keys = decrypted.keys.len(),
            "decrypted KDM"
        );
        Ok(decrypted)
    }

    pub fn add_key(&mut self, key: KeyRecord) {
        self.keys.push(key);
    }

    /// Check the validity window against every certificate of the signer
    ///
    /// Certificates are checked leaf first. For each one the start of the
    /// window is checked before the end, by calendar day.
    pub fn check_validity(&self, signer: &CertificateChain) -> Result<(), KdmError> {
        for certificate in signer.leaf_to_root() {
            if !self.not_valid_before.day_on_or_after(certificate.not_before_date()) {
                return Err(bad_date(
                    DateBoundary::Before,
                    certificate,
                    &self.not_valid_before,
                    certificate.not_before_date(),
                ));
            }
            if !self.not_valid_after.day_on_or_before(certificate.not_after_date()) {
                return Err(bad_date(
                    DateBoundary::After,
                    certificate,
                    &self.not_valid_after,
                    certificate.not_after_date(),
                ));
            }
        }
        Ok(())
    }

    /// Wrap every key for `recipient`, signed by `signer`
    ///
    /// Either every key is encrypted or an error is returned; keys keep the
    /// order in which they were added.
    pub fn encrypt(
        &self,
        signer: &CertificateChain,
        recipient: &Certificate,
        options: &EncryptOptions,
    ) -> Result<EncryptedKdm, KdmError> {
        let first = self.keys.first().ok_or(KdmError::NoKeys)?;
        self.check_validity(signer)?;

        let wrapper = RsaOaepWrapper::new(options.oaep_hash);
        let signer_thumbprint = signer.leaf().thumbprint();

        let mut key_id_list = Vec::with_capacity(self.keys.len());
        let mut cipher_values = Vec::with_capacity(self.keys.len());
        for record in &self.keys {
            let block = Zeroizing::new(key_block::pack(
                record,
                signer_thumbprint,
                self.not_valid_before,
                self.not_valid_after,
            )?);
            cipher_values.push(wrapper.wrap(&block, recipient.public_key())?);
            key_id_list.push(TypedKeyId {
                key_type: record.key_type(),
                key_id: record.key_id(),
            });
            debug!(
                key_id = %record.key_id(),
                standard = %record.standard(),
                block_len = block.len(),
                "encrypted key block"
            );
        }

        let encrypted = EncryptedKdm::assemble(
            KdmContents {
                cpl_id: first.cpl_id(),
                content_title_text: self.content_title_text.clone(),
                annotation_text: self.annotation_text.clone(),
                issue_date: self.issue_date,
                not_valid_before: self.not_valid_before,
                not_valid_after: self.not_valid_after,
                key_id_list,
                cipher_values,
            },
            signer,
            recipient,
            options,
        );
        info!(
            cpl_id = %encrypted.cpl_id(),
            keys = encrypted.cipher_values().len(),
            recipient = recipient.subject_common_name(),
            formulation = %options.formulation,
            "issued KDM"
        );
        Ok(encrypted)
    }

    /// Bind this KDM's keys to the resolved assets of `cpl`
    ///
    /// Only keys for `cpl` are considered. A matching asset whose reference
    /// has not been resolved fails with `UnresolvedRef`.
    pub fn decryption_contexts(&self, cpl: &Cpl) -> Result<Vec<DecryptionContext>, KdmError> {
        let mut contexts = Vec::new();
        for record in self.keys.iter().filter(|k| k.cpl_id() == cpl.id) {
            for reel_asset in cpl
                .reel_assets
                .iter()
                .filter(|a| a.key_id() == Some(record.key_id()))
            {
                contexts.push(DecryptionContext {
                    asset: reel_asset.asset().target()?,
                    key_id: record.key_id(),
                    key_type: record.key_type(),
                    key: record.key().clone(),
                });
            }
        }
        Ok(contexts)
    }

    pub fn keys(&self) -> &[KeyRecord] {
        &self.keys
    }

    pub fn not_valid_before(&self) -> LocalTime {
        self.not_valid_before
    }

    pub fn not_valid_after(&self) -> LocalTime {
        self.not_valid_after
    }

    pub fn annotation_text(&self) -> Option<&str> {
        self.annotation_text.as_deref()
    }

    pub fn content_title_text(&self) -> &str {
        &self.content_title_text
    }

    pub fn issue_date(&self) -> LocalTime {
        self.issue_date
    }
}

fn bad_date(
    boundary: DateBoundary,
    certificate: &Certificate,
    kdm_time: &LocalTime,
    certificate_date: NaiveDate,
) -> KdmError {
    KdmError::BadDate {
        boundary,
        certificate: certificate.subject_common_name().to_string(),
        kdm_date: kdm_time.date(),
        certificate_date,
    }
}

/// Builder for [`DecryptedKdm`]
#[derive(Debug, Default)]
pub struct DecryptedKdmBuilder {
    valid_from: Option<DateTime<FixedOffset>>,
    valid_to: Option<DateTime<FixedOffset>>,
    annotation_text: Option<String>,
    content_title_text: Option<String>,
    issue_date: Option<LocalTime>,
}

impl DecryptedKdmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the validity window
    #[must_use]
    pub fn valid_window(mut self, from: LocalTime, to: LocalTime) -> Self {
        self.valid_from = Some(*from.as_datetime());
        self.valid_to = Some(*to.as_datetime());
        self
    }

    /// Set validity for a duration from now
    #[must_use]
    pub fn valid_for(mut self, duration: Duration) -> Self {
        let now = Utc::now().fixed_offset();
        self.valid_from = Some(now);
        self.valid_to = Some(now + duration);
        self
    }

    /// Set validity for a number of days from now
    #[must_use]
    pub fn valid_for_days(self, days: i64) -> Self {
        self.valid_for(Duration::days(days))
    }

    #[must_use]
    pub fn annotation_text(mut self, text: impl Into<String>) -> Self {
        self.annotation_text = Some(text.into());
        self
    }

    /// Defaults to the CPL's title when building from a CPL
    #[must_use]
    pub fn content_title_text(mut self, text: impl Into<String>) -> Self {
        self.content_title_text = Some(text.into());
        self
    }

    /// Defaults to the time of building
    #[must_use]
    pub fn issue_date(mut self, date: LocalTime) -> Self {
        self.issue_date = Some(date);
        self
    }

    /// An empty KDM
    pub fn build(self) -> Result<DecryptedKdm, KdmError> {
        let title = self.content_title_text.clone().unwrap_or_default();
        self.build_with_title(title)
    }

    /// One SMPTE key record per encrypted asset of `cpl`, all sharing `key`
    pub fn build_for_cpl(self, cpl: &Cpl, key: &KeyMaterial) -> Result<DecryptedKdm, KdmError> {
        let title = self
            .content_title_text
            .clone()
            .unwrap_or_else(|| cpl.content_title_text.clone());
        let mut kdm = self.build_with_title(title)?;

        for asset in cpl.encryptable_assets() {
            kdm.add_key(smpte_record(asset, key.clone(), cpl.id)?);
        }
        if kdm.keys.is_empty() {
            return Err(KdmError::NotEncrypted { cpl_id: cpl.id });
        }

        debug!(cpl_id = %cpl.id, keys = kdm.keys.len(), "built KDM from CPL");
        Ok(kdm)
    }

    /// One SMPTE key record per (asset, key) pair; unencrypted assets are skipped
    pub fn build_for_asset_keys<'a, I>(
        self,
        cpl_id: Uuid,
        asset_keys: I,
    ) -> Result<DecryptedKdm, KdmError>
    where
        I: IntoIterator<Item = (&'a ReelFileAsset, KeyMaterial)>,
    {
        let title = self.content_title_text.clone().unwrap_or_default();
        let mut kdm = self.build_with_title(title)?;
        for (asset, key) in asset_keys {
            if !asset.encryptable() {
                warn!(asset_id = %asset.id(), "asset has no key id; skipping");
                continue;
            }
            kdm.add_key(smpte_record(asset, key, cpl_id)?);
        }
        Ok(kdm)
    }

    fn build_with_title(self, title: String) -> Result<DecryptedKdm, KdmError> {
        let (from, to) = match (self.valid_from, self.valid_to) {
            (Some(from), Some(to)) => (LocalTime::new(from)?, LocalTime::new(to)?),
            _ => return Err(KdmError::MissingWindow),
        };
        let issue_date = match self.issue_date {
            Some(date) => date,
            None => LocalTime::now()?,
        };
        DecryptedKdm::new(from, to, self.annotation_text, title, issue_date)
    }
}

fn smpte_record(
    asset: &ReelFileAsset,
    key: KeyMaterial,
    cpl_id: Uuid,
) -> Result<KeyRecord, KdmError> {
    let key_id = asset.key_id().ok_or(KdmError::NotEncrypted { cpl_id })?;
    KeyRecord::new(asset.key_type(), key_id, key, cpl_id, Standard::Smpte)
}
