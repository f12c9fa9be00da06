//! The transport form of a KDM
//!
//! An `EncryptedKdm` carries everything that goes into a SMPTE 430-1
//! `DCinemaSecurityMessage` except the XML itself and its signature: the
//! public metadata, the authorized device list and one RSA-wrapped key block
//! per content key. It is produced by [`DecryptedKdm::encrypt`] and never
//! modified afterwards.
//!
//! XML and XML-DSig are handled by another component, which exchanges this
//! value with the crate as JSON through [`EncryptedKdm::to_json`] and
//! [`EncryptedKdm::from_json`].
//!
//! [`DecryptedKdm::encrypt`]: crate::kdm::DecryptedKdm::encrypt

use crate::certificate::{Certificate, CertificateChain};
use crate::error::KdmError;
use crate::key::KeyType;
use crate::local_time::LocalTime;
use crate::wrap::OaepHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Thumbprint meaning "any device that holds the recipient key"
pub const ASSUME_TRUST_THUMBPRINT: &str = "2jmj7l5rSw0yVb/vlWAYkK/YBwk=";

pub const PICTURE_DISABLE_FLAG: &str = "http://www.smpte-ra.org/430-1/2006/KDM#mrkflg-picture-disable";
pub const AUDIO_DISABLE_FLAG: &str = "http://www.smpte-ra.org/430-1/2006/KDM#mrkflg-audio-disable";
const ABOVE_CHANNEL_SUFFIX: &str = "-above-channel-";

/// KDM variants as described in ISDCF Document 5
///
/// | Formulation                         | Trusted devices | Content authenticator |
/// |-------------------------------------|-----------------|-----------------------|
/// | `ModifiedTransitional1`             | assume trust    | no                    |
/// | `MultipleModifiedTransitional1`     | as supplied     | no                    |
/// | `DciAny`                            | assume trust    | yes                   |
/// | `DciSpecific`                       | as supplied     | yes                   |
/// | `ModifiedTransitionalTest`          | none            | no                    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Formulation {
    #[default]
    #[serde(rename = "modified-transitional-1")]
    ModifiedTransitional1,
    #[serde(rename = "multiple-modified-transitional-1")]
    MultipleModifiedTransitional1,
    DciAny,
    DciSpecific,
    ModifiedTransitionalTest,
}

impl Formulation {
    /// Whether the signer's leaf thumbprint goes into `ContentAuthenticator`
    pub fn has_content_authenticator(&self) -> bool {
        matches!(self, Formulation::DciAny | Formulation::DciSpecific)
    }

    /// Certificate thumbprints for the authorized device list
    pub fn device_thumbprints(&self, trusted_devices: &[String]) -> Vec<String> {
        match self {
            Formulation::ModifiedTransitional1 | Formulation::DciAny => {
                vec![ASSUME_TRUST_THUMBPRINT.to_string()]
            }
            Formulation::MultipleModifiedTransitional1 | Formulation::DciSpecific => {
                // An empty list falls back to assume-trust so both kinds can be issued together
                if trusted_devices.is_empty() {
                    vec![ASSUME_TRUST_THUMBPRINT.to_string()]
                } else {
                    trusted_devices.to_vec()
                }
            }
            Formulation::ModifiedTransitionalTest => Vec::new(),
        }
    }
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Formulation::ModifiedTransitional1 => "modified-transitional-1",
            Formulation::MultipleModifiedTransitional1 => "multiple-modified-transitional-1",
            Formulation::DciAny => "dci-any",
            Formulation::DciSpecific => "dci-specific",
            Formulation::ModifiedTransitionalTest => "modified-transitional-test",
        };
        f.write_str(name)
    }
}

/// Which forensic marking the recipient is told to switch off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForensicMarking {
    pub disable_picture: bool,
    /// `Some(0)` disables audio marking entirely; `Some(n)` only above channel `n`
    pub disable_audio: Option<u32>,
}

impl ForensicMarking {
    /// Marking left on for picture and sound
    pub fn enabled() -> Self {
        Self::default()
    }

    /// `ForensicMarkFlag` URIs for this setting
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.disable_picture {
            flags.push(PICTURE_DISABLE_FLAG.to_string());
        }
        match self.disable_audio {
            Some(0) => flags.push(AUDIO_DISABLE_FLAG.to_string()),
            Some(channel) => flags.push(format!(
                "{}{}{}",
                AUDIO_DISABLE_FLAG, ABOVE_CHANNEL_SUFFIX, channel
            )),
            None => {}
        }
        flags
    }

    /// Read back a flag list; unrecognised flags are ignored
    pub fn from_flags<S: AsRef<str>>(flags: &[S]) -> Result<Self, KdmError> {
        let mut marking = ForensicMarking::default();
        for flag in flags {
            let flag = flag.as_ref();
            if flag == PICTURE_DISABLE_FLAG {
                marking.disable_picture = true;
            } else if let Some(rest) = flag.strip_prefix(AUDIO_DISABLE_FLAG) {
                marking.disable_audio = Some(0);
                if let Some(channel) = rest.strip_prefix(ABOVE_CHANNEL_SUFFIX) {
                    let channel = channel
                        .parse::<u32>()
                        .map_err(|_| KdmError::InvalidForensicFlag(flag.to_string()))?;
                    marking.disable_audio = Some(channel);
                }
            }
        }
        Ok(marking)
    }
}

/// Settings for turning a `DecryptedKdm` into an `EncryptedKdm`
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    pub formulation: Formulation,
    /// Thumbprints of further devices allowed to use the KDM
    pub trusted_devices: Vec<String>,
    pub forensic_marking: ForensicMarking,
    pub oaep_hash: OaepHash,
}

impl EncryptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn formulation(mut self, formulation: Formulation) -> Self {
        self.formulation = formulation;
        self
    }

    #[must_use]
    pub fn trusted_device(mut self, thumbprint: impl Into<String>) -> Self {
        self.trusted_devices.push(thumbprint.into());
        self
    }

    #[must_use]
    pub fn trusted_devices(mut self, thumbprints: Vec<String>) -> Self {
        self.trusted_devices = thumbprints;
        self
    }

    #[must_use]
    pub fn forensic_marking(mut self, marking: ForensicMarking) -> Self {
        self.forensic_marking = marking;
        self
    }

    #[must_use]
    pub fn oaep_hash(mut self, hash: OaepHash) -> Self {
        self.oaep_hash = hash;
        self
    }
}

/// `Signer` element: who signed the KDM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    #[serde(rename = "x509IssuerName")]
    pub x509_issuer_name: String,
    #[serde(rename = "x509SerialNumber")]
    pub x509_serial_number: String,
}

/// `Recipient` element: the device certificate the keys are wrapped for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "x509IssuerName")]
    pub x509_issuer_name: String,
    #[serde(rename = "x509SerialNumber")]
    pub x509_serial_number: String,
    #[serde(rename = "x509SubjectName")]
    pub x509_subject_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedDeviceInfo {
    #[serde(rename = "deviceListIdentifier")]
    pub device_list_identifier: Uuid,
    #[serde(rename = "deviceListDescription", skip_serializing_if = "Option::is_none")]
    pub device_list_description: Option<String>,
    #[serde(rename = "certificateThumbprints")]
    pub certificate_thumbprints: Vec<String>,
}

/// One `TypedKeyId` entry of the `KeyIdList`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedKeyId {
    #[serde(rename = "keyType", skip_serializing_if = "Option::is_none", default)]
    pub key_type: Option<KeyType>,
    #[serde(rename = "keyId")]
    pub key_id: Uuid,
}

/// Description shown for the recipient: its common name after the first `.`
pub fn device_list_description(subject_common_name: &str) -> String {
    match subject_common_name.split_once('.') {
        Some((_, rest)) => rest.to_string(),
        None => subject_common_name.to_string(),
    }
}

/// Everything the KDM says apart from who it is for and who signed it
pub(crate) struct KdmContents {
    pub cpl_id: Uuid,
    pub content_title_text: String,
    pub annotation_text: Option<String>,
    pub issue_date: LocalTime,
    pub not_valid_before: LocalTime,
    pub not_valid_after: LocalTime,
    pub key_id_list: Vec<TypedKeyId>,
    pub cipher_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKdm {
    #[serde(rename = "messageId")]
    message_id: Uuid,
    #[serde(rename = "annotationText", skip_serializing_if = "Option::is_none", default)]
    annotation_text: Option<String>,
    #[serde(rename = "issueDate")]
    issue_date: LocalTime,
    signer: Signer,
    recipient: Recipient,
    #[serde(rename = "compositionPlaylistId")]
    cpl_id: Uuid,
    #[serde(rename = "contentAuthenticator", skip_serializing_if = "Option::is_none", default)]
    content_authenticator: Option<String>,
    #[serde(rename = "contentTitleText")]
    content_title_text: String,
    #[serde(rename = "contentKeysNotValidBefore")]
    not_valid_before: LocalTime,
    #[serde(rename = "contentKeysNotValidAfter")]
    not_valid_after: LocalTime,
    #[serde(rename = "authorizedDeviceInfo", skip_serializing_if = "Option::is_none", default)]
    authorized_device_info: Option<AuthorizedDeviceInfo>,
    #[serde(rename = "keyIdList")]
    key_id_list: Vec<TypedKeyId>,
    #[serde(rename = "forensicMarkFlagList", default)]
    forensic_mark_flags: Vec<String>,
    #[serde(rename = "cipherValues")]
    cipher_values: Vec<String>,
}

impl EncryptedKdm {
    pub(crate) fn assemble(
        contents: KdmContents,
        signer: &CertificateChain,
        recipient: &Certificate,
        options: &EncryptOptions,
    ) -> Self {
        let leaf = signer.leaf();
        let content_authenticator = options
            .formulation
            .has_content_authenticator()
            .then(|| leaf.thumbprint().to_string());

        EncryptedKdm {
            message_id: Uuid::new_v4(),
            annotation_text: contents.annotation_text,
            issue_date: contents.issue_date,
            signer: Signer {
                x509_issuer_name: leaf.issuer().to_string(),
                x509_serial_number: leaf.serial().to_string(),
            },
            recipient: Recipient {
                x509_issuer_name: recipient.issuer().to_string(),
                x509_serial_number: recipient.serial().to_string(),
                x509_subject_name: recipient.subject().to_string(),
            },
            cpl_id: contents.cpl_id,
            content_authenticator,
            content_title_text: contents.content_title_text,
            not_valid_before: contents.not_valid_before,
            not_valid_after: contents.not_valid_after,
            authorized_device_info: Some(AuthorizedDeviceInfo {
                device_list_identifier: Uuid::new_v4(),
                device_list_description: Some(device_list_description(
                    recipient.subject_common_name(),
                )),
                certificate_thumbprints: options
                    .formulation
                    .device_thumbprints(&options.trusted_devices),
            }),
            key_id_list: contents.key_id_list,
            forensic_mark_flags: options.forensic_marking.to_flags(),
            cipher_values: contents.cipher_values,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, KdmError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, KdmError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn annotation_text(&self) -> Option<&str> {
        self.annotation_text.as_deref()
    }

    pub fn issue_date(&self) -> LocalTime {
        self.issue_date
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn cpl_id(&self) -> Uuid {
        self.cpl_id
    }

    pub fn content_authenticator(&self) -> Option<&str> {
        self.content_authenticator.as_deref()
    }

    pub fn content_title_text(&self) -> &str {
        &self.content_title_text
    }

    pub fn not_valid_before(&self) -> LocalTime {
        self.not_valid_before
    }

    pub fn not_valid_after(&self) -> LocalTime {
        self.not_valid_after
    }

    pub fn authorized_device_info(&self) -> Option<&AuthorizedDeviceInfo> {
        self.authorized_device_info.as_ref()
    }

    pub fn key_id_list(&self) -> &[TypedKeyId] {
        &self.key_id_list
    }

    pub fn forensic_mark_flags(&self) -> &[String] {
        &self.forensic_mark_flags
    }

    /// The forensic marking setting expressed by the flag list
    pub fn forensic_marking(&self) -> Result<ForensicMarking, KdmError> {
        ForensicMarking::from_flags(&self.forensic_mark_flags)
    }

    /// Base64 `CipherValue` of each wrapped key block, in key order
    pub fn cipher_values(&self) -> &[String] {
        &self.cipher_values
    }
}
