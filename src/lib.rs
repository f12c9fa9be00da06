//! Key Delivery Messages for Digital Cinema Packages
//!
//! Issues and opens the KDMs that carry AES content keys to a cinema
//! playback device: the fixed-layout key blocks, their RSA-OAEP wrapping,
//! the validity checks against the signing certificate chain, and the
//! binding of delivered keys to the assets they decrypt.

pub mod asset_ref;
pub mod binary;
pub mod certificate;
pub mod cpl;
pub mod encrypted_kdm;
pub mod error;
pub mod kdm;
pub mod key;
pub mod key_block;
pub mod local_time;
pub mod prelude;
pub mod wrap;

pub use asset_ref::{Asset, AssetRef};
pub use certificate::{thumbprint_of, Certificate, CertificateChain, CertificateError, CertificateInfo};
pub use cpl::{Cpl, ReelFileAsset};
pub use encrypted_kdm::{
    AuthorizedDeviceInfo, EncryptOptions, EncryptedKdm, ForensicMarking, Formulation, Recipient,
    Signer, TypedKeyId, ASSUME_TRUST_THUMBPRINT,
};
pub use error::{DateBoundary, KdmError};
pub use kdm::{DecryptedKdm, DecryptedKdmBuilder, DecryptionContext, KeyRecord};
pub use key::{KeyError, KeyMaterial, KeyType, Standard, KEY_LENGTH};
pub use key_block::{
    format_uuid, pack, parse_uuid, unpack, BinaryKeyBlock, InteropKeyBlock, KeyBlockError,
    SmpteKeyBlock, INTEROP_BLOCK_LEN, SMPTE_BLOCK_LEN, SMPTE_STRUCTURE_ID,
};
pub use local_time::{LocalTime, TimeError};
pub use wrap::{
    load_private_key_pem, load_public_key_pem, CryptoError, KeyEncapsulation, OaepHash,
    RsaOaepWrapper,
};
