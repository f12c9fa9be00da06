//! Commonly used types in one import
//!
//! ```rust
//! use dcp_kdm::prelude::*;
//!
//! # fn example() -> Result<(), KdmError> {
//! let from = LocalTime::parse("2024-03-01T00:00:00+00:00")?;
//! let to = LocalTime::parse("2024-03-08T00:00:00+00:00")?;
//! let kdm = DecryptedKdm::builder()
//!     .valid_window(from, to)
//!     .content_title_text("Feature_FTR")
//!     .build()?;
//! assert!(kdm.keys().is_empty());
//! # Ok(())
//! # }
//! ```

pub use crate::asset_ref::{Asset, AssetRef};
pub use crate::certificate::{Certificate, CertificateChain, CertificateInfo};
pub use crate::cpl::{Cpl, ReelFileAsset};
pub use crate::encrypted_kdm::{EncryptOptions, EncryptedKdm, ForensicMarking, Formulation};
pub use crate::error::{DateBoundary, KdmError};
pub use crate::kdm::{DecryptedKdm, DecryptedKdmBuilder, DecryptionContext, KeyRecord};
pub use crate::key::{KeyMaterial, KeyType, Standard};
pub use crate::local_time::LocalTime;
pub use crate::wrap::{KeyEncapsulation, OaepHash, RsaOaepWrapper};
