//! The parts of a Composition Playlist a KDM depends on
//!
//! Reading and writing CPL XML is handled elsewhere; this is the narrow view
//! used to enumerate encrypted reel assets and bind keys to them.

use crate::asset_ref::{Asset, AssetRef};
use crate::key::{KeyType, Standard};
use std::sync::Arc;
use uuid::Uuid;

/// One asset entry in a reel (picture, sound, subtitle, auxiliary data)
#[derive(Debug, Clone)]
pub struct ReelFileAsset {
    id: Uuid,
    asset: AssetRef,
    key_type: Option<KeyType>,
    key_id: Option<Uuid>,
}

impl ReelFileAsset {
    /// An asset stored in the clear
    pub fn plain(id: Uuid) -> Self {
        ReelFileAsset {
            id,
            asset: AssetRef::new(id.hyphenated().to_string()),
            key_type: None,
            key_id: None,
        }
    }

    /// An asset encrypted with the key `key_id`
    pub fn encrypted(id: Uuid, key_type: KeyType, key_id: Uuid) -> Self {
        ReelFileAsset {
            id,
            asset: AssetRef::new(id.hyphenated().to_string()),
            key_type: Some(key_type),
            key_id: Some(key_id),
        }
    }

    /// Entry already bound to a loaded asset
    pub fn with_asset(mut self, asset: Arc<dyn Asset>) -> Self {
        self.asset = AssetRef::from_asset(asset);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn asset(&self) -> &AssetRef {
        &self.asset
    }

    pub fn asset_mut(&mut self) -> &mut AssetRef {
        &mut self.asset
    }

    pub fn key_type(&self) -> Option<KeyType> {
        self.key_type
    }

    pub fn key_id(&self) -> Option<Uuid> {
        self.key_id
    }

    pub fn encryptable(&self) -> bool {
        self.key_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Cpl {
    pub id: Uuid,
    pub content_title_text: String,
    pub standard: Standard,
    pub reel_assets: Vec<ReelFileAsset>,
}

impl Cpl {
    pub fn new(id: Uuid, content_title_text: impl Into<String>, standard: Standard) -> Self {
        Cpl {
            id,
            content_title_text: content_title_text.into(),
            standard,
            reel_assets: Vec::new(),
        }
    }

    pub fn add_asset(&mut self, asset: ReelFileAsset) {
        self.reel_assets.push(asset);
    }

    /// Encrypted reel assets, in reel order
    pub fn encryptable_assets(&self) -> impl Iterator<Item = &ReelFileAsset> {
        self.reel_assets.iter().filter(|a| a.encryptable())
    }

    /// Bind every reel asset reference against the loaded assets
    pub fn resolve_refs(&mut self, candidates: &[Arc<dyn Asset>]) {
        for reel_asset in &mut self.reel_assets {
            reel_asset.asset.resolve(candidates);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Mxf(String);

    impl Asset for Mxf {
        fn id(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn test_encryptable_assets_in_order() {
        let mut cpl = Cpl::new(Uuid::new_v4(), "Feature", Standard::Smpte);
        let picture_key = Uuid::new_v4();
        let sound_key = Uuid::new_v4();
        cpl.add_asset(ReelFileAsset::encrypted(Uuid::new_v4(), KeyType::MDIK, picture_key));
        cpl.add_asset(ReelFileAsset::plain(Uuid::new_v4()));
        cpl.add_asset(ReelFileAsset::encrypted(Uuid::new_v4(), KeyType::MDAK, sound_key));

        let keys: Vec<Option<Uuid>> = cpl.encryptable_assets().map(|a| a.key_id()).collect();
        assert_eq!(keys, [Some(picture_key), Some(sound_key)]);
    }

    #[test]
    fn test_resolve_refs() {
        let asset_id = Uuid::new_v4();
        let mut cpl = Cpl::new(Uuid::new_v4(), "Feature", Standard::Smpte);
        cpl.add_asset(ReelFileAsset::encrypted(asset_id, KeyType::MDIK, Uuid::new_v4()));
        cpl.add_asset(ReelFileAsset::plain(Uuid::new_v4()));

        let loaded: Vec<Arc<dyn Asset>> = vec![Arc::new(Mxf(asset_id.to_string()))];
        cpl.resolve_refs(&loaded);

        assert!(cpl.reel_assets[0].asset().is_resolved());
        assert!(!cpl.reel_assets[1].asset().is_resolved());
    }
}
