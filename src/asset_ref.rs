//! Lazily-resolved references to assets
//!
//! Reels and KDMs name assets by ID long before the assets themselves are
//! loaded. An `AssetRef` starts life holding only that ID and is bound to
//! the asset later with [`AssetRef::resolve`]. Reading the target of an
//! unbound reference fails with [`KdmError::UnresolvedRef`].

use crate::error::KdmError;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Anything that can be the target of an `AssetRef`
pub trait Asset: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;
}

/// Reference to an asset by ID, bound on demand
pub struct AssetRef<A: ?Sized + Asset = dyn Asset> {
    id: String,
    target: Option<Arc<A>>,
}

impl<A: ?Sized + Asset> AssetRef<A> {
    /// Unresolved reference
    pub fn new(id: impl Into<String>) -> Self {
        AssetRef {
            id: id.into(),
            target: None,
        }
    }

    /// Reference that is already bound to `asset`
    pub fn from_asset(asset: Arc<A>) -> Self {
        AssetRef {
            id: asset.id().to_string(),
            target: Some(asset),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Change the ID this reference points at
    ///
    /// An attached target is kept; callers changing the ID of a resolved
    /// reference are expected to resolve again against the new ID.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    /// Bind to the first candidate whose ID matches
    ///
    /// No match leaves the reference as it was. A reference that is already
    /// bound stays bound to its original target.
    pub fn resolve(&mut self, candidates: &[Arc<A>]) {
        let mut matches = candidates.iter().filter(|c| c.id() == self.id);
        let Some(first) = matches.next() else {
            return;
        };
        if matches.next().is_some() {
            warn!(asset_id = %self.id, "duplicate asset id; using the first match");
        }
        if self.target.is_none() {
            self.target = Some(Arc::clone(first));
        }
    }

    /// The bound asset
    pub fn target(&self) -> Result<Arc<A>, KdmError> {
        self.target
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| KdmError::UnresolvedRef {
                id: self.id.clone(),
            })
    }
}

impl<A: ?Sized + Asset> Clone for AssetRef<A> {
    fn clone(&self) -> Self {
        AssetRef {
            id: self.id.clone(),
            target: self.target.clone(),
        }
    }
}

impl<A: ?Sized + Asset> fmt::Debug for AssetRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("id", &self.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
