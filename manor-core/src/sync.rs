//! # World State Sync
//!
//! After each actor's mutations the cached snapshot is replaced by a fresh
//! fetch. A failed fetch leaves the old snapshot in place: stale but
//! consistent is better than half-applied.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::store::{WorldStore, fetch_world_state};
use crate::world::WorldState;

/// Refetches the authoritative snapshot.
pub struct WorldSync<'a> {
    store: &'a dyn WorldStore,
}

impl<'a> WorldSync<'a> {
    /// Sync against `store`.
    #[must_use]
    pub fn new(store: &'a dyn WorldStore) -> Self {
        Self { store }
    }

    /// Fetch a fresh snapshot.
    ///
    /// # Errors
    ///
    /// [`SyncError`] wrapping the store failure.
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<WorldState, SyncError> {
        Ok(fetch_world_state(self.store, cancel).await?)
    }

    /// Replace `cached` wholesale with a fresh snapshot.
    ///
    /// On failure `cached` is untouched and the error is returned.
    ///
    /// # Errors
    ///
    /// [`SyncError`] if the fetch or decode failed.
    pub async fn refresh(&self, cached: &mut WorldState, cancel: &CancellationToken) -> Result<(), SyncError> {
        match self.fetch(cancel).await {
            Ok(fresh) => {
                debug!(player_location = %fresh.player_location, "world state synced");
                *cached = fresh;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "world state sync failed; keeping previous snapshot");
                Err(e)
            }
        }
    }
}
