//! Applies a downscaled image to the drive.
//!
//! Preserve mode renames the original to `*_original` before uploading
//! `*_2k`; replace mode deletes it first. The two steps are not atomic, so a
//! failed upload triggers a compensating step: rename back, or re-upload the
//! original bytes under the original name.

use super::error::{MutationError, Rollback};
use super::names::PlannedNames;
use crate::graph::{upload, DriveStore, RemoteItem};
use crate::types::MutationMode;

pub async fn apply(
    store: &dyn DriveStore,
    mode: MutationMode,
    item: &RemoteItem,
    names: &PlannedNames,
    original: &[u8],
    resized: &[u8],
) -> Result<(), MutationError> {
    match mode {
        MutationMode::Preserve => preserve(store, item, names, resized).await,
        MutationMode::Replace => replace(store, item, names, original, resized).await,
    }
}

async fn preserve(
    store: &dyn DriveStore,
    item: &RemoteItem,
    names: &PlannedNames,
    resized: &[u8],
) -> Result<(), MutationError> {
    store
        .rename(&item.id, &names.original)
        .await
        .map_err(|source| MutationError::Rename {
            name: item.name.clone(),
            source,
        })?;
    tracing::info!(" Renamed: {} → {}", item.name, names.original);

    if let Err(source) = upload::upload(store, &item.parent_id, &names.resized, resized).await {
        let rollback = match store.rename(&item.id, &item.name).await {
            Ok(()) => Rollback::Restored,
            Err(e) => Rollback::Failed(e),
        };
        return Err(MutationError::UploadAfterRename {
            name: names.resized.clone(),
            source,
            rollback,
        });
    }
    Ok(())
}

async fn replace(
    store: &dyn DriveStore,
    item: &RemoteItem,
    names: &PlannedNames,
    original: &[u8],
    resized: &[u8],
) -> Result<(), MutationError> {
    store
        .delete(&item.id)
        .await
        .map_err(|source| MutationError::Delete {
            name: item.name.clone(),
            source,
        })?;
    tracing::info!(" Deleted original: {}", item.name);

    if let Err(source) = upload::upload(store, &item.parent_id, &names.resized, resized).await {
        let rollback = match upload::upload(store, &item.parent_id, &item.name, original).await {
            Ok(()) => Rollback::Restored,
            Err(e) => Rollback::Failed(e),
        };
        return Err(MutationError::UploadAfterDelete {
            name: names.resized.clone(),
            source,
            rollback,
        });
    }
    Ok(())
}
