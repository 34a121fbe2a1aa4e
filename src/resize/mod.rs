//! Image downscaling pipeline: walk → classify → download → downscale →
//! backup → mutate, strictly one item at a time.

pub mod backup;
pub mod downscale;
pub mod error;
pub mod exif;
pub mod heic;
pub mod mutate;
pub mod names;
pub mod report;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use self::backup::{BackupOutcome, BackupWriter};
use self::downscale::downscale;
use self::error::ItemError;
use self::names::{plan_names, split_name, PlannedNames};
use self::report::{item_line, RunSummary};
use crate::config::ResizeConfig;
use crate::graph::{self, walker, DriveStore, GraphError, RemoteItem};
use crate::retry::retry_with_backoff;
use crate::types::MutationMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Name already carries `_2k` or `_original`.
    AlreadyProcessed,
    NotImage,
    /// Longer edge already within the bound.
    BelowThreshold,
    /// A `_2k` sibling exists.
    DestinationExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingDecision {
    Skip(SkipReason),
    Process,
}

/// Decision from the listing metadata alone, before any content is fetched.
pub fn classify(item: &RemoteItem) -> ProcessingDecision {
    if !names::is_image(item) {
        ProcessingDecision::Skip(SkipReason::NotImage)
    } else if names::is_already_processed(&item.name) {
        ProcessingDecision::Skip(SkipReason::AlreadyProcessed)
    } else {
        ProcessingDecision::Process
    }
}

/// Terminal state of one processed candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped(SkipReason),
    /// Dry run: everything up to the mutation was done.
    WouldReplace,
    Replaced,
}

/// How a run ended.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Listing failure that ended the walk early.
    pub aborted: Option<GraphError>,
    pub interrupted: bool,
}

pub struct Pipeline<'a> {
    store: &'a dyn DriveStore,
    config: &'a ResizeConfig,
    backup: Option<BackupWriter>,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn DriveStore, config: &'a ResizeConfig) -> Self {
        let backup = config.backup.enabled.then(|| BackupWriter::new(config));
        Self {
            store,
            config,
            backup,
        }
    }

    /// Walk everything below `root_id` and process each candidate image.
    ///
    /// Per-item failures are logged and counted; a listing failure stops the
    /// walk. Cancellation is honoured between items.
    pub async fn run(&self, root_id: &str, shutdown_token: &CancellationToken) -> RunReport {
        let mut summary = RunSummary::default();
        let mut aborted = None;
        let mut interrupted = false;

        let items = walker::walk(self.store, root_id, self.config.recursive, self.config.retry);
        tokio::pin!(items);

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_token.cancelled() => None,
                next = items.next() => Some(next),
            };
            let item = match next {
                None => {
                    tracing::info!(" Interrupted by user.");
                    interrupted = true;
                    break;
                }
                Some(None) => break,
                Some(Some(Ok(item))) => item,
                Some(Some(Err(e))) => {
                    tracing::error!("Listing failed, stopping walk: {}", e);
                    aborted = Some(e);
                    break;
                }
            };

            match classify(&item) {
                ProcessingDecision::Skip(SkipReason::NotImage) => continue,
                ProcessingDecision::Skip(reason) => {
                    tracing::debug!("Skipping {} ({:?})", item.name, reason);
                    summary.skipped += 1;
                    continue;
                }
                ProcessingDecision::Process => {}
            }

            summary.found += 1;
            match self.process(&item, &mut summary).await {
                Ok(ItemOutcome::Skipped(_)) => summary.skipped += 1,
                Ok(ItemOutcome::WouldReplace) => summary.processed += 1,
                Ok(ItemOutcome::Replaced) => {
                    summary.processed += 1;
                    summary.created += 1;
                }
                Err(ItemError::Mutation(e)) if e.is_partially_applied() => {
                    summary.errors += 1;
                    tracing::error!(
                        " Action failed ({}), drive needs manual attention: {}",
                        item.name,
                        e
                    );
                }
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!(" Action failed ({}): {}", item.name, e);
                }
            }
        }

        RunReport {
            summary,
            aborted,
            interrupted,
        }
    }

    async fn process(
        &self,
        item: &RemoteItem,
        summary: &mut RunSummary,
    ) -> Result<ItemOutcome, ItemError> {
        let names = plan_names(&item.name);

        if self.config.mode == MutationMode::Preserve && self.config.skip_existing {
            let exists = self
                .store
                .child_exists(&item.parent_id, &names.resized)
                .await
                .map_err(ItemError::Precheck)?;
            if exists {
                tracing::info!(" Already exists: {} → {} (skipped)", item.name, names.resized);
                return Ok(ItemOutcome::Skipped(SkipReason::DestinationExists));
            }
        }

        let original = retry_with_backoff(&self.config.retry, graph::classify, || {
            self.store.download(item)
        })
        .await
        .map_err(ItemError::Download)?;

        let (_, ext) = split_name(&item.name);
        let scaled = downscale(
            &original,
            self.config.max_edge,
            ext,
            self.config.jpeg_quality,
        )?;
        summary.record_sizes(original.len(), scaled.bytes.len());

        if !scaled.resized {
            tracing::info!(
                "No resize needed: {} (<= {}px)",
                item.name,
                self.config.max_edge
            );
            return Ok(ItemOutcome::Skipped(SkipReason::BelowThreshold));
        }

        self.back_up(item, &original, summary).await;

        if self.config.dry_run {
            tracing::info!(
                "{}   {}",
                item_line("[DRY]", &names.resized, scaled.bytes.len(), original.len()),
                self.dry_run_action(&names)
            );
            return Ok(ItemOutcome::WouldReplace);
        }

        mutate::apply(
            self.store,
            self.config.mode,
            item,
            &names,
            &original,
            &scaled.bytes,
        )
        .await?;
        tracing::info!(
            "{}   {}×{} px",
            item_line("Done", &names.resized, scaled.bytes.len(), original.len()),
            scaled.width,
            scaled.height
        );
        Ok(ItemOutcome::Replaced)
    }

    /// Save the original locally. Failures are counted but never stop the
    /// mutation.
    async fn back_up(&self, item: &RemoteItem, original: &[u8], summary: &mut RunSummary) {
        let Some(writer) = &self.backup else {
            return;
        };
        if self.config.dry_run && !self.config.backup.in_dry_run {
            let path = writer.target_path(&item.parent_path, &item.name);
            tracing::info!(" [DRY] would save local backup: {}", path.display());
            return;
        }
        match writer.write(original, &item.parent_path, &item.name).await {
            Ok(BackupOutcome::Written(path)) => {
                summary.backups_saved += 1;
                tracing::info!(" Local backup: {}", path.display());
            }
            Ok(BackupOutcome::SkippedExisting(path)) => {
                summary.backups_skipped += 1;
                tracing::info!(" Backup skipped (already exists): {}", path.display());
            }
            Err(e) => {
                summary.errors += 1;
                tracing::warn!(" Backup failed ({}): {}", item.name, e);
            }
        }
    }

    fn dry_run_action(&self, names: &PlannedNames) -> String {
        match self.config.mode {
            MutationMode::Preserve => format!(
                "Would rename to {} and upload {}",
                names.original, names.resized
            ),
            MutationMode::Replace => format!(
                "Would DELETE the original and upload {}",
                names.resized
            ),
        }
    }
}
