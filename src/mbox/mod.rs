//! Batch export of Dovecot Maildirs to one mbox file per user.

pub mod error;
pub mod maildir;
pub mod writer;

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use fs4::fs_std::FileExt;
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use self::error::MboxError;
use self::maildir::{list_messages, Mailbox, MaildirFlags};
use crate::config::MboxConfig;

/// Multi-worker runs log progress every this many messages.
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted { messages: usize },
    SkippedExisting,
    Cancelled,
}

/// `MM:SS`; minutes are not wrapped into hours.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn print_overview(mailboxes: &[Mailbox]) {
    println!();
    println!("Unique mailboxes to convert:");
    println!();
    println!("{:<30} {:>10}   {}", "User", "Messages", "Path");
    println!("{}", "-".repeat(70));
    for mb in mailboxes {
        println!("{:<30} {:>10}   {}", mb.name, mb.messages, mb.path.display());
    }
    println!();
    println!("Total unique mailboxes: {}", mailboxes.len());
    println!("[DRY RUN] No files will be written.");
    println!();
}

fn create_progress_bar(total: u64) -> ProgressBar {
    if !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
            .expect("valid template")
            .progress_chars("=> "),
    );
    pb
}

/// Write every message of `mailbox` into `output`.
///
/// Blocking; runs on the blocking pool. An existing output file is left
/// alone.
pub fn convert_mailbox(
    mailbox: &Mailbox,
    output: &Path,
    workers: usize,
) -> Result<ConvertOutcome, MboxError> {
    let started = Instant::now();
    let name = &mailbox.name;

    if output.exists() {
        tracing::info!("[{}] Already exists, skipping.", name);
        return Ok(ConvertOutcome::SkippedExisting);
    }

    let entries = list_messages(&mailbox.path)?;
    let total = entries.len();
    tracing::info!(
        "[{}] Converting to {} ({} messages)",
        name,
        output.display(),
        total
    );

    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).map_err(MboxError::io(dir))?;
    }

    // Only a complete mbox is ever visible under `output`; an interrupted
    // run leaves the `.part` file, which the next run truncates.
    let partial = partial_path(output);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&partial)
        .map_err(MboxError::io(&partial))?;
    let locked = match file.try_lock_exclusive() {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            return Err(MboxError::Busy(partial));
        }
        Err(e) => {
            tracing::warn!("[{}] File locking not supported, continuing: {}", name, e);
            false
        }
    };

    let result = file
        .set_len(0)
        .map_err(MboxError::io(&partial))
        .and_then(|()| write_all(&file, &partial, &entries, name, workers));

    if locked {
        let _ = FileExt::unlock(&file);
    }
    drop(file);

    let count = match result {
        Ok(count) => count,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&partial) {
                tracing::warn!("[{}] Could not remove {}: {}", name, partial.display(), rm);
            }
            return Err(e);
        }
    };
    fs::rename(&partial, output).map_err(MboxError::io(output))?;

    tracing::info!(
        "[{}] Done: {} messages converted in {}",
        name,
        count,
        format_duration(started.elapsed())
    );
    Ok(ConvertOutcome::Converted { messages: count })
}

/// `<output>.part`, the in-progress name of a mailbox export.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn write_all(
    file: &File,
    output: &Path,
    entries: &[maildir::MaildirEntry],
    name: &str,
    workers: usize,
) -> Result<usize, MboxError> {
    let total = entries.len();
    let pb = if workers == 1 {
        create_progress_bar(total as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_message(format!("[{}]", name));

    let mut out = BufWriter::new(file);
    let mut count = 0usize;
    for entry in entries {
        let raw = fs::read(&entry.path).map_err(MboxError::io(&entry.path))?;
        let delivered = fs::metadata(&entry.path)
            .and_then(|m| m.modified())
            .map_err(MboxError::io(&entry.path))?;
        let file_name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let flags = MaildirFlags::from_file_name(&file_name);
        writer::write_message(&mut out, &raw, flags, entry.in_cur, delivered)
            .map_err(|source| MboxError::Io {
                path: entry.path.clone(),
                source,
            })?;
        count += 1;

        if workers > 1 {
            if count % PROGRESS_EVERY == 0 || count == total {
                let percent = if total > 0 { count * 100 / total } else { 100 };
                tracing::info!("[{}] {}/{} messages ({}%)", name, count, total, percent);
            }
        } else {
            pb.inc(1);
        }
    }
    out.flush().map_err(MboxError::io(output))?;
    pb.finish_and_clear();
    Ok(count)
}

/// Discover mailboxes and convert them with up to `config.workers`
/// concurrent conversions.
pub async fn run(config: &MboxConfig, shutdown_token: CancellationToken) -> anyhow::Result<()> {
    let users_dir = config.users_dir.clone();
    let mailboxes = tokio::task::spawn_blocking(move || maildir::discover(&users_dir))
        .await
        .map_err(MboxError::from)??;

    if config.dry_run {
        print_overview(&mailboxes);
        return Ok(());
    }

    tokio::fs::create_dir_all(&config.dest)
        .await
        .with_context(|| format!("Failed to create {}", config.dest.display()))?;

    let started = Instant::now();
    let workers = config.workers.max(1);
    let dest = config.dest.clone();

    let conversions = stream::iter(mailboxes)
        .map(|mailbox| {
            let output = dest.join(mailbox.mbox_file_name());
            let token = shutdown_token.clone();
            async move {
                if token.is_cancelled() {
                    return (mailbox, Ok(ConvertOutcome::Cancelled));
                }
                let job = mailbox.clone();
                let result =
                    tokio::task::spawn_blocking(move || convert_mailbox(&job, &output, workers))
                        .await
                        .map_err(MboxError::from)
                        .and_then(|r| r);
                (mailbox, result)
            }
        })
        .buffer_unordered(workers);
    tokio::pin!(conversions);

    let mut failed = 0usize;
    let mut cancelled = false;
    while let Some((mailbox, result)) = conversions.next().await {
        match result {
            Ok(ConvertOutcome::Cancelled) => cancelled = true,
            Ok(_) => {}
            Err(e) => {
                failed += 1;
                tracing::error!("[{}] Conversion failed: {}", mailbox.name, e);
            }
        }
    }

    if cancelled {
        tracing::info!("Shutdown requested, remaining mailboxes were not converted");
    }
    tracing::info!(
        "All mailboxes processed in {} total",
        format_duration(started.elapsed())
    );
    if failed > 0 {
        anyhow::bail!("{} mailbox(es) failed to convert", failed);
    }
    Ok(())
}
