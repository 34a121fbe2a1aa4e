use std::path::Path;
use std::time::Duration;

/// Counters and byte totals for one resize run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidate images (not already suffixed).
    pub found: usize,
    pub processed: usize,
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
    pub backups_saved: usize,
    pub backups_skipped: usize,
    pub original_bytes: u64,
    pub new_bytes: u64,
}

impl RunSummary {
    pub fn record_sizes(&mut self, original: usize, new: usize) {
        self.original_bytes += original as u64;
        self.new_bytes += new as u64;
    }

    pub fn saved_bytes(&self) -> u64 {
        self.original_bytes.saturating_sub(self.new_bytes)
    }

    pub fn saving_pct(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        100.0 * self.saved_bytes() as f64 / self.original_bytes as f64
    }

    pub fn log(&self, elapsed: Duration, log_file: Option<&Path>) {
        tracing::info!("------------------------------------------------------------");
        tracing::info!("── Summary ──");
        tracing::info!("   Found (candidates): {}", self.found);
        tracing::info!("   Processed:          {}", self.processed);
        tracing::info!("   New:                {}", self.created);
        tracing::info!("   Skipped:            {}", self.skipped);
        tracing::info!(
            "   Backups:            {} saved, {} skipped",
            self.backups_saved,
            self.backups_skipped
        );
        tracing::info!("   Errors:             {}", self.errors);
        tracing::info!("   Total original:     {}", human_size(self.original_bytes));
        tracing::info!("   Total new:          {}", human_size(self.new_bytes));
        tracing::info!(
            "   Total saved:        {}  ({:.1}%)",
            human_size(self.saved_bytes()),
            self.saving_pct()
        );
        tracing::info!("   Duration:           {:.1}s", elapsed.as_secs_f64());
        if let Some(path) = log_file {
            tracing::info!("   Log file:           {}", path.display());
        }
    }
}

/// Binary-prefixed size with one decimal, e.g. `1.5 MB`.
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}

/// Percentage saved going from `original` to `new` bytes; negative when the
/// output grew.
pub fn calc_saving(original: usize, new: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    100.0 * (original as f64 - new as f64) / original as f64
}

/// Aligned per-item result line: action, name, sizes, saving.
pub fn item_line(action: &str, name: &str, new: usize, original: usize) -> String {
    format!(
        "{:<12}{:<40.40}{:>8} / {:<8}  {:>6.1}%",
        action,
        name,
        human_size(new as u64),
        human_size(original as u64),
        calc_saving(original, new)
    )
}
