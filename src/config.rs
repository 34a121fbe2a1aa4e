use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{MboxArgs, ResizeArgs};
use crate::retry::RetryConfig;
use crate::types::{Cloud, MutationMode};

/// Local backup settings for the resize pipeline.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub root: PathBuf,
    pub enabled: bool,
    /// Use the site name as the first subdirectory under `root`.
    pub site_root: bool,
    /// Add the library name as a further subdirectory.
    pub include_library: bool,
    /// Mirror the remote folder tree below the start folder.
    pub preserve_tree: bool,
    pub overwrite: bool,
    /// Write backups even when the run is a dry run.
    pub in_dry_run: bool,
}

/// Resize pipeline configuration, built once from the CLI and passed by
/// reference everywhere.
pub struct ResizeConfig {
    pub tenant: String,
    pub client_id: String,
    pub site: String,
    pub library: String,
    pub start_folder: String,
    pub token_directory: PathBuf,
    pub log_dir: PathBuf,

    pub backup: BackupConfig,
    pub retry: RetryConfig,
    pub timeout: Duration,

    pub max_edge: u32,
    pub jpeg_quality: u8,

    pub cloud: Cloud,
    pub mode: MutationMode,

    pub recursive: bool,
    pub skip_existing: bool,
    pub dry_run: bool,
}

impl std::fmt::Debug for ResizeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeConfig")
            .field("tenant", &self.tenant)
            .field("client_id", &"<redacted>")
            .field("site", &self.site)
            .field("library", &self.library)
            .field("start_folder", &self.start_folder)
            .field("mode", &self.mode)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl ResizeConfig {
    pub fn from_cli(cli: ResizeArgs) -> anyhow::Result<Self> {
        if cli.site.trim_matches('/').is_empty() {
            anyhow::bail!("--site must name a site, e.g. `marketing` or `teams/site-name`");
        }
        if cli.timeout == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }

        let mode = if cli.delete_originals {
            MutationMode::Replace
        } else {
            MutationMode::Preserve
        };

        Ok(Self {
            tenant: cli.tenant,
            client_id: cli.client_id,
            site: cli.site.trim_matches('/').to_string(),
            library: cli.library,
            start_folder: cli.start_folder.trim_matches('/').to_string(),
            token_directory: expand_tilde(&cli.token_directory),
            log_dir: expand_tilde(&cli.log_dir),
            backup: BackupConfig {
                root: expand_tilde(&cli.backup_root),
                enabled: !cli.no_backup,
                site_root: !cli.no_backup_site_root,
                include_library: cli.backup_include_library,
                preserve_tree: !cli.no_backup_preserve_tree,
                overwrite: cli.backup_overwrite,
                in_dry_run: cli.dry_run_save_backups,
            },
            retry: RetryConfig {
                max_retries: cli.max_retries,
                base_delay_secs: cli.retry_delay,
                max_delay_secs: 60,
            },
            timeout: Duration::from_secs(cli.timeout),
            max_edge: cli.max_edge,
            jpeg_quality: cli.jpeg_quality,
            cloud: cli.cloud,
            mode,
            recursive: !cli.no_recursive,
            skip_existing: !cli.no_skip_existing,
            dry_run: cli.dry_run,
        })
    }

    /// Site name made safe for use in a file name.
    pub fn safe_site_name(&self) -> String {
        self.site.replace(['/', '\\'], "_")
    }
}

/// Maildir export configuration.
#[derive(Debug, Clone)]
pub struct MboxConfig {
    pub users_dir: PathBuf,
    pub dest: PathBuf,
    pub workers: usize,
    pub dry_run: bool,
}

impl MboxConfig {
    pub fn from_cli(cli: MboxArgs) -> Self {
        Self {
            users_dir: expand_tilde(&cli.users),
            dest: expand_tilde(&cli.dest),
            workers: usize::from(cli.workers),
            dry_run: cli.dry_run,
        }
    }
}
