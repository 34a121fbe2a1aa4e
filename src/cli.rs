use clap::{Args, Parser, Subcommand};

use crate::types::{Cloud, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "spshrink",
    about = "Downscale SharePoint/OneDrive images with local backup, or convert Maildirs to mbox"
)]
pub struct Cli {
    /// Log level (RUST_LOG overrides this)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resize images in a SharePoint/OneDrive library in place, with local backup
    Resize(ResizeArgs),
    /// Convert Dovecot Maildirs to mbox files
    Mbox(MboxArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ResizeArgs {
    /// Directory (tenant) ID or domain, e.g. contoso.onmicrosoft.com
    #[arg(long, env = "SPSHRINK_TENANT")]
    pub tenant: String,

    /// Application (client) ID of a public client app registration
    #[arg(long, env = "SPSHRINK_CLIENT_ID")]
    pub client_id: String,

    /// Microsoft cloud hosting the tenant
    #[arg(long, value_enum, default_value = "global")]
    pub cloud: Cloud,

    /// Server-relative site name, e.g. `marketing` or `teams/site-name`
    #[arg(long)]
    pub site: String,

    /// Document library display name
    #[arg(long, default_value = "Documents")]
    pub library: String,

    /// Folder inside the library to start from (empty = whole library)
    #[arg(long, default_value = "")]
    pub start_folder: String,

    /// Longest edge in pixels after downscaling
    #[arg(long, default_value_t = 2048, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_edge: u32,

    /// JPEG and WebP re-encoding quality (1-100)
    #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Only process the start folder itself, not its subfolders
    #[arg(long)]
    pub no_recursive: bool,

    /// Process items even when a `*_2k` sibling already exists (preserve mode only)
    #[arg(long)]
    pub no_skip_existing: bool,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Delete originals in SharePoint and upload the downscaled copy as `*_2k`
    #[arg(long)]
    pub delete_originals: bool,

    /// Show what would happen without changing anything remotely
    #[arg(long)]
    pub dry_run: bool,

    /// Still write local backups during a dry run
    #[arg(long)]
    pub dry_run_save_backups: bool,

    /// Root directory for local backups of the originals
    #[arg(long, default_value = "~/spshrink-backup")]
    pub backup_root: String,

    /// Do not write local backups
    #[arg(long)]
    pub no_backup: bool,

    /// Do not use the site name as the first backup subdirectory
    #[arg(long)]
    pub no_backup_site_root: bool,

    /// Add the library name as a backup subdirectory
    #[arg(long)]
    pub backup_include_library: bool,

    /// Store all backups flat instead of mirroring the folder tree
    #[arg(long)]
    pub no_backup_preserve_tree: bool,

    /// Overwrite existing local backup files
    #[arg(long)]
    pub backup_overwrite: bool,

    /// Directory for the cached refresh token
    #[arg(long, default_value = "~/.spshrink")]
    pub token_directory: String,

    /// Directory for run log files
    #[arg(long, default_value = "logs")]
    pub log_dir: String,

    /// Max retries for listing and download requests (0 = no retries)
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Base delay in seconds between listing/download retries
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,
}

#[derive(Args, Debug, Clone)]
pub struct MboxArgs {
    /// Directory containing per-user Maildirs (or symlinks to them)
    #[arg(long, default_value = "/Volumes/Data/Library/Server/Mail/Data/mail/users")]
    pub users: String,

    /// Export directory for the mbox files
    #[arg(long, default_value = "~/Desktop/MboxExport")]
    pub dest: String,

    /// Only list the mailboxes that would be converted
    #[arg(long)]
    pub dry_run: bool,

    /// Number of concurrent conversions
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,
}
