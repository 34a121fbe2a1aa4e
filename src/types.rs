#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Microsoft national cloud the tenant lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Cloud {
    Global,
    China,
    #[value(name = "us-gov")]
    UsGov,
}

impl Cloud {
    pub fn as_str(&self) -> &str {
        match self {
            Cloud::Global => "global",
            Cloud::China => "china",
            Cloud::UsGov => "us-gov",
        }
    }
}

/// How the original item is treated once its downscaled copy is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    /// Rename the original to `*_original` and upload `*_2k` next to it.
    Preserve,
    /// Delete the original and upload `*_2k` in its place.
    Replace,
}

impl std::fmt::Display for MutationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationMode::Preserve => write!(f, "RENAME to *_original + upload *_2k"),
            MutationMode::Replace => write!(f, "DELETE originals -> upload *_2k"),
        }
    }
}
