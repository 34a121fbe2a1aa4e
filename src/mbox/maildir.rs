//! Discovery of Dovecot user Maildirs and enumeration of their messages.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::MboxError;

/// Maildir subdirectories holding messages, in conversion order.
const MESSAGE_DIRS: [&str; 2] = ["new", "cur"];

/// One unique mailbox, possibly reachable under several user names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mailbox {
    pub name: String,
    pub path: PathBuf,
    pub messages: usize,
}

impl Mailbox {
    /// Output file name: spaces become underscores.
    pub fn mbox_file_name(&self) -> String {
        format!("{}.mbox", self.name.replace(' ', "_"))
    }
}

/// Message file in a Maildir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaildirEntry {
    pub path: PathBuf,
    /// Whether it was found in `cur` (already seen by a client) rather than `new`.
    pub in_cur: bool,
}

/// Maildir info flags (`:2,FRS`) of a message file name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaildirFlags {
    pub draft: bool,
    pub flagged: bool,
    pub replied: bool,
    pub seen: bool,
    pub trashed: bool,
}

impl MaildirFlags {
    pub fn from_file_name(name: &str) -> Self {
        let mut flags = Self::default();
        let Some((_, info)) = name.rsplit_once(":2,") else {
            return flags;
        };
        for ch in info.chars() {
            match ch {
                'D' => flags.draft = true,
                'F' => flags.flagged = true,
                'R' => flags.replied = true,
                'S' => flags.seen = true,
                'T' => flags.trashed = true,
                _ => {}
            }
        }
        flags
    }
}

fn is_message_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden && path.is_file()
}

/// Message files under `new` then `cur`, each sorted by name.
pub fn list_messages(maildir: &Path) -> Result<Vec<MaildirEntry>, MboxError> {
    let mut entries = Vec::new();
    for sub in MESSAGE_DIRS {
        let dir = maildir.join(sub);
        if !dir.is_dir() {
            continue;
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(MboxError::io(&dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_message_file(p))
            .collect();
        paths.sort();
        entries.extend(paths.into_iter().map(|path| MaildirEntry {
            path,
            in_cur: sub == "cur",
        }));
    }
    Ok(entries)
}

pub fn count_messages(maildir: &Path) -> Result<usize, MboxError> {
    Ok(list_messages(maildir)?.len())
}

/// Pick the display name for a mailbox reachable under several user names:
/// the first name (sorted) containing a dot, else the first name.
pub fn choose_best_name(names: &BTreeSet<String>) -> Option<&str> {
    names
        .iter()
        .find(|n| n.contains('.'))
        .or_else(|| names.iter().next())
        .map(String::as_str)
}

/// Scan a Dovecot `users` directory. Entries are directories or symlinks
/// to Maildirs; anything without a `cur` subdirectory is ignored. Entries
/// resolving to the same Maildir are merged.
pub fn discover(users_dir: &Path) -> Result<Vec<Mailbox>, MboxError> {
    if !users_dir.is_dir() {
        return Err(MboxError::UsersDirMissing(users_dir.to_path_buf()));
    }

    let mut grouped: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
    for entry in fs::read_dir(users_dir).map_err(MboxError::io(users_dir))? {
        let entry = entry.map_err(MboxError::io(users_dir))?;
        let user_name = entry.file_name().to_string_lossy().into_owned();
        let real_path = match fs::canonicalize(entry.path()) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", user_name, e);
                continue;
            }
        };
        if !real_path.join("cur").is_dir() {
            continue;
        }
        grouped.entry(real_path).or_default().insert(user_name);
    }

    let mut mailboxes = Vec::with_capacity(grouped.len());
    for (path, names) in grouped {
        let Some(name) = choose_best_name(&names) else {
            continue;
        };
        let name = name.to_string();
        let messages = count_messages(&path)?;
        mailboxes.push(Mailbox {
            name,
            path,
            messages,
        });
    }
    mailboxes.sort();
    Ok(mailboxes)
}
