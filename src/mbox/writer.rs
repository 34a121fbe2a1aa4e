//! mbox serialization of Maildir messages.

use std::io::{self, Write};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use super::maildir::MaildirFlags;

/// Envelope sender used on every `From ` separator line.
const ENVELOPE_SENDER: &str = "MAILER-DAEMON";

/// `From MAILER-DAEMON Wed Jan  1 00:00:00 2020` for the given delivery time.
pub fn from_line(delivered: SystemTime) -> String {
    let when: DateTime<Utc> = delivered.into();
    format!("From {} {}", ENVELOPE_SENDER, when.format("%a %b %e %H:%M:%S %Y"))
}

/// `Status` (R = read, O = old) and `X-Status` (D = deleted, F = flagged,
/// A = answered) header values.
pub fn status_headers(flags: MaildirFlags, in_cur: bool) -> (String, String) {
    let mut status = String::new();
    if flags.seen {
        status.push('R');
    }
    if in_cur {
        status.push('O');
    }
    let mut x_status = String::new();
    if flags.trashed {
        x_status.push('D');
    }
    if flags.flagged {
        x_status.push('F');
    }
    if flags.replied {
        x_status.push('A');
    }
    (status, x_status)
}

fn is_status_header(line: &[u8]) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with(b"status:") || lower.starts_with(b"x-status:")
}

/// Split raw message bytes into LF-terminated lines with CRLF normalized.
fn lines(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    raw.split_inclusive(|&b| b == b'\n').map(|line| {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        line.strip_suffix(b"\r").unwrap_or(line)
    })
}

/// Append one message to an mbox stream.
///
/// Existing `Status`/`X-Status` headers are replaced with ones derived from
/// the Maildir flags. Body lines starting with `From ` are quoted as
/// `>From `. Each message ends with a blank line.
pub fn write_message<W: Write>(
    out: &mut W,
    raw: &[u8],
    flags: MaildirFlags,
    in_cur: bool,
    delivered: SystemTime,
) -> io::Result<()> {
    writeln!(out, "{}", from_line(delivered))?;

    let mut in_headers = true;
    let mut skipping_header = false;
    for line in lines(raw) {
        if in_headers {
            if line.is_empty() {
                let (status, x_status) = status_headers(flags, in_cur);
                writeln!(out, "Status: {}", status)?;
                writeln!(out, "X-Status: {}", x_status)?;
                out.write_all(b"\n")?;
                in_headers = false;
                continue;
            }
            let continuation = line.first().is_some_and(|b| *b == b' ' || *b == b'\t');
            if !continuation {
                skipping_header = is_status_header(line);
            }
            if skipping_header {
                continue;
            }
            out.write_all(line)?;
            out.write_all(b"\n")?;
            continue;
        }

        if line.starts_with(b"From ") {
            out.write_all(b">")?;
        }
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }

    if in_headers {
        // Header-only message.
        let (status, x_status) = status_headers(flags, in_cur);
        writeln!(out, "Status: {}", status)?;
        writeln!(out, "X-Status: {}", x_status)?;
        out.write_all(b"\n")?;
    }
    out.write_all(b"\n")?;
    Ok(())
}
