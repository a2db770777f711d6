//! Command transmission.

use super::SerialLink;
use std::borrow::Cow;
use std::io;

/// Terminator expected by the firmware's command parser.
pub const LINE_TERMINATOR: char = '\n';

/// Appends a single `\n` unless the command already ends with one.
pub fn normalize_command(command: &str) -> Cow<'_, str> {
    if command.ends_with(LINE_TERMINATOR) {
        Cow::Borrowed(command)
    } else {
        Cow::Owned(format!("{}{}", command, LINE_TERMINATOR))
    }
}

/// Writes one normalized command and flushes it onto the wire.
///
/// Returns the number of bytes sent.
pub fn send_command(link: &mut dyn SerialLink, command: &str) -> io::Result<usize> {
    let line = normalize_command(command);
    link.write_all(line.as_bytes())?;
    link.flush()?;
    Ok(line.len())
}
