//! Command list cleanup before dispatch.

use std::io::BufRead;

/// Lines starting with this marker are comments and never sent to a device.
pub const COMMENT_MARKER: char = '#';

/// Trims a raw command line and strips terminal EOF control characters.
fn clean_line(line: &str) -> String {
    line.trim_matches(|c: char| c == '\r' || c == '\n' || c == ' ')
        .replace(['\u{4}', '\u{1a}'], "")
}

/// Drops empty and comment lines, trimming the rest.
pub fn sanitize_commands<I, S>(commands: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    commands
        .into_iter()
        .map(|command| clean_line(command.as_ref()))
        .filter(|command| !command.is_empty() && !command.starts_with(COMMENT_MARKER))
        .collect()
}

/// Reads a command list, one command per line, from any reader (e.g. stdin).
pub fn read_commands<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
    Ok(sanitize_commands(lines))
}
