//! Include files: plain text lists of `check = ...` lines

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

use super::check::CheckEntry;
use crate::error::MrpeError;
use crate::markers::Markers;

/// True when `path` names an existing regular file that can be opened.
pub fn is_valid_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false) && File::open(path).is_ok()
}

/// Append a [`CheckEntry`] for every valid `check = ...` line in `path`.
///
/// Blank lines and lines starting with `#` or `;` are skipped. Other bad
/// lines are logged and skipped. An unreadable file contributes nothing.
/// Returns the number of entries appended.
pub fn parse_include_file(
    user: &str,
    path: &Path,
    markers: &Markers,
    sink: &mut Vec<CheckEntry>,
) -> usize {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let err = MrpeError::MissingIncludeFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            };
            warn!("{err}");
            return 0;
        }
    };

    let before = sink.len();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let lineno = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("mrpe: stopped reading '{}' at line {lineno}: {e}", path.display());
                break;
            }
        };

        match parse_include_line(user, &line, markers) {
            Ok(Some(entry)) => sink.push(entry),
            Ok(None) => {}
            Err(MrpeError::MalformedCheckSpec { line, reason }) => {
                warn!("mrpe: invalid check '{line}' in '{}:{lineno}': {reason}", path.display());
            }
            Err(_) => {
                let err = MrpeError::MalformedIncludeLine {
                    path: path.to_path_buf(),
                    lineno,
                    line: line.trim().to_string(),
                };
                debug!("mrpe: {err}");
            }
        }
    }

    sink.len() - before
}

/// `Ok(None)` for comments and blank lines.
fn parse_include_line(
    user: &str,
    line: &str,
    markers: &Markers,
) -> Result<Option<CheckEntry>, MrpeError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return Ok(None);
    }

    let strange = || MrpeError::MalformedDirective {
        line: line.to_string(),
        reason: "expected 'check = <spec>'".to_string(),
    };

    let (var, value) = line.split_once('=').ok_or_else(strange)?;
    if !var.trim().eq_ignore_ascii_case("check") {
        return Err(strange());
    }

    CheckEntry::parse(user, value.trim(), markers).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let cfg = write(
            &dir,
            "mrpe_check.cfg",
            "# a\n  ;\n\ncheck = Type '/opt/one.sh'\n\n   CHECK= Type2 /opt/two.sh arg\ncheck = BadFile 'sss.bat'\n",
        );

        let markers = Markers::new("/opt/agent");
        let mut entries = Vec::new();
        let added = parse_include_file("", &cfg, &markers, &mut entries);

        assert_eq!(added, 3);
        assert_eq!(entries[0].command_line, "/opt/one.sh");
        assert_eq!(entries[1].command_line, "/opt/two.sh arg");
        assert_eq!(entries[2].command_line, "/opt/agent/sss.bat");
    }

    #[test]
    fn test_user_is_applied_to_every_entry() {
        let dir = TempDir::new().unwrap();
        let cfg = write(&dir, "u.cfg", "check = A /bin/true\ncheck = B /bin/false\n");

        let mut entries = Vec::new();
        parse_include_file("nagios", &cfg, &Markers::default(), &mut entries);

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.user == "nagios"));
    }

    #[test]
    fn test_strange_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let cfg = write(
            &dir,
            "strange.cfg",
            "no equals sign here\ninclude = other.cfg\ncheck = Lonely\ncheck = Good /bin/true\n",
        );

        let mut entries = Vec::new();
        let added = parse_include_file("", &cfg, &Markers::default(), &mut entries);

        assert_eq!(added, 1);
        assert_eq!(entries[0].description, "Good");
    }

    #[test]
    fn test_entries_are_appended_to_existing_sink() {
        let dir = TempDir::new().unwrap();
        let cfg = write(&dir, "a.cfg", "check = A /bin/true\n");
        let markers = Markers::default();

        let mut entries = vec![CheckEntry::parse("", "First /bin/echo", &markers).unwrap()];
        parse_include_file("", &cfg, &markers, &mut entries);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "First");
        assert_eq!(entries[1].description, "A");
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let mut entries = Vec::new();
        let added = parse_include_file(
            "",
            &dir.path().join("absent.cfg"),
            &Markers::default(),
            &mut entries,
        );
        assert_eq!(added, 0);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_is_valid_regular_file() {
        let dir = TempDir::new().unwrap();
        let file = write(&dir, "x.cfg", "");
        assert!(is_valid_regular_file(&file));
        assert!(!is_valid_regular_file(dir.path()));
        assert!(!is_valid_regular_file(&dir.path().join("nope")));
    }
}
