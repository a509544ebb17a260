//! Path marker substitution
//!
//! Check specifications and include paths may refer to agent directories
//! through `$NAME$` markers, e.g. `$CUSTOM_AGENT_PATH$\mrpe_checks.cfg`.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const BUILTIN_AGENT_PATH: &str = "$BUILTIN_AGENT_PATH$";
pub const CUSTOM_AGENT_PATH: &str = "$CUSTOM_AGENT_PATH$";
pub const CUSTOM_PLUGINS_PATH: &str = "$CUSTOM_PLUGINS_PATH$";
pub const CUSTOM_LOCAL_PATH: &str = "$CUSTOM_LOCAL_PATH$";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$(BUILTIN_AGENT_PATH|CUSTOM_AGENT_PATH|CUSTOM_PLUGINS_PATH|CUSTOM_LOCAL_PATH)\$")
            .expect("Invalid regex pattern")
    })
}

/// Directories the markers expand to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Root for relative paths and `$CUSTOM_AGENT_PATH$`
    pub base_dir: PathBuf,
    /// Target of `$BUILTIN_AGENT_PATH$`
    pub builtin_dir: PathBuf,
}

impl Markers {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            builtin_dir: base_dir.clone(),
            base_dir,
        }
    }

    pub fn with_builtin_dir(mut self, builtin_dir: impl Into<PathBuf>) -> Self {
        self.builtin_dir = builtin_dir.into();
        self
    }

    /// Replace every known marker in `text`. Unknown `$...$` sequences are kept.
    pub fn replace(&self, text: &str) -> String {
        marker_regex()
            .replace_all(text, |caps: &Captures| {
                let dir = match caps[1].to_ascii_uppercase().as_str() {
                    "BUILTIN_AGENT_PATH" => self.builtin_dir.clone(),
                    "CUSTOM_AGENT_PATH" => self.base_dir.clone(),
                    "CUSTOM_PLUGINS_PATH" => self.base_dir.join("plugins"),
                    "CUSTOM_LOCAL_PATH" => self.base_dir.join("local"),
                    _ => return caps[0].to_string(),
                };
                dir.to_string_lossy().into_owned()
            })
            .into_owned()
    }

    /// Resolve `path` against the base directory unless it is already absolute.
    ///
    /// Windows style absolute paths (`c:\...`, `\\server\...`) count as
    /// absolute on every platform so that configuration written for either
    /// agent flavour resolves the same way.
    pub fn resolve(&self, path: &str) -> String {
        if is_absolute_spec(path) {
            path.to_string()
        } else {
            join_lossy(&self.base_dir, path)
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(".")
    }
}

fn join_lossy(base: &Path, rel: &str) -> String {
    base.join(rel).to_string_lossy().into_owned()
}

/// True for `/x`, `\x` and drive-letter paths like `c:\x` or `C:/x`.
pub fn is_absolute_spec(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [b'/' | b'\\', ..] => true,
        [drive, b':', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

/// Last component of a path using either separator.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
}
