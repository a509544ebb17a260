//! Parsing of `check = ...` and `include [user] = ...` directives

use serde::Serialize;

use super::tokenize::remove_quotes;
use crate::error::MrpeError;
use crate::markers::Markers;

const INCLUDE_KEYWORD: &str = "include";

/// A reference to a file holding more `check = ...` lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeDirective {
    /// Identity the included checks run as; empty means the agent's own
    pub user: String,
    pub path: String,
}

/// One configuration directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A pending check specification, markers already substituted
    Check(String),
    Include(IncludeDirective),
}

/// Parse one configuration directive.
///
/// ```text
/// check = Console 'c:\windows\system32\mode.com' CON CP /STATUS
/// include sk = $CUSTOM_AGENT_PATH$\mrpe_checks.cfg
/// include = 'mrpe_checks.cfg'
/// ```
pub fn parse_directive_line(raw: &str, markers: &Markers) -> Result<Directive, MrpeError> {
    let malformed = |reason: &str| MrpeError::MalformedDirective {
        line: raw.to_string(),
        reason: reason.to_string(),
    };

    let (raw_key, value) = raw.split_once('=').ok_or_else(|| malformed("missing '='"))?;
    let key = raw_key.trim().to_lowercase();

    if key == "check" {
        let value = value.trim();
        if value.is_empty() {
            return Err(malformed("empty check specification"));
        }
        return Ok(Directive::Check(markers.replace(value)));
    }

    if let Some(rest) = key.strip_prefix(INCLUDE_KEYWORD) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            // Keep the user name's original case
            let user = raw_key
                .trim()
                .get(INCLUDE_KEYWORD.len()..)
                .unwrap_or_default()
                .trim();
            let path = parse_include_path(value, markers)
                .ok_or_else(|| malformed("empty include path"))?;
            return Ok(Directive::Include(IncludeDirective {
                user: user.to_string(),
                path,
            }));
        }
    }

    Err(malformed(&format!("unknown directive type '{key}'")))
}

fn parse_include_path(value: &str, markers: &Markers) -> Option<String> {
    let path = remove_quotes(value.trim()).trim();
    if path.is_empty() {
        return None;
    }
    Some(markers.resolve(&markers.replace(path)))
}
