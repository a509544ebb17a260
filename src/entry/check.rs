//! Check entries built from `check = ...` specifications

use serde::Serialize;

use super::tokenize::{remove_quotes, tokenize};
use crate::error::MrpeError;
use crate::markers::{file_name, Markers};

/// Cache control parsed from a `(<max_age>:yes|no)` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CachingPolicy {
    /// Seconds a captured result stays fresh
    pub max_age: u64,
    /// Append ` (<age>;<max_age>)` to cached output
    pub add_age: bool,
}

/// One external check to execute and report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEntry {
    /// Identity to run as; empty means the agent's own identity
    pub user: String,
    pub description: String,
    /// Resolved executable path
    pub exe_path: String,
    /// File name of the executable, reported in parentheses
    pub exe_name: String,
    pub args: Vec<String>,
    /// Executable path followed by the arguments, single-space separated
    pub command_line: String,
    pub caching: Option<CachingPolicy>,
}

impl CheckEntry {
    /// Parse a check specification such as
    /// `Codepage (3600:yes) 'c:\windows\system32\chcp.com' x d f`.
    pub fn parse(user: &str, raw: &str, markers: &Markers) -> Result<Self, MrpeError> {
        let malformed = |reason: &str| MrpeError::MalformedCheckSpec {
            line: raw.to_string(),
            reason: reason.to_string(),
        };

        let tokens = tokenize(raw);
        if tokens.len() < 2 {
            return Err(malformed("expected a description and an executable"));
        }

        let caching = parse_caching_token(&tokens[1]);
        let exe_pos = if caching.is_some() { 2 } else { 1 };

        let exe_token = tokens
            .get(exe_pos)
            .ok_or_else(|| malformed("missing executable after cache token"))?;
        if exe_token.chars().count() <= 2 {
            return Err(malformed("executable name is too short"));
        }

        let exe_path = markers.resolve(remove_quotes(&markers.replace(exe_token)));
        let exe_name = file_name(&exe_path).to_string();
        let args: Vec<String> = tokens[exe_pos + 1..].to_vec();

        let command_line = if args.is_empty() {
            exe_path.clone()
        } else {
            format!("{} {}", exe_path, args.join(" "))
        };

        Ok(Self {
            user: user.to_string(),
            description: tokens[0].clone(),
            exe_path,
            exe_name,
            args,
            command_line,
            caching,
        })
    }

    /// The `(<exe_name>) <description> ` prefix of every report line.
    pub fn line_prefix(&self) -> String {
        format!("({}) {} ", self.exe_name, self.description)
    }
}

/// Parse `(<digits>:yes)` or `(<digits>:no)`.
fn parse_caching_token(token: &str) -> Option<CachingPolicy> {
    let inner = token.strip_prefix('(')?.strip_suffix(')')?;
    let (age, flag) = inner.split_once(':')?;
    if age.is_empty() || !age.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let add_age = match flag {
        "yes" => true,
        "no" => false,
        _ => return None,
    };
    let max_age = age.parse().ok()?;
    Some(CachingPolicy { max_age, add_age })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Markers {
        Markers::new("/opt/agent")
    }

    #[test]
    fn test_parse_without_caching() {
        let entry =
            CheckEntry::parse("", r"Codepage 'c:\windows\system32\chcp.com' x d f", &markers())
                .unwrap();
        assert_eq!(entry.description, "Codepage");
        assert_eq!(entry.exe_name, "chcp.com");
        assert_eq!(entry.exe_path, r"c:\windows\system32\chcp.com");
        assert_eq!(entry.command_line, r"c:\windows\system32\chcp.com x d f");
        assert_eq!(entry.args, vec!["x", "d", "f"]);
        assert!(entry.caching.is_none());
        assert!(entry.user.is_empty());
    }

    #[test]
    fn test_parse_with_caching() {
        let entry = CheckEntry::parse(
            "",
            r"Codepage (123456:yes) 'c:\windows\system32\chcp.com' x d f",
            &markers(),
        )
        .unwrap();
        assert_eq!(entry.description, "Codepage");
        assert_eq!(entry.exe_name, "chcp.com");
        assert!(entry.command_line.ends_with(" x d f"));
        assert_eq!(
            entry.caching,
            Some(CachingPolicy {
                max_age: 123456,
                add_age: true
            })
        );
    }

    #[test]
    fn test_caching_without_age_suffix() {
        let entry = CheckEntry::parse("", "Time (10:no) /bin/date", &markers()).unwrap();
        assert_eq!(
            entry.caching,
            Some(CachingPolicy {
                max_age: 10,
                add_age: false
            })
        );
        assert_eq!(entry.command_line, "/bin/date");
    }

    #[test]
    fn test_relative_executable_resolves_against_base() {
        let entry = CheckEntry::parse("sk", "BadFile 'sss.bat'", &markers()).unwrap();
        assert_eq!(entry.exe_path, "/opt/agent/sss.bat");
        assert_eq!(entry.command_line, "/opt/agent/sss.bat");
        assert_eq!(entry.exe_name, "sss.bat");
        assert_eq!(entry.user, "sk");
    }

    #[test]
    fn test_markers_in_executable() {
        let entry =
            CheckEntry::parse("", "Local $CUSTOM_LOCAL_PATH$/check.sh -w 1", &markers()).unwrap();
        assert_eq!(entry.exe_path, "/opt/agent/local/check.sh");
        assert_eq!(entry.command_line, "/opt/agent/local/check.sh -w 1");
    }

    #[test]
    fn test_quoted_description() {
        let entry = CheckEntry::parse("", "'Disk usage' /bin/df -h", &markers()).unwrap();
        assert_eq!(entry.description, "Disk usage");
        assert_eq!(entry.line_prefix(), "(df) Disk usage ");
    }

    #[test]
    fn test_apostrophe_stays_in_argument() {
        let entry = CheckEntry::parse("", "Msg /bin/echo don't stop", &markers()).unwrap();
        assert_eq!(entry.args, vec!["don't", "stop"]);
        assert_eq!(entry.command_line, "/bin/echo don't stop");
    }

    #[test]
    fn test_too_few_tokens() {
        let err = CheckEntry::parse("", "Lonely", &markers()).unwrap_err();
        assert!(matches!(err, MrpeError::MalformedCheckSpec { .. }));
    }

    #[test]
    fn test_short_executable() {
        let err = CheckEntry::parse("", "Short ab", &markers()).unwrap_err();
        assert!(matches!(err, MrpeError::MalformedCheckSpec { .. }));
        assert!(CheckEntry::parse("", "Ok abc", &markers()).is_ok());
    }

    #[test]
    fn test_cache_token_without_executable() {
        let err = CheckEntry::parse("", "Cached (10:yes)", &markers()).unwrap_err();
        assert!(matches!(err, MrpeError::MalformedCheckSpec { .. }));
    }

    #[test]
    fn test_invalid_cache_tokens_are_executables() {
        assert!(parse_caching_token("(10:maybe)").is_none());
        assert!(parse_caching_token("(abc:yes)").is_none());
        assert!(parse_caching_token("(-5:yes)").is_none());
        assert!(parse_caching_token("(:yes)").is_none());
        assert!(parse_caching_token("10:yes").is_none());

        let entry = CheckEntry::parse("", "Odd (10:maybe) arg", &markers()).unwrap();
        assert!(entry.caching.is_none());
        assert_eq!(entry.exe_name, "(10:maybe)");
    }
}
