//! Environment file parsing for the function's environment variables
//!
//! The file holds `KEY=VALUE` lines that are forwarded into the Lambda
//! environment. A handful of keys are owned by the deployment itself (or by
//! the Lambda runtime) and are never forwarded, whatever the file says.

use crate::error::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Keys dropped from every forwarded environment
pub const RESERVED_KEYS: [&str; 4] = [
    "AWS_REGION",
    "AWS_ACCOUNT_ID",
    "AWS_LAMBDA_FUNCTION_NAME",
    "BOOKING_DATE",
];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Environment variables to set on the function, reserved keys excluded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionEnvironment {
    vars: BTreeMap<String, String>,
}

impl FunctionEnvironment {
    /// Parse the contents of an environment file.
    ///
    /// Blank lines and `#` comments are skipped and an `export ` prefix is
    /// allowed. The value is everything after the first `=`, with one pair
    /// of matching surrounding quotes removed.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut env = Self::default();

        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidEnvLine {
                    line: line_no,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::EmptyEnvKey { line: line_no });
            }
            env.insert(key, unquote(value));
        }

        Ok(env)
    }

    /// Load an environment file, returning `None` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::io(path.display().to_string(), e)),
        }
    }

    /// Load an environment file that must exist
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path)?.ok_or_else(|| ConfigError::EnvFileMissing {
            path: path.display().to_string(),
        })
    }

    /// Build from key/value pairs, dropping reserved keys
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut env = Self::default();
        for (key, value) in pairs {
            env.insert(key.as_ref(), value.into());
        }
        env
    }

    /// Insert a variable; reserved keys are ignored. Returns whether the
    /// variable was kept.
    pub fn insert(&mut self, key: &str, value: String) -> bool {
        if is_reserved(key) {
            debug!(key = %key, "Dropping reserved environment variable");
            return false;
        }
        self.vars.insert(key.to_string(), value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy into the map shape the Lambda SDK takes
    pub fn to_hash_map(&self) -> HashMap<String, String> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_pairs() {
        let env = FunctionEnvironment::parse("MAIL_USER=me@example.com\nPLATE_NUMBER=AB123\n").unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("MAIL_USER"), Some("me@example.com"));
        assert_eq!(env.get("PLATE_NUMBER"), Some("AB123"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let contents = "# credentials\n\n   \nPASSWORD_PARKING=secret\n  # trailing comment\n";
        let env = FunctionEnvironment::parse(contents).unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("PASSWORD_PARKING"), Some("secret"));
    }

    #[test]
    fn test_value_kept_verbatim_after_first_equals() {
        let env = FunctionEnvironment::parse("BASE_URL=https://host/login?a=b&c=d").unwrap();
        assert_eq!(env.get("BASE_URL"), Some("https://host/login?a=b&c=d"));

        let env = FunctionEnvironment::parse("EMPTY=").unwrap();
        assert_eq!(env.get("EMPTY"), Some(""));
    }

    #[test]
    fn test_export_prefix_and_quotes() {
        let env =
            FunctionEnvironment::parse("export A=\"quoted value\"\nB='single'\nC=\"unbalanced'\n")
                .unwrap();
        assert_eq!(env.get("A"), Some("quoted value"));
        assert_eq!(env.get("B"), Some("single"));
        assert_eq!(env.get("C"), Some("\"unbalanced'"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let env = FunctionEnvironment::parse("A=1\r\nB=2\r\n").unwrap();
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("2"));
    }

    #[test]
    fn test_reserved_keys_never_forwarded() {
        let contents = "AWS_REGION=us-east-1\nAWS_ACCOUNT_ID=1\nAWS_LAMBDA_FUNCTION_NAME=x\nBOOKING_DATE=2025-01-01\nMAIL_USER=me\n";
        let env = FunctionEnvironment::parse(contents).unwrap();
        assert_eq!(env.len(), 1);
        for key in RESERVED_KEYS {
            assert!(env.get(key).is_none(), "{key} must be filtered");
            assert!(!env.to_hash_map().contains_key(key));
        }
    }

    #[test]
    fn test_reserved_match_is_exact() {
        let env = FunctionEnvironment::parse("AWS_REGION_OVERRIDE=a\naws_region=b\n").unwrap();
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_from_pairs_filters_reserved() {
        let env = FunctionEnvironment::from_pairs([("BOOKING_DATE", "2025-01-01"), ("A", "1")]);
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("A"), Some("1"));
    }

    #[test]
    fn test_invalid_lines() {
        let err = FunctionEnvironment::parse("A=1\nnot a pair\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvLine { line: 2, .. }));

        let err = FunctionEnvironment::parse("=value\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyEnvKey { line: 1 }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        assert!(FunctionEnvironment::load(&path).unwrap().is_none());

        let err = FunctionEnvironment::load_required(&path).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFileMissing { .. }));
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "MAIL_USER=me\nBOOKING_DATE=2025-03-03\n").unwrap();

        let env = FunctionEnvironment::load_required(&path).unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("MAIL_USER"), Some("me"));
    }
}
