//! `KEY=VALUE` overrides given on the command line.

use std::sync::LazyLock;

use regex::Regex;

use super::EnvError;

/// Override value that removes a key instead of setting it.
pub const UNSET: &str = "UNSET";

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Whether `key` is a valid configuration key name.
pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

/// A single command-line override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    Set { key: String, value: String },
    Unset { key: String },
}

impl Override {
    /// Parse `KEY=VALUE`. The value is kept verbatim and may contain `=`.
    pub fn parse(entry: &str) -> Result<Self, EnvError> {
        let malformed = || EnvError::MalformedOverride {
            entry: entry.to_string(),
        };

        let (key, value) = entry.split_once('=').ok_or_else(malformed)?;
        if !is_valid_key(key) {
            return Err(malformed());
        }

        let key = key.to_string();
        if value == UNSET {
            Ok(Override::Unset { key })
        } else {
            Ok(Override::Set {
                key,
                value: value.to_string(),
            })
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Override::Set { key, .. } | Override::Unset { key } => key,
        }
    }
}

/// Parse every trailing override, failing on the first malformed one.
pub fn parse_overrides<I, S>(entries: I) -> Result<Vec<Override>, EnvError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|e| Override::parse(e.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Override::parse("CC=/usr/bin/clang").unwrap(),
            Override::Set {
                key: "CC".to_string(),
                value: "/usr/bin/clang".to_string()
            }
        );
    }

    #[test]
    fn test_value_may_contain_equals_and_be_empty() {
        assert_eq!(
            Override::parse("CFLAGS=-DX=1").unwrap(),
            Override::Set {
                key: "CFLAGS".to_string(),
                value: "-DX=1".to_string()
            }
        );
        assert_eq!(
            Override::parse("_EMPTY=").unwrap(),
            Override::Set {
                key: "_EMPTY".to_string(),
                value: String::new()
            }
        );
    }

    #[test]
    fn test_unset_sentinel() {
        let o = Override::parse("DOXYGEN_EXECUTABLE=UNSET").unwrap();
        assert_eq!(
            o,
            Override::Unset {
                key: "DOXYGEN_EXECUTABLE".to_string()
            }
        );
        assert_eq!(o.key(), "DOXYGEN_EXECUTABLE");
    }

    #[test]
    fn test_malformed_entries() {
        for bad in ["NOEQUALS", "1KEY=x", "BAD-KEY=x", "=value", " KEY=x"] {
            assert!(
                matches!(
                    Override::parse(bad),
                    Err(EnvError::MalformedOverride { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_overrides_stops_on_error() {
        let err = parse_overrides(["A=1", "oops", "B=2"]).unwrap_err();
        assert!(err.to_string().contains("`oops`"));
    }
}
