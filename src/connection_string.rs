//! ADO-style `key=value;` connection strings.
//!
//! Providers read their options through [`ConnectionStringBuilder`], and the
//! client relies on it to strip credentials before a connection string is
//! logged.

use std::fmt;

use crate::error::SqlClientError;

/// Keys removed from a connection string before it is logged.
pub const CREDENTIAL_KEYS: [&str; 4] = ["Password", "PWD", "UID", "User ID"];

/// Key forced to `False` in a logged connection string.
pub const PERSIST_SECURITY_INFO: &str = "Persist Security Info";

/// Ordered, case-insensitive view over the pairs of a connection string.
///
/// ```rust
/// use sql_facade::connection_string::ConnectionStringBuilder;
///
/// let mut builder = ConnectionStringBuilder::parse("Server=db;Password='p;w'").unwrap();
/// assert_eq!(builder.get("password"), Some("p;w"));
/// builder.remove("PASSWORD");
/// assert_eq!(builder.to_string(), "Server=db");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStringBuilder {
    entries: Vec<(String, String)>,
}

impl ConnectionStringBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string.
    ///
    /// Values may be wrapped in single or double quotes (a doubled quote inside
    /// is a literal quote), and `==` inside a key is a literal `=`. When a key
    /// repeats, the last value wins.
    ///
    /// # Errors
    /// Returns `SqlClientError::ConfigError` for a segment without `=` or an
    /// unterminated quoted value.
    pub fn parse(input: &str) -> Result<Self, SqlClientError> {
        let mut builder = Self::new();
        let chars: Vec<char> = input.chars().collect();
        let mut idx = 0;

        while idx < chars.len() {
            while idx < chars.len() && (chars[idx].is_whitespace() || chars[idx] == ';') {
                idx += 1;
            }
            if idx >= chars.len() {
                break;
            }

            let mut key = String::new();
            loop {
                match chars.get(idx) {
                    Some('=') if chars.get(idx + 1) == Some(&'=') => {
                        key.push('=');
                        idx += 2;
                    }
                    Some('=') => {
                        idx += 1;
                        break;
                    }
                    Some(';') | None => {
                        return Err(SqlClientError::ConfigError(format!(
                            "connection string segment '{}' has no '='",
                            key.trim()
                        )));
                    }
                    Some(c) => {
                        key.push(*c);
                        idx += 1;
                    }
                }
            }

            while idx < chars.len() && chars[idx].is_whitespace() {
                idx += 1;
            }

            let value = match chars.get(idx) {
                Some(&quote) if quote == '"' || quote == '\'' => {
                    idx += 1;
                    let mut value = String::new();
                    loop {
                        match chars.get(idx) {
                            Some(&c) if c == quote && chars.get(idx + 1) == Some(&quote) => {
                                value.push(quote);
                                idx += 2;
                            }
                            Some(&c) if c == quote => {
                                idx += 1;
                                break;
                            }
                            Some(&c) => {
                                value.push(c);
                                idx += 1;
                            }
                            None => {
                                return Err(SqlClientError::ConfigError(format!(
                                    "unterminated quoted value for key '{}'",
                                    key.trim()
                                )));
                            }
                        }
                    }
                    while idx < chars.len() && chars[idx] != ';' {
                        if !chars[idx].is_whitespace() {
                            return Err(SqlClientError::ConfigError(format!(
                                "unexpected text after quoted value for key '{}'",
                                key.trim()
                            )));
                        }
                        idx += 1;
                    }
                    value
                }
                _ => {
                    let start = idx;
                    while idx < chars.len() && chars[idx] != ';' {
                        idx += 1;
                    }
                    chars[start..idx].iter().collect::<String>().trim_end().to_string()
                }
            };

            builder.set(key.trim(), value);
        }

        Ok(builder)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    /// First value present among `keys` (providers accept several spellings).
    #[must_use]
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Set a value, keeping the original position of an existing key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Remove a key; returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strip credentials and force `Persist Security Info=False`.
    pub fn redact(&mut self) {
        for key in CREDENTIAL_KEYS {
            self.remove(key);
        }
        self.set(PERSIST_SECURITY_INFO, "False");
    }

    fn position(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for ConnectionStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}={}", key.replace('=', "=="), quote_value(value))?;
        }
        Ok(())
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.contains(';')
        || value.starts_with('"')
        || value.starts_with('\'')
        || value.trim() != value;
    if !needs_quotes {
        value.to_string()
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs_case_insensitively() {
        let b = ConnectionStringBuilder::parse("Server=localhost,1433; Database = app ;").unwrap();
        assert_eq!(b.get("server"), Some("localhost,1433"));
        assert_eq!(b.get("DATABASE"), Some("app"));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn quoted_values_keep_separators() {
        let b = ConnectionStringBuilder::parse(r#"Password="a;b""c";User ID='x'"#).unwrap();
        assert_eq!(b.get("Password"), Some(r#"a;b"c"#));
        assert_eq!(b.get("user id"), Some("x"));
        let reparsed = ConnectionStringBuilder::parse(&b.to_string()).unwrap();
        assert_eq!(reparsed, b);
    }

    #[test]
    fn doubled_equals_in_key() {
        let b = ConnectionStringBuilder::parse("a==b=1").unwrap();
        assert_eq!(b.get("a=b"), Some("1"));
        assert_eq!(b.to_string(), "a==b=1");
    }

    #[test]
    fn last_duplicate_wins_in_place() {
        let b = ConnectionStringBuilder::parse("A=1;B=2;a=3").unwrap();
        assert_eq!(b.to_string(), "A=3;B=2");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(ConnectionStringBuilder::parse("Server").is_err());
        assert!(ConnectionStringBuilder::parse("Password='abc").is_err());
        assert!(ConnectionStringBuilder::parse("Password='abc' x").is_err());
    }

    #[test]
    fn redact_removes_credentials() {
        let mut b = ConnectionStringBuilder::parse(
            "Server=db;uid=sa;User ID=admin;PWD=secret;password=hunter2;Persist Security Info=True",
        )
        .unwrap();
        b.redact();
        let rendered = b.to_string();
        assert_eq!(rendered, "Server=db;Persist Security Info=False");
    }
}
