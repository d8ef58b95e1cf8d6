//! Flat `key=value` property files.
//!
//! The format is the classic Java one: `#` or `!` start a comment line, the
//! key ends at the first unescaped `=`, `:` or whitespace, a trailing
//! backslash continues the logical line, and `\t`, `\n`, `\r`, `\f` and
//! `\uXXXX` escapes are understood. Any other escaped character stands for
//! itself.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::ConfigError;

/// An ordered set of string properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse property file content. Later duplicates win.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PropertySyntax` for a malformed `\u` escape.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut properties = Self::new();
        let mut lines = content.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let first = line.trim_start();
            if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
                continue;
            }

            let line_number = index + 1;
            let mut logical = String::new();
            let mut current = first;
            loop {
                if !continues(current) {
                    logical.push_str(current);
                    break;
                }
                logical.push_str(&current[..current.len() - 1]);
                match lines.next() {
                    Some((_, next)) => current = next.trim_start(),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical, line_number)?;
            properties.entries.insert(key, value);
        }

        Ok(properties)
    }

    /// Read and parse a property file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable or malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        Self::parse(&content)
    }

    /// Raw value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Trimmed value of a key, `None` when absent or blank.
    pub fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Set a key, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove a key.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Overlay another property set; its values win.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// An odd number of trailing backslashes continues the line.
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn split_entry(line: &str, line_number: usize) -> Result<(String, String), ConfigError> {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(|c: char| c == '=' || c == ':') {
        rest = stripped.trim_start_matches(is_blank);
    }

    Ok((
        unescape(&line[..key_end], line_number)?,
        unescape(rest, line_number)?,
    ))
}

fn unescape(raw: &str, line_number: usize) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ConfigError::property_syntax(line_number, format!("bad unicode escape \\u{hex}"))
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators() {
        let props = Properties::parse("a=1\nb: 2\nc 3\nd = 4\ne\n").unwrap();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
        assert_eq!(props.get("c"), Some("3"));
        assert_eq!(props.get("d"), Some("4"));
        assert_eq!(props.get("e"), Some(""));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let props = Properties::parse("# comment\n  ! also comment\n\n   \nkey=value\n").unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("key"), Some("value"));
    }

    #[test]
    fn test_value_keeps_separators_and_trailing_space() {
        let props = Properties::parse("searchFilter=(uid=%s)\nurl = ldap://dir:389 \n").unwrap();
        assert_eq!(props.get("searchFilter"), Some("(uid=%s)"));
        assert_eq!(props.get("url"), Some("ldap://dir:389 "));
        assert_eq!(props.get_trimmed("url"), Some("ldap://dir:389"));
    }

    #[test]
    fn test_line_continuation() {
        let props = Properties::parse(
            "searchBaseDn=ou=people,dc=example,dc=com;\\\n    ou=services,dc=example,dc=com\n",
        )
        .unwrap();
        assert_eq!(
            props.get("searchBaseDn"),
            Some("ou=people,dc=example,dc=com;ou=services,dc=example,dc=com")
        );
    }

    #[test]
    fn test_escaped_backslash_does_not_continue() {
        let props = Properties::parse("path=C:\\\\\nnext=1\n").unwrap();
        assert_eq!(props.get("path"), Some("C:\\"));
        assert_eq!(props.get("next"), Some("1"));
    }

    #[test]
    fn test_escapes() {
        let props = Properties::parse("my\\ key=a\\tb\\u0041\\=\n").unwrap();
        assert_eq!(props.get("my key"), Some("a\tbA="));
    }

    #[test]
    fn test_bad_unicode_escape() {
        let err = Properties::parse("ok=1\nbad=\\u00zz\n").unwrap_err();
        assert!(matches!(err, ConfigError::PropertySyntax { line: 2, .. }));
    }

    #[test]
    fn test_later_duplicates_win() {
        let props = Properties::parse("a=1\na=2\n").unwrap();
        assert_eq!(props.get("a"), Some("2"));
    }

    #[test]
    fn test_merge() {
        let mut base: Properties = [("a", "1"), ("b", "2")].into_iter().collect();
        base.merge(Properties::new().with("b", "3"));
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("3"));
    }
}
