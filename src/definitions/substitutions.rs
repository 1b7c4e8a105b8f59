use std::collections::HashMap;
use std::str::FromStr;

use crate::DefinitionError;
use crate::Error;
use crate::Result;

/// Macro values applied to a definition source, e.g. `P=LAB:,N=3`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: HashMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma separated `KEY=VALUE` list.
    ///
    /// Whitespace around keys and values is trimmed and empty entries are
    /// skipped. An entry without `=` or with an empty key is rejected.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut subs = Self::new();
        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| DefinitionError::MalformedSubstitution(entry.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(DefinitionError::MalformedSubstitution(entry.to_string()).into());
            }
            subs.insert(key, value.trim());
        }
        Ok(subs)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces every `$(KEY)` and `${KEY}` in `text`.
    ///
    /// A `$` not followed by an opening bracket, or a bracket that is never
    /// closed, is kept as is. Expansion is single pass: values are not
    /// expanded again.
    ///
    /// # Errors
    /// `DefinitionError::UnresolvedMacro` for a key with no value.
    pub fn expand(
        &self,
        text: &str,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let close = match after.chars().next() {
                Some('(') => ')',
                Some('{') => '}',
                _ => {
                    out.push('$');
                    rest = after;
                    continue;
                }
            };
            let Some(end) = after[1..].find(close) else {
                out.push_str(&rest[pos..]);
                rest = "";
                break;
            };

            let key = &after[1..1 + end];
            let value = self.get(key).ok_or_else(|| DefinitionError::UnresolvedMacro {
                name: key.to_string(),
            })?;
            out.push_str(value);
            rest = &after[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl FromStr for Substitutions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<K, V> FromIterator<(K, V)> for Substitutions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut subs = Self::new();
        for (k, v) in iter {
            subs.insert(k, v);
        }
        subs
    }
}
