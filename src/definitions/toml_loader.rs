use std::collections::HashSet;
use std::fs;
use std::path::Path;

use config::Config;
use config::File;
use config::FileFormat;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::DefinitionLoader;
use super::RecordDefinition;
use super::Substitutions;
use crate::AccessAttrs;
use crate::DefinitionError;
use crate::RecordValue;
use crate::Result;

/// Loads record definitions from a TOML file.
///
/// ```toml
/// [[records]]
/// name = "$(P)counter"
/// value = 0
/// access_level = 1
/// access_group = "ops"
/// ```
///
/// Macros are expanded line by line over the raw text before parsing, so
/// they may appear in names as well as in values. Whole-line `#` comments
/// are left unexpanded; a trailing comment after a value is still expanded.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlDefinitionLoader;

#[derive(Deserialize)]
#[serde(bound(deserialize = "V: DeserializeOwned"))]
struct DefinitionFile<V> {
    #[serde(default)]
    records: Vec<RawRecord<V>>,
}

#[derive(Deserialize)]
struct RawRecord<V> {
    name: String,
    value: V,
    access_level: Option<i32>,
    access_group: Option<String>,
}

impl TomlDefinitionLoader {
    /// Parses definitions from already expanded TOML text.
    pub fn parse_str<V>(text: &str) -> Result<Vec<RecordDefinition<V>>>
    where
        V: RecordValue + DeserializeOwned,
    {
        let file: DefinitionFile<V> = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(DefinitionError::Parse)?;

        let mut seen = HashSet::new();
        let mut definitions = Vec::with_capacity(file.records.len());
        for raw in file.records {
            if !seen.insert(raw.name.clone()) {
                return Err(DefinitionError::DuplicateChannel(raw.name).into());
            }

            let access = match (raw.access_level, raw.access_group) {
                (Some(level), Some(group)) => Some(AccessAttrs::new(level, group)),
                (None, None) => None,
                _ => {
                    return Err(DefinitionError::IncompleteAccessAttrs { channel: raw.name }.into());
                }
            };

            definitions.push(RecordDefinition {
                name: raw.name,
                value: raw.value,
                access,
            });
        }
        Ok(definitions)
    }
}

impl<V> DefinitionLoader<V> for TomlDefinitionLoader
where
    V: RecordValue + DeserializeOwned,
{
    fn load(
        &self,
        path: &Path,
        substitutions: &Substitutions,
    ) -> Result<Vec<RecordDefinition<V>>> {
        let raw = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let expanded = expand_outside_comments(substitutions, &raw)?;

        let definitions = Self::parse_str(&expanded)?;
        debug!(
            path = %path.display(),
            records = definitions.len(),
            "Loaded record definitions"
        );
        Ok(definitions)
    }
}

fn expand_outside_comments(
    substitutions: &Substitutions,
    raw: &str,
) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    for line in raw.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            out.push_str(line);
        } else {
            out.push_str(&substitutions.expand(line)?);
        }
    }
    Ok(out)
}
