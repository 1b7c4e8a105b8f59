//! Declarative record initialization.
//!
//! A definition source describes a set of records (name, initial value and
//! optional access attributes) that the server publishes in one go instead of
//! one `add_record` call at a time. Names and values may contain `$(KEY)` or
//! `${KEY}` macros that are expanded from a [`Substitutions`] map before the
//! definitions are parsed.

mod substitutions;
mod toml_loader;


pub use substitutions::*;
pub use toml_loader::*;

use std::path::Path;

#[cfg(test)]
use mockall::automock;

use crate::AccessAttrs;
use crate::ChannelName;
use crate::RecordValue;
use crate::Result;

/// One record to publish
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDefinition<V> {
    pub name: ChannelName,
    pub value: V,
    pub access: Option<AccessAttrs>,
}

impl<V> RecordDefinition<V> {
    pub fn new(
        name: impl Into<ChannelName>,
        value: V,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            access: None,
        }
    }

    pub fn with_access(
        mut self,
        access: AccessAttrs,
    ) -> Self {
        self.access = Some(access);
        self
    }
}

/// Turns a definition source into records to publish.
#[cfg_attr(test, automock)]
pub trait DefinitionLoader<V: RecordValue>: Send + Sync {
    /// Reads the definitions at `path`, expanding macros from `substitutions`.
    ///
    /// Implementations must either return every definition or fail; partial
    /// results are not allowed.
    fn load(
        &self,
        path: &Path,
        substitutions: &Substitutions,
    ) -> Result<Vec<RecordDefinition<V>>>;
}
