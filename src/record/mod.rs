//! Published records.
//!
//! A [`RecordHandle`] is the shared identity of one published channel: its
//! current value, its optional [`WriteCallback`] and its opaque
//! [`AccessAttrs`]. Handles are cheap to clone; the registry, the serving
//! runtime and any in-flight callback dispatch each hold their own clone, so a
//! record removed from the registry stays valid for whoever still holds it.

mod callback;
mod record_handle;


pub use callback::*;
pub use record_handle::*;

use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;

/// Name under which a record is addressable by remote clients
pub type ChannelName = String;

/// Bound for record payloads.
pub trait RecordValue: Clone + Debug + Send + Sync + 'static {}

impl<T> RecordValue for T where T: Clone + Debug + Send + Sync + 'static {}

/// Access-security attributes, forwarded untouched to the serving runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAttrs {
    pub level: i32,
    pub group: String,
}

impl AccessAttrs {
    pub fn new(
        level: i32,
        group: impl Into<String>,
    ) -> Self {
        Self {
            level,
            group: group.into(),
        }
    }
}
