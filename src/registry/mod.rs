//! Channel registry.
//!
//! Single source of truth for which channels are published. Every mutation
//! updates the map and the serving runtime inside one write-locked section,
//! so no reader ever observes a channel that is registered but not attached
//! (or the reverse).

mod record_registry;


pub use record_registry::*;
