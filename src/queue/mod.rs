//! Blocking FIFO used to hand channel names from serving threads to the
//! callback worker.
//!
//! The queue carries signals, not payloads: an entry only says "this channel
//! was written", and the consumer re-reads the record when it gets to it.

mod synchronized_queue;


pub use synchronized_queue::*;
