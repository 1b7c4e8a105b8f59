//! the test_utils folder here will share utils and test components between
//! unit tests
mod common;

pub use common::*;
