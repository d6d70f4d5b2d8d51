//! Plugin System Tests
//!
//! Load passes against in-memory content stores with script fixtures.

pub mod fixtures;
