//! Shared pipeline for the COMDAT and DWARF object-file scanners.
//!
//! This crate holds everything both command-line tools have in common: the
//! streaming MD5 primitive, the LEB128 encoders, the rolling-ETA progress
//! reporter, the path walker and work queue, the worker-pool driver, the
//! process-lifetime scratch directory, and the object-file provider backed
//! by `object` and `gimli`. The two binary crates (`comdat-count` and
//! `debug-types`) each own their engine-specific aggregation logic and wire
//! these pieces together.

pub mod cli;
pub mod error;
pub mod leb128;
pub mod md5;
pub mod progress;
pub mod provider;
pub mod tempdir;
pub mod walk;
pub mod workers;
pub mod workitem;

pub use error::ScanError;
pub use workitem::WorkItem;
