//! Vatio - per-function energy and runtime attribution
//!
//! This library turns sampled call stacks and a power-rail log recorded
//! alongside them into per-function estimates of runtime and energy, each
//! with a confidence interval. Registries from independent runs can be
//! summed, stored and compared between two conditions with a two-sample
//! test.

pub mod aggregate;
pub mod attribution;
pub mod batch;
pub mod cli;
pub mod comparison;
pub mod config;
pub mod correlator;
pub mod csv_output;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod json_output;
pub mod power;
pub mod stats;
pub mod store;
pub mod summary;
pub mod time_unit;
pub mod trace_reader;

pub use error::{Result, VatioError};
