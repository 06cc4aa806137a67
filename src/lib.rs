#![deny(clippy::all)]
#![deny(clippy::pedantic)]
// Allow some overly strict pedantic lints for middleware code
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! School API request pipeline
//!
//! An HTTP service whose resource routes sit behind a fixed chain of
//! cross-cutting middleware: origin control, compression, security headers,
//! timing, per-client rate limiting and parameter pollution filtering.

pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use presentation::middleware::{compose, Handler, Pipeline, Transformer};
