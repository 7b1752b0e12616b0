//! Command-line front end for `quota-io`.
//!
//! The CLI lives in the library so integration tests and other binaries can reuse
//! the argument definitions and the run loop.

pub mod cli;
