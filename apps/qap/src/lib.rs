//! # qap - THE BINARY
//!
//! Application layer of the QAP document registry: the HTTP JSON API, the
//! CLI, TOML configuration and CSV framing. All document logic lives in
//! `qap-core`; this crate is thin glue that maps requests, flags and CSV
//! rows onto core calls.

pub mod api;
pub mod cli;
pub mod config;
pub mod csv;
