// src/lib.rs
//! Keeps Google Sheets tabs in step with local CSV, Parquet and workbook files.
//!
//! Each configured target is loaded from disk ([`loader`]), the matching tab
//! is read back ([`remote`]), and the tab is replaced wholesale only when the
//! two differ ([`synchronizer`]). [`runner`] ties the steps together over a
//! [`config::SyncConfig`].

pub mod cloud_handler;
pub mod config;
pub mod csv_handler;
pub mod data_types;
pub mod encoding;
pub mod error;
pub mod excel_handler;
pub mod loader;
pub mod memory_service;
pub mod parquet_handler;
pub mod remote;
pub mod runner;
pub mod synchronizer;

pub use data_types::{ContentComparison, Dataset, ExactMatch};
pub use error::{Result, SyncError};
