//! chairside-core - Core library for Chairside
//!
//! This crate contains the shared models, local durable store, remote API
//! client, and the offline sync engine used by the Chairside interfaces.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Patient, SyncOperation, WriteMethod};
