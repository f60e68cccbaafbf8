//! Vault configuration management for the EDV service.
//!
//! This module provides:
//! - Vault configuration model and request validation
//! - Vault creation, lookup and update with controller checks
//! - Invoker authorization for document access
//!
//! # Architecture
//! The manager sits between the request dispatcher and the document
//! storage: it owns vault configurations and opens a storage partition for
//! every vault it creates.

pub mod config;
pub mod manager;

pub use config::{Authorities, VaultConfig, VaultConfigRequest};
pub use manager::VaultManager;
