//! Configuration and file layout for review-fs
//!
//! This crate provides:
//! - Configuration file loading (TOML) with serde defaults
//! - The on-disk layout mapping containers to mirror directories

pub mod config;
pub mod layout;

pub use config::{load_config_file, ReviewConfig};
pub use layout::Layout;
