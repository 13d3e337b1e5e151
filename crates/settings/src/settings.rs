//! Configuration system for ptyprobe.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
pub mod file;

pub use file::{
    config_path, ensure_config_file, ensure_config_file_at, load_config, load_config_from,
    Config, ParserConfig, TimingConfig,
};
