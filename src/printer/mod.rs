//! # Printer Configuration
//!
//! - [`config`]: validated printer, serial and server options

pub mod config;

pub use config::{
    Config, ConfigError, HeatSettings, ModemLine, PrinterConfig, SerialConfig, ServerConfig,
    load_config, parse_config,
};
