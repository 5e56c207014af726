//! # Printer Configuration
//!
//! Configuration for one thermal printer, its serial link and the HTTP host.
//! Every option is validated once, when the printer is constructed; nothing
//! downstream re-checks these bounds.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [printer]
//! paper_width = 58
//! chars_per_line = 32
//! heat_dots = 7
//! heat_time = 80
//! heat_interval = 2
//! enable_dtr_handshaking = true
//! dtr_pin = "cts"
//! max_queue_size = 10
//! print_delay_ms = 1000
//!
//! [serial]
//! device = "/dev/ttyUSB0"
//! baud_rate = 19200
//!
//! [server]
//! listen = "0.0.0.0:8080"
//! ```
//!
//! ## Heat Intensity
//!
//! ```text
//! intensity = heat_dots * heat_time / heat_interval   (must be <= 800)
//!
//! defaults: 7 * 80 / 2 = 280
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Highest accepted heat intensity
pub const MAX_HEAT_INTENSITY: f32 = 800.0;

/// Baud rates the printers ship with; anything else is allowed but logged
const COMMON_BAUD_RATES: [u32; 3] = [9600, 19200, 38400];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error(
        "heat settings too aggressive (intensity {intensity:.0} > 800): reduce heat_dots ({dots}) or heat_time ({time}), or increase heat_interval ({interval})"
    )]
    HeatTooAggressive {
        intensity: f32,
        dots: u8,
        time: u8,
        interval: u8,
    },
    #[error(
        "chars_per_line ({chars_per_line}) too high for paper_width ({paper_width}mm), recommended maximum {recommended}"
    )]
    CharsPerLineTooHigh {
        chars_per_line: u8,
        paper_width: u8,
        recommended: u32,
    },
    #[error("enable_dtr_handshaking requires dtr_pin")]
    DtrPinMissing,
    #[error("dtr_pin is set but enable_dtr_handshaking is false")]
    DtrPinWithoutHandshake,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn check_range<T: Into<f64> + Copy>(
    field: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<(), ConfigError> {
    let (value, min, max) = (value.into(), min.into(), max.into());
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// ============================================================================
// HEAT SETTINGS
// ============================================================================

/// Print head drive parameters, sent once per session with `ESC 7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatSettings {
    pub dots: u8,
    pub time: u8,
    pub interval: u8,
}

impl HeatSettings {
    /// Validated constructor, used for runtime heat changes.
    ///
    /// ```
    /// use calor::printer::HeatSettings;
    ///
    /// assert!(HeatSettings::new(7, 80, 2).is_ok());
    /// assert!(HeatSettings::new(15, 200, 1).is_err());
    /// ```
    pub fn new(dots: u8, time: u8, interval: u8) -> Result<Self, ConfigError> {
        let heat = Self {
            dots,
            time,
            interval,
        };
        heat.validate()?;
        Ok(heat)
    }

    /// `dots * time / interval`
    pub fn intensity(&self) -> f32 {
        f32::from(self.dots) * f32::from(self.time) / f32::from(self.interval.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("heat_dots", self.dots, 1, 15)?;
        check_range("heat_time", self.time, 50, 200)?;
        check_range("heat_interval", self.interval, 1, 10)?;
        let intensity = self.intensity();
        if intensity > MAX_HEAT_INTENSITY {
            return Err(ConfigError::HeatTooAggressive {
                intensity,
                dots: self.dots,
                time: self.time,
                interval: self.interval,
            });
        }
        Ok(())
    }
}

impl Default for HeatSettings {
    fn default() -> Self {
        Self {
            dots: 7,
            time: 80,
            interval: 2,
        }
    }
}

// ============================================================================
// PRINTER
// ============================================================================

/// Modem-status input the printer's DTR output is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModemLine {
    Cts,
    Dsr,
    Dcd,
    Ri,
}

/// Printer-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Paper width in mm
    pub paper_width: u8,
    /// Small-font characters per line
    pub chars_per_line: u8,
    pub heat_dots: u8,
    pub heat_time: u8,
    pub heat_interval: u8,
    /// Program the printer's idle sleep timer
    pub auto_sleep: bool,
    /// Roll length in mm
    pub paper_roll_length: f32,
    /// Paper advance per printed line, in mm
    pub line_height_calibration: f32,
    pub enable_rotation: bool,
    pub enable_qr_codes: bool,
    pub startup_message: bool,
    pub enable_dtr_handshaking: bool,
    pub dtr_pin: Option<ModemLine>,
    pub enable_queue_system: bool,
    pub max_queue_size: u8,
    pub print_delay_ms: u32,
    pub auto_process_queue: bool,
    pub dtr_timeout_ms: u32,
    pub paper_check_interval_ms: u32,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        let heat = HeatSettings::default();
        Self {
            paper_width: 58,
            chars_per_line: 32,
            heat_dots: heat.dots,
            heat_time: heat.time,
            heat_interval: heat.interval,
            auto_sleep: true,
            paper_roll_length: 30_000.0,
            line_height_calibration: 4.0,
            enable_rotation: true,
            enable_qr_codes: true,
            startup_message: true,
            enable_dtr_handshaking: false,
            dtr_pin: None,
            enable_queue_system: true,
            max_queue_size: 10,
            print_delay_ms: 1000,
            auto_process_queue: true,
            dtr_timeout_ms: 5000,
            paper_check_interval_ms: 10_000,
        }
    }
}

impl PrinterConfig {
    pub fn heat(&self) -> HeatSettings {
        HeatSettings {
            dots: self.heat_dots,
            time: self.heat_time,
            interval: self.heat_interval,
        }
    }

    pub fn print_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.print_delay_ms))
    }

    pub fn dtr_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.dtr_timeout_ms))
    }

    pub fn paper_check_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.paper_check_interval_ms))
    }

    /// Highest plausible `chars_per_line` for the configured paper width.
    pub fn recommended_chars_per_line(&self) -> u32 {
        (f32::from(self.paper_width) / 1.8) as u32
    }

    /// Check every option and cross-option rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("paper_width", self.paper_width, 32, 80)?;
        check_range("chars_per_line", self.chars_per_line, 16, 64)?;
        self.heat().validate()?;
        if !self.paper_roll_length.is_finite() || self.paper_roll_length <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "paper_roll_length",
                value: f64::from(self.paper_roll_length),
                min: f64::MIN_POSITIVE,
                max: f64::from(f32::MAX),
            });
        }
        check_range("line_height_calibration", self.line_height_calibration, 1.0, 10.0)?;
        check_range("max_queue_size", self.max_queue_size, 2, 50)?;
        check_range("print_delay_ms", self.print_delay_ms, 500, 10_000)?;
        check_range("dtr_timeout_ms", self.dtr_timeout_ms, 100, 60_000)?;
        check_range("paper_check_interval_ms", self.paper_check_interval_ms, 1000, 600_000)?;

        let recommended = self.recommended_chars_per_line();
        if f32::from(self.chars_per_line) > recommended as f32 * 1.2 {
            return Err(ConfigError::CharsPerLineTooHigh {
                chars_per_line: self.chars_per_line,
                paper_width: self.paper_width,
                recommended,
            });
        }

        match (self.enable_dtr_handshaking, self.dtr_pin) {
            (true, None) => Err(ConfigError::DtrPinMissing),
            (false, Some(_)) => Err(ConfigError::DtrPinWithoutHandshake),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SERIAL LINK AND HOST
// ============================================================================

/// Serial device the printer is attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
        }
    }
}

/// HTTP server and polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Scheduler tick period
    pub tick_interval_ms: u64,
    /// Where paper usage is persisted across restarts
    pub usage_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            tick_interval_ms: 50,
            usage_file: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.printer.validate()?;
        if !COMMON_BAUD_RATES.contains(&self.serial.baud_rate) {
            warn!(
                baud = self.serial.baud_rate,
                "unusual baud rate for a thermal printer (recommended: 9600 or 19200)"
            );
        }
        check_range("tick_interval_ms", self.server.tick_interval_ms as f64, 1.0, 1000.0)?;
        Ok(())
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        let p = &self.printer;
        info!(
            device = %self.serial.device,
            baud = self.serial.baud_rate,
            paper_width = p.paper_width,
            chars_per_line = p.chars_per_line,
            "thermal printer"
        );
        info!(
            dots = p.heat_dots,
            time = p.heat_time,
            interval = p.heat_interval,
            intensity = p.heat().intensity(),
            "heat"
        );
        info!(
            dtr = p.enable_dtr_handshaking,
            pin = ?p.dtr_pin,
            queue = p.enable_queue_system,
            max_queue_size = p.max_queue_size,
            print_delay_ms = p.print_delay_ms,
            auto_process = p.auto_process_queue,
            "queue"
        );
    }
}

/// Parse configuration from a TOML string and validate it.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load, parse and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)?;
    parse_config(&text)
}

// ============================================================================
// TESTS
// ============================================================================
