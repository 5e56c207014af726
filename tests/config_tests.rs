//! Configuration files on disk.

use calor::printer::{ConfigError, ModemLine, load_config};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_file_loads() {
    let file = write_config(
        r#"
[printer]
paper_width = 58
chars_per_line = 32
heat_dots = 7
heat_time = 80
heat_interval = 2
enable_dtr_handshaking = true
dtr_pin = "cts"
max_queue_size = 5
print_delay_ms = 2000

[serial]
device = "/dev/ttyAMA0"
baud_rate = 9600

[server]
listen = "0.0.0.0:9100"
tick_interval_ms = 20
usage_file = "/var/lib/calor/usage.json"
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.printer.dtr_pin, Some(ModemLine::Cts));
    assert_eq!(config.printer.max_queue_size, 5);
    assert_eq!(config.printer.print_delay().as_millis(), 2000);
    assert_eq!(config.serial.device, "/dev/ttyAMA0");
    assert_eq!(config.server.listen, "0.0.0.0:9100");
    assert!(config.server.usage_file.is_some());
}

#[test]
fn test_missing_sections_use_defaults() {
    let file = write_config("[serial]\ndevice = \"/dev/ttyS0\"\n");
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.serial.device, "/dev/ttyS0");
    assert_eq!(config.serial.baud_rate, 19200);
    assert_eq!(config.printer.max_queue_size, 10);
    assert_eq!(config.printer.print_delay_ms, 1000);
}

#[test]
fn test_aggressive_heat_rejected() {
    let file = write_config("[printer]\nheat_dots = 15\nheat_time = 200\nheat_interval = 1\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::HeatTooAggressive { .. }), "{err}");
}

#[test]
fn test_print_delay_below_minimum_rejected() {
    let file = write_config("[printer]\nprint_delay_ms = 100\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange {
            field: "print_delay_ms",
            ..
        }
    ));
}

#[test]
fn test_handshake_without_pin_rejected() {
    let file = write_config("[printer]\nenable_dtr_handshaking = true\n");
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::DtrPinMissing)
    ));
}

#[test]
fn test_bad_toml_reported() {
    let file = write_config("[printer\n");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Toml(_))));
}

#[test]
fn test_missing_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
