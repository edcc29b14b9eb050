use thiserror::Error;

use crate::config::PinMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GpioError {
    #[error("Pin {0} is already initialized")]
    AlreadyInitialized(u32),
    #[error("Invalid mode: {0}")]
    InvalidMode(String),
    #[error("Pin {0} is not initialized")]
    NotInitialized(u32),
    #[error("Pin {pin} is configured as {mode}")]
    WrongMode { pin: u32, mode: PinMode },
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("Pin {pin} out of range, chip has {num_lines} lines")]
    InvalidPin { pin: u32, num_lines: u32 },
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
}
