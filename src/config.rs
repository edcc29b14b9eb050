use std::{env, fmt, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::GpioError;

pub const CONFIG_ENV: &str = "GPIOX_CONFIG";

pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";
pub const OUTPUT_PIN: u32 = 20;
pub const INPUT_PIN: u32 = 21;
pub const DEBOUNCE_MICROS: u32 = 10 * 1000;
pub const DELAY_WHEN_HIGH_MS: u64 = 3000;
pub const DELAY_WHEN_LOW_MS: u64 = 1000;

#[derive(Debug, Hash, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PinMode {
    Output,
    OutputSource,
    OutputSink,
    InputPullUp,
    InputPullDown,
    InputFloating,
}

impl PinMode {
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            PinMode::Output | PinMode::OutputSource | PinMode::OutputSink
        )
    }

    pub fn is_input(&self) -> bool {
        !self.is_output()
    }

    /// Pull-up inputs and sink outputs report the logical level, so a grounded
    /// pull-up line reads `true`.
    pub fn is_active_low(&self) -> bool {
        matches!(self, PinMode::InputPullUp | PinMode::OutputSink)
    }
}

impl TryFrom<u32> for PinMode {
    type Error = GpioError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PinMode::InputFloating),
            1 => Ok(PinMode::InputPullDown),
            2 => Ok(PinMode::InputPullUp),
            3 => Ok(PinMode::Output),
            4 => Ok(PinMode::OutputSource),
            5 => Ok(PinMode::OutputSink),
            _ => Err(GpioError::InvalidMode(format!("unknown mode code {code}"))),
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinMode::Output => "output",
            PinMode::OutputSource => "output-source",
            PinMode::OutputSink => "output-sink",
            PinMode::InputPullUp => "input-pull-up",
            PinMode::InputPullDown => "input-pull-down",
            PinMode::InputFloating => "input-floating",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDrive {
    PushPull,
    OpenSource,
    OpenDrain,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InputBias {
    PullUp,
    PullDown,
    Floating,
}

/// How a line is claimed. Outputs carry their initial level, inputs their
/// debounce period.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LineConfig {
    Output {
        drive: OutputDrive,
        initial_value: bool,
    },
    Input {
        bias: InputBias,
        debounce_micros: u32,
    },
}

impl LineConfig {
    pub fn output(initial_value: bool) -> Self {
        LineConfig::Output {
            drive: OutputDrive::PushPull,
            initial_value,
        }
    }

    pub fn input(bias: InputBias, debounce_micros: u32) -> Self {
        LineConfig::Input {
            bias,
            debounce_micros,
        }
    }

    /// Builds a config from a numeric mode code and its mode-dependent
    /// parameter: output level for outputs, debounce micros for inputs.
    pub fn from_raw(mode_code: u32, param: u32) -> Result<Self, GpioError> {
        Ok(Self::from_mode(PinMode::try_from(mode_code)?, param))
    }

    pub fn from_mode(mode: PinMode, param: u32) -> Self {
        let level = param > 0;
        match mode {
            PinMode::Output => LineConfig::output(level),
            // open source lines always start in high impedance
            PinMode::OutputSource => LineConfig::Output {
                drive: OutputDrive::OpenSource,
                initial_value: false,
            },
            PinMode::OutputSink => LineConfig::Output {
                drive: OutputDrive::OpenDrain,
                initial_value: level,
            },
            PinMode::InputPullUp => LineConfig::input(InputBias::PullUp, param),
            PinMode::InputPullDown => LineConfig::input(InputBias::PullDown, param),
            PinMode::InputFloating => LineConfig::input(InputBias::Floating, param),
        }
    }

    pub fn mode(&self) -> PinMode {
        match self {
            LineConfig::Output { drive, .. } => match drive {
                OutputDrive::PushPull => PinMode::Output,
                OutputDrive::OpenSource => PinMode::OutputSource,
                OutputDrive::OpenDrain => PinMode::OutputSink,
            },
            LineConfig::Input { bias, .. } => match bias {
                InputBias::PullUp => PinMode::InputPullUp,
                InputBias::PullDown => PinMode::InputPullDown,
                InputBias::Floating => PinMode::InputFloating,
            },
        }
    }

    pub fn debounce_micros(&self) -> u32 {
        match self {
            LineConfig::Output { .. } => 0,
            LineConfig::Input {
                debounce_micros, ..
            } => *debounce_micros,
        }
    }

    pub fn initial_value(&self) -> Option<bool> {
        match self {
            LineConfig::Output { initial_value, .. } => Some(*initial_value),
            LineConfig::Input { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub chip: String,
    pub output_pin: u32,
    pub input_pin: u32,
    pub output_initial_value: bool,
    pub input_bias: InputBias,
    pub debounce_micros: u32,
    pub delay_when_high_ms: u64,
    pub delay_when_low_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chip: DEFAULT_CHIP.to_string(),
            output_pin: OUTPUT_PIN,
            input_pin: INPUT_PIN,
            output_initial_value: true,
            input_bias: InputBias::PullUp,
            debounce_micros: DEBOUNCE_MICROS,
            delay_when_high_ms: DELAY_WHEN_HIGH_MS,
            delay_when_low_ms: DELAY_WHEN_LOW_MS,
        }
    }
}

impl AppConfig {
    /// Built-in constants, overridden by the JSON file named in `GPIOX_CONFIG`.
    pub fn load() -> Result<Self, GpioError> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GpioError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| GpioError::Config(format!("Failed to read config: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| GpioError::Config(format!("Invalid config json: {e}")))
    }

    pub fn output_config(&self) -> LineConfig {
        LineConfig::output(self.output_initial_value)
    }

    pub fn input_config(&self) -> LineConfig {
        LineConfig::input(self.input_bias, self.debounce_micros)
    }

    pub fn delay_for(&self, input_level: bool) -> Duration {
        Duration::from_millis(if input_level {
            self.delay_when_high_ms
        } else {
            self.delay_when_low_ms
        })
    }
}
