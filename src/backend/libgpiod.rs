use std::path::PathBuf;
use std::time::Duration;

use ::libgpiod::{chip::Chip, line, request};
use log::debug;

use crate::config::{InputBias, LineConfig, OutputDrive};
use crate::error::GpioError;
use crate::gpio::{ChipInfo, GpioBackend};

pub struct LibgpiodBackend {
    chip_path: PathBuf,
}

pub struct GpiodLine {
    offset: u32,
    request: request::Request,
}

impl LibgpiodBackend {
    pub fn new(chip_path: &str) -> Result<Self, GpioError> {
        let backend = Self {
            chip_path: PathBuf::from(chip_path),
        };
        // fail early if the chip cannot be opened
        backend.open_chip()?;
        Ok(backend)
    }

    fn open_chip(&self) -> Result<Chip, GpioError> {
        Chip::open(&self.chip_path).map_err(|e| {
            GpioError::HardwareUnavailable(format!("open chip {}: {e}", self.chip_path.display()))
        })
    }

    fn make_line_settings(config: &LineConfig) -> Result<line::Settings, GpioError> {
        let mut ls =
            line::Settings::new().map_err(|e| GpioError::Gpio(format!("libgpiod settings: {e}")))?;

        match *config {
            LineConfig::Output {
                drive,
                initial_value,
            } => {
                ls.set_direction(line::Direction::Output)
                    .map_err(|e| GpioError::Gpio(format!("set direction: {e}")))?;
                let drive = match drive {
                    OutputDrive::PushPull => line::Drive::PushPull,
                    OutputDrive::OpenSource => line::Drive::OpenSource,
                    OutputDrive::OpenDrain => line::Drive::OpenDrain,
                };
                ls.set_drive(drive)
                    .map_err(|e| GpioError::Gpio(format!("set drive: {e}")))?;
                ls.set_output_value(to_line_value(initial_value))
                    .map_err(|e| GpioError::Gpio(format!("set output value: {e}")))?;
            }
            LineConfig::Input {
                bias,
                debounce_micros,
            } => {
                ls.set_direction(line::Direction::Input)
                    .map_err(|e| GpioError::Gpio(format!("set direction: {e}")))?;
                let bias = match bias {
                    InputBias::PullUp => line::Bias::PullUp,
                    InputBias::PullDown => line::Bias::PullDown,
                    InputBias::Floating => line::Bias::Disabled,
                };
                ls.set_bias(Some(bias))
                    .map_err(|e| GpioError::Gpio(format!("set bias: {e}")))?;
                ls.set_debounce_period(Duration::from_micros(debounce_micros as u64));
            }
        }
        ls.set_active_low(config.mode().is_active_low());

        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, GpioError> {
        let mut cfg =
            line::Config::new().map_err(|e| GpioError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| GpioError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }
}

fn to_line_value(value: bool) -> line::Value {
    if value {
        line::Value::Active
    } else {
        line::Value::InActive
    }
}

impl GpioBackend for LibgpiodBackend {
    type Handle = GpiodLine;

    fn chip_info(&self) -> Result<ChipInfo, GpioError> {
        let chip = self.open_chip()?;
        let info = chip
            .info()
            .map_err(|e| GpioError::HardwareUnavailable(format!("chip info: {e}")))?;

        Ok(ChipInfo {
            name: info
                .name()
                .map_err(|e| GpioError::Gpio(format!("chip name: {e}")))?
                .to_string(),
            label: info
                .label()
                .map_err(|e| GpioError::Gpio(format!("chip label: {e}")))?
                .to_string(),
            num_lines: info.num_lines() as u32,
        })
    }

    fn claim(&self, pin_id: u32, config: &LineConfig) -> Result<GpiodLine, GpioError> {
        let line_settings = Self::make_line_settings(config)?;
        let line_cfg = Self::make_line_config(pin_id, line_settings)?;

        let chip = self.open_chip()?;
        let mut req_cfg =
            request::Config::new().map_err(|e| GpioError::Gpio(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| GpioError::Gpio(format!("request consumer: {e}")))?;
        let request = chip
            .request_lines(Some(&req_cfg), &line_cfg)
            .map_err(|e| GpioError::HardwareUnavailable(format!("request line {pin_id}: {e}")))?;
        debug!("requested line {pin_id} on {}", self.chip_path.display());

        Ok(GpiodLine {
            offset: pin_id,
            request,
        })
    }

    fn read(&self, handle: &mut GpiodLine) -> Result<bool, GpioError> {
        let value = handle
            .request
            .value(handle.offset)
            .map_err(|e| GpioError::Gpio(format!("get value: {e}")))?;
        Ok(matches!(value, line::Value::Active))
    }

    fn write(&self, handle: &mut GpiodLine, value: bool) -> Result<(), GpioError> {
        handle
            .request
            .set_value(handle.offset, to_line_value(value))
            .map_err(|e| GpioError::Gpio(format!("set value: {e}")))?;
        Ok(())
    }

    fn release(&self, handle: GpiodLine) {
        // dropping the request hands the line back to the kernel
        debug!("releasing line {}", handle.offset);
        drop(handle.request);
    }
}
