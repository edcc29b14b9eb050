use log::debug;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::{InputBias, LineConfig};
use crate::error::GpioError;
use crate::gpio::{ChipInfo, GpioBackend};

const MOCK_BACKEND_NUM_LINES: u32 = 28;

/// In-memory provider. Lines can be driven from the outside to emulate wiring
/// and can be marked as held by another consumer.
pub struct MockGpioBackend {
    chip: Option<ChipInfo>,
    lines: Mutex<FxHashMap<u32, MockLine>>, // keyed by pin id
}

#[derive(Default)]
struct MockLine {
    claimed: bool,
    external: bool,
    driven: Option<bool>,
    bias: Option<InputBias>,
    writes: Vec<bool>,
}

impl MockLine {
    fn physical_level(&self) -> bool {
        self.driven
            .unwrap_or(matches!(self.bias, Some(InputBias::PullUp)))
    }
}

#[derive(Debug)]
pub struct MockHandle {
    pin_id: u32,
    active_low: bool,
}

impl Default for MockGpioBackend {
    fn default() -> Self {
        Self::new(ChipInfo {
            name: "gpiochip0".into(),
            label: "mock-gpio".into(),
            num_lines: MOCK_BACKEND_NUM_LINES,
        })
    }
}

impl MockGpioBackend {
    pub fn new(chip: ChipInfo) -> Self {
        Self {
            chip: Some(chip),
            lines: Mutex::new(FxHashMap::default()),
        }
    }

    /// A provider whose chip cannot be opened.
    pub fn unavailable() -> Self {
        Self {
            chip: None,
            lines: Mutex::new(FxHashMap::default()),
        }
    }

    /// Drives the physical line level, as external wiring would.
    pub fn drive(&self, pin_id: u32, level: bool) {
        self.lines.lock().entry(pin_id).or_default().driven = Some(level);
    }

    /// Marks the line as held by another consumer.
    pub fn claim_externally(&self, pin_id: u32) {
        self.lines.lock().entry(pin_id).or_default().external = true;
    }

    pub fn is_claimed(&self, pin_id: u32) -> bool {
        self.lines
            .lock()
            .get(&pin_id)
            .map(|l| l.claimed)
            .unwrap_or(false)
    }

    pub fn physical_level(&self, pin_id: u32) -> Option<bool> {
        self.lines.lock().get(&pin_id).map(MockLine::physical_level)
    }

    /// Logical values written to the line, initial level included.
    pub fn writes(&self, pin_id: u32) -> Vec<bool> {
        self.lines
            .lock()
            .get(&pin_id)
            .map(|l| l.writes.clone())
            .unwrap_or_default()
    }
}

impl GpioBackend for MockGpioBackend {
    type Handle = MockHandle;

    fn chip_info(&self) -> Result<ChipInfo, GpioError> {
        self.chip
            .clone()
            .ok_or_else(|| GpioError::HardwareUnavailable("mock chip unavailable".into()))
    }

    fn claim(&self, pin_id: u32, config: &LineConfig) -> Result<MockHandle, GpioError> {
        let mut lines = self.lines.lock();
        let line = lines.entry(pin_id).or_default();

        if line.claimed || line.external {
            return Err(GpioError::HardwareUnavailable(format!(
                "line {pin_id} is busy"
            )));
        }

        let active_low = config.mode().is_active_low();
        match *config {
            LineConfig::Output { initial_value, .. } => {
                line.bias = None;
                line.driven = Some(initial_value ^ active_low);
                line.writes.push(initial_value);
            }
            LineConfig::Input { bias, .. } => {
                line.bias = Some(bias);
            }
        }
        line.claimed = true;
        debug!("mock line {pin_id} claimed");

        Ok(MockHandle { pin_id, active_low })
    }

    fn read(&self, handle: &mut MockHandle) -> Result<bool, GpioError> {
        let lines = self.lines.lock();
        let line = lines
            .get(&handle.pin_id)
            .filter(|l| l.claimed)
            .ok_or_else(|| GpioError::Gpio(format!("line {} not requested", handle.pin_id)))?;

        Ok(line.physical_level() ^ handle.active_low)
    }

    fn write(&self, handle: &mut MockHandle, value: bool) -> Result<(), GpioError> {
        let mut lines = self.lines.lock();
        let line = lines
            .get_mut(&handle.pin_id)
            .filter(|l| l.claimed)
            .ok_or_else(|| GpioError::Gpio(format!("line {} not requested", handle.pin_id)))?;

        line.driven = Some(value ^ handle.active_low);
        line.writes.push(value);
        Ok(())
    }

    fn release(&self, handle: MockHandle) {
        if let Some(line) = self.lines.lock().get_mut(&handle.pin_id) {
            line.claimed = false;
            debug!("mock line {} released", handle.pin_id);
        }
    }
}
