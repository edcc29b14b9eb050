use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::config::{LineConfig, PinMode};
use crate::error::GpioError;
use crate::session::PinSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    pub name: String,
    pub label: String,
    pub num_lines: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Uninitialized,
    Ready,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinHandle {
    pub id: u32,
    pub mode: PinMode,
    pub debounce_micros: u32,
    pub value: Option<bool>,
    pub state: PinState,
}

/// Hardware access layer. A handle returned by `claim` owns the line until it
/// is passed back to `release`.
pub trait GpioBackend: Send + Sync {
    type Handle: Send;

    fn chip_info(&self) -> Result<ChipInfo, GpioError>;
    fn claim(&self, pin_id: u32, config: &LineConfig) -> Result<Self::Handle, GpioError>;
    fn read(&self, handle: &mut Self::Handle) -> Result<bool, GpioError>;
    fn write(&self, handle: &mut Self::Handle, value: bool) -> Result<(), GpioError>;
    fn release(&self, handle: Self::Handle);
}

struct PinEntry<H> {
    info: PinHandle,
    claim_id: u64,
    claim: Option<H>, // None once released
    blink: Option<BlinkTask>,
}

struct BlinkTask {
    id: u64,
    handle: JoinHandle<()>,
}

impl Drop for BlinkTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct PinRegistry<B: GpioBackend> {
    chip: ChipInfo,
    pins: Mutex<FxHashMap<u32, PinEntry<B::Handle>>>,
    next_id: AtomicU64,
    backend: Arc<B>,
}

impl<B: GpioBackend> PinRegistry<B> {
    pub fn new(backend: Arc<B>) -> Result<Self, GpioError> {
        let chip = backend.chip_info()?;
        debug!(
            "gpio chip {} [{}] with {} lines",
            chip.name, chip.label, chip.num_lines
        );

        Ok(Self {
            backend,
            chip,
            pins: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn chip_info(&self) -> &ChipInfo {
        &self.chip
    }

    pub fn initialize(&self, pin_id: u32, config: LineConfig) -> Result<(), GpioError> {
        self.claim(pin_id, config).map(|_| ())
    }

    /// Initializes the pin and returns the id of the new claim.
    pub(crate) fn claim(&self, pin_id: u32, config: LineConfig) -> Result<u64, GpioError> {
        if pin_id >= self.chip.num_lines {
            return Err(GpioError::InvalidPin {
                pin: pin_id,
                num_lines: self.chip.num_lines,
            });
        }

        let mut pins = self.pins.lock();
        if matches!(pins.get(&pin_id), Some(entry) if entry.info.state == PinState::Ready) {
            return Err(GpioError::AlreadyInitialized(pin_id));
        }

        let claim = self.backend.claim(pin_id, &config).map_err(|e| {
            warn!("claim of pin {pin_id} failed: {e}");
            e
        })?;

        let mode = config.mode();
        let claim_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!("pin {pin_id} initialized as {mode}");
        pins.insert(
            pin_id,
            PinEntry {
                info: PinHandle {
                    id: pin_id,
                    mode,
                    debounce_micros: config.debounce_micros(),
                    value: config.initial_value(),
                    state: PinState::Ready,
                },
                claim_id,
                claim: Some(claim),
                blink: None,
            },
        );

        Ok(claim_id)
    }

    /// Initializes from a numeric mode code; `param` is the output level for
    /// outputs and the debounce period in microseconds for inputs.
    pub fn initialize_raw(&self, pin_id: u32, mode_code: u32, param: u32) -> Result<(), GpioError> {
        self.initialize(pin_id, LineConfig::from_raw(mode_code, param)?)
    }

    pub fn read(&self, pin_id: u32) -> Result<bool, GpioError> {
        let mut pins = self.pins.lock();
        let entry = Self::ready_entry(&mut pins, pin_id)?;

        if !entry.info.mode.is_input() {
            return Err(GpioError::WrongMode {
                pin: pin_id,
                mode: entry.info.mode,
            });
        }

        let claim = entry
            .claim
            .as_mut()
            .ok_or(GpioError::NotInitialized(pin_id))?;
        let value = self.backend.read(claim)?;
        entry.info.value = Some(value);

        Ok(value)
    }

    pub fn write(&self, pin_id: u32, value: bool) -> Result<(), GpioError> {
        let mut pins = self.pins.lock();
        let entry = Self::ready_entry(&mut pins, pin_id)?;
        entry.blink = None;
        self.write_entry(entry, value)
    }

    /// Inverts the last written level and returns the new one.
    pub fn toggle(&self, pin_id: u32) -> Result<bool, GpioError> {
        let mut pins = self.pins.lock();
        let entry = Self::ready_entry(&mut pins, pin_id)?;
        entry.blink = None;
        let value = !entry.info.value.unwrap_or(false);
        self.write_entry(entry, value)?;

        Ok(value)
    }

    pub fn release(&self, pin_id: u32) -> Result<(), GpioError> {
        let mut pins = self.pins.lock();
        let entry = pins
            .get_mut(&pin_id)
            .ok_or(GpioError::NotInitialized(pin_id))?;
        self.release_entry(entry);

        Ok(())
    }

    /// Releases the pin only while it still holds the claim `claim_id`, so a
    /// later claim by someone else is left alone.
    pub(crate) fn release_claim(&self, pin_id: u32, claim_id: u64) -> bool {
        let mut pins = self.pins.lock();
        match pins.get_mut(&pin_id) {
            Some(entry) if entry.claim_id == claim_id => self.release_entry(entry),
            _ => false,
        }
    }

    pub fn release_all(&self) -> Vec<u32> {
        let mut pins = self.pins.lock();
        let mut released = Vec::new();

        for (pin_id, entry) in pins.iter_mut() {
            if self.release_entry(entry) {
                released.push(*pin_id);
            }
        }
        released.sort_unstable();
        if !released.is_empty() {
            info!("released pins {released:?}");
        }

        released
    }

    pub fn pin(&self, pin_id: u32) -> Option<PinHandle> {
        self.pins.lock().get(&pin_id).map(|e| e.info.clone())
    }

    pub fn state(&self, pin_id: u32) -> PinState {
        self.pins
            .lock()
            .get(&pin_id)
            .map(|e| e.info.state)
            .unwrap_or(PinState::Uninitialized)
    }

    pub fn is_blinking(&self, pin_id: u32) -> bool {
        self.pins
            .lock()
            .get(&pin_id)
            .map(|e| e.blink.is_some())
            .unwrap_or(false)
    }

    pub fn session(self: &Arc<Self>) -> PinSession<B> {
        PinSession::new(Arc::clone(self))
    }

    fn ready_entry(
        pins: &mut FxHashMap<u32, PinEntry<B::Handle>>,
        pin_id: u32,
    ) -> Result<&mut PinEntry<B::Handle>, GpioError> {
        match pins.get_mut(&pin_id) {
            Some(entry) if entry.info.state == PinState::Ready => Ok(entry),
            _ => Err(GpioError::NotInitialized(pin_id)),
        }
    }

    fn write_entry(&self, entry: &mut PinEntry<B::Handle>, value: bool) -> Result<(), GpioError> {
        let pin_id = entry.info.id;
        if !entry.info.mode.is_output() {
            return Err(GpioError::WrongMode {
                pin: pin_id,
                mode: entry.info.mode,
            });
        }

        let claim = entry
            .claim
            .as_mut()
            .ok_or(GpioError::NotInitialized(pin_id))?;
        self.backend.write(claim, value)?;
        entry.info.value = Some(value);
        debug!("pin {pin_id} set to {}", value as u8);

        Ok(())
    }

    fn release_entry(&self, entry: &mut PinEntry<B::Handle>) -> bool {
        entry.blink = None;
        match entry.claim.take() {
            Some(claim) => {
                self.backend.release(claim);
                entry.info.state = PinState::Released;
                info!("pin {} released", entry.info.id);
                true
            }
            None => false,
        }
    }

    /// One blink step. Returns false once the blink it belongs to is gone.
    fn blink_tick(&self, pin_id: u32, blink_id: u64) -> bool {
        let mut pins = self.pins.lock();
        let Ok(entry) = Self::ready_entry(&mut pins, pin_id) else {
            return false;
        };
        if entry.blink.as_ref().map(|b| b.id) != Some(blink_id) {
            return false;
        }

        let value = !entry.info.value.unwrap_or(false);
        match self.write_entry(entry, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("blink of pin {pin_id} stopped: {e}");
                entry.blink = None;
                false
            }
        }
    }
}

impl<B: GpioBackend + 'static> PinRegistry<B> {
    /// Toggles an output every `period` in the background until `write`,
    /// `toggle`, `stop_blink` or `release` touches the pin. Needs a tokio
    /// runtime.
    pub fn blink(self: &Arc<Self>, pin_id: u32, period: Duration) -> Result<(), GpioError> {
        if period.is_zero() {
            return Err(GpioError::InvalidValue(
                "blink period must be greater than zero".into(),
            ));
        }
        let runtime = Handle::try_current()
            .map_err(|e| GpioError::Gpio(format!("blink needs a tokio runtime: {e}")))?;

        let mut pins = self.pins.lock();
        let entry = Self::ready_entry(&mut pins, pin_id)?;
        if !entry.info.mode.is_output() {
            return Err(GpioError::WrongMode {
                pin: pin_id,
                mode: entry.info.mode,
            });
        }

        let blink_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::downgrade(self);
        let handle = runtime.spawn(blink_loop(registry, pin_id, blink_id, period));
        // replacing a running blink aborts it
        entry.blink = Some(BlinkTask {
            id: blink_id,
            handle,
        });
        info!("pin {pin_id} blinking every {} ms", period.as_millis());

        Ok(())
    }

    /// Stops a running blink and drives the output low.
    pub fn stop_blink(&self, pin_id: u32) -> Result<(), GpioError> {
        let mut pins = self.pins.lock();
        let entry = Self::ready_entry(&mut pins, pin_id)?;
        if entry.blink.take().is_some() {
            debug!("pin {pin_id} blink stopped");
        }
        self.write_entry(entry, false)
    }
}

// holds a weak reference so dropping the last registry Arc still releases pins
async fn blink_loop<B: GpioBackend>(
    registry: Weak<PinRegistry<B>>,
    pin_id: u32,
    blink_id: u64,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(registry) = registry.upgrade() else {
            break;
        };
        if !registry.blink_tick(pin_id, blink_id) {
            break;
        }
    }
}

impl<B: GpioBackend> Drop for PinRegistry<B> {
    fn drop(&mut self) {
        self.release_all();
    }
}
