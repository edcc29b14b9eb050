use std::sync::Arc;

use log::debug;

use crate::config::LineConfig;
use crate::error::GpioError;
use crate::gpio::{GpioBackend, PinRegistry};

/// Scoped pin acquisition. Pins claimed through a session are released when
/// it drops, unless ownership was handed off with [`PinSession::into_pins`].
/// A pin released and claimed again elsewhere meanwhile is left alone.
pub struct PinSession<B: GpioBackend> {
    registry: Arc<PinRegistry<B>>,
    claims: Vec<(u32, u64)>, // pin id, claim id
}

impl<B: GpioBackend> PinSession<B> {
    pub fn new(registry: Arc<PinRegistry<B>>) -> Self {
        Self {
            registry,
            claims: Vec::new(),
        }
    }

    pub fn claim(&mut self, pin_id: u32, config: LineConfig) -> Result<(), GpioError> {
        let claim_id = self.registry.claim(pin_id, config)?;
        self.claims.push((pin_id, claim_id));
        Ok(())
    }

    pub fn pins(&self) -> Vec<u32> {
        self.claims.iter().map(|(pin_id, _)| *pin_id).collect()
    }

    pub fn into_pins(mut self) -> Vec<u32> {
        std::mem::take(&mut self.claims)
            .into_iter()
            .map(|(pin_id, _)| pin_id)
            .collect()
    }
}

impl<B: GpioBackend> Drop for PinSession<B> {
    fn drop(&mut self) {
        // reverse claim order
        for (pin_id, claim_id) in self.claims.drain(..).rev() {
            if !self.registry.release_claim(pin_id, claim_id) {
                debug!("pin {pin_id} no longer held by this session");
            }
        }
    }
}
