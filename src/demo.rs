use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::AppConfig;
use crate::deferred::{Deferred, Fired};
use crate::error::GpioError;
use crate::gpio::{GpioBackend, PinRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub input_level: bool,
    pub delay: Duration,
    pub fired: Fired,
}

/// Drives the output, samples the input once, then switches the output off
/// and releases both pins after the delay the input selects. `shutdown`
/// completing early brings the teardown forward.
pub async fn run<B, S>(
    registry: Arc<PinRegistry<B>>,
    config: &AppConfig,
    shutdown: S,
) -> Result<Outcome, GpioError>
where
    B: GpioBackend + 'static,
    S: Future<Output = ()>,
{
    let chip = registry.chip_info();
    info!("chip name {}", chip.name);
    info!("chip label {}", chip.label);
    info!("output pin is gpio {}", config.output_pin);
    info!("input pin is gpio {}", config.input_pin);

    let mut session = registry.session();
    session.claim(config.output_pin, config.output_config())?;
    session.claim(config.input_pin, config.input_config())?;

    let input_level = registry.read(config.input_pin)?;
    let delay = config.delay_for(input_level);
    info!(
        "input is {}, output pin turns off after {} ms",
        input_level as u8,
        delay.as_millis()
    );

    let pins = session.into_pins();
    let output_pin = config.output_pin;
    let teardown_registry = Arc::clone(&registry);
    let deferred = Deferred::spawn(delay, move |_| {
        if let Err(e) = teardown_registry.write(output_pin, false) {
            warn!("switching off pin {output_pin} failed: {e}");
        }
        for pin_id in pins {
            if let Err(e) = teardown_registry.release(pin_id) {
                warn!("release of pin {pin_id} failed: {e}");
            }
        }
    });

    let canceller = deferred.canceller();
    let join = deferred.join();
    tokio::pin!(join);

    tokio::select! {
        fired = &mut join => {
            return fired.map(|fired| Outcome { input_level, delay, fired });
        }
        _ = shutdown => {
            warn!("shutdown requested, tearing down early");
            canceller.cancel();
        }
    }

    let fired = join.await?;
    Ok(Outcome {
        input_level,
        delay,
        fired,
    })
}
