use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

use gpiox::{AppConfig, PinRegistry, demo};

#[cfg(feature = "hardware-gpio")]
use gpiox::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use gpiox::MockGpioBackend;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), gpiox::GpioError> {
    let config = AppConfig::load()?;

    let backend = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(LibgpiodBackend::new(&config.chip)?)
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            Arc::new(MockGpioBackend::default())
        }
    };
    let registry = Arc::new(PinRegistry::new(backend)?);

    info!("*** on/off example ***");
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // no signal handler, wait for the timer instead
            std::future::pending::<()>().await;
        }
    };
    let outcome = demo::run(registry, &config, shutdown).await?;
    info!("output pin switched off ({:?})", outcome.fired);

    Ok(())
}
