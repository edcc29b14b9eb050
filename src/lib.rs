pub mod backend;
pub mod config;
pub mod deferred;
pub mod demo;
pub mod error;
pub mod gpio;
pub mod session;

pub use config::{AppConfig, InputBias, LineConfig, OutputDrive, PinMode};
pub use deferred::{Canceller, Deferred, Fired};
pub use error::GpioError;
pub use gpio::{ChipInfo, GpioBackend, PinHandle, PinRegistry, PinState};
pub use session::PinSession;

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::MockGpioBackend;
