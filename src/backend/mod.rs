#[cfg(feature = "hardware-gpio")]
pub mod libgpiod;
pub mod mock;

#[cfg(feature = "hardware-gpio")]
pub use self::libgpiod::{GpiodLine, LibgpiodBackend};
pub use mock::{MockGpioBackend, MockHandle};
