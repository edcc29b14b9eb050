use std::sync::Arc;

use gpiox::backend::MockGpioBackend;
use gpiox::{GpioError, InputBias, LineConfig, PinMode, PinRegistry, PinState};

fn registry() -> (Arc<MockGpioBackend>, Arc<PinRegistry<MockGpioBackend>>) {
    let backend = Arc::new(MockGpioBackend::default());
    let registry = Arc::new(PinRegistry::new(backend.clone()).expect("mock chip"));
    (backend, registry)
}

#[test]
fn chip_info_is_fetched_once() {
    let (_, registry) = registry();
    let chip = registry.chip_info();
    assert_eq!(chip.name, "gpiochip0");
    assert_eq!(chip.label, "mock-gpio");
    assert_eq!(chip.num_lines, 28);
}

#[test]
fn unavailable_chip_fails_construction() {
    let backend = Arc::new(MockGpioBackend::unavailable());
    let err = PinRegistry::new(backend).err().expect("construction must fail");
    assert!(matches!(err, GpioError::HardwareUnavailable(_)));
}

#[test]
fn read_pull_up_input_never_wrong_mode() {
    let (backend, registry) = registry();
    for pin in 0..28 {
        registry
            .initialize(pin, LineConfig::input(InputBias::PullUp, 10_000))
            .unwrap();
        assert_eq!(registry.read(pin), Ok(false));
        backend.drive(pin, false);
        assert_eq!(registry.read(pin), Ok(true));
    }
}

#[test]
fn write_on_pull_up_input_is_wrong_mode() {
    let (_, registry) = registry();
    registry
        .initialize(21, LineConfig::input(InputBias::PullUp, 0))
        .unwrap();
    assert_eq!(
        registry.write(21, true),
        Err(GpioError::WrongMode {
            pin: 21,
            mode: PinMode::InputPullUp
        })
    );
    assert!(matches!(
        registry.toggle(21),
        Err(GpioError::WrongMode { .. })
    ));
}

#[test]
fn read_on_output_is_wrong_mode() {
    let (_, registry) = registry();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    assert_eq!(
        registry.read(20),
        Err(GpioError::WrongMode {
            pin: 20,
            mode: PinMode::Output
        })
    );
}

#[test]
fn double_initialize_fails() {
    let (_, registry) = registry();
    registry.initialize(20, LineConfig::output(false)).unwrap();
    assert_eq!(
        registry.initialize(20, LineConfig::output(true)),
        Err(GpioError::AlreadyInitialized(20))
    );

    registry.release(20).unwrap();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    assert_eq!(registry.state(20), PinState::Ready);
}

#[test]
fn release_is_idempotent() {
    let (backend, registry) = registry();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    assert!(backend.is_claimed(20));

    registry.release(20).unwrap();
    assert_eq!(registry.state(20), PinState::Released);
    assert!(!backend.is_claimed(20));

    registry.release(20).unwrap();
    assert_eq!(registry.state(20), PinState::Released);
}

#[test]
fn release_without_initialize_fails() {
    let (_, registry) = registry();
    assert_eq!(registry.release(7), Err(GpioError::NotInitialized(7)));
    assert_eq!(registry.state(7), PinState::Uninitialized);
}

#[test]
fn operations_after_release_fail() {
    let (_, registry) = registry();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    registry
        .initialize(21, LineConfig::input(InputBias::PullDown, 0))
        .unwrap();
    registry.release(20).unwrap();
    registry.release(21).unwrap();

    assert_eq!(registry.write(20, false), Err(GpioError::NotInitialized(20)));
    assert_eq!(registry.read(21), Err(GpioError::NotInitialized(21)));
}

#[test]
fn unused_pin_is_not_initialized() {
    let (_, registry) = registry();
    assert_eq!(registry.read(3), Err(GpioError::NotInitialized(3)));
    assert_eq!(registry.write(3, true), Err(GpioError::NotInitialized(3)));
    assert!(registry.pin(3).is_none());
}

#[test]
fn externally_claimed_pin_is_unavailable() {
    let (backend, registry) = registry();
    backend.claim_externally(20);

    let err = registry.initialize(20, LineConfig::output(true)).unwrap_err();
    assert!(matches!(err, GpioError::HardwareUnavailable(_)));
    assert_eq!(registry.state(20), PinState::Uninitialized);
}

#[test]
fn failed_reclaim_leaves_released_pin_released() {
    let (backend, registry) = registry();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    registry.release(20).unwrap();
    backend.claim_externally(20);

    assert!(matches!(
        registry.initialize(20, LineConfig::output(true)),
        Err(GpioError::HardwareUnavailable(_))
    ));
    assert_eq!(registry.state(20), PinState::Released);
}

#[test]
fn pin_out_of_range_is_rejected() {
    let (_, registry) = registry();
    assert_eq!(
        registry.initialize(28, LineConfig::output(false)),
        Err(GpioError::InvalidPin {
            pin: 28,
            num_lines: 28
        })
    );
}

#[test]
fn raw_mode_codes() {
    let (backend, registry) = registry();
    registry.initialize_raw(20, 3, 1).unwrap();
    registry.initialize_raw(21, 2, 10_000).unwrap();

    let output = registry.pin(20).unwrap();
    assert_eq!(output.mode, PinMode::Output);
    assert_eq!(output.value, Some(true));
    assert_eq!(output.debounce_micros, 0);

    let input = registry.pin(21).unwrap();
    assert_eq!(input.mode, PinMode::InputPullUp);
    assert_eq!(input.debounce_micros, 10_000);
    assert_eq!(input.value, None);

    assert!(matches!(
        registry.initialize_raw(22, 9, 0),
        Err(GpioError::InvalidMode(_))
    ));
    assert_eq!(registry.state(22), PinState::Uninitialized);
    assert!(!backend.is_claimed(22));
}

#[test]
fn write_and_toggle_drive_the_line() {
    let (backend, registry) = registry();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    assert_eq!(backend.physical_level(20), Some(true));

    registry.write(20, false).unwrap();
    assert_eq!(backend.physical_level(20), Some(false));
    assert_eq!(registry.toggle(20), Ok(true));
    assert_eq!(registry.pin(20).unwrap().value, Some(true));
    assert_eq!(backend.writes(20), vec![true, false, true]);
}

#[test]
fn sink_output_is_active_low() {
    let (backend, registry) = registry();
    registry.initialize_raw(5, 5, 1).unwrap();
    assert_eq!(registry.pin(5).unwrap().mode, PinMode::OutputSink);
    assert_eq!(backend.physical_level(5), Some(false));

    registry.write(5, false).unwrap();
    assert_eq!(backend.physical_level(5), Some(true));
}

#[test]
fn read_caches_value() {
    let (backend, registry) = registry();
    registry
        .initialize(4, LineConfig::input(InputBias::PullDown, 0))
        .unwrap();
    backend.drive(4, true);

    assert_eq!(registry.read(4), Ok(true));
    assert_eq!(registry.pin(4).unwrap().value, Some(true));
}

#[test]
fn release_all_returns_ready_pins() {
    let (backend, registry) = registry();
    registry.initialize(21, LineConfig::output(false)).unwrap();
    registry.initialize(20, LineConfig::output(false)).unwrap();
    registry
        .initialize(3, LineConfig::input(InputBias::Floating, 0))
        .unwrap();
    registry.release(3).unwrap();

    assert_eq!(registry.release_all(), vec![20, 21]);
    assert!(!backend.is_claimed(20));
    assert!(!backend.is_claimed(21));
    assert!(registry.release_all().is_empty());
}

#[test]
fn dropping_registry_releases_pins() {
    let (backend, registry) = registry();
    registry.initialize(20, LineConfig::output(true)).unwrap();
    drop(registry);
    assert!(!backend.is_claimed(20));
}

#[test]
fn session_releases_on_drop() {
    let (backend, registry) = registry();
    {
        let mut session = registry.session();
        session.claim(20, LineConfig::output(true)).unwrap();
        session
            .claim(21, LineConfig::input(InputBias::PullUp, 10_000))
            .unwrap();
        assert_eq!(session.pins(), vec![20, 21]);
    }
    assert_eq!(registry.state(20), PinState::Released);
    assert_eq!(registry.state(21), PinState::Released);
    assert!(!backend.is_claimed(20));
    assert!(!backend.is_claimed(21));
}

#[test]
fn session_releases_claimed_pins_when_setup_fails() {
    let (backend, registry) = registry();
    backend.claim_externally(21);

    let setup = || -> Result<(), GpioError> {
        let mut session = registry.session();
        session.claim(20, LineConfig::output(true))?;
        session.claim(21, LineConfig::input(InputBias::PullUp, 10_000))?;
        Ok(())
    };

    assert!(matches!(setup(), Err(GpioError::HardwareUnavailable(_))));
    assert_eq!(registry.state(20), PinState::Released);
    assert_eq!(registry.state(21), PinState::Uninitialized);
    assert!(!backend.is_claimed(20));
}

#[test]
fn session_handoff_keeps_pins_ready() {
    let (_, registry) = registry();
    let mut session = registry.session();
    session.claim(20, LineConfig::output(true)).unwrap();

    let pins = session.into_pins();
    assert_eq!(pins, vec![20]);
    assert_eq!(registry.state(20), PinState::Ready);
}

#[test]
fn session_leaves_reclaimed_pin_alone() {
    let (backend, registry) = registry();
    let mut session = registry.session();
    session.claim(20, LineConfig::output(true)).unwrap();

    // another control flow takes the pin over while the session is alive
    registry.release(20).unwrap();
    registry.initialize(20, LineConfig::output(false)).unwrap();

    drop(session);
    assert_eq!(registry.state(20), PinState::Ready);
    assert!(backend.is_claimed(20));
    assert_eq!(registry.write(20, true), Ok(()));
}
