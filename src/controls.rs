//! Time-proportioning heater relay
//!
//! A mechanical relay or SSR on a heating element can't be PWM'd at audio
//! rates, so the controller output (0-100 %) becomes an on-time inside a
//! long fixed window. With a 5 s window and an output of 40 the heater is
//! on for the first 2 s of every window and off for the remaining 3 s.
//!
//! The window start moves forward by exactly one window length each time
//! the window elapses. It is never re-synced to the current time, so the
//! period stays constant no matter how irregular the ticks are.

use embedded_hal::digital::{OutputPin, PinState};

use crate::{OUTPUT_MAX, OUTPUT_MIN, RELAY_WINDOW_MS};

/// Rejected relay configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayError {
    /// Window length of zero
    InvalidWindow,
}

/// Window bookkeeping for time-proportioning output
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayWindow {
    window_ms: u32,
    window_start: u32,
}

impl RelayWindow {
    /// Start the first window at `now_ms`
    pub fn new(window_ms: u32, now_ms: u32) -> Result<Self, RelayError> {
        if window_ms == 0 {
            return Err(RelayError::InvalidWindow);
        }
        Ok(Self {
            window_ms,
            window_start: now_ms,
        })
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    pub fn window_start(&self) -> u32 {
        self.window_start
    }

    /// On-time within the window for a controller output in percent
    pub fn on_time_ms(&self, output: f32) -> f32 {
        clamp_output(output) * (self.window_ms as f32 / 100.0)
    }

    /// Advance the window if it has elapsed and decide whether the heater is on
    ///
    /// Wrapping subtraction keeps this correct across `u32` millisecond
    /// rollover.
    pub fn update(&mut self, now_ms: u32, output: f32) -> bool {
        if now_ms.wrapping_sub(self.window_start) > self.window_ms {
            self.window_start = self.window_start.wrapping_add(self.window_ms);
        }

        let elapsed = now_ms.wrapping_sub(self.window_start);

        // Full output also covers the tick landing exactly on the window edge
        clamp_output(output) >= OUTPUT_MAX || (elapsed as f32) < self.on_time_ms(output)
    }
}

/// Output limited to 0-100 %, with NaN treated as off
fn clamp_output(output: f32) -> f32 {
    if output.is_finite() {
        output.clamp(OUTPUT_MIN, OUTPUT_MAX)
    } else {
        OUTPUT_MIN
    }
}

/// Electrical level that switches the heater on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayPolarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

impl RelayPolarity {
    fn level(self, on: bool) -> PinState {
        match self {
            RelayPolarity::ActiveHigh => PinState::from(on),
            RelayPolarity::ActiveLow => PinState::from(!on),
        }
    }
}

/// Heater relay on a GPIO, driven by a [`RelayWindow`]
pub struct Relay<P> {
    pin: P,
    polarity: RelayPolarity,
    window: RelayWindow,
    on: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Create the relay with the heater off and the first window starting now
    pub fn new(
        pin: P,
        polarity: RelayPolarity,
        window_ms: u32,
        now_ms: u32,
    ) -> Result<Self, RelayError> {
        let mut relay = Self {
            pin,
            polarity,
            window: RelayWindow::new(window_ms, now_ms)?,
            on: false,
        };
        relay.set_on(false);
        Ok(relay)
    }

    /// Relay with the default 5 s window and active-high output
    pub fn with_defaults(pin: P, now_ms: u32) -> Self {
        let mut relay = Self {
            pin,
            polarity: RelayPolarity::default(),
            window: RelayWindow {
                window_ms: RELAY_WINDOW_MS,
                window_start: now_ms,
            },
            on: false,
        };
        relay.set_on(false);
        relay
    }

    /// Run one tick of time-proportioning and drive the pin
    pub fn drive(&mut self, now_ms: u32, output: f32) -> bool {
        let on = self.window.update(now_ms, output);
        self.set_on(on);
        on
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn window(&self) -> &RelayWindow {
        &self.window
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    fn set_on(&mut self, on: bool) {
        self.on = on;
        // Fire-and-forget, pin errors are not observable here
        let _ = self.pin.set_state(self.polarity.level(on));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Mock GPIO pin for testing
    struct MockPin {
        high: bool,
        writes: usize,
    }

    impl MockPin {
        fn new() -> Self {
            Self {
                high: false,
                writes: 0,
            }
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_forty_percent_of_five_seconds() {
        let mut window = RelayWindow::new(5000, 0).unwrap();

        assert!(window.update(0, 40.0));
        assert!(window.update(1000, 40.0));
        assert!(window.update(1999, 40.0));
        assert!(!window.update(2000, 40.0));
        assert!(!window.update(4999, 40.0));
        assert!(!window.update(5000, 40.0));
        assert_eq!(window.window_start(), 0);

        // Next window
        assert!(window.update(5001, 40.0));
        assert_eq!(window.window_start(), 5000);
        assert!(window.update(6999, 40.0));
        assert!(!window.update(7000, 40.0));
    }

    #[test]
    fn test_window_advances_by_exactly_one_window() {
        let mut window = RelayWindow::new(5000, 100).unwrap();

        // Late tick well into the next window
        window.update(5300, 50.0);
        assert_eq!(window.window_start(), 5100);

        window.update(10_200, 50.0);
        assert_eq!(window.window_start(), 10_100);
    }

    #[test]
    fn test_zero_output_never_on() {
        let mut window = RelayWindow::new(5000, 0).unwrap();
        for now in (0..20_000).step_by(7) {
            assert!(!window.update(now, 0.0));
        }
    }

    #[test]
    fn test_full_output_always_on() {
        let mut window = RelayWindow::new(5000, 0).unwrap();
        for now in 0..20_000 {
            assert!(window.update(now, 100.0));
        }
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert_eq!(RelayWindow::new(0, 0).unwrap_err(), RelayError::InvalidWindow);
        assert!(matches!(
            Relay::new(MockPin::new(), RelayPolarity::ActiveHigh, 0, 0),
            Err(RelayError::InvalidWindow)
        ));
    }

    #[test]
    fn test_one_ms_window_keeps_zero_and_full_output() {
        let mut window = RelayWindow::new(1, 0).unwrap();
        for now in 0..5 {
            assert!(!window.update(now, 0.0));
        }
        for now in 5..10 {
            assert!(window.update(now, 100.0));
        }
    }

    #[test]
    fn test_output_is_clamped() {
        let window = RelayWindow::new(5000, 0).unwrap();
        assert_eq!(window.on_time_ms(150.0), 5000.0);
        assert_eq!(window.on_time_ms(-20.0), 0.0);
        assert_eq!(window.on_time_ms(f32::NAN), 0.0);
    }

    #[test]
    fn test_millis_rollover() {
        let start = u32::MAX - 1000;
        let mut window = RelayWindow::new(5000, start).unwrap();

        // 1500 ms into the window, across the wrap
        assert!(window.update(start.wrapping_add(1500), 40.0));
        assert!(!window.update(start.wrapping_add(2500), 40.0));

        window.update(start.wrapping_add(5001), 40.0);
        assert_eq!(window.window_start(), start.wrapping_add(5000));
    }

    #[test]
    fn test_relay_starts_off() {
        let relay = Relay::with_defaults(MockPin::new(), 0);
        assert!(!relay.is_on());
        assert!(!relay.pin().high);
        assert_eq!(relay.pin().writes, 1);
    }

    #[test]
    fn test_active_low_relay() {
        let mut relay = Relay::new(MockPin::new(), RelayPolarity::ActiveLow, 5000, 0).unwrap();
        // Off means pin high for active-low
        assert!(relay.pin().high);

        assert!(relay.drive(100, 40.0));
        assert!(!relay.pin().high);

        assert!(!relay.drive(3000, 40.0));
        assert!(relay.pin().high);
    }

    #[test]
    fn test_active_high_relay() {
        let mut relay = Relay::new(MockPin::new(), RelayPolarity::ActiveHigh, 5000, 0).unwrap();
        assert!(relay.drive(100, 40.0));
        assert!(relay.pin().high);
        assert!(relay.is_on());
    }
}
