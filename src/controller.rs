//! The control loop
//!
//! One [`Controller::tick`] does, in order:
//!
//! 1. thermistor sample → smoothed temperature (the PID input)
//! 2. PID → heater output
//! 3. time-proportioning relay update
//! 4. setpoint buttons
//! 5. status snapshot, and whether the serial report is due
//!
//! The relay has to run after the PID because it uses this tick's output.
//! There is no rate limiting here; the caller ticks as fast as it can.

use core::fmt;

use embedded_hal::digital::{OutputPin, PinState};

use crate::adjustment::{Adjustment, SetpointAdjuster};
use crate::controls::{Relay, RelayError, RelayPolarity};
use crate::pid::{ControlAlgorithm, Tunings};
use crate::sensor::{SensorConfig, SensorError, Thermistor};
use crate::{AVERAGE_SIZE, DEFAULT_SETPOINT, RELAY_WINDOW_MS, REPORT_INTERVAL_MS};

/// Loop configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub sensor: SensorConfig,
    pub relay_polarity: RelayPolarity,
    /// Time-proportioning window, must be non-zero
    pub relay_window_ms: u32,
    pub report_interval_ms: u32,
    /// Setpoint at power-up (°C)
    pub initial_setpoint: f32,
    /// PID input until the first good thermistor reading (°C)
    pub initial_input: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig::default(),
            relay_polarity: RelayPolarity::default(),
            relay_window_ms: RELAY_WINDOW_MS,
            report_interval_ms: REPORT_INTERVAL_MS,
            initial_setpoint: DEFAULT_SETPOINT,
            initial_input: 20.0,
        }
    }
}

/// Fixed-phase throttle for the serial report
///
/// Due once `now` is strictly past the next due time; the due time then
/// moves on by one interval, not to `now`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportSchedule {
    interval_ms: u32,
    next_due: u32,
}

impl ReportSchedule {
    pub fn new(interval_ms: u32, first_due: u32) -> Self {
        Self {
            interval_ms,
            next_due: first_due,
        }
    }

    pub fn next_due(&self) -> u32 {
        self.next_due
    }

    pub fn poll(&mut self, now_ms: u32) -> bool {
        // Signed difference so the comparison survives millis rollover
        if (now_ms.wrapping_sub(self.next_due) as i32) > 0 {
            self.next_due = self.next_due.wrapping_add(self.interval_ms);
            true
        } else {
            false
        }
    }
}

/// Values shown on the display and sent over serial
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub setpoint: f32,
    pub input: f32,
    pub output: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "setpoint: {:.2} input: {:.2} output: {:.2} kp: {:.2} ki: {:.2} kd: {:.2}",
            self.setpoint, self.input, self.output, self.kp, self.ki, self.kd
        )
    }
}

/// Hardware readings for one tick
#[derive(Debug, Clone, Copy)]
pub struct TickInputs {
    pub now_ms: u32,
    /// Raw thermistor ADC count, or why it couldn't be read
    pub sample: Result<u16, SensorError>,
    pub increment: PinState,
    pub decrement: PinState,
}

/// What happened during one tick
#[derive(Debug, Clone)]
pub struct Tick {
    pub status: Status,
    pub heater_on: bool,
    /// The serial report should go out this tick
    pub report_due: bool,
    pub sensor_fault: Option<SensorError>,
    pub adjustments: heapless::Vec<Adjustment, 2>,
}

/// Single-zone heater controller, smoothing over `N` thermistor readings
pub struct Controller<A, P, const N: usize = AVERAGE_SIZE> {
    thermistor: Thermistor<N>,
    algorithm: A,
    relay: Relay<P>,
    adjuster: SetpointAdjuster,
    schedule: ReportSchedule,
    setpoint: f32,
    input: f32,
    output: f32,
    sensor_faults: u32,
}

impl<A: ControlAlgorithm, P: OutputPin> Controller<A, P> {
    /// Create the controller; the first relay window starts at `now_ms`
    pub fn new(
        config: ControllerConfig,
        algorithm: A,
        relay_pin: P,
        now_ms: u32,
    ) -> Result<Self, RelayError> {
        Self::with_average(config, algorithm, relay_pin, now_ms)
    }
}

impl<A: ControlAlgorithm, P: OutputPin, const N: usize> Controller<A, P, N> {
    /// Like [`Controller::new`] with an `N`-reading temperature average
    pub fn with_average(
        config: ControllerConfig,
        algorithm: A,
        relay_pin: P,
        now_ms: u32,
    ) -> Result<Self, RelayError> {
        let relay = Relay::new(
            relay_pin,
            config.relay_polarity,
            config.relay_window_ms,
            now_ms,
        )?;
        let output = algorithm.output();
        Ok(Self {
            thermistor: Thermistor::with_average(config.sensor),
            algorithm,
            relay,
            adjuster: SetpointAdjuster::new(),
            schedule: ReportSchedule::new(config.report_interval_ms, now_ms),
            setpoint: config.initial_setpoint,
            input: config.initial_input,
            output,
            sensor_faults: 0,
        })
    }

    pub fn tick(&mut self, inputs: TickInputs) -> Tick {
        let sample = inputs.sample.and_then(|raw| self.thermistor.sample(raw));
        let sensor_fault = match sample {
            Ok(smoothed) => {
                self.input = smoothed;
                None
            }
            Err(err) => {
                // Keep the last smoothed value as the PID input
                self.sensor_faults = self.sensor_faults.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::warn!("Thermistor fault: {}, holding {}°C", err, self.input);
                Some(err)
            }
        };

        self.output = self
            .algorithm
            .compute(self.input, self.setpoint, inputs.now_ms);

        let heater_on = self.relay.drive(inputs.now_ms, self.output);

        let adjustments =
            self.adjuster
                .update(&mut self.setpoint, inputs.increment, inputs.decrement);
        #[cfg(feature = "defmt")]
        {
            if !adjustments.is_empty() {
                defmt::debug!("Setpoint: {}°C", self.setpoint);
            }
        }

        let report_due = self.schedule.poll(inputs.now_ms);

        Tick {
            status: self.status(),
            heater_on,
            report_due,
            sensor_fault,
            adjustments,
        }
    }

    pub fn status(&self) -> Status {
        let Tunings { kp, ki, kd } = self.algorithm.tunings();
        Status {
            setpoint: self.setpoint,
            input: self.input,
            output: self.output,
            kp,
            ki,
            kd,
        }
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn input(&self) -> f32 {
        self.input
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    /// Readings dropped since power-up
    pub fn sensor_faults(&self) -> u32 {
        self.sensor_faults
    }

    pub fn relay(&self) -> &Relay<P> {
        &self.relay
    }

    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algorithm
    }
}
