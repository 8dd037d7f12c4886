//! Heater control for a recirculating infusion mash system (RIMS).
//!
//! The crate is split the same way the hardware is:
//!
//! - [`average`]: rolling average used to smooth the thermistor
//! - [`sensor`]: NTC thermistor on a voltage divider, Beta equation
//! - [`adjustment`]: two-button setpoint adjustment
//! - [`controls`]: time-proportioning relay output
//! - [`pid`]: the control algorithm driving the relay
//! - [`controller`]: one control loop tick tying everything together
//! - [`display`] / [`sh1107`]: status screen and the OLED driver behind it
//!
//! Everything except `src/main.rs` is `no_std` and hardware independent, so
//! it runs under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod adjustment;
pub mod average;
pub mod controller;
pub mod controls;
pub mod display;
pub mod pid;
pub mod sensor;
pub mod sh1107;

pub const DEFAULT_SETPOINT: f32 = 32.0; // Setpoint at power-up (°C)
pub const SETPOINT_STEP: f32 = 1.0; // Change per button press (°C)
pub const AVERAGE_SIZE: usize = 50; // Samples in the thermistor rolling average
pub const RELAY_WINDOW_MS: u32 = 5000; // Time-proportioning window for the heater relay
pub const REPORT_INTERVAL_MS: u32 = 1000; // Serial status report interval
pub const PID_SAMPLE_TIME_MS: u32 = 100; // Minimum time between PID computations
pub const OUTPUT_MIN: f32 = 0.0; // PID output lower limit (% of relay window)
pub const OUTPUT_MAX: f32 = 100.0; // PID output upper limit (% of relay window)

pub const TERM_KP: f32 = 30.0; // Proportional term - Basic steering (This is the first parameter you should tune for a particular setup)
pub const TERM_KI: f32 = 0.0; // Integral term - Compensate for heat loss by vessel
pub const TERM_KD: f32 = 0.0; // Derivative term - Damp overshoot when the wort flow changes
