//! PID control algorithm
//!
//! The control loop only talks to [`ControlAlgorithm`], so the relay and the
//! loop can be tested with a fixed-output stand-in. [`Pid`] is the algorithm
//! used on the hardware: direct acting, proportional on error, integral
//! clamped to the output limits, derivative on measurement so a setpoint
//! change doesn't kick the output.

use crate::{OUTPUT_MAX, OUTPUT_MIN, PID_SAMPLE_TIME_MS, TERM_KD, TERM_KI, TERM_KP};

/// User-facing PID gains
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tunings {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Tunings {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    fn is_valid(&self) -> bool {
        self.kp >= 0.0 && self.ki >= 0.0 && self.kd >= 0.0
    }
}

impl Default for Tunings {
    fn default() -> Self {
        Self::new(TERM_KP, TERM_KI, TERM_KD)
    }
}

/// Algorithm turning the smoothed temperature into a heater output
pub trait ControlAlgorithm {
    /// Compute the output (0-100 %) for this tick
    fn compute(&mut self, input: f32, setpoint: f32, now_ms: u32) -> f32;

    /// Most recently computed output
    fn output(&self) -> f32;

    /// Gains currently in use, for reporting
    fn tunings(&self) -> Tunings;
}

/// PID configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidConfig {
    pub tunings: Tunings,
    /// Minimum time between two computations
    pub sample_time_ms: u32,
    pub output_min: f32,
    pub output_max: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            tunings: Tunings::default(),
            sample_time_ms: PID_SAMPLE_TIME_MS,
            output_min: OUTPUT_MIN,
            output_max: OUTPUT_MAX,
        }
    }
}

/// Rejected PID parameter changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PidError {
    /// A gain was negative
    NegativeGain,
    /// Output minimum not below maximum
    InvalidLimits,
    /// Sample time of zero
    InvalidSampleTime,
}

/// Sample-time based PID controller
#[derive(Debug, Clone)]
pub struct Pid {
    tunings: Tunings,
    /// Ki scaled by the sample time in seconds
    ki_sampled: f32,
    /// Kd divided by the sample time in seconds
    kd_sampled: f32,
    sample_time_ms: u32,
    output_min: f32,
    output_max: f32,
    output: f32,
    output_sum: f32,
    last_input: f32,
    last_time: Option<u32>,
}

impl Pid {
    pub fn new(config: PidConfig) -> Result<Self, PidError> {
        if !config.tunings.is_valid() {
            return Err(PidError::NegativeGain);
        }
        if !(config.output_min < config.output_max) {
            return Err(PidError::InvalidLimits);
        }
        if config.sample_time_ms == 0 {
            return Err(PidError::InvalidSampleTime);
        }

        let mut pid = Self {
            tunings: config.tunings,
            ki_sampled: 0.0,
            kd_sampled: 0.0,
            sample_time_ms: config.sample_time_ms,
            output_min: config.output_min,
            output_max: config.output_max,
            output: 0.0,
            output_sum: 0.0,
            last_input: 0.0,
            last_time: None,
        };
        pid.scale_tunings();
        Ok(pid)
    }

    /// Change the gains; the integral sum is kept so the output doesn't jump
    pub fn set_tunings(&mut self, tunings: Tunings) -> Result<(), PidError> {
        if !tunings.is_valid() {
            return Err(PidError::NegativeGain);
        }
        self.tunings = tunings;
        self.scale_tunings();
        Ok(())
    }

    pub fn set_output_limits(&mut self, min: f32, max: f32) -> Result<(), PidError> {
        if !(min < max) {
            return Err(PidError::InvalidLimits);
        }
        self.output_min = min;
        self.output_max = max;
        self.output = self.clamp(self.output);
        self.output_sum = self.clamp(self.output_sum);
        Ok(())
    }

    pub fn set_sample_time(&mut self, sample_time_ms: u32) -> Result<(), PidError> {
        if sample_time_ms == 0 {
            return Err(PidError::InvalidSampleTime);
        }
        self.sample_time_ms = sample_time_ms;
        self.scale_tunings();
        Ok(())
    }

    pub fn sample_time_ms(&self) -> u32 {
        self.sample_time_ms
    }

    fn scale_tunings(&mut self) {
        let sample_time_s = self.sample_time_ms as f32 / 1000.0;
        self.ki_sampled = self.tunings.ki * sample_time_s;
        self.kd_sampled = self.tunings.kd / sample_time_s;
    }

    fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.output_min, self.output_max)
    }
}

impl ControlAlgorithm for Pid {
    fn compute(&mut self, input: f32, setpoint: f32, now_ms: u32) -> f32 {
        let last_time = match self.last_time {
            Some(last_time) => last_time,
            None => {
                // Bumpless start from whatever the output currently is
                self.output_sum = self.clamp(self.output);
                self.last_input = input;
                now_ms.wrapping_sub(self.sample_time_ms)
            }
        };

        if now_ms.wrapping_sub(last_time) < self.sample_time_ms {
            return self.output;
        }

        let error = setpoint - input;
        let d_input = input - self.last_input;

        self.output_sum = self.clamp(self.output_sum + self.ki_sampled * error);

        let output = self.tunings.kp * error + self.output_sum - self.kd_sampled * d_input;
        self.output = self.clamp(output);

        self.last_input = input;
        self.last_time = Some(now_ms);
        self.output
    }

    fn output(&self) -> f32 {
        self.output
    }

    fn tunings(&self) -> Tunings {
        self.tunings
    }
}
