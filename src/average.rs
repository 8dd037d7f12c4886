//! Fixed-size rolling average
//!
//! Slots that have not been written yet hold zero and still count towards
//! the mean, so the average ramps up from zero over the first `N` samples.

use crate::AVERAGE_SIZE;

/// Rolling average over the last `N` samples
#[derive(Debug, Clone)]
pub struct RollingAverage<const N: usize> {
    values: [f32; N],
    index: usize,
    average: f32,
}

/// Rolling average sized for the thermistor
pub type TemperatureAverage = RollingAverage<AVERAGE_SIZE>;

impl<const N: usize> RollingAverage<N> {
    pub const fn new() -> Self {
        const { assert!(N > 0, "rolling average needs at least one slot") };
        Self {
            values: [0.0; N],
            index: 0,
            average: 0.0,
        }
    }

    /// Overwrite the oldest slot with `value` and recompute the mean
    pub fn add_value(&mut self, value: f32) {
        self.values[self.index] = value;
        self.index = (self.index + 1) % N;
        self.average = self.values.iter().sum::<f32>() / N as f32;
    }

    pub fn average(&self) -> f32 {
        self.average
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for RollingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}
