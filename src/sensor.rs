//! NTC thermistor on a voltage divider
//!
//! Circuit: VREF -- fixed resistor -- ADC_PIN -- NTC -- GND
//!
//! The raw ADC count is turned into a voltage, the voltage into the NTC
//! resistance, and the resistance into a temperature with the Beta
//! equation:
//!
//! ```text
//! 1/T = 1/T0 + 1/B * ln(R/R0)
//! ```
//!
//! Every good reading goes through a [`RollingAverage`]; the smoothed
//! value is what the control loop sees.

use core::fmt;

use crate::average::RollingAverage;
use crate::AVERAGE_SIZE;

const KELVIN_OFFSET: f32 = 273.15;

/// Errors that can occur while converting a thermistor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// ADC at full scale: thermistor disconnected, resistance unbounded
    OpenCircuit,
    /// ADC at zero: thermistor shorted to ground
    ShortCircuit,
    /// ADC count above the configured resolution
    OutOfRange,
    /// Conversion produced a non-finite temperature
    ConversionError,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::OpenCircuit => f.write_str("thermistor open circuit"),
            SensorError::ShortCircuit => f.write_str("thermistor short circuit"),
            SensorError::OutOfRange => f.write_str("ADC reading out of range"),
            SensorError::ConversionError => f.write_str("temperature conversion failed"),
        }
    }
}

/// Divider and thermistor constants
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    /// ADC reference voltage in millivolts
    pub vref_mv: f32,
    /// Full-scale ADC count
    pub adc_resolution: u16,
    /// Fixed divider resistor in ohms
    pub divider_ohms: f32,
    /// Thermistor resistance at `nominal_celsius`
    pub nominal_ohms: f32,
    /// Reference temperature for `nominal_ohms`
    pub nominal_celsius: f32,
    /// Thermistor Beta coefficient
    pub beta: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            vref_mv: 5000.0,
            adc_resolution: 1023,
            divider_ohms: 10_000.0,
            nominal_ohms: 10_000.0,
            nominal_celsius: 25.0,
            beta: 3950.0,
        }
    }
}

impl SensorConfig {
    /// Convert a raw ADC count to the thermistor resistance in ohms
    pub fn raw_to_resistance(&self, raw: u16) -> Result<f32, SensorError> {
        if raw > self.adc_resolution {
            return Err(SensorError::OutOfRange);
        }
        // vout == vref would divide by zero below
        if raw == self.adc_resolution {
            return Err(SensorError::OpenCircuit);
        }
        if raw == 0 {
            return Err(SensorError::ShortCircuit);
        }

        let vout = (raw as f32 / self.adc_resolution as f32) * self.vref_mv;
        Ok((vout * self.divider_ohms) / (self.vref_mv - vout))
    }

    /// Convert a thermistor resistance to degrees Celsius
    pub fn resistance_to_celsius(&self, ohms: f32) -> Result<f32, SensorError> {
        if !(ohms > 0.0) {
            return Err(SensorError::ConversionError);
        }

        let mut inverse = libm::logf(ohms / self.nominal_ohms) / self.beta;
        inverse += 1.0 / (self.nominal_celsius + KELVIN_OFFSET);
        let celsius = 1.0 / inverse - KELVIN_OFFSET;

        if celsius.is_finite() {
            Ok(celsius)
        } else {
            Err(SensorError::ConversionError)
        }
    }

    /// Instantaneous temperature for one raw ADC count
    pub fn raw_to_celsius(&self, raw: u16) -> Result<f32, SensorError> {
        self.raw_to_resistance(raw)
            .and_then(|ohms| self.resistance_to_celsius(ohms))
    }
}

/// Thermistor with smoothing over the last `N` good readings
#[derive(Debug, Clone)]
pub struct Thermistor<const N: usize = AVERAGE_SIZE> {
    config: SensorConfig,
    average: RollingAverage<N>,
}

impl Thermistor {
    pub fn new(config: SensorConfig) -> Self {
        Self::with_average(config)
    }
}

impl<const N: usize> Thermistor<N> {
    /// Thermistor averaging over `N` readings instead of [`AVERAGE_SIZE`]
    pub fn with_average(config: SensorConfig) -> Self {
        Self {
            config,
            average: RollingAverage::new(),
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Feed one raw ADC count and return the smoothed temperature
    ///
    /// A faulty reading is not added to the average; the caller decides
    /// whether to keep using [`smoothed`](Self::smoothed).
    pub fn sample(&mut self, raw: u16) -> Result<f32, SensorError> {
        let celsius = self.config.raw_to_celsius(raw)?;
        self.average.add_value(celsius);
        Ok(self.average.average())
    }

    /// Current smoothed temperature
    pub fn smoothed(&self) -> f32 {
        self.average.average()
    }
}

impl Default for Thermistor {
    fn default() -> Self {
        Self::new(SensorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Divider where half scale is an exact count
    fn even_config() -> SensorConfig {
        SensorConfig {
            adc_resolution: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_resistance_is_reference_temperature() {
        let config = SensorConfig::default();
        let temp = config.resistance_to_celsius(10_000.0).unwrap();
        assert!((temp - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_half_scale_reads_reference_resistance() {
        let config = even_config();
        let r = config.raw_to_resistance(500).unwrap();
        assert!((r - 10_000.0).abs() < 1e-2);
        let temp = config.raw_to_celsius(500).unwrap();
        assert!((temp - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_lower_resistance_is_hotter() {
        let config = SensorConfig::default();
        // 10K NTC, B=3950: about 3.6K at 50°C
        let temp = config.resistance_to_celsius(3_600.0).unwrap();
        assert!((temp - 50.0).abs() < 1.0);

        let cold = config.resistance_to_celsius(30_000.0).unwrap();
        assert!(cold < 5.0);
    }

    #[test]
    fn test_full_scale_is_open_circuit() {
        let config = SensorConfig::default();
        assert_eq!(config.raw_to_celsius(1023), Err(SensorError::OpenCircuit));
    }

    #[test]
    fn test_zero_is_short_circuit() {
        let config = SensorConfig::default();
        assert_eq!(config.raw_to_celsius(0), Err(SensorError::ShortCircuit));
    }

    #[test]
    fn test_above_resolution_is_out_of_range() {
        let config = SensorConfig::default();
        assert_eq!(config.raw_to_celsius(4095), Err(SensorError::OutOfRange));
    }

    #[test]
    fn test_fault_does_not_touch_average() {
        let mut thermistor = Thermistor::new(even_config());
        thermistor.sample(500).unwrap();
        let before = thermistor.smoothed();

        assert!(thermistor.sample(1000).is_err());
        assert_eq!(thermistor.smoothed(), before);
    }

    #[test]
    fn test_smoothed_settles_after_full_window() {
        let mut thermistor = Thermistor::new(even_config());
        let mut last = 0.0;
        for _ in 0..50 {
            last = thermistor.sample(500).unwrap();
        }
        assert!((last - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_short_average_settles_sooner() {
        let mut thermistor = Thermistor::<4>::with_average(even_config());
        let first = thermistor.sample(500).unwrap();
        assert!((first - 6.25).abs() < 1e-3);
        for _ in 0..3 {
            thermistor.sample(500).unwrap();
        }
        assert!((thermistor.smoothed() - 25.0).abs() < 1e-3);
    }
}
