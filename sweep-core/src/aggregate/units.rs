//! Linear magnitude to display power conversion
//! 
//! dBm here is an approximation: 10*log10(magnitude) shifted by a receiver
//! calibration offset, not an absolute power measurement.

use serde::{Deserialize, Serialize};

/// Offset applied when no calibration is configured
pub const DEFAULT_CALIBRATION_OFFSET: f64 = -100.0;

/// Value reported for magnitudes with no defined logarithm (<= 0, NaN)
pub const DEFAULT_DBM_FLOOR: f64 = DEFAULT_CALIBRATION_OFFSET;

/// Decimal places kept in converted values
pub const DBM_DECIMALS: i32 = 2;

/// Round `value` to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Calibrated dBm conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbmScale {
    pub calibration_offset: f64,
    pub floor: f64,
}

impl Default for DbmScale {
    fn default() -> Self {
        Self {
            calibration_offset: DEFAULT_CALIBRATION_OFFSET,
            floor: DEFAULT_DBM_FLOOR,
        }
    }
}

impl DbmScale {
    /// Scale whose floor equals the calibration offset
    pub fn new(calibration_offset: f64) -> Self {
        Self {
            calibration_offset,
            floor: calibration_offset,
        }
    }
    
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }
    
    /// 10*log10(value) + offset, unrounded
    /// 
    /// Exports round this once, to their own precision.
    pub fn to_dbm_raw(&self, value: f64) -> f64 {
        if !(value > 0.0) || !value.is_finite() {
            return self.floor;
        }
        10.0 * value.log10() + self.calibration_offset
    }
    
    /// 10*log10(value) + offset, rounded to `DBM_DECIMALS`
    pub fn to_dbm(&self, value: f64) -> f64 {
        round_to(self.to_dbm_raw(value), DBM_DECIMALS)
    }
    
    /// Convert the power column of `(freq, power)` pairs
    pub fn convert(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points.iter().map(|&(f, p)| (f, self.to_dbm(p))).collect()
    }
    
    /// Same as `convert`, without display rounding
    pub fn convert_raw(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points.iter().map(|&(f, p)| (f, self.to_dbm_raw(p))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_zero_maps_to_floor() {
        let scale = DbmScale::new(-100.0);
        assert_eq!(scale.to_dbm(0.0), -100.0);
        assert_eq!(scale.to_dbm(-3.0), -100.0);
        assert_eq!(scale.to_dbm(f64::NAN), -100.0);
        
        let scale = scale.with_floor(-140.0);
        assert_eq!(scale.to_dbm(0.0), -140.0);
    }
    
    #[test]
    fn test_conversion_and_rounding() {
        let scale = DbmScale::default();
        assert_eq!(scale.to_dbm(1.0), -100.0);
        assert_eq!(scale.to_dbm(1000.0), -70.0);
        // 10*log10(2) = 3.0103
        assert_eq!(scale.to_dbm(2.0), -96.99);
        assert!((scale.to_dbm_raw(2.0) + 96.9897).abs() < 1e-4);
    }
    
    #[test]
    fn test_raw_conversion_keeps_precision() {
        let scale = DbmScale::default();
        // 10*log10(v) = 26.504 -> -73.496 dBm, which displays as -73.5
        let value = 10f64.powf(2.6504);
        assert_eq!(scale.to_dbm(value), -73.5);
        assert!((scale.to_dbm_raw(value) + 73.496).abs() < 1e-9);
        assert_eq!(scale.to_dbm_raw(0.0), scale.floor);
    }
    
    #[test]
    fn test_convert_keeps_frequencies() {
        let scale = DbmScale::new(-50.0);
        assert_eq!(
            scale.convert(&[(470e6, 10.0), (471e6, 0.0)]),
            vec![(470e6, -40.0), (471e6, -50.0)]
        );
    }
}
