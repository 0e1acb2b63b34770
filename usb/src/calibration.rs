//! Coefficients read from the spectrometer's EEPROM, and the formulas which turn raw detector
//! counts into a calibrated spectrum. Everything in here is pure.
//!
//! See the OceanOptics "OOINLCorrect Linearity Coefficient Procedure" note for the
//! nonlinearity model.

use oceanoptics_types::Spectrum;
use std::ops::Range;

/// Full scale of the USB2000+ detector, used to normalise against the saturation level.
pub const FULL_SCALE: f64 = 65535.0;

/// Detector samples exactly as the device sent them, dark pixels included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSpectrum {
    samples: Vec<i32>,
}

impl RawSpectrum {
    pub fn from_signed(samples: &[i16]) -> Self {
        Self {
            samples: samples.iter().map(|&s| s as i32).collect(),
        }
    }

    pub fn from_unsigned(samples: &[u16]) -> Self {
        Self {
            samples: samples.iter().map(|&s| s as i32).collect(),
        }
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationCoefficients {
    /// Intercept first, then the first, second and third order terms.
    pub wavelength: [f64; 4],

    /// Empty only for data built by hand without a calibration.
    pub nonlinearity: Vec<f64>,

    /// Stored for callers doing radiometric work, never applied here.
    pub stray_light: Vec<f64>,

    /// `65535 / saturation level`, only known on the USB2000+.
    pub saturation_factor: Option<f64>,
}

// Evaluates sum(coefficients[i] * x^i).
fn polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |accumulator, coefficient| accumulator * x + coefficient)
}

impl CalibrationCoefficients {
    pub fn wavelength(&self, pixel: usize) -> f64 {
        polynomial(&self.wavelength, pixel as f64)
    }

    pub fn wavelengths(&self, pixels: Range<usize>) -> Vec<f64> {
        pixels.map(|pixel| self.wavelength(pixel)).collect()
    }

    /// Corrects a single raw count as `raw / sum(nonlinearity[i] * raw^i)`, then applies the
    /// saturation factor. An empty coefficient list marks uncalibrated data, and the correction
    /// is then the identity. Sessions never hold such a list, loading rejects it.
    pub fn linearise(&self, raw: f64) -> f64 {
        let corrected = if self.nonlinearity.is_empty() {
            raw
        } else {
            raw / polynomial(&self.nonlinearity, raw)
        };

        match self.saturation_factor {
            Some(factor) => corrected * factor,
            None => corrected,
        }
    }

    /// Builds the spectrum for `pixels`, dropping every sample outside the range.
    pub fn apply(&self, raw: &RawSpectrum, pixels: Range<usize>) -> Spectrum {
        let end = pixels.end.min(raw.len());
        let pixels = pixels.start.min(end)..end;

        Spectrum {
            wavelengths: self.wavelengths(pixels.clone()),
            intensities: raw.samples()[pixels]
                .iter()
                .map(|&count| self.linearise(count as f64))
                .collect(),
        }
    }
}

/// Turns the raw saturation level into the factor applied to every corrected count.
pub fn saturation_factor(saturation_level: i16) -> Option<f64> {
    if saturation_level <= 0 {
        return None;
    }
    Some(FULL_SCALE / saturation_level as f64)
}
