//! Source time functions convolved into Green's functions before a search.

use serde::{Deserialize, Serialize};

use crate::error::MisfitError;

/// Symmetric, unit-area source time function centered on zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Wavelet {
    /// Triangle of the given half duration in seconds.
    Triangle {
        /// Half the total duration.
        half_duration: f64,
    },
    /// Trapezoid with linear ramps of `rise_time` seconds and total half
    /// duration `half_duration`; `rise_time == half_duration` is a triangle.
    Trapezoid {
        /// Duration of each linear ramp.
        rise_time: f64,
        /// Half the total duration.
        half_duration: f64,
    },
}

impl Wavelet {
    /// Triangle wavelet.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidWavelet`] if `half_duration` is not finite and positive.
    pub fn triangle(half_duration: f64) -> Result<Self, MisfitError> {
        let wavelet = Self::Triangle { half_duration };
        wavelet.validate()?;
        Ok(wavelet)
    }

    /// Trapezoid wavelet.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidWavelet`] unless `0 < rise_time <= half_duration`.
    pub fn trapezoid(rise_time: f64, half_duration: f64) -> Result<Self, MisfitError> {
        let wavelet = Self::Trapezoid {
            rise_time,
            half_duration,
        };
        wavelet.validate()?;
        Ok(wavelet)
    }

    /// Check durations. Called by the constructors and after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidWavelet`] on non-positive or inconsistent durations.
    pub fn validate(&self) -> Result<(), MisfitError> {
        let (rise, half) = self.ramps();
        if !(half.is_finite() && half > 0.0) {
            return Err(MisfitError::InvalidWavelet {
                reason: format!("half duration must be positive, got {half}"),
            });
        }
        if !(rise.is_finite() && rise > 0.0 && rise <= half) {
            return Err(MisfitError::InvalidWavelet {
                reason: format!("rise time must be in (0, {half}], got {rise}"),
            });
        }
        Ok(())
    }

    fn ramps(&self) -> (f64, f64) {
        match *self {
            Self::Triangle { half_duration } => (half_duration, half_duration),
            Self::Trapezoid {
                rise_time,
                half_duration,
            } => (rise_time, half_duration),
        }
    }

    /// Evaluate the continuous wavelet at time `t` seconds.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        let (rise, half) = self.ramps();
        let height = 1.0 / (2.0 * half - rise);
        let t = t.abs();
        if t >= half {
            0.0
        } else if t <= half - rise {
            height
        } else {
            height * (half - t) / rise
        }
    }

    /// Sample the wavelet at `k * delta` for `k` in `-m..=m`, rescaled so that
    /// `delta * Σ w = 1`. The center sample is at index `m`.
    #[must_use]
    pub fn sample(&self, delta: f64) -> Vec<f64> {
        let (_, half) = self.ramps();
        let m = (half / delta).ceil() as isize;
        let mut samples: Vec<f64> = (-m..=m).map(|k| self.evaluate(k as f64 * delta)).collect();
        // The center sample is always positive, so the area is too.
        let area: f64 = samples.iter().sum::<f64>() * delta;
        for s in &mut samples {
            *s /= area;
        }
        samples
    }

    /// Convolve `signal` (sampled at `delta`) with the wavelet, keeping the
    /// input length and alignment.
    #[must_use]
    pub fn convolve(&self, signal: &[f64], delta: f64) -> Vec<f64> {
        let w = self.sample(delta);
        let center = (w.len() / 2) as isize;
        let n = signal.len() as isize;
        (0..n)
            .map(|i| {
                let mut acc = 0.0;
                for (k, &wk) in w.iter().enumerate() {
                    let j = i - (k as isize - center);
                    if (0..n).contains(&j) {
                        acc += wk * signal[j as usize];
                    }
                }
                acc * delta
            })
            .collect()
    }
}
