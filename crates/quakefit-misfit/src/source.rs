//! Candidate sources: moment tensors and point forces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MisfitError;

/// Convert moment magnitude to scalar moment in N·m: `M0 = 10^(1.5 Mw + 9.1)`.
#[must_use]
pub fn moment_from_magnitude(magnitude: f64) -> f64 {
    10f64.powf(1.5 * magnitude + 9.1)
}

/// Convert scalar moment in N·m to moment magnitude: `Mw = 2/3 (log10 M0 - 9.1)`.
#[must_use]
pub fn magnitude_from_moment(moment: f64) -> f64 {
    2.0 / 3.0 * (moment.log10() - 9.1)
}

/// The two families of source parameterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Six independent moment-tensor components.
    MomentTensor,
    /// Three force components.
    Force,
}

impl SourceKind {
    /// Number of basis components, and so of Green's function traces per component.
    #[must_use]
    pub fn n_components(self) -> usize {
        match self {
            Self::MomentTensor => 6,
            Self::Force => 3,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MomentTensor => write!(f, "moment tensor"),
            Self::Force => write!(f, "force"),
        }
    }
}

/// Moment tensor in N·m, up-south-east order: `Mrr, Mtt, Mpp, Mrt, Mrp, Mtp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 6]", into = "[f64; 6]")]
pub struct MomentTensor([f64; 6]);

impl MomentTensor {
    /// Create a moment tensor from its six components.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidSource`] if any component is non-finite.
    pub fn new(components: [f64; 6]) -> Result<Self, MisfitError> {
        if let Some(i) = components.iter().position(|v| !v.is_finite()) {
            return Err(MisfitError::InvalidSource {
                reason: format!("moment tensor component {i} is not finite"),
            });
        }
        Ok(Self(components))
    }

    /// Double-couple moment tensor from fault angles in degrees and moment magnitude.
    ///
    /// Uses the Aki & Richards convention (strike clockwise from north, dip
    /// from horizontal, rake in the fault plane), converted from
    /// north-east-down to up-south-east.
    #[must_use]
    pub fn from_strike_dip_rake(strike: f64, dip: f64, rake: f64, magnitude: f64) -> Self {
        let m0 = moment_from_magnitude(magnitude);
        let (sp, cp) = strike.to_radians().sin_cos();
        let (sd, cd) = dip.to_radians().sin_cos();
        let (sl, cl) = rake.to_radians().sin_cos();
        let (s2p, c2p) = (2.0 * strike.to_radians()).sin_cos();
        let (s2d, c2d) = (2.0 * dip.to_radians()).sin_cos();

        let mxx = -m0 * (sd * cl * s2p + s2d * sl * sp * sp);
        let mxy = m0 * (sd * cl * c2p + 0.5 * s2d * sl * s2p);
        let mxz = -m0 * (cd * cl * cp + c2d * sl * sp);
        let myy = m0 * (sd * cl * s2p - s2d * sl * cp * cp);
        let myz = -m0 * (cd * cl * sp - c2d * sl * cp);
        let mzz = m0 * s2d * sl;

        Self([mzz, mxx, myy, mxz, -myz, -mxy])
    }

    /// Return the six components.
    #[must_use]
    pub fn components(&self) -> &[f64; 6] {
        &self.0
    }

    /// Scalar moment `sqrt(0.5 * Σ Mij²)` in N·m.
    #[must_use]
    pub fn scalar_moment(&self) -> f64 {
        let [rr, tt, pp, rt, rp, tp] = self.0;
        (0.5 * (rr * rr + tt * tt + pp * pp + 2.0 * (rt * rt + rp * rp + tp * tp))).sqrt()
    }

    /// Moment magnitude.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        magnitude_from_moment(self.scalar_moment())
    }
}

impl TryFrom<[f64; 6]> for MomentTensor {
    type Error = MisfitError;

    fn try_from(components: [f64; 6]) -> Result<Self, Self::Error> {
        Self::new(components)
    }
}

impl From<MomentTensor> for [f64; 6] {
    fn from(mt: MomentTensor) -> Self {
        mt.0
    }
}

/// Point force in N, up-south-east order: `Fr, Ft, Fp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Force([f64; 3]);

impl Force {
    /// Create a force from its three components.
    ///
    /// # Errors
    ///
    /// Returns [`MisfitError::InvalidSource`] if any component is non-finite.
    pub fn new(components: [f64; 3]) -> Result<Self, MisfitError> {
        if let Some(i) = components.iter().position(|v| !v.is_finite()) {
            return Err(MisfitError::InvalidSource {
                reason: format!("force component {i} is not finite"),
            });
        }
        Ok(Self(components))
    }

    /// Force from azimuth `phi` (degrees clockwise from north), `h` (cosine
    /// of the angle from vertical up, in `[-1, 1]`), and magnitude in N.
    #[must_use]
    pub fn from_angles(phi: f64, h: f64, magnitude: f64) -> Self {
        let h = h.clamp(-1.0, 1.0);
        let sin_theta = (1.0 - h * h).sqrt();
        let (sp, cp) = phi.to_radians().sin_cos();
        Self([
            magnitude * h,
            -magnitude * sin_theta * cp,
            magnitude * sin_theta * sp,
        ])
    }

    /// Return the three components.
    #[must_use]
    pub fn components(&self) -> &[f64; 3] {
        &self.0
    }

    /// Euclidean norm in N.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.0.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

impl TryFrom<[f64; 3]> for Force {
    type Error = MisfitError;

    fn try_from(components: [f64; 3]) -> Result<Self, Self::Error> {
        Self::new(components)
    }
}

impl From<Force> for [f64; 3] {
    fn from(force: Force) -> Self {
        force.0
    }
}

/// A candidate source mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "components", rename_all = "snake_case")]
pub enum Source {
    /// Moment-tensor source.
    MomentTensor(MomentTensor),
    /// Point-force source.
    Force(Force),
}

impl Source {
    /// Return which family this source belongs to.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::MomentTensor(_) => SourceKind::MomentTensor,
            Self::Force(_) => SourceKind::Force,
        }
    }

    /// Return the components used as linear weights on the Green's function basis.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        match self {
            Self::MomentTensor(mt) => mt.components(),
            Self::Force(f) => f.components(),
        }
    }

    /// Moment magnitude for moment tensors, `None` for forces.
    #[must_use]
    pub fn magnitude(&self) -> Option<f64> {
        match self {
            Self::MomentTensor(mt) => Some(mt.magnitude()),
            Self::Force(_) => None,
        }
    }
}

impl From<MomentTensor> for Source {
    fn from(mt: MomentTensor) -> Self {
        Self::MomentTensor(mt)
    }
}

impl From<Force> for Source {
    fn from(force: Force) -> Self {
        Self::Force(force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn magnitude_round_trip() {
        for mw in [2.0, 4.5, 7.3] {
            let m0 = moment_from_magnitude(mw);
            assert!(close(magnitude_from_moment(m0), mw, 1e-12));
        }
    }

    #[test]
    fn double_couple_has_requested_magnitude() {
        let mt = MomentTensor::from_strike_dip_rake(31.0, 67.0, -42.0, 4.5);
        assert!(close(mt.magnitude(), 4.5, 1e-9));
        let [rr, tt, pp, ..] = *mt.components();
        assert!((rr + tt + pp).abs() < 1e-6 * mt.scalar_moment());
    }

    #[test]
    fn vertical_strike_slip_is_pure_mtp() {
        let mt = MomentTensor::from_strike_dip_rake(0.0, 90.0, 0.0, 4.0);
        let m0 = moment_from_magnitude(4.0);
        let c = mt.components();
        assert!(close(c[5], -m0, 1e-9));
        for v in &c[..5] {
            assert!(v.abs() < 1e-9 * m0, "{c:?}");
        }
    }

    #[test]
    fn rejects_non_finite_components() {
        assert!(MomentTensor::new([0.0, f64::NAN, 0.0, 0.0, 0.0, 0.0]).is_err());
        assert!(Force::new([f64::INFINITY, 0.0, 0.0]).is_err());
    }

    #[test]
    fn force_from_angles() {
        let up = Force::from_angles(0.0, 1.0, 2.0);
        assert_eq!(up.components(), &[2.0, 0.0, 0.0]);
        let north = Force::from_angles(0.0, 0.0, 1.0);
        assert!(close(north.components()[1], -1.0, 1e-12));
        let east = Force::from_angles(90.0, 0.0, 3.0);
        assert!(close(east.components()[2], 3.0, 1e-12));
        assert!(close(east.magnitude(), 3.0, 1e-12));
    }

    #[test]
    fn source_serializes_tagged() {
        let source = Source::from(Force::new([1.0, 2.0, 3.0]).unwrap());
        let json = serde_json::to_string(&source).unwrap();
        assert_eq!(json, r#"{"type":"force","components":[1.0,2.0,3.0]}"#);
        let back: Source = serde_json::from_str(&json).unwrap();
        assert_eq!(back, source);
        assert_eq!(back.kind().n_components(), 3);
    }
}
