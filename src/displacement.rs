//! Radial/tangential decomposition of a displacement field and ring averages.
//!
//! No unit conversion happens here; positions, displacements, radii and the
//! magnitude cutoff must all be given in the same unit.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::matcher::Correspondence;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FieldPoint {
    pub x: f64,
    pub y: f64,
    pub u: f64,
    pub v: f64,
}

impl FieldPoint {
    #[inline(always)]
    pub fn position(&self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }

    #[inline(always)]
    pub fn displacement(&self) -> na::Vector2<f64> {
        na::Vector2::new(self.u, self.v)
    }

    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.u.hypot(self.v)
    }
}

/// (x, y, u, v) samples, optionally flagged valid/invalid.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(try_from = "RawField")]
pub struct DisplacementField {
    points: Vec<FieldPoint>,
    valid: Option<Vec<bool>>,
}

#[derive(Deserialize)]
struct RawField {
    points: Vec<FieldPoint>,
    valid: Option<Vec<bool>>,
}

impl TryFrom<RawField> for DisplacementField {
    type Error = Error;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        if let Some(flags) = &raw.valid {
            Error::check_len("valid", raw.points.len(), flags.len())?;
        }

        Ok(Self {
            points: raw.points,
            valid: raw.valid,
        })
    }
}

impl DisplacementField {
    pub fn new(points: Vec<FieldPoint>) -> Self {
        Self {
            points,
            valid: None,
        }
    }

    pub fn from_components(
        x: &[f64],
        y: &[f64],
        u: &[f64],
        v: &[f64],
        valid: Option<&[bool]>,
    ) -> Result<Self, Error> {
        let n = x.len();
        Error::check_len("y", n, y.len())?;
        Error::check_len("u", n, u.len())?;
        Error::check_len("v", n, v.len())?;

        if let Some(flags) = valid {
            Error::check_len("valid", n, flags.len())?;
        }

        let points = (0..n)
            .map(|i| FieldPoint {
                x: x[i],
                y: y[i],
                u: u[i],
                v: v[i],
            })
            .collect();

        Ok(Self {
            points,
            valid: valid.map(<[bool]>::to_vec),
        })
    }

    /// Field anchored at the source positions of every valid match, pointing
    /// to the matched target.
    pub fn from_correspondence(
        source: &[na::Point2<f64>],
        target: &[na::Point2<f64>],
        corr: &Correspondence,
    ) -> Result<Self, Error> {
        Error::check_len("source", corr.len(), source.len())?;
        Error::check_len("target", corr.num_targets(), target.len())?;

        let points = corr
            .valid()
            .map(|m| {
                let from = source[m.source];
                let d = target[m.target] - from;

                FieldPoint {
                    x: from.x,
                    y: from.y,
                    u: d.x,
                    v: d.y,
                }
            })
            .collect();

        Ok(Self::new(points))
    }

    /// Same field with positions and displacements multiplied by `factor`,
    /// e.g. `1.0 / pixel_to_mm_ratio` to go from px to mm.
    pub fn scaled(&self, factor: f64) -> Self {
        let points = self
            .points
            .iter()
            .map(|p| FieldPoint {
                x: p.x * factor,
                y: p.y * factor,
                u: p.u * factor,
                v: p.v * factor,
            })
            .collect();

        Self {
            points,
            valid: self.valid.clone(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[FieldPoint] {
        &self.points
    }

    #[inline]
    pub fn valid_flags(&self) -> Option<&[bool]> {
        self.valid.as_deref()
    }

    /// Points that pass the validity flags, if any were supplied.
    pub fn iter_valid(&self) -> impl Iterator<Item = &FieldPoint> {
        let flags = self.valid.as_deref();

        self.points
            .iter()
            .enumerate()
            .filter(move |(idx, _)| flags.map_or(true, |f| f[*idx]))
            .map(|(_, p)| p)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum FieldCentering {
    /// Known frame center.
    Fixed(na::Point2<f64>),
    /// Centroid of the positions left after magnitude filtering.
    Centroid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RingParams {
    pub centering: FieldCentering,
    /// Center-disk exclusion radius.
    pub min_radius: f64,
    pub max_radius: Option<f64>,
    /// Points with a longer displacement are discarded.
    pub magnitude_cutoff: Option<f64>,
    pub ring_count: usize,
    /// Added to the largest radius when computing ring width.
    pub edge_padding: f64,
}

impl RingParams {
    pub fn new(centering: FieldCentering, min_radius: f64, ring_count: usize) -> Self {
        Self {
            centering,
            min_radius,
            max_radius: None,
            magnitude_cutoff: None,
            ring_count,
            edge_padding: 1.0,
        }
    }

    pub fn with_max_radius(mut self, max_radius: f64) -> Self {
        self.max_radius = Some(max_radius);
        self
    }

    pub fn with_magnitude_cutoff(mut self, cutoff: f64) -> Self {
        self.magnitude_cutoff = Some(cutoff);
        self
    }

    pub fn with_edge_padding(mut self, padding: f64) -> Self {
        self.edge_padding = padding;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ring_count == 0 {
            return Err(Error::config("ring count must be at least 1"));
        }

        if !(self.min_radius.is_finite() && self.min_radius >= 0.0) {
            return Err(Error::config(format!(
                "minimum radius must be non-negative, got {}",
                self.min_radius
            )));
        }

        if let Some(max) = self.max_radius {
            if !(max >= self.min_radius) {
                return Err(Error::config(format!(
                    "maximum radius {} is below minimum radius {}",
                    max, self.min_radius
                )));
            }
        }

        if let Some(cutoff) = self.magnitude_cutoff {
            if !(cutoff >= 0.0) {
                return Err(Error::config(format!(
                    "magnitude cutoff must be non-negative, got {}",
                    cutoff
                )));
            }
        }

        if !(self.edge_padding.is_finite() && self.edge_padding >= 0.0) {
            return Err(Error::config(format!(
                "edge padding must be non-negative, got {}",
                self.edge_padding
            )));
        }

        Ok(())
    }
}

/// One field point in polar form around the chosen center.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PolarSample {
    pub r: f64,
    pub radial: f64,
    pub tangential: f64,
}

/// Mean radial and tangential displacement per ring.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RingProfile {
    /// Lower bound of each ring.
    pub radii: Vec<f64>,
    pub dr: f64,
    pub radial: Vec<f64>,
    pub tangential: Vec<f64>,
}

impl RingProfile {
    #[inline]
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    /// (lower bound, radial mean, tangential mean) per ring.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.radii
            .iter()
            .zip(self.radial.iter())
            .zip(self.tangential.iter())
            .map(|((&r, &rad), &tan)| (r, rad, tan))
    }

    /// First ring whose half-open interval contains `r`.
    pub fn ring_of(&self, r: f64) -> Option<usize> {
        self.radii
            .iter()
            .position(|&lower| lower <= r && r < lower + self.dr)
    }
}

/// Polar samples of every point that survives filtering.
pub fn decompose(field: &DisplacementField, params: &RingParams) -> Result<Vec<PolarSample>, Error> {
    params.validate()?;

    let kept: Vec<&FieldPoint> = field
        .iter_valid()
        .filter(|p| params.magnitude_cutoff.map_or(true, |c| p.magnitude() <= c))
        .collect();

    let center = match params.centering {
        FieldCentering::Fixed(c) => c,
        FieldCentering::Centroid => {
            if kept.is_empty() {
                return Ok(Vec::new());
            }

            let sum = kept
                .iter()
                .fold(na::Vector2::<f64>::zeros(), |acc, p| acc + p.position().coords);

            (sum / kept.len() as f64).into()
        }
    };

    let samples = kept
        .into_iter()
        .filter_map(|p| {
            let rel = p.position() - center;
            let r = rel.norm();

            if !(r > 0.0) || r < params.min_radius {
                return None;
            }

            if params.max_radius.map_or(false, |max| r > max) {
                return None;
            }

            let r_hat = rel / r;
            let theta_hat = na::Vector2::new(-r_hat.y, r_hat.x);
            let d = p.displacement();

            Some(PolarSample {
                r,
                radial: d.dot(&r_hat),
                tangential: d.dot(&theta_hat),
            })
        })
        .collect();

    Ok(samples)
}

/// Bins polar samples into `ring_count` rings from `min_radius` to the largest
/// observed radius.
pub fn ring_average(samples: &[PolarSample], params: &RingParams) -> Result<RingProfile, Error> {
    params.validate()?;

    let max_r = samples
        .iter()
        .map(|s| s.r)
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
        .ok_or(Error::EmptyRadiusSet)?;

    let n = params.ring_count;
    let min_r = params.min_radius;
    let dr = (max_r + params.edge_padding - min_r) / n as f64;

    let radii: Vec<f64> = if n == 1 {
        vec![min_r]
    } else {
        let step = (max_r - min_r) / (n - 1) as f64;
        (0..n)
            .map(|i| if i == n - 1 { max_r } else { min_r + step * i as f64 })
            .collect()
    };

    let mut radial = Vec::with_capacity(n);
    let mut tangential = Vec::with_capacity(n);

    for &lower in &radii {
        let (count, rad_sum, tan_sum) = samples
            .iter()
            .filter(|s| lower <= s.r && s.r < lower + dr)
            .fold((0usize, 0.0, 0.0), |(c, rs, ts), s| {
                (c + 1, rs + s.radial, ts + s.tangential)
            });

        if count == 0 {
            radial.push(0.0);
            tangential.push(0.0);
        } else {
            radial.push(rad_sum / count as f64);
            tangential.push(tan_sum / count as f64);
        }
    }

    Ok(RingProfile {
        radii,
        dr,
        radial,
        tangential,
    })
}

pub fn compute_displacement_field(
    field: &DisplacementField,
    params: &RingParams,
) -> Result<RingProfile, Error> {
    let samples = decompose(field, params)?;

    ring_average(&samples, params)
}
