use serde_derive::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::{AnalysisConfig, Units};
use crate::error::Error;
use nalgebra as na;

/// Contains (x,y) of the disk center and its radius
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "r")]
    pub radius: f64,
}

impl Detection {
    #[inline]
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    #[inline(always)]
    pub fn center(&self) -> na::Point2<f64> {
        na::Point2::new(self.x, self.y)
    }
}

/// Disk centers detected in one frame, with index-aligned radii.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(try_from = "RawPointSet")]
pub struct PointSet {
    centers: Vec<na::Point2<f64>>,
    radii: Vec<f64>,
}

#[derive(Deserialize)]
struct RawPointSet {
    centers: Vec<na::Point2<f64>>,
    radii: Vec<f64>,
}

impl TryFrom<RawPointSet> for PointSet {
    type Error = Error;

    fn try_from(raw: RawPointSet) -> Result<Self, Self::Error> {
        PointSet::new(raw.centers, raw.radii)
    }
}

/// Size statistics of the disks found in one frame. Radii are in mm, areas
/// in mm², the areal fraction in percent of the system area.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameStatistics {
    pub num_detected: usize,
    pub min_detected_radius: f64,
    pub max_detected_radius: f64,
    /// Midpoint between the smallest and largest radius; splits small from
    /// large disks.
    pub medium_radius: f64,
    pub small_disks_num: usize,
    pub large_disks_num: usize,
    /// Sum of the detected disk areas.
    pub covered_detected_area: f64,
    /// Area of the nominal small and large disks plus the center disk.
    pub covered_area: f64,
    pub total_area: f64,
    pub areal_fraction: f64,
}

impl PointSet {
    pub fn new(centers: Vec<na::Point2<f64>>, radii: Vec<f64>) -> Result<Self, Error> {
        Error::check_len("radii", centers.len(), radii.len())?;

        Ok(Self { centers, radii })
    }

    /// Point set without radius information; radii are zero.
    pub fn from_centers(centers: Vec<na::Point2<f64>>) -> Self {
        let radii = vec![0.0; centers.len()];

        Self { centers, radii }
    }

    pub fn from_xy(points: &[(f64, f64)]) -> Self {
        Self::from_centers(
            points
                .iter()
                .map(|&(x, y)| na::Point2::new(x, y))
                .collect(),
        )
    }

    pub fn from_detections(dets: &[Detection]) -> Self {
        Self {
            centers: dets.iter().map(Detection::center).collect(),
            radii: dets.iter().map(|d| d.radius).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    #[inline]
    pub fn centers(&self) -> &[na::Point2<f64>] {
        &self.centers
    }

    #[inline]
    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<Detection> {
        let c = self.centers.get(idx)?;

        Some(Detection::new(c.x, c.y, self.radii[idx]))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        self.centers
            .iter()
            .zip(self.radii.iter())
            .map(|(c, &r)| Detection::new(c.x, c.y, r))
    }

    pub fn mean(&self) -> Option<na::Point2<f64>> {
        if self.is_empty() {
            return None;
        }

        let sum = self
            .centers
            .iter()
            .fold(na::Vector2::<f64>::zeros(), |acc, c| acc + c.coords);

        Some((sum / self.len() as f64).into())
    }

    /// Radius statistics for this frame, `None` when nothing was detected.
    /// `center_disk_radius` is in pixels, like the detected radii.
    pub fn statistics(
        &self,
        config: &AnalysisConfig,
        center_disk_radius: f64,
    ) -> Option<FrameStatistics> {
        if self.is_empty() {
            return None;
        }

        let mm = |px: f64| config.to_units(px, Units::Millimeters);
        let disk_area = |r: f64| PI * r * r;

        let (min, max) = self
            .radii
            .iter()
            .map(|&r| mm(r))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r), hi.max(r))
            });
        let medium = 0.5 * (min + max);

        let small = self.radii.iter().filter(|&&r| mm(r) <= medium).count();
        let large = self.len() - small;

        let covered_detected_area: f64 = self.radii.iter().map(|&r| disk_area(mm(r))).sum();
        let covered_area = disk_area(config.small_disk_radius_mm) * small as f64
            + disk_area(config.large_disk_radius_mm) * large as f64
            + disk_area(mm(center_disk_radius));
        let total_area = disk_area(config.system_radius(Units::Millimeters));

        Some(FrameStatistics {
            num_detected: self.len(),
            min_detected_radius: min,
            max_detected_radius: max,
            medium_radius: medium,
            small_disks_num: small,
            large_disks_num: large,
            covered_detected_area,
            covered_area,
            total_area,
            areal_fraction: 100.0 * covered_detected_area / total_area,
        })
    }
}
