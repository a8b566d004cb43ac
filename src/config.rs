//! Experiment geometry and optics.
//!
//! All lengths are stored in millimeters except `ring_edge_padding`, which is
//! in pixels. Use the [`Units`] accessors to get values in the unit the caller
//! works in.

use serde_derive::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Pixels,
    Millimeters,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// px per mm
    pub pixel_to_mm_ratio: f64,
    pub small_disk_radius_mm: f64,
    pub large_disk_radius_mm: f64,
    pub total_system_radius_mm: f64,
    pub ring_count: usize,
    /// Added to the outermost radius before dividing into rings, in px.
    pub ring_edge_padding: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pixel_to_mm_ratio: 16.0,
            small_disk_radius_mm: 2.5,
            large_disk_radius_mm: 3.5,
            total_system_radius_mm: 84.0,
            ring_count: 100,
            ring_edge_padding: 1.0,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(src: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(src)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path)?;

        Self::from_json_str(&src)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let lengths = [
            ("pixel_to_mm_ratio", self.pixel_to_mm_ratio),
            ("small_disk_radius_mm", self.small_disk_radius_mm),
            ("large_disk_radius_mm", self.large_disk_radius_mm),
            ("total_system_radius_mm", self.total_system_radius_mm),
        ];

        for (name, value) in lengths {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::config(format!(
                    "`{}` must be positive, got {}",
                    name, value
                )));
            }
        }

        if self.ring_count == 0 {
            return Err(Error::config("`ring_count` must be at least 1"));
        }

        if !(self.ring_edge_padding.is_finite() && self.ring_edge_padding >= 0.0) {
            return Err(Error::config(format!(
                "`ring_edge_padding` must be non-negative, got {}",
                self.ring_edge_padding
            )));
        }

        Ok(())
    }

    #[inline]
    fn from_mm(&self, mm: f64, units: Units) -> f64 {
        match units {
            Units::Millimeters => mm,
            Units::Pixels => mm * self.pixel_to_mm_ratio,
        }
    }

    #[inline]
    pub fn to_units(&self, px: f64, units: Units) -> f64 {
        match units {
            Units::Pixels => px,
            Units::Millimeters => px / self.pixel_to_mm_ratio,
        }
    }

    /// Largest plausible nearest-neighbour jump between two frames: one small
    /// disk diameter.
    #[inline]
    pub fn max_displacement(&self, units: Units) -> f64 {
        self.from_mm(2.0 * self.small_disk_radius_mm, units)
    }

    /// Displacements longer than half a large disk diameter are spurious.
    #[inline]
    pub fn magnitude_cutoff(&self, units: Units) -> f64 {
        self.from_mm(self.large_disk_radius_mm, units)
    }

    #[inline]
    pub fn system_radius(&self, units: Units) -> f64 {
        self.from_mm(self.total_system_radius_mm, units)
    }

    #[inline]
    pub fn ring_edge_padding(&self, units: Units) -> f64 {
        self.to_units(self.ring_edge_padding, units)
    }
}
