use std::path::Path;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Read-only description of one recorded experiment.
pub trait Measurement {
    fn name(&self) -> &str;

    /// Frame file names, ordered by frame number.
    fn frame_names(&self) -> &[String];

    #[inline]
    fn total_frames(&self) -> usize {
        self.frame_names().len()
    }

    /// Frame center in px.
    fn frame_center(&self) -> na::Point2<f64>;

    /// Center-disk exclusion radius in px.
    fn center_disk_radius(&self) -> f64;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeasurementInfo {
    pub name: String,
    pub frame_names: Vec<String>,
    pub frame_center: na::Point2<f64>,
    pub center_disk_radius: f64,
}

impl MeasurementInfo {
    pub fn new(
        name: impl Into<String>,
        mut frame_names: Vec<String>,
        frame_center: na::Point2<f64>,
        center_disk_radius: f64,
    ) -> Self {
        frame_names.sort();

        Self {
            name: name.into(),
            frame_names,
            frame_center,
            center_disk_radius,
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path)?;
        let mut info: Self = serde_json::from_str(&src)?;
        info.frame_names.sort();

        Ok(info)
    }
}

impl Measurement for MeasurementInfo {
    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn frame_names(&self) -> &[String] {
        &self.frame_names
    }

    #[inline]
    fn frame_center(&self) -> na::Point2<f64> {
        self.frame_center
    }

    #[inline]
    fn center_disk_radius(&self) -> f64 {
        self.center_disk_radius
    }
}
