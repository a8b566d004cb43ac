//! Per-particle trajectories over a whole frame sequence.
//!
//! The result is a dense `[frame, slot, 2]` tensor. A slot is a label handed
//! out when a particle is first seen and kept for as long as the matcher can
//! follow it; it is not the per-frame detection index.
//!
//! Two modes are offered:
//!
//! * [`TrajectoryMode::Baseline`] allocates as many slots as the largest
//!   frame, seeds them from frame 0 and writes the nearest detection into every
//!   slot at every step. Ungated, this reproduces historical output, including
//!   implausible jumps. Gated, a slot whose nearest detection is beyond the
//!   maximum displacement keeps its previous position.
//! * [`TrajectoryMode::Robust`] uses mutual nearest-neighbour matching with
//!   the displacement gate. Unmatched slots freeze, unclaimed detections
//!   open new slots and the history of earlier frames is zero-padded.

use nalgebra as na;
use ndarray::{s, Array3, Axis};
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detection::PointSet;
use crate::error::Error;
use crate::frame::FrameSequence;
use crate::matcher::{MatchMode, SpatialMatcher};
use crate::selection::ParticleSelection;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Centering {
    /// Mean of every detection across the whole measurement.
    GlobalMean,
    /// Externally known frame center.
    Fixed(na::Point2<f64>),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryMode {
    Baseline { gated: bool },
    Robust,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryOptions {
    pub mode: TrajectoryMode,
    pub centering: Centering,
    pub max_displacement: f64,
}

impl TrajectoryOptions {
    /// Historical behaviour: fixed center, nearest match always written.
    pub fn baseline(center: na::Point2<f64>, max_displacement: f64) -> Self {
        Self {
            mode: TrajectoryMode::Baseline { gated: false },
            centering: Centering::Fixed(center),
            max_displacement,
        }
    }

    pub fn robust(max_displacement: f64) -> Self {
        Self {
            mode: TrajectoryMode::Robust,
            centering: Centering::GlobalMean,
            max_displacement,
        }
    }

    pub fn with_centering(mut self, centering: Centering) -> Self {
        self.centering = centering;
        self
    }

    pub fn with_mode(mut self, mode: TrajectoryMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Non-fatal conditions found while building trajectories.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataQualityWarning {
    EmptyFrame { frame: usize },
    FrozenSlots { frame: usize, count: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub warnings: Vec<DataQualityWarning>,
    /// Slots opened after frame 0.
    pub new_slots: usize,
    /// Slot updates rejected by the gate or the mutual check.
    pub rejected_matches: usize,
}

impl BuildReport {
    pub fn empty_frames(&self) -> Vec<usize> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                DataQualityWarning::EmptyFrame { frame } => Some(*frame),
                _ => None,
            })
            .collect()
    }

    #[inline]
    pub fn num_empty_frames(&self) -> usize {
        self.empty_frames().len()
    }

    fn empty_frame(&mut self, frame: usize) {
        warn!(frame, "frame has no detections");
        self.warnings.push(DataQualityWarning::EmptyFrame { frame });
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "Array3<f64>")]
pub struct TrajectoryTensor {
    data: Array3<f64>,
}

impl TryFrom<Array3<f64>> for TrajectoryTensor {
    type Error = Error;

    fn try_from(data: Array3<f64>) -> Result<Self, Self::Error> {
        Self::from_array(data)
    }
}

impl TrajectoryTensor {
    pub fn from_array(data: Array3<f64>) -> Result<Self, Error> {
        Error::check_len("coordinate axis", 2, data.len_of(Axis(2)))?;

        Ok(Self { data })
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    #[inline]
    pub fn as_array(&self) -> &Array3<f64> {
        &self.data
    }

    #[inline]
    pub fn into_array(self) -> Array3<f64> {
        self.data
    }

    #[inline]
    pub fn position(&self, frame: usize, slot: usize) -> Option<na::Point2<f64>> {
        if frame >= self.num_frames() || slot >= self.num_slots() {
            return None;
        }

        Some(na::Point2::new(
            self.data[[frame, slot, 0]],
            self.data[[frame, slot, 1]],
        ))
    }

    pub fn frame_positions(&self, frame: usize) -> Option<Vec<na::Point2<f64>>> {
        (0..self.num_slots())
            .map(|slot| self.position(frame, slot))
            .collect()
    }

    pub fn trajectory(&self, slot: usize) -> Option<Vec<na::Point2<f64>>> {
        (0..self.num_frames())
            .map(|frame| self.position(frame, slot))
            .collect()
    }

    /// Frames `first..=last`.
    pub fn window(&self, first: usize, last: usize) -> Option<TrajectoryTensor> {
        if first > last || last >= self.num_frames() {
            return None;
        }

        Some(Self {
            data: self.data.slice(s![first..=last, .., ..]).to_owned(),
        })
    }

    pub fn select(&self, selection: &ParticleSelection) -> TrajectoryTensor {
        let slots = selection.resolve(self.num_slots());

        Self {
            data: self.data.select(Axis(1), &slots),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trajectories {
    pub tensor: TrajectoryTensor,
    pub report: BuildReport,
}

/// Slot storage that can grow while keeping earlier frames zero-padded.
struct SlotArena {
    data: Array3<f64>,
    active: usize,
}

impl SlotArena {
    fn new(num_frames: usize, capacity: usize) -> Self {
        Self {
            data: Array3::zeros((num_frames, capacity, 2)),
            active: 0,
        }
    }

    #[inline]
    fn get(&self, frame: usize, slot: usize) -> na::Point2<f64> {
        na::Point2::new(self.data[[frame, slot, 0]], self.data[[frame, slot, 1]])
    }

    #[inline]
    fn set(&mut self, frame: usize, slot: usize, p: na::Point2<f64>) {
        self.data[[frame, slot, 0]] = p.x;
        self.data[[frame, slot, 1]] = p.y;
    }

    fn row(&self, frame: usize) -> Vec<na::Point2<f64>> {
        (0..self.active).map(|slot| self.get(frame, slot)).collect()
    }

    fn push(&mut self, frame: usize, p: na::Point2<f64>) -> usize {
        let capacity = self.data.len_of(Axis(1));

        if self.active == capacity {
            let (frames, _, _) = self.data.dim();
            let mut grown = Array3::zeros((frames, (capacity * 2).max(4), 2));
            grown.slice_mut(s![.., ..capacity, ..]).assign(&self.data);
            self.data = grown;
        }

        let slot = self.active;
        self.active += 1;
        self.set(frame, slot, p);

        slot
    }

    fn into_tensor(self) -> TrajectoryTensor {
        TrajectoryTensor {
            data: self.data.slice(s![.., ..self.active, ..]).to_owned(),
        }
    }
}

pub struct TrajectoryBuilder {
    options: TrajectoryOptions,
    matcher: SpatialMatcher,
}

impl TrajectoryBuilder {
    pub fn new(options: TrajectoryOptions) -> Result<Self, Error> {
        let mode = match options.mode {
            TrajectoryMode::Baseline { .. } => MatchMode::Nearest,
            TrajectoryMode::Robust => MatchMode::Mutual,
        };

        Ok(Self {
            matcher: SpatialMatcher::new(options.max_displacement, mode)?,
            options,
        })
    }

    #[inline]
    pub fn options(&self) -> &TrajectoryOptions {
        &self.options
    }

    pub fn build_sequence(&self, frames: &FrameSequence) -> Result<Trajectories, Error> {
        self.build(&frames.point_sets())
    }

    pub fn build(&self, frames: &[&PointSet]) -> Result<Trajectories, Error> {
        let centered = self.center(frames);
        let mut report = BuildReport::default();

        info!(
            frames = frames.len(),
            mode = ?self.options.mode,
            "building trajectories"
        );

        let tensor = match self.options.mode {
            TrajectoryMode::Baseline { gated } => {
                self.build_baseline(&centered, gated, &mut report)?
            }
            TrajectoryMode::Robust => self.build_robust(&centered, &mut report)?,
        };

        info!(
            frames = tensor.num_frames(),
            slots = tensor.num_slots(),
            empty_frames = report.num_empty_frames(),
            rejected = report.rejected_matches,
            "trajectories built"
        );

        Ok(Trajectories { tensor, report })
    }

    fn center(&self, frames: &[&PointSet]) -> Vec<Vec<na::Point2<f64>>> {
        let center = match self.options.centering {
            Centering::Fixed(c) => c,
            Centering::GlobalMean => {
                let (sum, count) = frames
                    .iter()
                    .flat_map(|f| f.centers().iter())
                    .fold((na::Vector2::<f64>::zeros(), 0usize), |(s, n), c| {
                        (s + c.coords, n + 1)
                    });

                if count == 0 {
                    na::Point2::origin()
                } else {
                    (sum / count as f64).into()
                }
            }
        };

        debug!(x = center.x, y = center.y, "trajectory reference center");

        frames
            .iter()
            .map(|f| {
                f.centers()
                    .iter()
                    .map(|c| na::Point2::from(*c - center))
                    .collect()
            })
            .collect()
    }

    fn build_baseline(
        &self,
        frames: &[Vec<na::Point2<f64>>],
        gated: bool,
        report: &mut BuildReport,
    ) -> Result<TrajectoryTensor, Error> {
        let num_slots = frames.iter().map(Vec::len).max().unwrap_or(0);
        let mut arena = SlotArena::new(frames.len(), num_slots);

        let first = match frames.first() {
            Some(first) => first,
            None => return Ok(arena.into_tensor()),
        };

        if first.is_empty() {
            report.empty_frame(0);
        }

        for slot in 0..num_slots {
            arena.push(0, first.get(slot).copied().unwrap_or_else(na::Point2::origin));
        }

        for (t, current) in frames.iter().enumerate().skip(1) {
            let prev = arena.row(t - 1);

            if current.is_empty() {
                report.empty_frame(t);

                if gated {
                    for (slot, p) in prev.into_iter().enumerate() {
                        arena.set(t, slot, p);
                    }
                }
                continue;
            }

            let corr = self.matcher.match_points(&prev, current)?;
            let mut frozen = 0;

            for m in corr.iter() {
                let p = if gated && !m.is_valid() {
                    frozen += 1;
                    prev[m.source]
                } else {
                    current[m.target]
                };

                arena.set(t, m.source, p);
            }

            if gated && frozen > 0 {
                debug!(frame = t, count = frozen, "slots held by gate");
                report.rejected_matches += frozen;
                report
                    .warnings
                    .push(DataQualityWarning::FrozenSlots { frame: t, count: frozen });
            }
        }

        Ok(arena.into_tensor())
    }

    fn build_robust(
        &self,
        frames: &[Vec<na::Point2<f64>>],
        report: &mut BuildReport,
    ) -> Result<TrajectoryTensor, Error> {
        let capacity = frames.iter().map(Vec::len).max().unwrap_or(0);
        let mut arena = SlotArena::new(frames.len(), capacity);

        let first = match frames.first() {
            Some(first) => first,
            None => return Ok(arena.into_tensor()),
        };

        if first.is_empty() {
            report.empty_frame(0);
        }

        for p in first {
            arena.push(0, *p);
        }

        for (t, current) in frames.iter().enumerate().skip(1) {
            let prev = arena.row(t - 1);

            for (slot, p) in prev.iter().enumerate() {
                arena.set(t, slot, *p);
            }

            if current.is_empty() {
                report.empty_frame(t);
                continue;
            }

            let corr = self.matcher.match_points(&prev, current)?;
            let mut frozen = 0;

            for m in corr.iter() {
                if m.is_valid() {
                    arena.set(t, m.source, current[m.target]);
                } else {
                    frozen += 1;
                }
            }

            let appeared = corr.unclaimed_targets();
            for &idx in &appeared {
                arena.push(t, current[idx]);
            }

            if frozen > 0 {
                report.rejected_matches += frozen;
                report
                    .warnings
                    .push(DataQualityWarning::FrozenSlots { frame: t, count: frozen });
            }

            if !appeared.is_empty() {
                debug!(frame = t, count = appeared.len(), "new slots");
                report.new_slots += appeared.len();
            }
        }

        Ok(arena.into_tensor())
    }
}
