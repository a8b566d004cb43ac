pub mod config;
pub mod detection;
pub mod detector;
pub mod displacement;
pub mod error;
pub mod frame;
pub mod matcher;
pub mod measurement;
pub mod pairs;
pub mod selection;
pub mod trajectory;

pub use config::{AnalysisConfig, Units};
pub use detection::{Detection, FrameStatistics, PointSet};
pub use detector::{detect_measurement, Detector};
pub use displacement::{
    DisplacementField, FieldCentering, FieldPoint, PolarSample, RingParams, RingProfile,
};
pub use error::Error;
pub use frame::{Frame, FrameSequence};
pub use matcher::{Correspondence, Match, MatchMode, MatchStatus, SpatialIndex, SpatialMatcher};
pub use measurement::{Measurement, MeasurementInfo};
pub use pairs::FramePairs;
pub use selection::ParticleSelection;
pub use trajectory::{
    BuildReport, Centering, DataQualityWarning, Trajectories, TrajectoryBuilder,
    TrajectoryMode, TrajectoryOptions, TrajectoryTensor,
};

use nalgebra as na;
use std::collections::hash_map::{Entry, HashMap};
use tracing::{info, warn};

/// Displacement field between two frames of a batch run.
#[derive(Debug)]
pub struct PairField {
    pub first: usize,
    pub second: usize,
    pub field: Result<DisplacementField, Error>,
}

#[derive(Debug)]
pub struct PairProfile {
    pub first: usize,
    pub second: usize,
    pub profile: Result<RingProfile, Error>,
}

/// Entry point tying one [`AnalysisConfig`] to the matcher, the trajectory
/// builder and the ring calculator. Matching works in pixels.
#[derive(Debug, Clone)]
pub struct DiskTracker {
    config: AnalysisConfig,
}

impl DiskTracker {
    pub fn new(config: AnalysisConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn matcher(&self, mode: MatchMode) -> Result<SpatialMatcher, Error> {
        SpatialMatcher::new(self.config.max_displacement(Units::Pixels), mode)
    }

    pub fn match_points(
        &self,
        source: &PointSet,
        target: &PointSet,
        mode: MatchMode,
    ) -> Result<Correspondence, Error> {
        self.matcher(mode)?.match_sets(source, target)
    }

    pub fn default_trajectory_options(&self) -> TrajectoryOptions {
        TrajectoryOptions::robust(self.config.max_displacement(Units::Pixels))
    }

    /// Historical trajectory settings for `measurement`: ungated baseline
    /// around the known frame center.
    pub fn baseline_trajectory_options<M: Measurement + ?Sized>(
        &self,
        measurement: &M,
    ) -> TrajectoryOptions {
        TrajectoryOptions::baseline(
            measurement.frame_center(),
            self.config.max_displacement(Units::Pixels),
        )
    }

    pub fn build_trajectories(
        &self,
        frames: &FrameSequence,
        options: TrajectoryOptions,
    ) -> Result<Trajectories, Error> {
        TrajectoryBuilder::new(options)?.build_sequence(frames)
    }

    /// Ring parameters for `measurement` in `units`: fixed frame center,
    /// center disk excluded, spurious jumps cut off.
    pub fn default_ring_params<M: Measurement + ?Sized>(
        &self,
        measurement: &M,
        units: Units,
    ) -> RingParams {
        let c = measurement.frame_center();
        let center = na::Point2::new(
            self.config.to_units(c.x, units),
            self.config.to_units(c.y, units),
        );

        RingParams::new(
            FieldCentering::Fixed(center),
            self.config.to_units(measurement.center_disk_radius(), units),
            self.config.ring_count,
        )
        .with_magnitude_cutoff(self.config.magnitude_cutoff(units))
        .with_edge_padding(self.config.ring_edge_padding(units))
    }

    /// Radius statistics of every frame, `None` for frames without disks.
    pub fn frame_statistics<M: Measurement + ?Sized>(
        &self,
        frames: &FrameSequence,
        measurement: &M,
    ) -> Vec<Option<FrameStatistics>> {
        frames
            .iter()
            .map(|frame| {
                frame
                    .points
                    .statistics(&self.config, measurement.center_disk_radius())
            })
            .collect()
    }

    pub fn compute_displacement_field(
        &self,
        field: &DisplacementField,
        params: &RingParams,
    ) -> Result<RingProfile, Error> {
        displacement::compute_displacement_field(field, params)
    }

    /// Matches every scheduled frame pair. Configuration problems fail the
    /// whole run; a pair that cannot be matched is logged and reported in
    /// its [`PairField`].
    pub fn pair_fields(
        &self,
        frames: &FrameSequence,
        pairs: FramePairs,
        mode: MatchMode,
    ) -> Result<Vec<PairField>, Error> {
        let matcher = self.matcher(mode)?;
        let schedule = pairs.pairs(frames.len())?;
        let mut indexes: HashMap<usize, SpatialIndex> = HashMap::new();
        let mut out = Vec::with_capacity(schedule.len());

        info!(pairs = schedule.len(), ?mode, "matching frame pairs");

        for (first, second) in schedule {
            let source = &frames.frames()[first].points;
            let target = &frames.frames()[second].points;

            let field = Self::pair_field(&matcher, &mut indexes, second, source, target);

            if let Err(err) = &field {
                warn!(first, second, error = %err, "skipping frame pair");
            }

            out.push(PairField {
                first,
                second,
                field,
            });
        }

        Ok(out)
    }

    fn pair_field(
        matcher: &SpatialMatcher,
        indexes: &mut HashMap<usize, SpatialIndex>,
        target_idx: usize,
        source: &PointSet,
        target: &PointSet,
    ) -> Result<DisplacementField, Error> {
        if source.is_empty() {
            return Ok(DisplacementField::default());
        }

        let index = match indexes.entry(target_idx) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(SpatialIndex::build(target.centers())?),
        };

        let corr = matcher.match_indexed(source.centers(), index)?;

        DisplacementField::from_correspondence(source.centers(), target.centers(), &corr)
    }

    /// Ring profile of every successfully matched pair. Failed pairs carry
    /// their error forward.
    pub fn ring_profiles(&self, fields: Vec<PairField>, params: &RingParams) -> Vec<PairProfile> {
        fields
            .into_iter()
            .map(|pf| {
                let profile = pf
                    .field
                    .and_then(|field| self.compute_displacement_field(&field, params));

                if let Err(err) = &profile {
                    warn!(first = pf.first, second = pf.second, error = %err, "no ring profile");
                }

                PairProfile {
                    first: pf.first,
                    second: pf.second,
                    profile,
                }
            })
            .collect()
    }
}
