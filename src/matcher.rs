//! Nearest-neighbour correspondence between two point sets.
//!
//! The destination set is indexed once in a k-d tree and every source point
//! is queried against it. A match is valid only when its distance is below
//! the configured maximum displacement. In [`MatchMode::Mutual`] a match
//! `(i, j)` additionally requires `i` to be the nearest source of `j`, so no
//! destination point is claimed twice.

use std::cmp::Ordering;

use kd_tree::{KdPoint, KdTree};
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::detection::PointSet;
use crate::error::Error;

#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    pos: [f64; 2],
    idx: usize,
}

impl IndexedPoint {
    #[inline]
    fn new(p: &na::Point2<f64>, idx: usize) -> Self {
        Self {
            pos: [p.x, p.y],
            idx,
        }
    }
}

impl KdPoint for IndexedPoint {
    type Scalar = f64;
    type Dim = typenum::U2;

    #[inline]
    fn at(&self, k: usize) -> f64 {
        self.pos[k]
    }
}

/// k-d tree over one point set. Build once, query many times.
pub struct SpatialIndex {
    tree: KdTree<IndexedPoint>,
    points: Vec<na::Point2<f64>>,
}

impl SpatialIndex {
    pub fn build(points: &[na::Point2<f64>]) -> Result<Self, Error> {
        if points.is_empty() {
            return Err(Error::EmptyDestinationSet);
        }

        let items = points
            .iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint::new(p, idx))
            .collect();

        Ok(Self {
            tree: KdTree::build_by_ordered_float(items),
            points: points.to_vec(),
        })
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
    pub fn points(&self) -> &[na::Point2<f64>] {
        &self.points
    }

    /// Index of and distance to the nearest indexed point. Equidistant
    /// candidates resolve to the lowest index.
    pub fn nearest(&self, query: &na::Point2<f64>) -> Option<(usize, f64)> {
        let q = IndexedPoint::new(query, usize::MAX);
        let found = self.tree.nearest(&q)?;

        let radius = found.squared_distance.sqrt() * (1.0 + 1e-9) + f64::EPSILON;
        let idx = self
            .tree
            .within_radius(&q, radius)
            .into_iter()
            .map(|item| {
                (
                    item.idx,
                    na::distance_squared(query, &self.points[item.idx]),
                )
            })
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            })
            .map(|(idx, _)| idx)
            .unwrap_or(found.item.idx);

        Some((idx, na::distance(query, &self.points[idx])))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Plain nearest neighbour; several sources may share one target.
    Nearest,
    /// Keep only pairs that are each other's nearest neighbour.
    Mutual,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Valid,
    BeyondGate,
    NotMutual,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub source: usize,
    pub target: usize,
    pub distance: f64,
    pub status: MatchStatus,
}

impl Match {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status == MatchStatus::Valid
    }
}

/// One [`Match`] per source point, in source order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Correspondence {
    matches: Vec<Match>,
    num_targets: usize,
}

impl Correspondence {
    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    #[inline]
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    #[inline]
    pub fn get(&self, source: usize) -> Option<&Match> {
        self.matches.get(source)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter()
    }

    #[inline]
    pub fn valid(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.is_valid())
    }

    #[inline]
    pub fn num_valid(&self) -> usize {
        self.valid().count()
    }

    #[inline]
    pub fn num_targets(&self) -> usize {
        self.num_targets
    }

    /// Target indices claimed by at least one valid match.
    pub fn claimed(&self) -> Vec<bool> {
        let mut claimed = vec![false; self.num_targets];

        for m in self.valid() {
            claimed[m.target] = true;
        }

        claimed
    }

    pub fn unclaimed_targets(&self) -> Vec<usize> {
        self.claimed()
            .into_iter()
            .enumerate()
            .filter_map(|(idx, c)| if c { None } else { Some(idx) })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMatcher {
    max_displacement: f64,
    mode: MatchMode,
}

impl SpatialMatcher {
    pub fn new(max_displacement: f64, mode: MatchMode) -> Result<Self, Error> {
        if !(max_displacement.is_finite() && max_displacement > 0.0) {
            return Err(Error::config(format!(
                "maximum displacement must be positive, got {}",
                max_displacement
            )));
        }

        Ok(Self {
            max_displacement,
            mode,
        })
    }

    #[inline]
    pub fn max_displacement(&self) -> f64 {
        self.max_displacement
    }

    #[inline]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    #[inline]
    fn gate(&self, distance: f64) -> MatchStatus {
        if distance < self.max_displacement {
            MatchStatus::Valid
        } else {
            MatchStatus::BeyondGate
        }
    }

    pub fn match_sets(&self, source: &PointSet, target: &PointSet) -> Result<Correspondence, Error> {
        self.match_points(source.centers(), target.centers())
    }

    pub fn match_points(
        &self,
        source: &[na::Point2<f64>],
        target: &[na::Point2<f64>],
    ) -> Result<Correspondence, Error> {
        if source.is_empty() {
            return Ok(Correspondence {
                matches: Vec::new(),
                num_targets: target.len(),
            });
        }

        let index = SpatialIndex::build(target)?;

        self.match_indexed(source, &index)
    }

    /// Same as [`SpatialMatcher::match_points`] against a prebuilt target
    /// index.
    pub fn match_indexed(
        &self,
        source: &[na::Point2<f64>],
        target: &SpatialIndex,
    ) -> Result<Correspondence, Error> {
        let mut matches = Vec::with_capacity(source.len());

        for (idx, p) in source.iter().enumerate() {
            let (target_idx, distance) = target.nearest(p).ok_or(Error::EmptyDestinationSet)?;

            matches.push(Match {
                source: idx,
                target: target_idx,
                distance,
                status: self.gate(distance),
            });
        }

        if self.mode == MatchMode::Mutual && !source.is_empty() {
            let reverse = SpatialIndex::build(source)?;

            for m in matches.iter_mut().filter(|m| m.is_valid()) {
                match reverse.nearest(&target.points()[m.target]) {
                    Some((back, back_dist)) if back == m.source => {
                        m.status = self.gate(back_dist);
                    }
                    _ => m.status = MatchStatus::NotMutual,
                }
            }
        }

        Ok(Correspondence {
            matches,
            num_targets: target.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pts(xy: &[(f64, f64)]) -> Vec<na::Point2<f64>> {
        xy.iter().map(|&(x, y)| na::Point2::new(x, y)).collect()
    }

    #[test]
    fn nearest_within_gate_is_valid() {
        let matcher = SpatialMatcher::new(10.0, MatchMode::Nearest).unwrap();
        let corr = matcher
            .match_points(&pts(&[(0.0, 0.0)]), &pts(&[(5.0, 0.0), (100.0, 100.0)]))
            .unwrap();

        assert_eq!(corr.len(), 1);
        let m = corr.get(0).unwrap();
        assert_eq!(m.target, 0);
        assert_relative_eq!(m.distance, 5.0);
        assert!(m.is_valid());
    }

    #[test]
    fn gate_is_exclusive() {
        let matcher = SpatialMatcher::new(5.0, MatchMode::Nearest).unwrap();
        let corr = matcher
            .match_points(&pts(&[(0.0, 0.0), (0.0, 20.0)]), &pts(&[(5.0, 0.0), (0.0, 24.0)]))
            .unwrap();

        assert_eq!(corr.matches()[0].status, MatchStatus::BeyondGate);
        assert_eq!(corr.matches()[1].status, MatchStatus::Valid);
        assert_eq!(corr.num_valid(), 1);
    }

    #[test]
    fn identical_sets_match_mutually_at_zero_distance() {
        let set = pts(&[(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);

        for mode in [MatchMode::Nearest, MatchMode::Mutual] {
            let corr = SpatialMatcher::new(1.0, mode)
                .unwrap()
                .match_points(&set, &set)
                .unwrap();

            for (idx, m) in corr.iter().enumerate() {
                assert_eq!(m.target, idx);
                assert_relative_eq!(m.distance, 0.0);
                assert!(m.is_valid());
            }
            assert!(corr.unclaimed_targets().is_empty());
        }
    }

    #[test]
    fn mutual_mode_resolves_collisions() {
        let source = pts(&[(0.0, 0.0), (3.0, 0.0)]);
        let target = pts(&[(2.0, 0.0), (50.0, 0.0)]);

        let nearest = SpatialMatcher::new(10.0, MatchMode::Nearest)
            .unwrap()
            .match_points(&source, &target)
            .unwrap();
        assert_eq!(nearest.num_valid(), 2);
        assert!(nearest.iter().all(|m| m.target == 0));

        let mutual = SpatialMatcher::new(10.0, MatchMode::Mutual)
            .unwrap()
            .match_points(&source, &target)
            .unwrap();
        assert_eq!(mutual.matches()[0].status, MatchStatus::NotMutual);
        assert_eq!(mutual.matches()[1].status, MatchStatus::Valid);
        assert_eq!(mutual.unclaimed_targets(), vec![1]);
    }

    #[test]
    fn ties_resolve_to_lowest_target_index() {
        let target = pts(&[(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)]);
        let index = SpatialIndex::build(&target).unwrap();

        for _ in 0..3 {
            let (idx, dist) = index.nearest(&na::Point2::new(0.0, 0.0)).unwrap();
            assert_eq!(idx, 0);
            assert_relative_eq!(dist, 1.0);
        }
    }

    #[test]
    fn empty_target_is_an_error() {
        let matcher = SpatialMatcher::new(10.0, MatchMode::Nearest).unwrap();
        let err = matcher.match_points(&pts(&[(0.0, 0.0)]), &[]).unwrap_err();

        assert!(matches!(err, Error::EmptyDestinationSet));
        assert!(matcher.match_points(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn invalid_gate_is_a_configuration_error() {
        assert!(matches!(
            SpatialMatcher::new(0.0, MatchMode::Nearest),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            SpatialMatcher::new(f64::NAN, MatchMode::Mutual),
            Err(Error::Configuration(_))
        ));
    }
}
