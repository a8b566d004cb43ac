use approx::assert_relative_eq;
use disktrack::{
    AnalysisConfig, DisplacementField, DiskTracker, Error, MatchMode, PointSet, SpatialIndex,
    SpatialMatcher, Units,
};
use nalgebra as na;

/// Small deterministic generator so property checks are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn points(&mut self, n: usize, extent: f64) -> Vec<na::Point2<f64>> {
        (0..n)
            .map(|_| na::Point2::new(self.next_f64() * extent, self.next_f64() * extent))
            .collect()
    }
}

#[test]
fn every_source_gets_one_in_range_match() {
    let mut rng = Lcg(7);

    for (n, m) in [(1, 1), (5, 40), (40, 5), (100, 100)] {
        let source = rng.points(n, 500.0);
        let target = rng.points(m, 500.0);

        for mode in [MatchMode::Nearest, MatchMode::Mutual] {
            let corr = SpatialMatcher::new(30.0, mode)
                .unwrap()
                .match_points(&source, &target)
                .unwrap();

            assert_eq!(corr.len(), n);
            for (idx, mt) in corr.iter().enumerate() {
                assert_eq!(mt.source, idx);
                assert!(mt.target < m);
                assert!(mt.distance >= 0.0);
                if mt.is_valid() {
                    assert!(mt.distance < 30.0);
                }
                if mode == MatchMode::Nearest {
                    assert_eq!(mt.is_valid(), mt.distance < 30.0);
                }
            }
        }
    }
}

#[test]
fn matches_brute_force_nearest() {
    let mut rng = Lcg(42);
    let source = rng.points(60, 200.0);
    let target = rng.points(80, 200.0);
    let index = SpatialIndex::build(&target).unwrap();

    for p in &source {
        let (idx, dist) = index.nearest(p).unwrap();
        let brute = target
            .iter()
            .map(|t| na::distance(p, t))
            .fold(f64::INFINITY, f64::min);

        assert_relative_eq!(dist, brute);
        assert_relative_eq!(na::distance(p, &target[idx]), brute);
    }
}

#[test]
fn repeated_matching_is_identical() {
    let mut rng = Lcg(3);
    let source = rng.points(50, 100.0);
    let target = rng.points(50, 100.0);
    let matcher = SpatialMatcher::new(10.0, MatchMode::Mutual).unwrap();

    let a = matcher.match_points(&source, &target).unwrap();
    let b = matcher.match_points(&source, &target).unwrap();

    assert_eq!(a, b);
}

#[test]
fn mutual_matches_never_share_a_target() {
    let mut rng = Lcg(11);
    let source = rng.points(120, 300.0);
    let target = rng.points(90, 300.0);

    let corr = SpatialMatcher::new(50.0, MatchMode::Mutual)
        .unwrap()
        .match_points(&source, &target)
        .unwrap();

    let mut seen = vec![false; target.len()];
    for mt in corr.valid() {
        assert!(!seen[mt.target]);
        seen[mt.target] = true;
    }
}

#[test]
fn default_gate_comes_from_small_disk_diameter() {
    let tracker = DiskTracker::new(AnalysisConfig::default()).unwrap();
    let source = PointSet::from_xy(&[(0.0, 0.0), (500.0, 500.0)]);
    let target = PointSet::from_xy(&[(79.0, 0.0), (580.0, 500.0)]);

    let corr = tracker
        .match_points(&source, &target, MatchMode::Nearest)
        .unwrap();

    assert_relative_eq!(
        tracker.matcher(MatchMode::Nearest).unwrap().max_displacement(),
        tracker.config().max_displacement(Units::Pixels)
    );
    assert!(corr.matches()[0].is_valid());
    assert!(!corr.matches()[1].is_valid());
}

#[test]
fn displacement_field_uses_valid_matches_only() {
    let source = vec![na::Point2::new(0.0, 0.0), na::Point2::new(50.0, 0.0)];
    let target = vec![na::Point2::new(2.0, 1.0), na::Point2::new(90.0, 0.0)];

    let corr = SpatialMatcher::new(10.0, MatchMode::Nearest)
        .unwrap()
        .match_points(&source, &target)
        .unwrap();
    let field = DisplacementField::from_correspondence(&source, &target, &corr).unwrap();

    assert_eq!(field.len(), 1);
    let p = field.points()[0];
    assert_relative_eq!(p.x, 0.0);
    assert_relative_eq!(p.u, 2.0);
    assert_relative_eq!(p.v, 1.0);
}

#[test]
fn empty_destination_is_reported() {
    let err = SpatialMatcher::new(10.0, MatchMode::Mutual)
        .unwrap()
        .match_sets(&PointSet::from_xy(&[(1.0, 1.0)]), &PointSet::default())
        .unwrap_err();

    assert!(matches!(err, Error::EmptyDestinationSet));
}
