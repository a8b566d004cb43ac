use approx::{assert_abs_diff_eq, assert_relative_eq};
use disktrack::{
    AnalysisConfig, DisplacementField, DiskTracker, Error, FieldCentering, MeasurementInfo,
    RingParams, Units,
};
use nalgebra as na;

/// Rigid rotation plus outward expansion about `center`.
fn swirl(center: (f64, f64), n: usize) -> DisplacementField {
    let (mut x, mut y, mut u, mut v) = (vec![], vec![], vec![], vec![]);

    for i in 0..n {
        let angle = i as f64 * 0.37;
        let r = 250.0 + (i * 17 % 900) as f64;
        let (s, c) = angle.sin_cos();

        x.push(center.0 + r * c);
        y.push(center.1 + r * s);
        // 3 px outward, 5 px counterclockwise
        u.push(3.0 * c - 5.0 * s);
        v.push(3.0 * s + 5.0 * c);
    }

    DisplacementField::from_components(&x, &y, &u, &v, None).unwrap()
}

#[test]
fn one_ring_purely_radial() {
    let field = DisplacementField::from_components(
        &[1.0, 2.0, 3.0],
        &[0.0, 0.0, 0.0],
        &[1.0, 1.0, 1.0],
        &[0.0, 0.0, 0.0],
        None,
    )
    .unwrap();
    let params = RingParams::new(FieldCentering::Fixed(na::Point2::origin()), 0.0, 1);

    let profile = disktrack::displacement::compute_displacement_field(&field, &params).unwrap();

    assert_relative_eq!(profile.radial[0], 1.0);
    assert_abs_diff_eq!(profile.tangential[0], 0.0);
}

#[test]
fn profile_is_dense_and_bounded() {
    let field = swirl((800.0, 600.0), 300);

    for ring_count in [1, 7, 50, 100, 400] {
        let params = RingParams::new(
            FieldCentering::Fixed(na::Point2::new(800.0, 600.0)),
            240.0,
            ring_count,
        );
        let profile =
            disktrack::displacement::compute_displacement_field(&field, &params).unwrap();
        let max_r = disktrack::displacement::decompose(&field, &params)
            .unwrap()
            .iter()
            .map(|s| s.r)
            .fold(0.0, f64::max);

        assert_eq!(profile.len(), ring_count);
        assert_eq!(profile.radial.len(), ring_count);
        assert_eq!(profile.tangential.len(), ring_count);

        for (lower, radial, tangential) in profile.iter() {
            assert!(lower >= 240.0 && lower <= max_r + profile.dr);
            assert!(radial.is_finite() && tangential.is_finite());

            if radial != 0.0 {
                assert_relative_eq!(radial, 3.0, epsilon = 1e-9);
                assert_relative_eq!(tangential, 5.0, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn pixels_and_millimeters_agree() {
    let config = AnalysisConfig::default();
    let ratio = config.pixel_to_mm_ratio;
    let px_field = swirl((640.0, 480.0), 200);
    let mm_field = px_field.scaled(1.0 / ratio);

    let px_params = RingParams::new(FieldCentering::Fixed(na::Point2::new(640.0, 480.0)), 240.0, 25)
        .with_magnitude_cutoff(config.magnitude_cutoff(Units::Pixels))
        .with_edge_padding(config.ring_edge_padding(Units::Pixels));
    let mm_params = RingParams::new(
        FieldCentering::Fixed(na::Point2::new(640.0 / ratio, 480.0 / ratio)),
        240.0 / ratio,
        25,
    )
    .with_magnitude_cutoff(config.magnitude_cutoff(Units::Millimeters))
    .with_edge_padding(config.ring_edge_padding(Units::Millimeters));

    let px = disktrack::displacement::compute_displacement_field(&px_field, &px_params).unwrap();
    let mm = disktrack::displacement::compute_displacement_field(&mm_field, &mm_params).unwrap();

    assert_relative_eq!(px.dr / ratio, mm.dr, epsilon = 1e-12);
    for i in 0..25 {
        assert_relative_eq!(px.radii[i] / ratio, mm.radii[i], epsilon = 1e-12);
        assert_relative_eq!(px.radial[i] / ratio, mm.radial[i], epsilon = 1e-12);
        assert_relative_eq!(px.tangential[i] / ratio, mm.tangential[i], epsilon = 1e-12);
    }
}

#[test]
fn measurement_defaults_in_both_units() {
    let tracker = DiskTracker::new(AnalysisConfig::default()).unwrap();
    let measurement = MeasurementInfo::new(
        "21.01.25",
        vec!["DSC_0001.jpg".into()],
        na::Point2::new(1600.0, 1200.0),
        240.0,
    );

    let px = tracker.default_ring_params(&measurement, Units::Pixels);
    let mm = tracker.default_ring_params(&measurement, Units::Millimeters);

    assert_eq!(px.ring_count, 100);
    assert_relative_eq!(px.min_radius, 240.0);
    assert_relative_eq!(mm.min_radius, 15.0);
    assert_eq!(px.magnitude_cutoff, Some(56.0));
    assert_eq!(mm.magnitude_cutoff, Some(3.5));
    assert_eq!(
        mm.centering,
        FieldCentering::Fixed(na::Point2::new(100.0, 75.0))
    );
}

#[test]
fn everything_filtered_out_is_an_error() {
    let field = DisplacementField::from_components(
        &[10.0, 20.0],
        &[0.0, 0.0],
        &[1.0, 1.0],
        &[0.0, 0.0],
        Some(&[false, false]),
    )
    .unwrap();
    let params = RingParams::new(FieldCentering::Centroid, 0.0, 10);

    let err = disktrack::displacement::compute_displacement_field(&field, &params).unwrap_err();

    assert!(matches!(err, Error::EmptyRadiusSet));
}
