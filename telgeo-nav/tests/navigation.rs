use approx::assert_relative_eq;
use nalgebra::{Matrix3, Vector3};
use telgeo_core::{
    placement_rotation, Error, FlipMatrix, PlaneCatalog, PlaneDescriptor, UniformField,
};
use telgeo_nav::{
    NavigationConfig, TelescopeGeometry, TerminationReason, NO_PLANE_FOUND, NO_SENSOR,
};

const SILICON: f64 = PlaneDescriptor::SILICON_RADIATION_LENGTH;

fn two_planes() -> PlaneCatalog {
    PlaneCatalog::from_planes([
        PlaneDescriptor::new(0, [0.0, 0.0, 0.0]),
        PlaneDescriptor::new(1, [0.0, 0.0, 100.0]),
    ])
    .unwrap()
}

fn built(catalog: PlaneCatalog) -> TelescopeGeometry {
    let mut geometry = TelescopeGeometry::field_free(catalog);
    geometry.build().unwrap();
    geometry
}

/// Two 1 mm thick boxes sharing the face at z = 0.5.
fn touching_boxes() -> PlaneCatalog {
    PlaneCatalog::from_planes([
        PlaneDescriptor::new(0, [0.0, 0.0, 0.0]).with_size(20.0, 10.0, 1.0),
        PlaneDescriptor::new(1, [0.0, 0.0, 1.0]).with_size(20.0, 10.0, 1.0),
    ])
    .unwrap()
}

#[test]
fn test_straight_track_hits_downstream_plane() {
    let geometry = built(two_planes());
    let intersector = geometry.intersector().unwrap();

    let hit = intersector
        .find_intersection(
            &Vector3::new(0.0, 0.0, -10.0),
            &Vector3::new(0.0, 0.0, 1.0),
            1.0,
            1,
        )
        .unwrap();

    assert!(hit.is_found());
    assert_eq!(hit.status, 1);
    assert_relative_eq!(hit.arc_length, 110.0, epsilon = 1e-9);
    assert_relative_eq!(hit.position, Vector3::new(0.0, 0.0, 100.0), epsilon = 1e-9);
    assert_relative_eq!(hit.momentum, Vector3::new(0.0, 0.0, 1.0));
}

#[test]
fn test_plane_behind_track_is_missed() {
    let geometry = built(two_planes());
    let hit = geometry
        .intersector()
        .unwrap()
        .find_intersection(&Vector3::new(0.0, 0.0, 150.0), &Vector3::z(), 1.0, 1)
        .unwrap();
    assert_eq!(hit.status, NO_SENSOR);
    assert!(!hit.is_found());
}

/// Plane 1 turned by 60 degrees about y and 4 mm thick, so straight tracks
/// off the axis cross its mid-surface outside the box.
fn tilted_thick_plane() -> PlaneCatalog {
    PlaneCatalog::from_planes([
        PlaneDescriptor::new(0, [0.0, 0.0, 0.0]),
        PlaneDescriptor::new(1, [0.0, 0.0, 100.0])
            .with_size(20.0, 10.0, 4.0)
            .with_angles(0.0, 60.0, 0.0),
    ])
    .unwrap()
}

#[test]
fn test_intersection_searches_forward_for_entrance() {
    let geometry = built(tilted_thick_plane());
    let sqrt3 = 3f64.sqrt();

    let hit = geometry
        .intersector()
        .unwrap()
        .find_intersection(&Vector3::new(6.0, 0.0, 0.0), &Vector3::z(), 1.0, 1)
        .unwrap();

    // mid-surface crossing at local x = 12, entry through the x = 10 face
    assert_eq!(hit.status, 1);
    assert_relative_eq!(hit.arc_length, 100.0 - 6.0 * sqrt3, epsilon = 1e-9);
    assert_relative_eq!(
        hit.position,
        Vector3::new(6.0, 0.0, 100.0 - 14.0 / sqrt3 + 0.01),
        epsilon = 1e-9
    );
    assert_eq!(geometry.locate(&hit.position).unwrap(), 1);
}

#[test]
fn test_intersection_retries_backward() {
    let geometry = built(tilted_thick_plane());
    let sqrt3 = 3f64.sqrt();

    let hit = geometry
        .intersector()
        .unwrap()
        .find_intersection(&Vector3::new(-6.0, 0.0, 0.0), &Vector3::z(), 1.0, 1)
        .unwrap();

    // the box lies between start and mid-surface crossing
    assert_eq!(hit.status, 1);
    assert_relative_eq!(hit.arc_length, 100.0 + 6.0 * sqrt3, epsilon = 1e-9);
    assert_relative_eq!(
        hit.position,
        Vector3::new(-6.0, 0.0, 100.0 + 14.0 / sqrt3 - 0.01),
        epsilon = 1e-9
    );
    assert_eq!(geometry.locate(&hit.position).unwrap(), 1);
}

#[test]
fn test_intersection_outside_box_both_ways() {
    let geometry = built(tilted_thick_plane());
    let sqrt3 = 3f64.sqrt();

    let hit = geometry
        .intersector()
        .unwrap()
        .find_intersection(&Vector3::new(8.0, 0.0, 0.0), &Vector3::z(), 1.0, 1)
        .unwrap();

    assert_eq!(hit.status, NO_SENSOR);
    assert!(!hit.is_found());
    assert_relative_eq!(
        hit.position,
        Vector3::new(8.0, 0.0, 100.0 - 8.0 * sqrt3),
        epsilon = 1e-9
    );
    assert_relative_eq!(hit.momentum, Vector3::z());
}

#[test]
fn test_unknown_target_is_an_error() {
    let geometry = built(two_planes());
    let result = geometry.intersector().unwrap().find_intersection(
        &Vector3::zeros(),
        &Vector3::z(),
        1.0,
        42,
    );
    assert!(matches!(result, Err(Error::InvalidGeometry(_))));
}

#[test]
fn test_helix_reaches_plane_in_field() {
    let mut geometry = TelescopeGeometry::new(two_planes(), UniformField::new(0.0, 1.0, 0.0));
    geometry.build().unwrap();

    let momentum = Vector3::new(0.0, 0.0, 10.0);
    let hit = geometry
        .intersector()
        .unwrap()
        .find_intersection(&Vector3::new(0.0, 0.0, -10.0), &momentum, 1.0, 1)
        .unwrap();

    assert_eq!(hit.status, 1);
    // Sagitta of a 33 m radius over 110 mm.
    assert!(hit.position.x.abs() > 0.17 && hit.position.x.abs() < 0.19);
    assert_relative_eq!(hit.momentum.norm(), 10.0, max_relative = 1e-12);
    assert!(hit.momentum.x.abs() > 0.0);
}

#[test]
fn test_find_next_plane() {
    let geometry = built(two_planes());
    let intersector = geometry.intersector().unwrap();

    let first = intersector.find_next_plane(Vector3::new(0.0, 0.0, -10.0), Vector3::z());
    assert_eq!(first.sensor_id, 0);
    assert_relative_eq!(first.point.z, -0.015, epsilon = 1e-9);

    // Starting inside plane 0 skips it.
    let second = intersector.find_next_plane(Vector3::zeros(), Vector3::new(0.0, 0.0, 3.0));
    assert_eq!(second.sensor_id, 1);
    assert_relative_eq!(second.point.z, 99.985, epsilon = 1e-9);

    let none = intersector.find_next_plane(Vector3::new(0.0, 0.0, 200.0), Vector3::z());
    assert_eq!(none.sensor_id, NO_PLANE_FOUND);
    assert!(!none.is_found());

    let off_axis = intersector.find_next_plane(Vector3::new(50.0, 0.0, -10.0), Vector3::z());
    assert_eq!(off_axis.sensor_id, NO_PLANE_FOUND);
}

#[test]
fn test_find_plane_entrance() {
    let geometry = built(two_planes());
    let intersector = geometry.intersector().unwrap();

    let forward = intersector
        .find_plane_entrance(Vector3::new(0.0, 0.0, 50.0), Vector3::z(), 1)
        .unwrap();
    assert_relative_eq!(forward.z, 99.985, epsilon = 1e-9);

    assert!(intersector
        .find_plane_entrance(Vector3::new(0.0, 0.0, 50.0), Vector3::z(), 0)
        .is_none());
    assert!(intersector
        .find_plane_entrance(Vector3::new(0.0, 0.0, 50.0), -Vector3::z(), 0)
        .is_some());
}

#[test]
fn test_locate() {
    let catalog = PlaneCatalog::from_planes([PlaneDescriptor::new(7, [0.0, 0.0, 0.0])]).unwrap();
    let geometry = built(catalog);

    assert_eq!(geometry.locate(&Vector3::new(0.5, 0.5, 0.0)).unwrap(), 7);
    assert_eq!(geometry.locate(&Vector3::new(0.0, 0.0, 30.0)).unwrap(), NO_SENSOR);
}

#[test]
fn test_radiation_length_without_boxes_is_zero() {
    let geometry = built(two_planes());
    let integrator = geometry.radiation_integrator().unwrap();
    let total = integrator.accumulate(
        &Vector3::new(0.0, 0.0, 10.0),
        &Vector3::new(0.0, 0.0, 90.0),
        false,
    );
    assert_eq!(total, 0.0);
}

#[test]
fn test_radiation_length_through_telescope() {
    let geometry = built(two_planes());
    let total = geometry.radiation_integrator().unwrap().accumulate(
        &Vector3::new(0.0, 0.0, -10.0),
        &Vector3::new(0.0, 0.0, 110.0),
        false,
    );
    assert!(total > 0.0);
    assert_relative_eq!(total, 0.1 * 0.1 / SILICON, epsilon = 1e-12);
}

#[test]
fn test_touching_boxes_recover_with_nudge() {
    let geometry = built(touching_boxes());
    let report = geometry
        .radiation_integrator()
        .unwrap()
        .accumulate_detailed(
            &Vector3::new(0.0, 0.0, -10.0),
            &Vector3::new(0.0, 0.0, 10.0),
            false,
        );

    assert_eq!(report.reason, TerminationReason::ReachedEnd);
    assert_eq!(report.nudges, 1);
    assert_eq!(report.steps, 4);
    assert_relative_eq!(report.total, 0.1 * 2.0 / SILICON, epsilon = 1e-12);
    assert_relative_eq!(report.length, 20.0, epsilon = 1e-9);
}

#[test]
fn test_nudge_stops_at_end_point() {
    let geometry = built(touching_boxes());
    let start = Vector3::new(0.0, 0.0, -10.0);
    let finish = Vector3::new(0.0, 0.0, 0.505);
    let report = geometry
        .radiation_integrator()
        .unwrap()
        .accumulate_detailed(&start, &finish, false);

    assert_eq!(report.reason, TerminationReason::ReachedEnd);
    assert_eq!(report.nudges, 1);
    assert_eq!(report.steps, 2);
    assert_relative_eq!(report.length, (finish - start).norm(), epsilon = 1e-9);
    assert_relative_eq!(report.total, 0.1 * 1.005 / SILICON, epsilon = 1e-12);
}

#[test]
fn test_degenerate_step_limit_returns_partial_sum() {
    let mut geometry = TelescopeGeometry::field_free(touching_boxes())
        .with_navigation_config(NavigationConfig::new().with_max_degenerate_steps(0));
    geometry.build().unwrap();

    let report = geometry
        .radiation_integrator()
        .unwrap()
        .accumulate_detailed(
            &Vector3::new(0.0, 0.0, -10.0),
            &Vector3::new(0.0, 0.0, 10.0),
            false,
        );

    assert_eq!(report.reason, TerminationReason::DegenerateSteps);
    assert_eq!(report.nudges, 0);
    assert_relative_eq!(report.total, 0.1 / SILICON, epsilon = 1e-12);
}

#[test]
fn test_build_lifecycle() {
    let mut geometry = TelescopeGeometry::field_free(two_planes());
    assert!(matches!(
        geometry.navigator(),
        Err(Error::MissingGeometry(_))
    ));

    geometry.build().unwrap();
    // Second build is a logged no-op.
    geometry.build().unwrap();
    assert!(geometry.is_built());

    geometry.reset();
    assert!(matches!(geometry.model(), Err(Error::MissingGeometry(_))));
    geometry.build().unwrap();
    assert_eq!(geometry.model().unwrap().boxes().len(), 2);
}

#[test]
fn test_empty_layout_fails_to_build() {
    let mut geometry = TelescopeGeometry::field_free(PlaneCatalog::new());
    assert!(matches!(geometry.build(), Err(Error::MissingGeometry(_))));
}

#[test]
fn test_replace_planes_rebuilds_model() {
    let mut geometry = built(two_planes());
    geometry
        .replace_planes([PlaneDescriptor::new(1, [0.0, 0.0, 200.0])])
        .unwrap();

    assert_eq!(geometry.locate(&Vector3::new(0.0, 0.0, 100.0)).unwrap(), NO_SENSOR);
    assert_eq!(geometry.locate(&Vector3::new(0.0, 0.0, 200.0)).unwrap(), 1);
    assert_relative_eq!(
        geometry.frames().offset(1).unwrap(),
        Vector3::new(0.0, 0.0, 200.0)
    );

    let unknown = geometry.replace_planes([PlaneDescriptor::new(9, [0.0; 3])]);
    assert!(matches!(unknown, Err(Error::NotFound(_))));
}

#[test]
fn test_update_layout_from_refined_model() {
    let catalog = PlaneCatalog::from_planes([
        PlaneDescriptor::new(0, [0.0, 0.0, 0.0]),
        PlaneDescriptor::new(1, [0.0, 0.0, 100.0]).with_flip(FlipMatrix::new(0, 1, 1, 0)),
    ])
    .unwrap();
    let mut geometry = built(catalog);

    let refined = geometry.catalog().get(1).unwrap().clone().with_angles(0.0, 5.0, 2.0);
    geometry
        .model_mut()
        .unwrap()
        .set_placement(1, Vector3::new(2.0, 0.0, 120.0), placement_rotation(&refined))
        .unwrap();
    geometry.update_layout().unwrap();

    let plane = geometry.catalog().get(1).unwrap();
    assert_relative_eq!(plane.position[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(plane.position[2], 120.0, epsilon = 1e-12);
    assert_relative_eq!(plane.angles[0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(plane.angles[1], 5.0, epsilon = 1e-9);
    assert_relative_eq!(plane.angles[2], 2.0, epsilon = 1e-9);
    assert_eq!(plane.flip, FlipMatrix::new(0, 1, 1, 0));
    assert_relative_eq!(plane.size[2], 0.05, epsilon = 1e-15);
    assert_relative_eq!(
        geometry.frames().offset(1).unwrap(),
        Vector3::new(2.0, 0.0, 120.0)
    );
}

#[test]
fn test_update_layout_keeps_upside_down_plane() {
    let catalog = PlaneCatalog::from_planes([
        PlaneDescriptor::new(0, [0.0, 0.0, 0.0]),
        PlaneDescriptor::new(1, [0.0, 0.0, 100.0]).with_angles(0.0, 0.0, 180.0),
    ])
    .unwrap();
    let mut geometry = built(catalog);
    geometry.update_layout().unwrap();

    assert_eq!(geometry.catalog().get(1).unwrap().angles, [0.0, 0.0, 180.0]);
    assert_relative_eq!(
        geometry.frames().x_axis(1).unwrap(),
        Vector3::new(-1.0, 0.0, 0.0),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        geometry.frames().y_axis(1).unwrap(),
        Vector3::new(0.0, -1.0, 0.0),
        epsilon = 1e-12
    );
}

#[test]
fn test_update_layout_after_large_rotation() {
    let mut geometry = built(two_planes());
    let turned = geometry.catalog().get(0).unwrap().clone().with_angles(10.0, 120.0, 170.0);
    let rotation = placement_rotation(&turned);
    geometry
        .model_mut()
        .unwrap()
        .set_placement(0, Vector3::zeros(), rotation)
        .unwrap();
    geometry.update_layout().unwrap();

    let plane = geometry.catalog().get(0).unwrap();
    assert_relative_eq!(placement_rotation(plane), rotation, epsilon = 1e-9);
    assert!(plane.angles[0].abs() <= 90.0);
    assert_relative_eq!(
        geometry.frames().x_axis(0).unwrap(),
        rotation.column(0).into_owned(),
        epsilon = 1e-9
    );
}

#[test]
fn test_update_layout_rejects_unreachable_rotation() {
    let mut geometry = built(two_planes());
    let stretched = Matrix3::from_diagonal(&Vector3::new(2.0, 1.0, 1.0));
    geometry
        .model_mut()
        .unwrap()
        .set_placement(1, Vector3::new(0.0, 0.0, 100.0), stretched)
        .unwrap();

    assert!(matches!(
        geometry.update_layout(),
        Err(Error::InvalidGeometry(_))
    ));
    assert_eq!(geometry.catalog().get(1).unwrap().angles, [0.0, 0.0, 0.0]);
}

#[test]
fn test_update_layout_requires_model() {
    let mut geometry = TelescopeGeometry::field_free(two_planes());
    assert!(matches!(
        geometry.update_layout(),
        Err(Error::MissingGeometry(_))
    ));
}

#[test]
fn test_set_placement_writes_back() {
    let mut geometry = built(two_planes());
    geometry
        .set_placement(1, [1.0, 0.0, 150.0], [0.0, 10.0, 0.0])
        .unwrap();

    let plane = geometry.catalog().get(1).unwrap();
    assert_eq!(plane.position, [1.0, 0.0, 150.0]);
    assert_eq!(plane.angles, [0.0, 10.0, 0.0]);
    assert_eq!(geometry.locate(&Vector3::new(1.0, 0.0, 150.0)).unwrap(), 1);
    assert_eq!(geometry.locate(&Vector3::new(0.0, 0.0, 100.0)).unwrap(), NO_SENSOR);

    let normal = geometry.frames().normal(1).unwrap();
    assert_relative_eq!(normal.x, 10f64.to_radians().sin(), epsilon = 1e-12);
}

#[test]
fn test_parallel_helpers_match_sequential() {
    let geometry = built(two_planes());
    let rays: Vec<(Vector3<f64>, Vector3<f64>)> = (0..16)
        .map(|i| {
            let x = f64::from(i) - 8.0;
            (Vector3::new(x, 0.0, -20.0), Vector3::new(0.0, 0.0, 1.0))
        })
        .collect();

    let parallel = geometry.next_planes_par(&rays).unwrap();
    let intersector = geometry.intersector().unwrap();
    for ((point, direction), crossing) in rays.iter().zip(&parallel) {
        assert_eq!(
            *crossing,
            intersector.find_next_plane(*point, *direction)
        );
    }

    let segments: Vec<(Vector3<f64>, Vector3<f64>)> = rays
        .iter()
        .map(|(p, _)| (*p, p + Vector3::new(0.0, 0.0, 140.0)))
        .collect();
    let lengths = geometry.radiation_lengths_par(&segments, false).unwrap();
    assert_eq!(lengths.len(), 16);
    for total in lengths {
        assert_relative_eq!(total, 0.1 * 0.1 / SILICON, epsilon = 1e-12);
    }
}
