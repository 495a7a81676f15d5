//! Radiation-length integration along straight segments.

use crate::config::NavigationConfig;
use crate::navigator::Navigator;
use crate::volume::VolumeModel;
use nalgebra::Vector3;

/// Media with a radiation length outside this open range contribute nothing.
const RADIATION_LENGTH_RANGE: (f64, f64) = (1e-9, 1e10);

/// Why an integration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The whole segment was traversed.
    ReachedEnd,
    /// The ray left the world before the end point.
    LeftWorld,
    /// The start point lies outside the world.
    StartedOutside,
    /// Too many consecutive near-zero steps.
    DegenerateSteps,
}

/// Outcome of a detailed integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiationReport {
    /// Traversed material in units of the radiation length.
    pub total: f64,
    /// Path length covered, including boundary nudges.
    pub length: f64,
    /// Regular boundary steps taken.
    pub steps: usize,
    /// Degenerate steps recovered by a nudge.
    pub nudges: usize,
    /// Why the integration stopped.
    pub reason: TerminationReason,
}

impl RadiationReport {
    fn empty(reason: TerminationReason) -> Self {
        Self {
            total: 0.0,
            length: 0.0,
            steps: 0,
            nudges: 0,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum IntegrationState {
    Stepping,
    Nudging { boundary_volume: bool },
    Terminated(TerminationReason),
}

/// Integrates `X/X0` between two points of a volume model.
#[derive(Debug, Clone)]
pub struct RadiationIntegrator<'a> {
    model: &'a VolumeModel,
    config: NavigationConfig,
}

impl<'a> RadiationIntegrator<'a> {
    /// Creates an integrator over the model.
    pub fn new(model: &'a VolumeModel, config: NavigationConfig) -> Self {
        Self { model, config }
    }

    /// Step control in use.
    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Radiation lengths traversed from `start` to `finish`.
    ///
    /// With `skip_boundary_volumes` the volumes holding either end point are
    /// left out of the sum.
    pub fn accumulate(
        &self,
        start: &Vector3<f64>,
        finish: &Vector3<f64>,
        skip_boundary_volumes: bool,
    ) -> f64 {
        self.accumulate_detailed(start, finish, skip_boundary_volumes)
            .total
    }

    /// Same as [`accumulate`](Self::accumulate), reporting how the walk ended.
    pub fn accumulate_detailed(
        &self,
        start: &Vector3<f64>,
        finish: &Vector3<f64>,
        skip_boundary_volumes: bool,
    ) -> RadiationReport {
        let segment = finish - start;
        let budget = segment.norm();
        if budget <= self.config.min_remaining_step {
            return RadiationReport::empty(TerminationReason::ReachedEnd);
        }

        let mut navigator = Navigator::new(self.model);
        if navigator.init_track(*start, segment).is_none() {
            return RadiationReport::empty(TerminationReason::StartedOutside);
        }

        let start_node = self.model.locate_node(start);
        let finish_node = self.model.locate_node(finish);

        let mut report = RadiationReport::empty(TerminationReason::ReachedEnd);
        let mut remaining = budget;
        let mut last_rad = 0.0;
        let mut consecutive_degenerate = 0usize;
        let mut state = IntegrationState::Stepping;

        loop {
            state = match state {
                IntegrationState::Stepping => 'step: {
                    let Some(node) = navigator.node() else {
                        break 'step IntegrationState::Terminated(TerminationReason::LeftWorld);
                    };
                    if remaining <= self.config.min_remaining_step {
                        break 'step IntegrationState::Terminated(TerminationReason::ReachedEnd);
                    }

                    let boundary_volume = Some(node) == start_node || Some(node) == finish_node;
                    let counted = !(skip_boundary_volumes && boundary_volume);
                    let medium = self.model.radiation_length(node);

                    navigator.find_next_boundary_and_step(remaining);
                    let step = navigator.last_step();

                    if step < self.config.degenerate_step {
                        consecutive_degenerate += 1;
                        if consecutive_degenerate > self.config.max_degenerate_steps {
                            log::warn!(
                                "radiation length integration stopped after {consecutive_degenerate} \
                                 degenerate steps at {:?}, returning partial sum {}",
                                navigator.point(),
                                report.total
                            );
                            IntegrationState::Terminated(TerminationReason::DegenerateSteps)
                        } else {
                            IntegrationState::Nudging { boundary_volume }
                        }
                    } else {
                        consecutive_degenerate = 0;
                        report.steps += 1;
                        report.length += step;
                        remaining -= step;

                        last_rad = match medium {
                            Some(radlen)
                                if radlen > RADIATION_LENGTH_RANGE.0
                                    && radlen < RADIATION_LENGTH_RANGE.1 =>
                            {
                                let rad = self.config.length_scale / radlen;
                                if counted {
                                    report.total += rad * step;
                                }
                                rad
                            }
                            _ => 0.0,
                        };
                        log::trace!(
                            "step {step} in {} (X0 = {medium:?}), total {}",
                            self.model.node_name(node),
                            report.total
                        );
                        IntegrationState::Stepping
                    }
                }
                IntegrationState::Nudging { boundary_volume } => {
                    // never past the end point
                    let epsilon = self.config.nudge_epsilon.min(remaining);
                    let nudged = navigator.point() + navigator.direction() * epsilon;
                    report.nudges += 1;
                    report.length += epsilon;
                    remaining -= epsilon;
                    if !(skip_boundary_volumes && boundary_volume) {
                        report.total += last_rad * epsilon;
                    }

                    match navigator.relocate(nudged) {
                        Some(_) => IntegrationState::Stepping,
                        None => IntegrationState::Terminated(TerminationReason::LeftWorld),
                    }
                }
                IntegrationState::Terminated(reason) => {
                    report.reason = reason;
                    return report;
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryConfig;
    use approx::assert_relative_eq;
    use telgeo_core::{PlaneCatalog, PlaneDescriptor};

    const RADLEN: f64 = 93.66;

    fn model(config: &GeometryConfig) -> VolumeModel {
        let catalog = PlaneCatalog::from_planes([
            PlaneDescriptor::new(0, [0.0, 0.0, 0.0]).with_size(20.0, 10.0, 1.0),
            PlaneDescriptor::new(1, [0.0, 0.0, 50.0]).with_size(20.0, 10.0, 2.0),
        ])
        .unwrap();
        VolumeModel::build(&catalog, config).unwrap()
    }

    #[test]
    fn test_sums_box_thicknesses() {
        let model = model(&GeometryConfig::default());
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let report = integrator.accumulate_detailed(
            &Vector3::new(0.0, 0.0, -10.0),
            &Vector3::new(0.0, 0.0, 80.0),
            false,
        );

        assert_eq!(report.reason, TerminationReason::ReachedEnd);
        assert_eq!(report.nudges, 0);
        assert_relative_eq!(report.total, 0.1 * 3.0 / RADLEN, epsilon = 1e-12);
        assert_relative_eq!(report.length, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_segment_without_boxes_is_zero() {
        let model = model(&GeometryConfig::default());
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let total = integrator.accumulate(
            &Vector3::new(0.0, 0.0, 10.0),
            &Vector3::new(5.0, 0.0, 40.0),
            false,
        );
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_material_world() {
        let air = 300_000.0;
        let model = model(&GeometryConfig::default().with_world_radiation_length(air));
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let total = integrator.accumulate(
            &Vector3::new(0.0, 0.0, 10.0),
            &Vector3::new(0.0, 0.0, 40.0),
            false,
        );
        assert_relative_eq!(total, 0.1 * 30.0 / air, epsilon = 1e-15);
    }

    #[test]
    fn test_start_outside_world() {
        let model = model(&GeometryConfig::default());
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let report = integrator.accumulate_detailed(
            &Vector3::new(0.0, 0.0, -6000.0),
            &Vector3::new(0.0, 0.0, 80.0),
            false,
        );
        assert_eq!(report.reason, TerminationReason::StartedOutside);
        assert_eq!(report.total, 0.0);
    }

    #[test]
    fn test_leaving_world_keeps_partial_sum() {
        let model = model(&GeometryConfig::default());
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let report = integrator.accumulate_detailed(
            &Vector3::new(0.0, 0.0, 20.0),
            &Vector3::new(0.0, 0.0, 7000.0),
            false,
        );
        assert_eq!(report.reason, TerminationReason::LeftWorld);
        assert_relative_eq!(report.total, 0.1 * 2.0 / RADLEN, epsilon = 1e-12);
    }

    #[test]
    fn test_skip_boundary_volumes() {
        let model = model(&GeometryConfig::default());
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let start = Vector3::new(0.0, 0.0, 0.0);
        let finish = Vector3::new(0.0, 0.0, 80.0);

        let all = integrator.accumulate(&start, &finish, false);
        let skipped = integrator.accumulate(&start, &finish, true);
        assert_relative_eq!(all, 0.1 * 2.5 / RADLEN, epsilon = 1e-12);
        assert_relative_eq!(skipped, 0.1 * 2.0 / RADLEN, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_length_segment() {
        let model = model(&GeometryConfig::default());
        let integrator = RadiationIntegrator::new(&model, NavigationConfig::default());
        let p = Vector3::new(0.0, 0.0, 0.0);
        assert_eq!(integrator.accumulate(&p, &p, false), 0.0);
    }
}
