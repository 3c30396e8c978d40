// Integration tests for the leg IK solver

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use hexapod_rs::Config;
    use hexapod_rs::geometry::Vec3;
    use hexapod_rs::hardware::Actuator;
    use hexapod_rs::hardware::simulated::SimulatedActuator;
    use hexapod_rs::leg::{Leg, LegGeometry};
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn geometry(leg: usize) -> LegGeometry {
        let config = Config::default();
        config.legs[leg].geometry(&config.body)
    }

    fn simulated_leg(leg: usize) -> (Leg, [Arc<SimulatedActuator>; 3]) {
        let actuators = [
            Arc::new(SimulatedActuator::new(1)),
            Arc::new(SimulatedActuator::new(2)),
            Arc::new(SimulatedActuator::new(3)),
        ];
        let handles: [Arc<dyn Actuator>; 3] = [
            actuators[0].clone(),
            actuators[1].clone(),
            actuators[2].clone(),
        ];
        (Leg::new(leg, geometry(leg), handles), actuators)
    }

    #[test]
    fn test_reachable_targets_solve_finite() {
        let left = geometry(2);
        let right = geometry(3);
        for reach in [55.0_f64, 100.0, 150.0, 200.0, 265.0] {
            for step in 0..12 {
                let angle = step as f64 * PI / 6.0 + 0.1;
                let elevation: f64 = -0.6;
                let goal = Vec3::new(
                    reach * elevation.cos() * angle.cos(),
                    reach * elevation.cos() * angle.sin(),
                    reach * elevation.sin(),
                );
                assert!(left.solve(&goal).is_finite(), "left {:?}", goal);
                assert!(right.solve(&goal).is_finite(), "right {:?}", goal);
            }
        }
    }

    #[test]
    fn test_out_of_reach_targets_are_not_finite() {
        let leg = geometry(3);
        assert!(!leg.solve(&Vec3::new(250.0, 100.0, -150.0)).is_finite());
        assert!(!leg.solve(&Vec3::new(20.0, 10.0, -5.0)).is_finite());
    }

    #[test]
    fn test_mirrored_goals_give_mirrored_angles() {
        let left = geometry(0);
        let right = geometry(1);
        for goal in [
            Vec3::new(90.0, 100.0, -100.0),
            Vec3::new(120.0, -40.0, -80.0),
            Vec3::new(60.0, 150.0, 10.0),
        ] {
            let mirrored = Vec3::new(-goal.x, goal.y, goal.z);
            let l = left.solve(&mirrored);
            let r = right.solve(&goal);
            assert_relative_eq!(l.hip_yaw + r.hip_yaw, 2.0 * PI, epsilon = 1e-9);
            assert_relative_eq!(l.hip_pitch + r.hip_pitch, 2.0 * PI, epsilon = 1e-9);
            assert_relative_eq!(l.knee + r.knee, 2.0 * PI, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_goal_below_hip_is_finite() {
        for leg in [0, 1] {
            let angles = geometry(leg).solve(&Vec3::new(0.0, 0.0, -150.0));
            assert!(angles.is_finite());
        }
        let right = geometry(1).solve(&Vec3::new(0.0, 0.0, -150.0));
        assert_relative_eq!(right.hip_yaw, geometry(1).mount_angle);
    }

    #[test]
    fn test_unreachable_goal_holds_last_pose() {
        let (leg, actuators) = simulated_leg(3);
        leg.set_goal_position(Vec3::new(260.0, 0.0, -100.0));
        assert!(leg.update_actuators());
        let held: Vec<Option<f64>> = actuators.iter().map(|a| a.last_angle()).collect();

        leg.set_goal_position(Vec3::new(900.0, 0.0, -100.0));
        assert!(!leg.update_actuators());
        assert_eq!(leg.goal_position(), Some(Vec3::new(900.0, 0.0, -100.0)));
        let after: Vec<Option<f64>> = actuators.iter().map(|a| a.last_angle()).collect();
        assert_eq!(held, after);
        assert!(actuators.iter().all(|a| a.command_count() == 1));
    }

    #[test]
    fn test_disconnected_actuator_does_not_stop_the_leg() {
        let actuators: [Arc<dyn Actuator>; 3] = [
            Arc::new(SimulatedActuator::new(41)),
            Arc::new(SimulatedActuator::disconnected(42)),
            Arc::new(SimulatedActuator::new(43)),
        ];
        let leg = Leg::new(3, geometry(3), actuators);
        leg.set_goal_position(Vec3::new(260.0, 0.0, -100.0));
        assert!(leg.update_actuators());
        assert!(leg.set_torque_enabled(true).is_err());
    }

    #[test]
    fn test_servo_offset_shifts_goal() {
        let mut config = Config::default();
        config.body.servo_offset_z = 15.0;
        let shifted = config.legs[3].geometry(&config.body);
        let plain = geometry(3);
        let a = shifted.solve(&Vec3::new(130.0, 20.0, -100.0));
        let b = plain.solve(&Vec3::new(130.0, 20.0, -85.0));
        assert_relative_eq!(a.hip_pitch, b.hip_pitch, epsilon = 1e-12);
        assert_relative_eq!(a.knee, b.knee, epsilon = 1e-12);
    }
}
