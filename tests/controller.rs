// Integration tests for the mobility controller: modes, commands and packets

#[cfg(test)]
mod tests {
    use hexapod_rs::command::{CommandError, JoystickKind, Notification, Notifier, Packet};
    use hexapod_rs::geometry::{Vec2, Vec3};
    use hexapod_rs::hardware::simulated::SimulatedRig;
    use hexapod_rs::host::build_legs;
    use hexapod_rs::leg::LEG_COUNT;
    use hexapod_rs::module::{Module, ModuleContext};
    use hexapod_rs::motion::{GaitKind, MobilityController, Mode};
    use hexapod_rs::sensors::SensorCache;
    use hexapod_rs::Config;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;

    const TICK: Duration = Duration::from_millis(20);

    struct Fixture {
        mobility: MobilityController,
        sensors: Arc<SensorCache>,
        notes: broadcast::Receiver<Notification>,
    }

    fn fixture(with_orientation: bool) -> Fixture {
        let config = Config::default();
        let rig = SimulatedRig::for_config(&config, with_orientation);
        let legs = build_legs(&config, &rig.hardware_set()).unwrap();
        let sensors = Arc::new(SensorCache::new(with_orientation));
        let notifier = Notifier::new(64);
        let notes = notifier.subscribe();
        let mut mobility = MobilityController::new(ModuleContext {
            config,
            legs,
            sensors: sensors.clone(),
            notifier,
        })
        .unwrap();
        mobility.start();
        Fixture {
            mobility,
            sensors,
            notes,
        }
    }

    fn run(mobility: &mut MobilityController, ticks: u64) {
        for tick in 0..ticks {
            mobility.tick(tick, TICK);
        }
    }

    fn run_until(mobility: &mut MobilityController, limit: u64, done: impl Fn(&MobilityController) -> bool) -> bool {
        for tick in 0..limit {
            if done(mobility) {
                return true;
            }
            mobility.tick(tick, TICK);
        }
        done(mobility)
    }

    fn lifted(with_orientation: bool) -> Fixture {
        let mut f = fixture(with_orientation);
        f.mobility.lift();
        assert!(run_until(&mut f.mobility, 1000, |m| m.mode() == Mode::Lifted));
        f
    }

    fn messages(notes: &mut broadcast::Receiver<Notification>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(note) = notes.try_recv() {
            out.push(note.message);
        }
        out
    }

    fn feet_home(mobility: &MobilityController) -> bool {
        let engine = mobility.gait_engine();
        (0..LEG_COUNT).all(|i| (engine.walk_position(i).xy() - engine.default_position(i)).norm() <= 1.0)
    }

    #[test]
    fn test_lift_then_drop() {
        let mut f = fixture(false);
        assert_eq!(f.mobility.mode(), Mode::Dropped);

        f.mobility.handle_command(&["lift"]).unwrap();
        assert_eq!(f.mobility.mode(), Mode::Lifting);
        run(&mut f.mobility, 5);
        assert_eq!(f.mobility.mode(), Mode::Lifting);
        assert!(run_until(&mut f.mobility, 1000, |m| m.mode() == Mode::Lifted));
        for leg in f.mobility.legs() {
            assert_eq!(leg.goal_position().unwrap().z, -100.0);
        }

        f.mobility.lift();
        assert_eq!(f.mobility.mode(), Mode::Lifted);

        f.mobility.handle_command(&["drop"]).unwrap();
        assert_eq!(f.mobility.mode(), Mode::Dropping);
        assert!(run_until(&mut f.mobility, 1000, |m| m.mode() == Mode::Dropped));
        for leg in f.mobility.legs() {
            assert_eq!(leg.goal_position().unwrap().z, 10.0);
        }
        assert_eq!(messages(&mut f.notes), vec!["Lifting...", "Dropping..."]);
    }

    #[test]
    fn test_lifting_moves_monotonically() {
        let mut f = fixture(false);
        f.mobility.lift();
        let mut last = 20.0;
        for tick in 0..50 {
            f.mobility.tick(tick, TICK);
            let z = f.mobility.legs()[4].goal_position().unwrap().z;
            assert!(z < last);
            last = z;
        }
    }

    #[test]
    fn test_idle_lifted_goal_is_default_stance() {
        let mut f = lifted(false);
        run(&mut f.mobility, 3);
        let goal = f.mobility.legs()[0].goal_position().unwrap();
        assert_eq!(goal, Vec3::new(-180.0, 310.0, -100.0));
    }

    #[test]
    fn test_height_up_clamps_at_maximum() {
        let mut f = fixture(false);
        for _ in 0..13 {
            f.mobility.handle_command(&["height", "up"]).unwrap();
        }
        assert_eq!(f.mobility.state().pose.height_goal, 170.0);
        let notes = messages(&mut f.notes);
        assert_eq!(notes.len(), 6);
        assert!(notes.iter().all(|n| n == "Maximum reached (17cm)"));

        for _ in 0..20 {
            f.mobility.handle_command(&["height", "down"]).unwrap();
        }
        assert_eq!(f.mobility.state().pose.height_goal, 40.0);
        assert_eq!(messages(&mut f.notes).last().map(String::as_str), Some("Minimum reached (4cm)"));
    }

    #[test]
    fn test_height_goal_is_approached_smoothly() {
        let mut f = lifted(false);
        f.mobility.handle_command(&["height", "up"]).unwrap();
        run(&mut f.mobility, 1);
        let height = f.mobility.state().pose.height;
        assert!(height > 100.0 && height < 110.0);
        run(&mut f.mobility, 2000);
        assert!((f.mobility.state().pose.height - 110.0).abs() < 0.01);
    }

    #[test]
    fn test_non_numeric_speed_is_rejected() {
        let mut f = fixture(false);
        f.mobility.handle_command(&["speed", "0.3"]).unwrap();
        let result = f.mobility.handle_command(&["speed", "abc"]);
        assert_eq!(result, Err(CommandError::InvalidNumber("abc".to_string())));
        assert_eq!(f.mobility.walking_speed(), Vec2::new(0.0, 0.3));
        let notes = messages(&mut f.notes);
        assert!(notes.last().unwrap().starts_with("Error:"));

        f.mobility.handle_command(&["SPEEDX", "-0.2"]).unwrap();
        assert_eq!(f.mobility.walking_speed(), Vec2::new(-0.2, 0.3));
    }

    #[test]
    fn test_ground_adaptation_clears_tilt() {
        let mut f = lifted(false);
        f.mobility.handle_command(&["toggle-tilt"]).unwrap();
        assert!(f.mobility.state().tilt_enabled);
        f.mobility.handle_packet(&Packet::Rotation(Vec3::new(0.6, -0.3, 0.0)));
        run(&mut f.mobility, 20);
        assert!(f.mobility.state().pose.tilt.x > 0.0);

        f.mobility.handle_command(&["toggle-groundadaption"]).unwrap();
        let state = f.mobility.state();
        assert!(state.ground_adaptation_enabled);
        assert!(!state.tilt_enabled);
        assert_eq!(state.pose.tilt, Vec2::zeros());
        assert_eq!(state.pose.tilt_goal, Vec2::zeros());
        assert_eq!(state.pose.leveling_rotation, Vec3::zeros());
        assert!(state.ground.offsets().iter().all(|o| *o == 0.0));
    }

    #[test]
    fn test_tilt_rejected_during_ground_adaptation() {
        let mut f = fixture(false);
        f.mobility.handle_command(&["toggle-groundadaption"]).unwrap();
        messages(&mut f.notes);
        f.mobility.handle_command(&["toggle-tilt"]).unwrap();
        f.mobility.handle_command(&["tilt", "on"]).unwrap();
        assert!(!f.mobility.state().tilt_enabled);
        assert_eq!(
            messages(&mut f.notes),
            vec!["Error: Ground adaption enabled.", "Error: Ground adaption enabled."]
        );
    }

    #[test]
    fn test_leveling_requires_orientation_sensor() {
        let mut f = fixture(false);
        f.mobility.handle_command(&["toggle-leveling"]).unwrap();
        assert!(!f.mobility.state().leveling_enabled);
        assert_eq!(messages(&mut f.notes), vec!["Missing orientation sensor."]);

        let mut f = fixture(true);
        f.mobility.handle_command(&["toggle-leveling"]).unwrap();
        assert!(f.mobility.state().leveling_enabled);
        assert_eq!(messages(&mut f.notes), vec!["Leveling activated."]);
    }

    #[test]
    fn test_leveling_accumulates_from_gravity() {
        let mut f = lifted(true);
        f.mobility.handle_command(&["toggle-leveling"]).unwrap();
        f.sensors.publish_level(Vec3::new(0.5, 0.0, 1.0));
        run(&mut f.mobility, 10);
        let rotation = f.mobility.state().pose.leveling_rotation;
        // gravity (z, x) = (1.0, 0.5) integrated over 0.2 s with gain 0.2
        assert!((rotation.x + 0.04).abs() < 1e-9);
        assert!((rotation.y - 0.02).abs() < 1e-9);
        assert_eq!(rotation.z, 0.0);
    }

    #[test]
    fn test_gait_switch_commits_when_idle() {
        let mut f = lifted(false);
        f.mobility.handle_command(&["gait", "tripod"]).unwrap();
        assert_eq!(f.mobility.state().pending_gait, Some(GaitKind::Tripod));
        run(&mut f.mobility, 1);
        assert_eq!(f.mobility.state().gait, GaitKind::Tripod);
        assert_eq!(f.mobility.state().pending_gait, None);
        assert!(messages(&mut f.notes).contains(&"Switching to tripod gait...".to_string()));
    }

    #[test]
    fn test_gait_switch_waits_for_feet_to_settle() {
        let mut f = lifted(false);
        f.mobility.handle_packet(&Packet::Joystick {
            kind: JoystickKind::Direction,
            data: Vec2::new(0.0, 0.5),
        });
        run(&mut f.mobility, 100);
        assert!(!feet_home(&f.mobility));

        f.mobility.handle_command(&["gait", "wave"]).unwrap();
        run(&mut f.mobility, 1);
        assert_eq!(f.mobility.walking_speed(), Vec2::zeros());
        assert_eq!(f.mobility.state().gait, GaitKind::Ripple);
        assert_eq!(f.mobility.state().pending_gait, Some(GaitKind::Wave));

        assert!(run_until(&mut f.mobility, 5000, |m| m.state().pending_gait.is_none()));
        assert_eq!(f.mobility.state().gait, GaitKind::Wave);
        assert!(feet_home(&f.mobility));
    }

    #[test]
    fn test_walking_moves_stance_feet_backwards() {
        let mut f = lifted(false);
        f.mobility.set_walking_speed(Vec2::new(0.0, 0.5));
        run(&mut f.mobility, 5);
        let engine = f.mobility.gait_engine();
        // Leg 2 starts ripple in stance.
        assert!(engine.walk_position(2).y < 0.0);
        assert_eq!(engine.walk_position(2).z, 0.0);
    }

    #[test]
    fn test_rotation_joystick_is_clamped() {
        let mut f = fixture(false);
        f.mobility.handle_packet(&Packet::Joystick {
            kind: JoystickKind::Rotation,
            data: Vec2::new(4.0, 0.0),
        });
        assert_eq!(f.mobility.rotation_speed(), 1.0);
    }

    #[test]
    fn test_leg_loss_demo_pins_one_leg() {
        let mut f = lifted(false);
        f.mobility.handle_command(&["toggle-loss"]).unwrap();
        run(&mut f.mobility, 1);
        assert_eq!(f.mobility.legs()[3].goal_position().unwrap().z, 0.0);
        assert_eq!(f.mobility.legs()[2].goal_position().unwrap().z, -100.0);
    }

    #[test]
    fn test_center_offset_shifts_every_foot() {
        let mut f = lifted(false);
        f.mobility.handle_command(&["move-center-y+"]).unwrap();
        f.mobility.handle_command(&["move-center-y+"]).unwrap();
        run(&mut f.mobility, 1);
        let goal = f.mobility.legs()[5].goal_position().unwrap();
        assert_eq!(goal, Vec3::new(180.0, -300.0, -100.0));
    }

    #[test]
    fn test_ground_adaptation_keeps_offsets_zero_sum() {
        let mut f = lifted(false);
        f.mobility.handle_command(&["toggle-groundadaption"]).unwrap();
        f.sensors.publish_loads([120, -40, 30, -90, 10, -5]);
        for tick in 0..50 {
            f.mobility.tick(tick, TICK);
            assert!(f.mobility.state().ground.sum().abs() < 1e-6);
        }
        assert!(f.mobility.state().ground.offsets().iter().any(|o| o.abs() > 1e-6));
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let mut f = fixture(false);
        assert_eq!(
            f.mobility.handle_command(&["jump"]),
            Err(CommandError::Unknown("jump".to_string()))
        );
        assert_eq!(messages(&mut f.notes), vec!["Error: Unknown command: jump"]);
    }
}
