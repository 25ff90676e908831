use super::*;

pub(crate) fn read_vehicle_input(
    bindings: Res<VehicleInputBindings>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    mut input: ResMut<VehicleInputState>,
) {
    input.jump_pressed = bindings
        .jump
        .iter()
        .any(|key| keyboard.just_pressed(*key))
        || bindings
            .jump_buttons
            .iter()
            .any(|button| mouse.just_pressed(*button));
    input.cycle_pressed = bindings
        .cycle_vehicle
        .iter()
        .any(|key| keyboard.just_pressed(*key));
}

pub(crate) fn sync_rapier_gravity_from_config(
    config: Res<GameConfig>,
    mut rapier_config_query: Query<&mut RapierConfiguration, With<DefaultRapierContext>>,
) {
    let Ok(mut rapier_config) = rapier_config_query.single_mut() else {
        return;
    };
    let target_gravity = Vec2::new(0.0, config.game.world.gravity_y);
    if rapier_config.gravity != target_gravity {
        rapier_config.gravity = target_gravity;
    }
}

/// Drive torque for the ball, gated to zero once forward spin reaches the
/// configured cap. The cap limits drive input only; rolling downhill may
/// spin the ball faster and is left alone.
fn roll_drive_torque(forward_spin: f32, max_roll_speed: f32, roll_torque: f32) -> f32 {
    if forward_spin >= max_roll_speed {
        0.0
    } else {
        // Rightward travel is clockwise, which is negative spin in 2D.
        -roll_torque
    }
}

/// Idealized motor for one wheel: spin is set, not torqued, and linear speed
/// is capped so downhill stretches cannot inject unbounded energy through
/// the springs.
fn driven_wheel_velocity(
    mut velocity: Velocity,
    wheel_motor_speed: f32,
    wheel_max_speed: f32,
) -> Velocity {
    velocity.angvel = -wheel_motor_speed;
    velocity.linvel = velocity.linvel.clamp_length_max(wheel_max_speed);
    velocity
}

#[allow(clippy::type_complexity)]
pub(crate) fn drive_player_vehicle(
    config: Res<GameConfig>,
    active: Option<Res<ActiveVehicle>>,
    mut player_query: Query<(&PlayerVehicle, &Velocity, &mut ExternalForce), Without<VehicleWheel>>,
    mut wheel_query: Query<&mut Velocity, With<VehicleWheel>>,
) {
    let Some(active) = active else {
        return;
    };
    let Some(vehicle) = config.vehicles_by_id.get(&active.id) else {
        return;
    };
    let Ok((player, velocity, mut external_force)) = player_query.single_mut() else {
        return;
    };

    *external_force = ExternalForce::default();
    match player.kind {
        VehicleKind::RollingBall => {
            let forward_spin = -velocity.angvel;
            external_force.torque =
                roll_drive_torque(forward_spin, vehicle.max_roll_speed, vehicle.roll_torque);
        }
        VehicleKind::WheeledCar => {
            for mut wheel_velocity in &mut wheel_query {
                *wheel_velocity = driven_wheel_velocity(
                    *wheel_velocity,
                    vehicle.wheel_motor_speed,
                    vehicle.wheel_max_speed,
                );
            }
        }
    }
}

/// Velocity after one jump press. No ground contact is consulted, so the
/// full boost lands even while airborne or already rising.
fn jump_velocity(
    kind: VehicleKind,
    mut velocity: Velocity,
    jump_boost: f32,
    jump_pitch_nudge: f32,
) -> Velocity {
    velocity.linvel.y += jump_boost;
    if kind == VehicleKind::WheeledCar {
        // Nose-up kick so the car clears ledges front first.
        velocity.angvel += jump_pitch_nudge;
    }
    velocity
}

/// Jumps are always honoured, grounded or not. Mid-air presses stack more
/// upward speed on purpose.
pub(crate) fn apply_jump_input(
    config: Res<GameConfig>,
    active: Option<Res<ActiveVehicle>>,
    input: Res<VehicleInputState>,
    mut jump_events: MessageWriter<VehicleJumpedEvent>,
    mut player_query: Query<(&PlayerVehicle, &mut Velocity), Without<VehicleWheel>>,
) {
    if !input.jump_pressed {
        return;
    }
    let Some(active) = active else {
        return;
    };
    let Some(vehicle) = config.vehicles_by_id.get(&active.id) else {
        return;
    };
    let Ok((player, mut velocity)) = player_query.single_mut() else {
        return;
    };

    *velocity = jump_velocity(
        player.kind,
        *velocity,
        vehicle.jump_boost,
        vehicle.jump_pitch_nudge,
    );

    jump_events.write(VehicleJumpedEvent);
}

fn has_fallen(vehicle_y: f32, fall_threshold_y: f32) -> bool {
    vehicle_y < fall_threshold_y
}

fn wheel_reset_position(
    reset_origin: Vec2,
    axle: WheelAxle,
    axle_offset_x: f32,
    axle_offset_y: f32,
    suspension_rest_length: f32,
) -> Vec2 {
    let offset_x = match axle {
        WheelAxle::Front => axle_offset_x,
        WheelAxle::Rear => -axle_offset_x,
    };
    Vec2::new(
        reset_origin.x + offset_x,
        reset_origin.y + axle_offset_y - suspension_rest_length,
    )
}

/// Teleports a fallen vehicle back to the surface elevation at its current
/// x. Body, wheels and velocities are rewritten in the same frame so the rig
/// never straddles a reset.
#[allow(clippy::type_complexity)]
pub(crate) fn reset_fallen_vehicle(
    config: Res<GameConfig>,
    active: Option<Res<ActiveVehicle>>,
    mut reset_events: MessageWriter<VehicleResetEvent>,
    mut player_query: Query<
        (&PlayerVehicle, &mut Transform, &mut Velocity),
        Without<VehicleWheel>,
    >,
    mut wheel_query: Query<
        (&VehicleWheel, &mut Transform, &mut Velocity),
        Without<PlayerVehicle>,
    >,
) {
    let Ok((player, mut transform, mut velocity)) = player_query.single_mut() else {
        return;
    };
    let world = &config.game.world;
    if !has_fallen(transform.translation.y, world.fall_threshold_y) {
        return;
    }

    // Resolve the wheel geometry before touching anything so the rig is
    // rewritten whole or not at all.
    let car_geometry = match player.kind {
        VehicleKind::RollingBall => None,
        VehicleKind::WheeledCar => {
            let Some(vehicle) = active
                .as_ref()
                .and_then(|active| config.vehicles_by_id.get(&active.id))
            else {
                error!("Fallen car has no catalog entry; skipping reset.");
                return;
            };
            Some((
                vehicle.axle_offset_x,
                vehicle.axle_offset_y,
                vehicle.suspension_rest_length,
            ))
        }
    };

    let fall_x = transform.translation.x;
    let fall_depth = world.fall_threshold_y - transform.translation.y;
    let reset_origin = Vec2::new(fall_x, world.reset_height_y);

    transform.translation.x = reset_origin.x;
    transform.translation.y = reset_origin.y;
    transform.rotation = Quat::IDENTITY;
    *velocity = Velocity::zero();

    if let Some((axle_offset_x, axle_offset_y, suspension_rest_length)) = car_geometry {
        for (wheel, mut wheel_transform, mut wheel_velocity) in &mut wheel_query {
            let wheel_position = wheel_reset_position(
                reset_origin,
                wheel.axle,
                axle_offset_x,
                axle_offset_y,
                suspension_rest_length,
            );
            wheel_transform.translation.x = wheel_position.x;
            wheel_transform.translation.y = wheel_position.y;
            wheel_transform.rotation = Quat::IDENTITY;
            *wheel_velocity = Velocity::zero();
        }
    }

    reset_events.write(VehicleResetEvent { fall_x, fall_depth });
    info!(
        "Vehicle fell out of the world at x = {:.0}; reset to the surface.",
        fall_x
    );
}

pub(crate) fn update_vehicle_telemetry(
    mut telemetry: ResMut<VehicleTelemetry>,
    player_query: Query<(&Transform, &Velocity), With<PlayerVehicle>>,
) {
    let Ok((transform, velocity)) = player_query.single() else {
        return;
    };

    telemetry.position = transform.translation.truncate();
    telemetry.speed = velocity.linvel.x;
    telemetry.distance = telemetry.distance.max(transform.translation.x);
}

pub(super) fn reset_vehicle_telemetry(mut telemetry: ResMut<VehicleTelemetry>) {
    *telemetry = VehicleTelemetry::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_torque_cuts_out_at_the_spin_cap() {
        assert_eq!(roll_drive_torque(27.9, 28.0, 90_000_000.0), -90_000_000.0);
        assert_eq!(roll_drive_torque(28.0, 28.0, 90_000_000.0), 0.0);
        assert_eq!(roll_drive_torque(35.0, 28.0, 90_000_000.0), 0.0);
    }

    #[test]
    fn drive_torque_still_pushes_while_spinning_backwards() {
        assert_eq!(roll_drive_torque(-4.0, 28.0, 90_000_000.0), -90_000_000.0);
    }

    #[test]
    fn fall_detection_uses_a_strict_threshold() {
        assert!(has_fallen(-900.1, -900.0));
        assert!(!has_fallen(-900.0, -900.0));
        assert!(!has_fallen(0.0, -900.0));
    }

    #[test]
    fn reset_does_not_retrigger_from_the_surface() {
        // After a reset the body sits at the surface elevation, far above
        // the fall line, so the check cannot fire twice in a row.
        let reset_height_y = 0.0;
        assert!(!has_fallen(reset_height_y, -900.0));
    }

    #[test]
    fn wheel_reset_positions_sit_symmetrically_under_the_chassis() {
        let origin = Vec2::new(512.0, 0.0);
        let front = wheel_reset_position(origin, WheelAxle::Front, 42.0, -14.0, 34.0);
        let rear = wheel_reset_position(origin, WheelAxle::Rear, 42.0, -14.0, 34.0);

        assert_eq!(front, Vec2::new(554.0, -48.0));
        assert_eq!(rear, Vec2::new(470.0, -48.0));
        assert_eq!(front.y, rear.y);
        assert_eq!(front.x - origin.x, origin.x - rear.x);
    }

    #[test]
    fn jump_boost_lands_without_any_ground_check() {
        // Airborne and already rising from an earlier press.
        let rising = Velocity {
            linvel: Vec2::new(300.0, 450.0),
            angvel: -12.0,
        };

        let jumped = jump_velocity(VehicleKind::RollingBall, rising, 600.0, 2.4);

        assert_eq!(jumped.linvel, Vec2::new(300.0, 1050.0));
        assert_eq!(jumped.angvel, -12.0);
    }

    #[test]
    fn repeated_jump_presses_stack_upward_speed() {
        let mut velocity = Velocity::zero();
        for _ in 0..3 {
            velocity = jump_velocity(VehicleKind::RollingBall, velocity, 600.0, 0.0);
        }

        assert_eq!(velocity.linvel.y, 1800.0);
    }

    #[test]
    fn car_jump_adds_the_nose_up_kick() {
        let jumped = jump_velocity(VehicleKind::WheeledCar, Velocity::zero(), 540.0, 2.4);

        assert_eq!(jumped.linvel.y, 540.0);
        assert_eq!(jumped.angvel, 2.4);
    }

    #[test]
    fn wheel_motor_sets_spin_directly() {
        let coasting = Velocity {
            linvel: Vec2::new(120.0, -40.0),
            angvel: 9.0,
        };

        let driven = driven_wheel_velocity(coasting, 32.0, 750.0);

        assert_eq!(driven.angvel, -32.0);
        assert_eq!(driven.linvel, Vec2::new(120.0, -40.0));
    }

    #[test]
    fn wheel_linear_speed_is_capped_at_the_maximum() {
        let plunging = Velocity {
            linvel: Vec2::new(900.0, 0.0),
            angvel: 3.0,
        };

        let driven = driven_wheel_velocity(plunging, 32.0, 750.0);

        assert_eq!(driven.linvel, Vec2::new(750.0, 0.0));
        assert_eq!(driven.angvel, -32.0);
    }
}
