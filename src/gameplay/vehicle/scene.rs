use super::*;

pub(super) fn spawn_vehicle_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    config: Res<GameConfig>,
    active: Option<Res<ActiveVehicle>>,
    existing_player: Query<Entity, With<PlayerVehicle>>,
) {
    let active_id = match active {
        Some(active) => active.id.clone(),
        None => {
            let id = config.game.app.player_vehicle.clone();
            commands.insert_resource(ActiveVehicle { id: id.clone() });
            id
        }
    };

    if !existing_player.is_empty() {
        return;
    }

    let Some(vehicle) = config.vehicles_by_id.get(&active_id) else {
        error!("Active vehicle `{active_id}` is missing from the catalog.");
        return;
    };
    let Some(kind) = VehicleKind::parse(&vehicle.kind) else {
        error!(
            "Vehicle `{}` declares unknown kind `{}`.",
            vehicle.id, vehicle.kind
        );
        return;
    };

    let origin = Vec2::new(0.0, config.game.world.reset_height_y);
    match kind {
        VehicleKind::RollingBall => {
            spawn_rolling_ball(&mut commands, &mut meshes, &mut materials, vehicle, origin)
        }
        VehicleKind::WheeledCar => {
            spawn_wheeled_car(&mut commands, &mut meshes, &mut materials, vehicle, origin)
        }
    }
    info!("Spawned vehicle `{}` at x = {:.0}.", vehicle.id, origin.x);
}

pub(super) fn spawn_rolling_ball(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<ColorMaterial>,
    vehicle: &VehicleConfig,
    origin: Vec2,
) {
    let color = vehicle_color(vehicle);
    let player_entity = commands
        .spawn((
            Name::new("PlayerVehicle"),
            PlayerVehicle {
                kind: VehicleKind::RollingBall,
            },
            Transform::from_xyz(origin.x, origin.y, PLAYER_Z),
            GlobalTransform::default(),
            Visibility::Inherited,
            InheritedVisibility::VISIBLE,
            ViewVisibility::default(),
        ))
        .insert((
            RigidBody::Dynamic,
            Collider::ball(vehicle.radius),
            ColliderMassProperties::Density(vehicle.density),
            Friction::coefficient(vehicle.friction),
            Restitution::coefficient(vehicle.restitution),
            GravityScale(1.0),
            Velocity::zero(),
            ExternalForce::default(),
            Damping {
                linear_damping: vehicle.linear_damping,
                angular_damping: vehicle.angular_damping,
            },
            Ccd::enabled(),
            Sleeping::disabled(),
            CollisionGroups::new(Group::GROUP_2, Group::GROUP_1),
        ))
        .id();

    let disc_mesh = meshes.add(Circle::new(vehicle.radius));
    let disc_material = materials.add(ColorMaterial::from(color));
    commands.entity(player_entity).with_children(|parent| {
        parent.spawn((
            Name::new("BallBodyVisual"),
            Mesh2d(disc_mesh),
            MeshMaterial2d(disc_material),
            Transform::from_xyz(0.0, 0.0, 0.2),
        ));

        // Off-white stripe across the disc so the roll reads on screen.
        parent.spawn((
            Name::new("BallStripeVisual"),
            Sprite::from_color(
                Color::srgb(0.93, 0.93, 0.90),
                Vec2::new(vehicle.radius * 1.7, vehicle.radius * 0.18),
            ),
            Transform::from_xyz(0.0, 0.0, 0.3),
        ));
    });
}

pub(super) fn spawn_wheeled_car(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<ColorMaterial>,
    vehicle: &VehicleConfig,
    origin: Vec2,
) {
    let color = vehicle_color(vehicle);
    let chassis_entity = commands
        .spawn((
            Name::new("PlayerVehicle"),
            PlayerVehicle {
                kind: VehicleKind::WheeledCar,
            },
            Transform::from_xyz(origin.x, origin.y, PLAYER_Z),
            GlobalTransform::default(),
            Visibility::Inherited,
            InheritedVisibility::VISIBLE,
            ViewVisibility::default(),
        ))
        .insert((
            RigidBody::Dynamic,
            Collider::cuboid(vehicle.chassis_half_width, vehicle.chassis_half_height),
            ColliderMassProperties::Density(vehicle.chassis_density),
            Friction::coefficient(CHASSIS_FRICTION),
            Restitution::coefficient(0.0),
            GravityScale(1.0),
            Velocity::zero(),
            ExternalForce::default(),
            Damping {
                linear_damping: vehicle.linear_damping,
                angular_damping: vehicle.angular_damping,
            },
            Ccd::enabled(),
            Sleeping::disabled(),
            CollisionGroups::new(Group::GROUP_2, Group::GROUP_1),
        ))
        .id();

    commands.entity(chassis_entity).with_children(|parent| {
        parent.spawn((
            Name::new("CarBodyVisual"),
            Sprite::from_color(
                color,
                Vec2::new(
                    vehicle.chassis_half_width * 2.0,
                    vehicle.chassis_half_height * 2.0,
                ),
            ),
            Transform::from_xyz(0.0, 0.0, 0.2),
        ));

        parent.spawn((
            Name::new("CarCabinVisual"),
            Sprite::from_color(
                Color::srgb(0.82, 0.88, 0.93),
                Vec2::new(
                    vehicle.chassis_half_width * 0.9,
                    vehicle.chassis_half_height * 1.1,
                ),
            ),
            Transform::from_xyz(
                -vehicle.chassis_half_width * 0.2,
                vehicle.chassis_half_height * 1.4,
                0.3,
            ),
        ));
    });

    let wheel_mesh = meshes.add(RegularPolygon::new(vehicle.wheel_radius, WHEEL_VISUAL_SIDES));
    let wheel_material = materials.add(ColorMaterial::from(Color::srgb(0.16, 0.17, 0.20)));
    let axles = [
        (WheelAxle::Front, vehicle.axle_offset_x),
        (WheelAxle::Rear, -vehicle.axle_offset_x),
    ];
    for (axle, offset_x) in axles {
        let anchor_local = Vec2::new(offset_x, vehicle.axle_offset_y);
        let joint = SpringJointBuilder::new(
            vehicle.suspension_rest_length,
            vehicle.suspension_stiffness,
            vehicle.suspension_damping,
        )
        .local_anchor1(anchor_local)
        .local_anchor2(Vec2::ZERO);

        let wheel_start = Vec2::new(
            origin.x + anchor_local.x,
            origin.y + anchor_local.y - vehicle.suspension_rest_length,
        );
        let wheel_entity = commands
            .spawn((
                Name::new(match axle {
                    WheelAxle::Front => "PlayerWheelFront",
                    WheelAxle::Rear => "PlayerWheelRear",
                }),
                VehicleWheel { axle },
                Transform::from_xyz(wheel_start.x, wheel_start.y, PLAYER_Z),
                GlobalTransform::default(),
                Visibility::Inherited,
                InheritedVisibility::VISIBLE,
                ViewVisibility::default(),
            ))
            .insert((
                RigidBody::Dynamic,
                Collider::ball(vehicle.wheel_radius),
                ColliderMassProperties::Density(vehicle.wheel_density),
                Friction::coefficient(vehicle.wheel_friction),
                Restitution::coefficient(0.0),
                GravityScale(1.0),
                Velocity::zero(),
                Damping {
                    linear_damping: vehicle.linear_damping,
                    angular_damping: 0.0,
                },
                Ccd::enabled(),
                Sleeping::disabled(),
                CollisionGroups::new(Group::GROUP_2, Group::GROUP_1),
                ImpulseJoint::new(chassis_entity, joint),
            ))
            .id();

        commands.entity(wheel_entity).with_children(|parent| {
            parent.spawn((
                Name::new("WheelHubVisual"),
                Mesh2d(wheel_mesh.clone()),
                MeshMaterial2d(wheel_material.clone()),
                Transform::from_xyz(0.0, 0.0, 0.2),
            ));
        });
    }
}

fn vehicle_color(vehicle: &VehicleConfig) -> Color {
    Color::srgb(vehicle.color[0], vehicle.color[1], vehicle.color[2])
}

pub(super) fn cleanup_vehicle_scene(
    mut commands: Commands,
    player_query: Query<Entity, With<PlayerVehicle>>,
    wheel_query: Query<Entity, With<VehicleWheel>>,
) {
    for entity in &player_query {
        commands.entity(entity).try_despawn();
    }
    for entity in &wheel_query {
        commands.entity(entity).try_despawn();
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cycle_player_vehicle(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    config: Res<GameConfig>,
    input: Res<VehicleInputState>,
    active: Option<ResMut<ActiveVehicle>>,
    player_query: Query<(Entity, &Transform), With<PlayerVehicle>>,
    wheel_query: Query<Entity, With<VehicleWheel>>,
) {
    if !input.cycle_pressed {
        return;
    }
    let Some(mut active) = active else {
        return;
    };
    let catalog = &config.vehicles.vehicles;
    if catalog.len() < 2 {
        return;
    }

    let current_slot = catalog
        .iter()
        .position(|vehicle| vehicle.id == active.id)
        .unwrap_or(0);
    let next = &catalog[(current_slot + 1) % catalog.len()];
    let Some(kind) = VehicleKind::parse(&next.kind) else {
        error!("Vehicle `{}` declares unknown kind `{}`.", next.id, next.kind);
        return;
    };

    let respawn_x = player_query
        .single()
        .map(|(_, transform)| transform.translation.x)
        .unwrap_or(0.0);
    for (entity, _) in &player_query {
        commands.entity(entity).try_despawn();
    }
    for entity in &wheel_query {
        commands.entity(entity).try_despawn();
    }

    active.id = next.id.clone();
    let origin = Vec2::new(respawn_x, config.game.world.reset_height_y);
    match kind {
        VehicleKind::RollingBall => {
            spawn_rolling_ball(&mut commands, &mut meshes, &mut materials, next, origin)
        }
        VehicleKind::WheeledCar => {
            spawn_wheeled_car(&mut commands, &mut meshes, &mut materials, next, origin)
        }
    }
    info!("Switched vehicle to `{}`.", next.id);
}
