use crate::config::{GameConfig, VehicleConfig};
use crate::states::GameState;
use bevy::prelude::*;
use bevy_rapier2d::prelude::*;

mod runtime;
mod scene;

pub(crate) use runtime::{
    apply_jump_input, drive_player_vehicle, read_vehicle_input, reset_fallen_vehicle,
    sync_rapier_gravity_from_config, update_vehicle_telemetry,
};
pub(crate) use scene::cycle_player_vehicle;
use runtime::reset_vehicle_telemetry;
use scene::{cleanup_vehicle_scene, spawn_vehicle_scene};

const PLAYER_Z: f32 = 10.0;
const CHASSIS_FRICTION: f32 = 0.4;
const WHEEL_VISUAL_SIDES: u32 = 6;

pub struct VehiclePlugin;

impl Plugin for VehiclePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VehicleInputBindings>()
            .init_resource::<VehicleInputState>()
            .init_resource::<VehicleTelemetry>()
            .add_message::<VehicleJumpedEvent>()
            .add_message::<VehicleResetEvent>()
            .add_systems(
                OnEnter(GameState::InRun),
                (
                    spawn_vehicle_scene.run_if(resource_exists::<GameConfig>),
                    reset_vehicle_telemetry,
                ),
            )
            .add_systems(OnExit(GameState::InRun), cleanup_vehicle_scene);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleKind {
    RollingBall,
    WheeledCar,
}

impl VehicleKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ball" => Some(Self::RollingBall),
            "car" => Some(Self::WheeledCar),
            _ => None,
        }
    }
}

/// The player body. For the ball this is the one rolling collider, for the
/// car it is the chassis the wheels hang from.
#[derive(Component, Debug, Clone, Copy)]
pub struct PlayerVehicle {
    pub kind: VehicleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAxle {
    Front,
    Rear,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct VehicleWheel {
    pub axle: WheelAxle,
}

/// Which catalog entry is on the road. Survives restarts so the player keeps
/// their pick across runs.
#[derive(Resource, Debug, Clone)]
pub struct ActiveVehicle {
    pub id: String,
}

#[derive(Resource, Debug, Clone)]
pub struct VehicleInputBindings {
    pub jump: Vec<KeyCode>,
    pub jump_buttons: Vec<MouseButton>,
    pub cycle_vehicle: Vec<KeyCode>,
}

impl Default for VehicleInputBindings {
    fn default() -> Self {
        Self {
            jump: vec![KeyCode::Space, KeyCode::ArrowUp, KeyCode::KeyW],
            jump_buttons: vec![MouseButton::Left],
            cycle_vehicle: vec![KeyCode::Tab],
        }
    }
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct VehicleInputState {
    pub jump_pressed: bool,
    pub cycle_pressed: bool,
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct VehicleTelemetry {
    pub position: Vec2,
    pub speed: f32,
    pub distance: f32,
}

#[derive(Message, Debug, Clone, Copy)]
pub struct VehicleJumpedEvent;

#[derive(Message, Debug, Clone, Copy)]
pub struct VehicleResetEvent {
    pub fall_x: f32,
    pub fall_depth: f32,
}
