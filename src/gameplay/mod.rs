pub mod camera;
pub mod sfx;
pub mod terrain;
pub mod vehicle;

use crate::config::GameConfig;
use crate::states::GameState;
use bevy::prelude::*;
use camera::camera_follow_vehicle;
use sfx::GameplaySfxPlugin;
use terrain::{advance_terrain_frontier, evict_stale_chunks, TerrainPlugin};
use vehicle::{
    apply_jump_input, cycle_player_vehicle, drive_player_vehicle, read_vehicle_input,
    reset_fallen_vehicle, sync_rapier_gravity_from_config, update_vehicle_telemetry, VehiclePlugin,
};

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(TerrainPlugin)
            .add_plugins(VehiclePlugin)
            .add_plugins(GameplaySfxPlugin)
            .add_systems(
                Update,
                // Fixed frame order: input and drive first, then the terrain
                // frontier reacts to the new position, stale chunks leave,
                // fallen vehicles reset, and the camera snaps last.
                (
                    read_vehicle_input,
                    sync_rapier_gravity_from_config,
                    apply_jump_input,
                    drive_player_vehicle,
                    advance_terrain_frontier,
                    evict_stale_chunks,
                    reset_fallen_vehicle,
                    update_vehicle_telemetry,
                    cycle_player_vehicle,
                    camera_follow_vehicle,
                )
                    .chain()
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}
