use crate::config::GameConfig;
use crate::gameplay::vehicle::PlayerVehicle;
use bevy::prelude::*;

const CAMERA_Z: f32 = 999.9;

/// Camera center for a vehicle position: locked to the vehicle on both axes,
/// dropped by the configured bias so the vehicle rides above screen center
/// and the ground ahead stays in view.
fn camera_target(vehicle_position: Vec2, vertical_bias: f32) -> Vec2 {
    Vec2::new(vehicle_position.x, vehicle_position.y - vertical_bias)
}

/// Rigid follow, no smoothing. The vehicle never drifts from the frame
/// center, only the bias offsets it.
pub(crate) fn camera_follow_vehicle(
    config: Res<GameConfig>,
    player_query: Query<&Transform, With<PlayerVehicle>>,
    mut camera_query: Query<&mut Transform, (With<Camera2d>, Without<PlayerVehicle>)>,
) {
    let Ok(player_transform) = player_query.single() else {
        return;
    };
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let target = camera_target(
        player_transform.translation.truncate(),
        config.game.camera.vertical_bias,
    );
    camera_transform.translation.x = target.x;
    camera_transform.translation.y = target.y;
    camera_transform.translation.z = CAMERA_Z;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_stays_locked_to_the_vehicle() {
        let target = camera_target(Vec2::new(123.0, -45.0), 90.0);
        assert_eq!(target, Vec2::new(123.0, -135.0));
    }

    #[test]
    fn zero_bias_centers_the_vehicle_exactly() {
        let position = Vec2::new(-512.5, 77.25);
        assert_eq!(camera_target(position, 0.0), position);
    }

    #[test]
    fn bias_is_purely_vertical() {
        let position = Vec2::new(4096.0, -300.0);
        let target = camera_target(position, 120.0);
        assert_eq!(target.x, position.x);
        assert_eq!(position.y - target.y, 120.0);
    }
}
