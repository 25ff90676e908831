use crate::config::{GameConfig, VehicleConfig};
use crate::gameplay::terrain::TerrainChunks;
use crate::gameplay::vehicle::{
    ActiveVehicle, PlayerVehicle, VehicleInputState, VehicleJumpedEvent, VehicleResetEvent,
    VehicleTelemetry,
};
use crate::states::GameState;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::fs;
use std::path::Path;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DebugRunStats>()
            .init_resource::<KeybindOverlayState>()
            .init_resource::<VehicleTuningPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_vehicle_tuning_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(OnEnter(GameState::InRun), reset_run_stats)
            .add_systems(
                Update,
                (update_run_stats, update_debug_overlay_text)
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                vehicle_tuning_panel_ui
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

/// Per-run counters fed by gameplay messages. Terrain figures come straight
/// from [`TerrainChunks`] so the overlay never keeps a second copy of them.
#[derive(Resource, Debug, Clone, Default)]
pub struct DebugRunStats {
    pub distance: f32,
    pub speed: f32,
    pub jump_count: u32,
    pub reset_count: u32,
    pub last_fall_x: f32,
    pub last_fall_depth: f32,
}

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

#[derive(Debug, Clone)]
struct VehicleTuningParams {
    jump_boost: f32,
    linear_damping: f32,
    angular_damping: f32,
    radius: f32,
    density: f32,
    friction: f32,
    restitution: f32,
    roll_torque: f32,
    max_roll_speed: f32,
    chassis_density: f32,
    wheel_radius: f32,
    wheel_density: f32,
    wheel_friction: f32,
    suspension_rest_length: f32,
    suspension_stiffness: f32,
    suspension_damping: f32,
    wheel_motor_speed: f32,
    wheel_max_speed: f32,
    jump_pitch_nudge: f32,
}

impl VehicleTuningParams {
    fn from_vehicle(vehicle: &VehicleConfig) -> Self {
        Self {
            jump_boost: vehicle.jump_boost,
            linear_damping: vehicle.linear_damping,
            angular_damping: vehicle.angular_damping,
            radius: vehicle.radius,
            density: vehicle.density,
            friction: vehicle.friction,
            restitution: vehicle.restitution,
            roll_torque: vehicle.roll_torque,
            max_roll_speed: vehicle.max_roll_speed,
            chassis_density: vehicle.chassis_density,
            wheel_radius: vehicle.wheel_radius,
            wheel_density: vehicle.wheel_density,
            wheel_friction: vehicle.wheel_friction,
            suspension_rest_length: vehicle.suspension_rest_length,
            suspension_stiffness: vehicle.suspension_stiffness,
            suspension_damping: vehicle.suspension_damping,
            wheel_motor_speed: vehicle.wheel_motor_speed,
            wheel_max_speed: vehicle.wheel_max_speed,
            jump_pitch_nudge: vehicle.jump_pitch_nudge,
        }
    }

    fn apply_to_vehicle(&self, vehicle: &mut VehicleConfig) {
        vehicle.jump_boost = self.jump_boost;
        vehicle.linear_damping = self.linear_damping;
        vehicle.angular_damping = self.angular_damping;
        vehicle.radius = self.radius;
        vehicle.density = self.density;
        vehicle.friction = self.friction;
        vehicle.restitution = self.restitution;
        vehicle.roll_torque = self.roll_torque;
        vehicle.max_roll_speed = self.max_roll_speed;
        vehicle.chassis_density = self.chassis_density;
        vehicle.wheel_radius = self.wheel_radius;
        vehicle.wheel_density = self.wheel_density;
        vehicle.wheel_friction = self.wheel_friction;
        vehicle.suspension_rest_length = self.suspension_rest_length;
        vehicle.suspension_stiffness = self.suspension_stiffness;
        vehicle.suspension_damping = self.suspension_damping;
        vehicle.wheel_motor_speed = self.wheel_motor_speed;
        vehicle.wheel_max_speed = self.wheel_max_speed;
        vehicle.jump_pitch_nudge = self.jump_pitch_nudge;
    }
}

#[derive(Resource, Debug, Default)]
struct VehicleTuningPanelState {
    visible: bool,
    source_vehicle_id: String,
    params: Option<VehicleTuningParams>,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(186.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn reset_run_stats(mut run_stats: ResMut<DebugRunStats>) {
    *run_stats = DebugRunStats::default();
}

fn update_run_stats(
    telemetry: Option<Res<VehicleTelemetry>>,
    mut jumps: MessageReader<VehicleJumpedEvent>,
    mut resets: MessageReader<VehicleResetEvent>,
    mut run_stats: ResMut<DebugRunStats>,
) {
    if let Some(telemetry) = telemetry {
        run_stats.distance = telemetry.distance;
        run_stats.speed = telemetry.speed;
    }

    for _jump in jumps.read() {
        run_stats.jump_count += 1;
    }

    for reset in resets.read() {
        run_stats.reset_count += 1;
        run_stats.last_fall_x = reset.fall_x;
        run_stats.last_fall_depth = reset.fall_depth;
    }
}

fn reset_summary(run_stats: &DebugRunStats) -> String {
    if run_stats.reset_count == 0 {
        return "Resets: 0".to_string();
    }
    format!(
        "Resets: {} (last at x {:.0}, depth {:.1})",
        run_stats.reset_count, run_stats.last_fall_x, run_stats.last_fall_depth
    )
}

#[allow(clippy::too_many_arguments)]
fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    run_stats: Res<DebugRunStats>,
    chunks: Option<Res<TerrainChunks>>,
    active: Option<Res<ActiveVehicle>>,
    player_query: Query<&Transform, With<PlayerVehicle>>,
    input_state: Option<Res<VehicleInputState>>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let (player_x, player_y) = player_query
        .single()
        .map(|transform| (transform.translation.x, transform.translation.y))
        .unwrap_or((0.0, 0.0));
    let jump_held = input_state
        .map(|state| state.jump_pressed)
        .unwrap_or(false);
    let vehicle_id = active
        .map(|active| active.id.clone())
        .unwrap_or_else(|| "n/a".to_string());

    let (chunk_count, frontier_x, spawned, evicted, starved) = match chunks {
        Some(chunks) => (
            chunks.chunk_count(),
            chunks.frontier_x(),
            chunks.total_spawned(),
            chunks.total_evicted(),
            chunks.is_starved(),
        ),
        None => (0, 0.0, 0, 0, false),
    };

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\nVehicle: {vehicle_id} | X: {player_x:>8.1} Y: {player_y:>7.1}\nSpeed: {speed:>7.1} px/s | Best X: {distance:>8.1}\nJump input: {jump} | Jumps: {jumps} | {resets}\nChunks held: {chunk_count} | Frontier: {frontier_x:>8.1} (lead {lead:>7.1})\nChunks spawned: {spawned} | evicted: {evicted} | starved: {starved}\nHotkeys: H help | V tuning | Tab vehicle | F5 reload config",
        speed = run_stats.speed,
        distance = run_stats.distance,
        jump = if jump_held { "yes" } else { "no" },
        jumps = run_stats.jump_count,
        resets = reset_summary(&run_stats),
        lead = frontier_x - player_x,
        starved = if starved { "yes" } else { "no" },
    ));
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn toggle_vehicle_tuning_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<VehicleTuningPanelState>,
    active: Option<Res<ActiveVehicle>>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyV) {
        return;
    }

    panel_state.visible = !panel_state.visible;
    if panel_state.visible {
        if let Some(config) = config {
            let vehicle_id = active_vehicle_id(&active, &config);
            if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config, &vehicle_id)
            {
                panel_state.status = error;
            }
        }
        info!("Vehicle tuning panel shown.");
    } else {
        info!("Vehicle tuning panel hidden.");
    }
}

fn active_vehicle_id(active: &Option<Res<ActiveVehicle>>, config: &GameConfig) -> String {
    active
        .as_ref()
        .map(|active| active.id.clone())
        .unwrap_or_else(|| config.game.app.player_vehicle.clone())
}

fn vehicle_tuning_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<VehicleTuningPanelState>,
    active: Option<Res<ActiveVehicle>>,
    mut config: ResMut<GameConfig>,
) {
    if !panel_state.visible {
        return;
    }

    let current_id = active_vehicle_id(&active, &config);
    if panel_state.params.is_none() || panel_state.source_vehicle_id != current_id {
        if let Err(error) = sync_panel_state_from_config(&mut panel_state, &config, &current_id) {
            panel_state.status = error;
            return;
        }
    }

    let Some(mut params) = panel_state.params.clone() else {
        return;
    };

    let mut window_open = panel_state.visible;
    let mut params_changed = false;
    let mut reload_clicked = false;
    let mut apply_clicked = false;
    let status = panel_state.status.clone();
    let vehicle_id = panel_state.source_vehicle_id.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Vehicle Tuning")
        .open(&mut window_open)
        .resizable(true)
        .default_width(560.0)
        .show(ctx, |ui| {
            ui.label(format!("Active vehicle: {vehicle_id}"));
            ui.label("Each row has a slider plus a free-form float value.");
            ui.separator();

            ui.collapsing("Shared", |ui| {
                params_changed |= tuning_slider_row(
                    ui,
                    "jump_boost",
                    &mut params.jump_boost,
                    0.0..=2000.0,
                    1.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "linear_damping",
                    &mut params.linear_damping,
                    0.0..=10.0,
                    0.01,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "angular_damping",
                    &mut params.angular_damping,
                    0.0..=10.0,
                    0.01,
                );
            });

            ui.collapsing("Ball Drive", |ui| {
                params_changed |=
                    tuning_slider_row(ui, "radius", &mut params.radius, 4.0..=120.0, 0.5);
                params_changed |=
                    tuning_slider_row(ui, "density", &mut params.density, 0.1..=20.0, 0.1);
                params_changed |=
                    tuning_slider_row(ui, "friction", &mut params.friction, 0.0..=4.0, 0.01);
                params_changed |= tuning_slider_row(
                    ui,
                    "restitution",
                    &mut params.restitution,
                    0.0..=1.0,
                    0.01,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "roll_torque",
                    &mut params.roll_torque,
                    0.0..=400_000_000.0,
                    100_000.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "max_roll_speed",
                    &mut params.max_roll_speed,
                    1.0..=120.0,
                    0.1,
                );
            });

            ui.collapsing("Car Drive + Suspension", |ui| {
                params_changed |= tuning_slider_row(
                    ui,
                    "chassis_density",
                    &mut params.chassis_density,
                    0.1..=20.0,
                    0.1,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "wheel_radius",
                    &mut params.wheel_radius,
                    4.0..=60.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "wheel_density",
                    &mut params.wheel_density,
                    0.1..=20.0,
                    0.1,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "wheel_friction",
                    &mut params.wheel_friction,
                    0.0..=4.0,
                    0.01,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "suspension_rest_length",
                    &mut params.suspension_rest_length,
                    4.0..=120.0,
                    0.5,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "suspension_stiffness",
                    &mut params.suspension_stiffness,
                    10_000.0..=10_000_000.0,
                    1_000.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "suspension_damping",
                    &mut params.suspension_damping,
                    0.0..=1_000_000.0,
                    500.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "wheel_motor_speed",
                    &mut params.wheel_motor_speed,
                    1.0..=120.0,
                    0.1,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "wheel_max_speed",
                    &mut params.wheel_max_speed,
                    50.0..=2000.0,
                    1.0,
                );
                params_changed |= tuning_slider_row(
                    ui,
                    "jump_pitch_nudge",
                    &mut params.jump_pitch_nudge,
                    -10.0..=10.0,
                    0.05,
                );
            });

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Reload From Config").clicked() {
                    reload_clicked = true;
                }
                if ui.button("Apply To vehicles.toml").clicked() {
                    apply_clicked = true;
                }
            });

            if !status.is_empty() {
                ui.separator();
                ui.label(status);
            }
        });

    panel_state.visible = window_open;

    if reload_clicked {
        match sync_panel_state_from_config(&mut panel_state, &config, &vehicle_id) {
            Ok(()) => panel_state.status = "Reloaded values from current config.".to_string(),
            Err(error) => panel_state.status = error,
        }
        return;
    }

    panel_state.params = Some(params.clone());

    if params_changed {
        if let Err(error) =
            apply_vehicle_tuning_to_runtime_config(&mut config, &vehicle_id, &params)
        {
            panel_state.status = error;
        } else {
            panel_state.status = "Live-tuning active (in-memory config updated).".to_string();
        }
    }

    if apply_clicked {
        match persist_vehicle_tuning_and_reload(&mut config, &vehicle_id, &params) {
            Ok(message) => {
                panel_state.status = message;
                if let Err(error) =
                    sync_panel_state_from_config(&mut panel_state, &config, &vehicle_id)
                {
                    panel_state.status = error;
                }
            }
            Err(error) => panel_state.status = error,
        }
    }
}

fn tuning_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        changed |= ui
            .add(egui::Slider::new(value, slider_range).show_value(false))
            .changed();
        changed |= ui
            .add(egui::DragValue::new(value).speed(drag_speed as f64))
            .changed();
    });
    changed
}

fn sync_panel_state_from_config(
    panel_state: &mut VehicleTuningPanelState,
    config: &GameConfig,
    vehicle_id: &str,
) -> Result<(), String> {
    let Some(vehicle) = config.vehicles_by_id.get(vehicle_id) else {
        return Err(format!(
            "Vehicle tuning panel: vehicle `{vehicle_id}` not found in config."
        ));
    };

    panel_state.source_vehicle_id = vehicle_id.to_string();
    panel_state.params = Some(VehicleTuningParams::from_vehicle(vehicle));
    Ok(())
}

fn apply_vehicle_tuning_to_runtime_config(
    config: &mut GameConfig,
    vehicle_id: &str,
    params: &VehicleTuningParams,
) -> Result<(), String> {
    let Some(vehicle) = config.vehicles_by_id.get_mut(vehicle_id) else {
        return Err(format!(
            "Vehicle tuning panel: runtime vehicle `{vehicle_id}` not found in vehicles_by_id."
        ));
    };
    params.apply_to_vehicle(vehicle);

    let Some(vehicle) = config
        .vehicles
        .vehicles
        .iter_mut()
        .find(|v| v.id == vehicle_id)
    else {
        return Err(format!(
            "Vehicle tuning panel: runtime vehicle `{vehicle_id}` not found in vehicles list."
        ));
    };
    params.apply_to_vehicle(vehicle);
    Ok(())
}

fn persist_vehicle_tuning_and_reload(
    config: &mut GameConfig,
    vehicle_id: &str,
    params: &VehicleTuningParams,
) -> Result<String, String> {
    let path = Path::new("config").join("vehicles.toml");
    let original_raw = fs::read_to_string(&path)
        .map_err(|error| format!("Failed reading `{}`: {error}", path.display()))?;
    let mut root: toml::Value = toml::from_str(&original_raw)
        .map_err(|error| format!("Failed parsing `{}`: {error}", path.display()))?;

    write_params_to_toml_value(&mut root, vehicle_id, params)?;

    let updated_raw = toml::to_string_pretty(&root)
        .map_err(|error| format!("Failed serializing vehicles TOML: {error}"))?;
    fs::write(&path, updated_raw)
        .map_err(|error| format!("Failed writing `{}`: {error}", path.display()))?;

    match GameConfig::load_from_dir(Path::new("config")) {
        Ok(new_config) => {
            *config = new_config;
            Ok(format!(
                "Applied tuning and saved to {}.",
                path.to_string_lossy()
            ))
        }
        Err(error) => {
            let _ = fs::write(&path, original_raw);
            if let Ok(restored) = GameConfig::load_from_dir(Path::new("config")) {
                *config = restored;
            }
            Err(format!(
                "Apply failed validation: {error}. Reverted `{}`.",
                path.display()
            ))
        }
    }
}

fn write_params_to_toml_value(
    root: &mut toml::Value,
    vehicle_id: &str,
    params: &VehicleTuningParams,
) -> Result<(), String> {
    let Some(vehicles_array) = root.get_mut("vehicles").and_then(toml::Value::as_array_mut) else {
        return Err("vehicles.toml: missing or invalid `vehicles` array".to_string());
    };

    let Some(vehicle_table) = vehicles_array.iter_mut().find_map(|vehicle_value| {
        let table = vehicle_value.as_table_mut()?;
        if table.get("id").and_then(toml::Value::as_str) == Some(vehicle_id) {
            Some(table)
        } else {
            None
        }
    }) else {
        return Err(format!(
            "vehicles.toml: could not find vehicle with id `{vehicle_id}`"
        ));
    };

    set_toml_float(vehicle_table, "jump_boost", params.jump_boost)?;
    set_toml_float(vehicle_table, "linear_damping", params.linear_damping)?;
    set_toml_float(vehicle_table, "angular_damping", params.angular_damping)?;
    set_toml_float(vehicle_table, "radius", params.radius)?;
    set_toml_float(vehicle_table, "density", params.density)?;
    set_toml_float(vehicle_table, "friction", params.friction)?;
    set_toml_float(vehicle_table, "restitution", params.restitution)?;
    set_toml_float(vehicle_table, "roll_torque", params.roll_torque)?;
    set_toml_float(vehicle_table, "max_roll_speed", params.max_roll_speed)?;
    set_toml_float(vehicle_table, "chassis_density", params.chassis_density)?;
    set_toml_float(vehicle_table, "wheel_radius", params.wheel_radius)?;
    set_toml_float(vehicle_table, "wheel_density", params.wheel_density)?;
    set_toml_float(vehicle_table, "wheel_friction", params.wheel_friction)?;
    set_toml_float(
        vehicle_table,
        "suspension_rest_length",
        params.suspension_rest_length,
    )?;
    set_toml_float(
        vehicle_table,
        "suspension_stiffness",
        params.suspension_stiffness,
    )?;
    set_toml_float(
        vehicle_table,
        "suspension_damping",
        params.suspension_damping,
    )?;
    set_toml_float(vehicle_table, "wheel_motor_speed", params.wheel_motor_speed)?;
    set_toml_float(vehicle_table, "wheel_max_speed", params.wheel_max_speed)?;
    set_toml_float(vehicle_table, "jump_pitch_nudge", params.jump_pitch_nudge)?;

    Ok(())
}

fn set_toml_float(
    table: &mut toml::map::Map<String, toml::Value>,
    key: &str,
    value: f32,
) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("`{key}` is not a finite number"));
    }

    table.insert(key.to_string(), toml::Value::Float(value as f64));
    Ok(())
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
V - Toggle vehicle tuning panel\n\
F5 - Hot-reload config\n\
Space / W / Up / LMB - Jump\n\
Tab - Switch vehicle\n\
R - Restart run\n\
Esc - Quit"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roller_vehicle() -> VehicleConfig {
        toml::from_str(
            r#"
id = "roller"
kind = "ball"
color = [0.9, 0.5, 0.2]
jump_boost = 600.0
radius = 26.0
density = 4.0
friction = 1.9
roll_torque = 90000000.0
max_roll_speed = 28.0
"#,
        )
        .expect("test vehicle parses")
    }

    fn tuned_params() -> VehicleTuningParams {
        VehicleTuningParams::from_vehicle(&roller_vehicle())
    }

    #[test]
    fn params_round_trip_through_vehicle_config() {
        let mut vehicle = roller_vehicle();

        let mut params = VehicleTuningParams::from_vehicle(&vehicle);
        params.jump_boost = 912.0;
        params.max_roll_speed = 44.0;
        params.apply_to_vehicle(&mut vehicle);

        assert_eq!(vehicle.jump_boost, 912.0);
        assert_eq!(vehicle.max_roll_speed, 44.0);
    }

    #[test]
    fn writing_params_rewrites_matching_vehicle_table() {
        let raw = r#"
[[vehicles]]
id = "roller"
kind = "ball"
jump_boost = 1.0

[[vehicles]]
id = "buggy"
kind = "car"
jump_boost = 2.0
"#;
        let mut root: toml::Value = toml::from_str(raw).expect("test TOML parses");
        let mut params = tuned_params();
        params.jump_boost = 777.0;

        write_params_to_toml_value(&mut root, "roller", &params).expect("roller exists");

        let vehicles = root
            .get("vehicles")
            .and_then(toml::Value::as_array)
            .expect("vehicles array");
        let roller_boost = vehicles[0]
            .get("jump_boost")
            .and_then(toml::Value::as_float)
            .expect("roller jump_boost");
        let buggy_boost = vehicles[1]
            .get("jump_boost")
            .and_then(toml::Value::as_float)
            .expect("buggy jump_boost");

        assert_eq!(roller_boost, 777.0);
        assert_eq!(buggy_boost, 2.0);
    }

    #[test]
    fn writing_params_rejects_unknown_vehicle() {
        let raw = r#"
[[vehicles]]
id = "roller"
kind = "ball"
"#;
        let mut root: toml::Value = toml::from_str(raw).expect("test TOML parses");
        let error = write_params_to_toml_value(&mut root, "ghost", &tuned_params())
            .expect_err("unknown id must fail");
        assert!(error.contains("ghost"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut table = toml::map::Map::new();
        let error = set_toml_float(&mut table, "radius", f32::NAN).expect_err("NaN must fail");
        assert!(error.contains("radius"));
        assert!(table.is_empty());
    }

    #[test]
    fn reset_summary_names_where_the_vehicle_last_fell() {
        let mut stats = DebugRunStats::default();
        assert_eq!(reset_summary(&stats), "Resets: 0");

        stats.reset_count = 2;
        stats.last_fall_x = 1280.0;
        stats.last_fall_depth = 912.4;

        let line = reset_summary(&stats);
        assert!(line.contains("Resets: 2"));
        assert!(line.contains("x 1280"));
        assert!(line.contains("depth 912.4"));
    }
}
