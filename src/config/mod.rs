use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} vehicles, chunk width {:.0}, lookahead {:.0}, retention {}.",
        config.vehicles.vehicles.len(),
        config.terrain.streamer.chunk_width,
        config.terrain.streamer.lookahead_margin,
        config.terrain.streamer.retention_limit
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub terrain: TerrainFile,
    pub vehicles: VehiclesFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let terrain: TerrainFile = read_toml(&config_dir.join("terrain.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;

        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            game,
            terrain,
            vehicles,
        };

        config.validate_references()?;
        Ok(config)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self
            .vehicles_by_id
            .contains_key(&self.game.app.player_vehicle)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.player_vehicle references unknown vehicle id `{}`",
                self.game.app.player_vehicle
            )));
        }

        let world = &self.game.world;
        if world.gravity_y >= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::world.gravity_y must be < 0 (the world falls downward)".to_string(),
            ));
        }
        if world.fall_threshold_y >= world.reset_height_y {
            return Err(ConfigError::Validation(
                "game.toml::world.fall_threshold_y must be below world.reset_height_y".to_string(),
            ));
        }

        if self.game.camera.vertical_bias < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.vertical_bias must be >= 0".to_string(),
            ));
        }

        let audio = &self.game.audio;
        for (field, value) in [
            ("master_volume", audio.master_volume),
            ("engine_volume", audio.engine_volume),
            ("jump_volume", audio.jump_volume),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "game.toml::audio.{field} must be in [0, 1]"
                )));
            }
        }

        let profile = &self.terrain.profile;
        if profile.hill_wavelength <= 0.0 || profile.detail_wavelength <= 0.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::profile wavelengths must be > 0".to_string(),
            ));
        }
        if profile.hill_amplitude < 0.0 || profile.detail_amplitude < 0.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::profile amplitudes must be >= 0".to_string(),
            ));
        }
        if profile.quantize_step < 0.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::profile.quantize_step must be >= 0 (0 disables quantization)"
                    .to_string(),
            ));
        }
        let crest_y = profile.base_height + profile.hill_amplitude + profile.detail_amplitude;
        if crest_y >= world.reset_height_y {
            return Err(ConfigError::Validation(format!(
                "game.toml::world.reset_height_y must clear the highest terrain crest ({crest_y}); raise it or lower terrain.toml::profile.base_height"
            )));
        }

        let streamer = &self.terrain.streamer;
        if streamer.chunk_width <= 0.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::streamer.chunk_width must be > 0".to_string(),
            ));
        }
        if streamer.lookahead_margin <= 0.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::streamer.lookahead_margin must be > 0".to_string(),
            ));
        }
        if streamer.retention_limit == 0 {
            return Err(ConfigError::Validation(
                "terrain.toml::streamer.retention_limit must be >= 1".to_string(),
            ));
        }
        if streamer.sample_spacing <= 0.0 || streamer.sample_spacing > streamer.chunk_width / 2.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::streamer.sample_spacing must be > 0 and <= chunk_width / 2"
                    .to_string(),
            ));
        }
        if streamer.curtain_depth <= 0.0 {
            return Err(ConfigError::Validation(
                "terrain.toml::streamer.curtain_depth must be > 0".to_string(),
            ));
        }

        // Eviction may never pull terrain out from under the vehicle: the
        // retained span must cover the lookahead plus the chunk the vehicle
        // is on plus one behind it.
        let retained_span = streamer.retention_limit as f32 * streamer.chunk_width;
        let required_span = streamer.lookahead_margin + 2.0 * streamer.chunk_width;
        if retained_span < required_span {
            return Err(ConfigError::Validation(format!(
                "terrain.toml::streamer.retention_limit {} retains {retained_span} of terrain but {required_span} is required (lookahead_margin + 2 * chunk_width)",
                streamer.retention_limit
            )));
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            if !matches!(vehicle.kind.as_str(), "ball" | "car") {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].kind `{}` is unsupported (expected ball/car)",
                    vehicle.kind
                )));
            }
            if vehicle.jump_boost <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].jump_boost must be > 0"
                )));
            }
            if vehicle.linear_damping < 0.0 || vehicle.angular_damping < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}] damping values must be >= 0"
                )));
            }

            if vehicle.kind == "ball" {
                if vehicle.radius <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].radius must be > 0 for ball vehicles"
                    )));
                }
                if vehicle.density <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].density must be > 0 for ball vehicles"
                    )));
                }
                if vehicle.friction < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].friction must be >= 0"
                    )));
                }
                if !(0.0..=1.0).contains(&vehicle.restitution) {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].restitution must be in [0, 1]"
                    )));
                }
                if vehicle.roll_torque <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].roll_torque must be > 0 for ball vehicles"
                    )));
                }
                if vehicle.max_roll_speed <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].max_roll_speed must be > 0 for ball vehicles"
                    )));
                }
            }

            if vehicle.kind == "car" {
                if vehicle.chassis_half_width <= 0.0 || vehicle.chassis_half_height <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}] chassis half extents must be > 0 for car vehicles"
                    )));
                }
                if vehicle.chassis_density <= 0.0 || vehicle.wheel_density <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}] densities must be > 0 for car vehicles"
                    )));
                }
                if vehicle.wheel_radius <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].wheel_radius must be > 0 for car vehicles"
                    )));
                }
                if vehicle.wheel_friction < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].wheel_friction must be >= 0"
                    )));
                }
                if vehicle.axle_offset_x <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].axle_offset_x must be > 0 for car vehicles"
                    )));
                }
                if vehicle.suspension_rest_length <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].suspension_rest_length must be > 0 for car vehicles"
                    )));
                }
                if vehicle.suspension_stiffness <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].suspension_stiffness must be > 0 for car vehicles"
                    )));
                }
                if vehicle.suspension_damping < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].suspension_damping must be >= 0"
                    )));
                }
                if vehicle.wheel_motor_speed <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].wheel_motor_speed must be > 0 for car vehicles"
                    )));
                }
                if vehicle.wheel_max_speed <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].wheel_max_speed must be > 0 for car vehicles"
                    )));
                }
                if vehicle.jump_pitch_nudge < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].jump_pitch_nudge must be >= 0"
                    )));
                }
            }

            // The frontier must stay ahead of the fastest the vehicle can go;
            // a margin under one second of top-speed travel is a starvation
            // hazard, not a tuning choice.
            let top_speed = vehicle.top_linear_speed();
            if streamer.lookahead_margin < top_speed {
                return Err(ConfigError::Validation(format!(
                    "terrain.toml::streamer.lookahead_margin {} is under one second of top-speed travel ({top_speed}) for vehicles[{index}] `{}`",
                    streamer.lookahead_margin, vehicle.id
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub world: WorldConfig,
    pub camera: CameraConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub player_vehicle: String,
    pub debug_overlay: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub gravity_y: f32,
    pub fall_threshold_y: f32,
    pub reset_height_y: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub vertical_bias: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub master_volume: f32,
    pub engine_volume: f32,
    pub jump_volume: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerrainFile {
    pub profile: TerrainProfileConfig,
    pub streamer: StreamerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerrainProfileConfig {
    pub seed: u64,
    pub base_height: f32,
    pub hill_amplitude: f32,
    pub hill_wavelength: f32,
    pub detail_amplitude: f32,
    pub detail_wavelength: f32,
    #[serde(default)]
    pub quantize_step: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamerConfig {
    pub chunk_width: f32,
    pub lookahead_margin: f32,
    pub retention_limit: u32,
    pub sample_spacing: f32,
    pub curtain_depth: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub kind: String,
    pub color: [f32; 3],
    pub jump_boost: f32,
    #[serde(default)]
    pub linear_damping: f32,
    #[serde(default)]
    pub angular_damping: f32,
    // ball
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub density: f32,
    #[serde(default)]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
    #[serde(default)]
    pub roll_torque: f32,
    #[serde(default)]
    pub max_roll_speed: f32,
    // car
    #[serde(default)]
    pub chassis_half_width: f32,
    #[serde(default)]
    pub chassis_half_height: f32,
    #[serde(default)]
    pub chassis_density: f32,
    #[serde(default)]
    pub wheel_radius: f32,
    #[serde(default)]
    pub wheel_density: f32,
    #[serde(default)]
    pub wheel_friction: f32,
    #[serde(default)]
    pub axle_offset_x: f32,
    #[serde(default)]
    pub axle_offset_y: f32,
    #[serde(default)]
    pub suspension_rest_length: f32,
    #[serde(default)]
    pub suspension_stiffness: f32,
    #[serde(default)]
    pub suspension_damping: f32,
    #[serde(default)]
    pub wheel_motor_speed: f32,
    #[serde(default)]
    pub wheel_max_speed: f32,
    #[serde(default)]
    pub jump_pitch_nudge: f32,
}

impl VehicleConfig {
    /// Fastest horizontal speed the drive model can sustain on its own.
    pub fn top_linear_speed(&self) -> f32 {
        match self.kind.as_str() {
            "ball" => self.max_roll_speed * self.radius,
            "car" => self.wheel_max_speed,
            _ => 0.0,
        }
    }
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_vehicle(id: &str) -> VehicleConfig {
        VehicleConfig {
            id: id.to_string(),
            kind: "ball".to_string(),
            color: [0.9, 0.5, 0.2],
            jump_boost: 600.0,
            linear_damping: 0.05,
            angular_damping: 0.1,
            radius: 26.0,
            density: 4.0,
            friction: 1.9,
            restitution: 0.0,
            roll_torque: 90_000_000.0,
            max_roll_speed: 28.0,
            chassis_half_width: 0.0,
            chassis_half_height: 0.0,
            chassis_density: 0.0,
            wheel_radius: 0.0,
            wheel_density: 0.0,
            wheel_friction: 0.0,
            axle_offset_x: 0.0,
            axle_offset_y: 0.0,
            suspension_rest_length: 0.0,
            suspension_stiffness: 0.0,
            suspension_damping: 0.0,
            wheel_motor_speed: 0.0,
            wheel_max_speed: 0.0,
            jump_pitch_nudge: 0.0,
        }
    }

    fn valid_config() -> GameConfig {
        let vehicle = ball_vehicle("roller");
        GameConfig {
            game: GameFile {
                app: AppConfig {
                    player_vehicle: "roller".to_string(),
                    debug_overlay: true,
                },
                world: WorldConfig {
                    gravity_y: -1350.0,
                    fall_threshold_y: -900.0,
                    reset_height_y: 0.0,
                },
                camera: CameraConfig {
                    vertical_bias: 90.0,
                },
                audio: AudioConfig {
                    master_volume: 0.5,
                    engine_volume: 0.4,
                    jump_volume: 0.6,
                },
            },
            terrain: TerrainFile {
                profile: TerrainProfileConfig {
                    seed: 7,
                    base_height: -320.0,
                    hill_amplitude: 150.0,
                    hill_wavelength: 900.0,
                    detail_amplitude: 40.0,
                    detail_wavelength: 220.0,
                    quantize_step: 0.0,
                },
                streamer: StreamerConfig {
                    chunk_width: 1000.0,
                    lookahead_margin: 2000.0,
                    retention_limit: 5,
                    sample_spacing: 25.0,
                    curtain_depth: 600.0,
                },
            },
            vehicles: VehiclesFile {
                vehicles: vec![vehicle.clone()],
            },
            vehicles_by_id: HashMap::from([("roller".to_string(), vehicle)]),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config()
            .validate_references()
            .expect("shipped defaults should validate");
    }

    #[test]
    fn validation_fails_for_missing_vehicle_reference() {
        let mut config = valid_config();
        config.game.app.player_vehicle = "missing_vehicle".to_string();

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("player_vehicle"));
        assert!(message.contains("missing_vehicle"));
    }

    #[test]
    fn validation_rejects_retention_too_small_for_lookahead() {
        let mut config = valid_config();
        // 3 * 1000 retained < 2000 + 2 * 1000 required
        config.terrain.streamer.retention_limit = 3;

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("retention_limit"));
        assert!(message.contains("lookahead_margin + 2 * chunk_width"));
    }

    #[test]
    fn validation_rejects_lookahead_under_top_speed_travel() {
        let mut config = valid_config();
        // ball top speed = 28 rad/s * 26 px = 728 px/s
        config.terrain.streamer.lookahead_margin = 700.0;
        config.terrain.streamer.retention_limit = 3;

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("lookahead_margin"));
        assert!(message.contains("top-speed"));
    }

    #[test]
    fn validation_rejects_unknown_vehicle_kind() {
        let mut config = valid_config();
        config.vehicles.vehicles[0].kind = "hovercraft".to_string();

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("kind"));
        assert!(message.contains("hovercraft"));
    }

    #[test]
    fn validation_requires_car_fields_for_car_kind() {
        let mut config = valid_config();
        let mut car = ball_vehicle("buggy");
        car.kind = "car".to_string();
        config.vehicles.vehicles = vec![car.clone()];
        config.vehicles_by_id = HashMap::from([("buggy".to_string(), car)]);
        config.game.app.player_vehicle = "buggy".to_string();

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("vehicles[0]"));
        assert!(message.contains("car vehicles"));
    }

    #[test]
    fn validation_rejects_reset_height_under_terrain_crest() {
        let mut config = valid_config();
        config.terrain.profile.base_height = 100.0;

        let error = config
            .validate_references()
            .expect_err("validation should fail");
        let message = error.to_string();

        assert!(message.contains("reset_height_y"));
    }

    #[test]
    fn duplicate_vehicle_ids_are_rejected() {
        let rows = vec![ball_vehicle("roller"), ball_vehicle("roller")];

        let error =
            to_index("vehicles.toml::vehicles", &rows).expect_err("duplicate ids should fail");
        let message = error.to_string();

        assert!(message.contains("duplicate id"));
        assert!(message.contains("roller"));
    }
}
