use crate::config::GameConfig;
use crate::gameplay::vehicle::{
    ActiveVehicle, VehicleJumpedEvent, VehicleResetEvent, VehicleTelemetry,
};
use crate::states::GameState;
use bevy::audio::{
    AudioPlayer, AudioSink, AudioSinkPlayback, AudioSource, PlaybackSettings, Volume,
};
use bevy::prelude::*;
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::time::{SystemTime, UNIX_EPOCH};

const AUDIO_ID_ENGINE_LOOP: &str = "synth_engine_loop";
const AUDIO_ID_JUMP_BLIP: &str = "synth_jump_blip";
const AUDIO_ID_RESET_THUD: &str = "synth_reset_thud";

const SYNTH_SAMPLE_RATE_HZ: u32 = 44_100;
const ENGINE_LOOP_BASE_HZ: f32 = 110.0;
const ENGINE_LOOP_SECONDS: f32 = 1.0;
const ENGINE_LOOP_AMPLITUDE: f32 = 0.55;
const JUMP_BLIP_HZ: f32 = 660.0;
const JUMP_BLIP_SECONDS: f32 = 0.09;
const JUMP_BLIP_AMPLITUDE: f32 = 0.5;
const RESET_THUD_HZ: f32 = 70.0;
const RESET_THUD_SECONDS: f32 = 0.22;
const RESET_THUD_AMPLITUDE: f32 = 0.6;
const RESET_THUD_GAIN: f32 = 0.55;

const ENGINE_BASE_SPEED: f32 = 0.8;
const ENGINE_SPEED_SWING: f32 = 0.9;
const ENGINE_IDLE_GAIN: f32 = 0.35;
const ENGINE_LOAD_GAIN: f32 = 0.65;
const ENGINE_LOAD_SMOOTH_RATE_HZ: f32 = 6.0;
const ENGINE_PITCH_JITTER: f32 = 0.035;
const ENGINE_JITTER_REFRESH_MIN_S: f32 = 0.14;
const ENGINE_JITTER_REFRESH_MAX_S: f32 = 0.36;
const ONE_SHOT_PITCH_MIN: f32 = 0.92;
const ONE_SHOT_PITCH_MAX: f32 = 1.08;

pub struct GameplaySfxPlugin;

impl Plugin for GameplaySfxPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SfxRngState>()
            .init_resource::<SynthAudioCache>()
            .add_systems(OnEnter(GameState::InRun), reset_sfx_rng_state)
            .add_systems(OnExit(GameState::InRun), cleanup_sfx_entities)
            .add_systems(
                Update,
                (
                    ensure_engine_loop_audio,
                    update_engine_loop_audio,
                    play_gameplay_sfx,
                )
                    .chain()
                    .run_if(in_state(GameState::InRun))
                    .run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct EngineLoopAudio;

#[derive(Component, Debug, Clone, Copy, Default)]
struct EngineLoopRuntime {
    smoothed_load: f32,
    pitch_jitter_current: f32,
    pitch_jitter_target: f32,
    pitch_jitter_refresh_s: f32,
}

#[derive(Component)]
struct GameplaySfxTransient;

#[derive(Resource, Debug, Clone, Copy)]
struct SfxRngState {
    seed: u64,
}

impl Default for SfxRngState {
    fn default() -> Self {
        Self {
            seed: 0x51AB_70D6_94C2_E80F,
        }
    }
}

#[derive(Resource, Debug, Default)]
struct SynthAudioCache {
    handles_by_id: HashMap<String, Handle<AudioSource>>,
}

fn reset_sfx_rng_state(mut rng: ResMut<SfxRngState>) {
    rng.seed ^= unix_timestamp_seconds();
}

fn cleanup_sfx_entities(
    mut commands: Commands,
    sfx_query: Query<Entity, Or<(With<EngineLoopAudio>, With<GameplaySfxTransient>)>>,
) {
    for entity in &sfx_query {
        commands.entity(entity).try_despawn();
    }
}

fn ensure_engine_loop_audio(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut audio_sources: ResMut<Assets<AudioSource>>,
    mut synth_cache: ResMut<SynthAudioCache>,
    existing_query: Query<Entity, With<EngineLoopAudio>>,
) {
    if !existing_query.is_empty() {
        return;
    }

    let Some(handle) =
        resolve_synth_audio_handle(AUDIO_ID_ENGINE_LOOP, &mut audio_sources, &mut synth_cache)
    else {
        return;
    };

    let audio = &config.game.audio;
    let initial_volume = (audio.master_volume * audio.engine_volume * ENGINE_IDLE_GAIN).max(0.0);
    commands.spawn((
        Name::new("SfxEngineLoop"),
        EngineLoopAudio,
        EngineLoopRuntime::default(),
        AudioPlayer::new(handle),
        PlaybackSettings::LOOP
            .with_volume(Volume::Linear(initial_volume))
            .with_speed(ENGINE_BASE_SPEED),
    ));
}

fn update_engine_loop_audio(
    time: Res<Time>,
    config: Res<GameConfig>,
    active: Option<Res<ActiveVehicle>>,
    telemetry: Res<VehicleTelemetry>,
    mut rng: ResMut<SfxRngState>,
    mut engine_query: Query<(&mut AudioSink, &mut EngineLoopRuntime), With<EngineLoopAudio>>,
) {
    let dt = time.delta_secs().max(0.000_1);
    let top_speed = active
        .and_then(|active| config.vehicles_by_id.get(&active.id))
        .map(|vehicle| vehicle.top_linear_speed().max(1.0))
        .unwrap_or(500.0);
    let speed_norm = (telemetry.speed.abs() / top_speed).clamp(0.0, 1.0);

    let audio = &config.game.audio;
    for (mut sink, mut runtime) in &mut engine_query {
        runtime.smoothed_load = runtime
            .smoothed_load
            .lerp(speed_norm, (dt * ENGINE_LOAD_SMOOTH_RATE_HZ).clamp(0.0, 1.0));

        runtime.pitch_jitter_refresh_s -= dt;
        if runtime.pitch_jitter_refresh_s <= 0.0 {
            runtime.pitch_jitter_refresh_s = lerp(
                ENGINE_JITTER_REFRESH_MIN_S,
                ENGINE_JITTER_REFRESH_MAX_S,
                next_unit_random(&mut rng.seed),
            );
            runtime.pitch_jitter_target =
                next_signed_unit_random(&mut rng.seed) * ENGINE_PITCH_JITTER;
        }
        runtime.pitch_jitter_current = runtime
            .pitch_jitter_current
            .lerp(runtime.pitch_jitter_target, (dt * 5.0).clamp(0.0, 1.0));

        let playback_speed = (ENGINE_BASE_SPEED + (runtime.smoothed_load * ENGINE_SPEED_SWING))
            * (1.0 + runtime.pitch_jitter_current);
        let engine_gain = ENGINE_IDLE_GAIN + (runtime.smoothed_load * ENGINE_LOAD_GAIN);
        let volume = audio.master_volume * audio.engine_volume * engine_gain;

        sink.set_speed(playback_speed.max(0.05));
        sink.set_volume(Volume::Linear(volume.max(0.0)));
    }
}

fn play_gameplay_sfx(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut audio_sources: ResMut<Assets<AudioSource>>,
    mut synth_cache: ResMut<SynthAudioCache>,
    mut rng: ResMut<SfxRngState>,
    mut jump_events: MessageReader<VehicleJumpedEvent>,
    mut reset_events: MessageReader<VehicleResetEvent>,
) {
    let audio = &config.game.audio;

    for _ in jump_events.read() {
        play_one_shot(
            &mut commands,
            &mut audio_sources,
            &mut synth_cache,
            AUDIO_ID_JUMP_BLIP,
            audio.master_volume * audio.jump_volume,
            &mut rng.seed,
        );
    }

    for _ in reset_events.read() {
        play_one_shot(
            &mut commands,
            &mut audio_sources,
            &mut synth_cache,
            AUDIO_ID_RESET_THUD,
            audio.master_volume * RESET_THUD_GAIN,
            &mut rng.seed,
        );
    }
}

fn play_one_shot(
    commands: &mut Commands,
    audio_sources: &mut Assets<AudioSource>,
    synth_cache: &mut SynthAudioCache,
    audio_id: &str,
    volume: f32,
    seed: &mut u64,
) {
    if volume <= f32::EPSILON {
        return;
    }
    let Some(handle) = resolve_synth_audio_handle(audio_id, audio_sources, synth_cache) else {
        return;
    };

    let pitch = lerp(ONE_SHOT_PITCH_MIN, ONE_SHOT_PITCH_MAX, next_unit_random(seed)).max(0.01);
    commands.spawn((
        Name::new("GameplaySfxOneShot"),
        GameplaySfxTransient,
        AudioPlayer::<AudioSource>::new(handle),
        PlaybackSettings::DESPAWN
            .with_volume(Volume::Linear(volume))
            .with_speed(pitch),
    ));
}

fn resolve_synth_audio_handle(
    audio_id: &str,
    audio_sources: &mut Assets<AudioSource>,
    synth_cache: &mut SynthAudioCache,
) -> Option<Handle<AudioSource>> {
    if let Some(handle) = synth_cache.handles_by_id.get(audio_id) {
        return Some(handle.clone());
    }

    let bytes = match audio_id {
        AUDIO_ID_ENGINE_LOOP => build_engine_loop_wav_bytes(),
        AUDIO_ID_JUMP_BLIP => {
            build_fading_blip_wav_bytes(JUMP_BLIP_HZ, JUMP_BLIP_SECONDS, JUMP_BLIP_AMPLITUDE)
        }
        AUDIO_ID_RESET_THUD => {
            build_fading_blip_wav_bytes(RESET_THUD_HZ, RESET_THUD_SECONDS, RESET_THUD_AMPLITUDE)
        }
        _ => return None,
    };

    let handle = audio_sources.add(AudioSource {
        bytes: bytes.into(),
    });
    synth_cache
        .handles_by_id
        .insert(audio_id.to_string(), handle.clone());
    Some(handle)
}

/// One second of layered engine drone. The buffer holds a whole number of
/// periods of every partial, so looping it is click free.
fn build_engine_loop_wav_bytes() -> Vec<u8> {
    let period_count = (ENGINE_LOOP_BASE_HZ * ENGINE_LOOP_SECONDS).round().max(1.0);
    let sample_count =
        ((period_count * SYNTH_SAMPLE_RATE_HZ as f32) / ENGINE_LOOP_BASE_HZ).round() as usize;

    let mut samples = Vec::with_capacity(sample_count);
    for index in 0..sample_count {
        let phase = (index as f32 / SYNTH_SAMPLE_RATE_HZ as f32) * ENGINE_LOOP_BASE_HZ * TAU;
        let mix = phase.sin() + (0.33 * (2.0 * phase).sin()) + (0.18 * (3.0 * phase).sin());
        let value = (mix / 1.51) * ENGINE_LOOP_AMPLITUDE;
        samples.push((value * i16::MAX as f32) as i16);
    }
    encode_wav_pcm16(SYNTH_SAMPLE_RATE_HZ, &samples)
}

fn build_fading_blip_wav_bytes(frequency_hz: f32, seconds: f32, amplitude: f32) -> Vec<u8> {
    let sample_count = (SYNTH_SAMPLE_RATE_HZ as f32 * seconds).round().max(1.0) as usize;

    let mut samples = Vec::with_capacity(sample_count);
    for index in 0..sample_count {
        let phase = (index as f32 / SYNTH_SAMPLE_RATE_HZ as f32) * frequency_hz * TAU;
        let envelope = 1.0 - (index as f32 / sample_count as f32);
        let value = phase.sin() * amplitude * envelope;
        samples.push((value * i16::MAX as f32) as i16);
    }
    encode_wav_pcm16(SYNTH_SAMPLE_RATE_HZ, &samples)
}

fn encode_wav_pcm16(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2_u16.to_le_bytes());
    bytes.extend_from_slice(&16_u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

fn next_unit_random(seed: &mut u64) -> f32 {
    *seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((*seed >> 32) as u32) as f32 / u32::MAX as f32
}

fn next_signed_unit_random(seed: &mut u64) -> f32 {
    (next_unit_random(seed) * 2.0) - 1.0
}

fn unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + ((b - a) * t.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_sample(bytes: &[u8], index: usize) -> i16 {
        let offset = 44 + (index * 2);
        i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn wav_header_describes_mono_pcm16() {
        let bytes = encode_wav_pcm16(44_100, &[0, 100, -100, 0]);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 1);
        assert_eq!(
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            44_100
        );
        assert_eq!(
            u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
            88_200
        );
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(
            u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]),
            8
        );
        assert_eq!(bytes.len(), 44 + 8);
    }

    #[test]
    fn engine_loop_wraps_around_without_a_click() {
        let bytes = build_engine_loop_wav_bytes();
        let sample_count = (bytes.len() - 44) / 2;

        let first = decode_sample(&bytes, 0);
        let last = decode_sample(&bytes, sample_count - 1);
        assert_eq!(first, 0);
        // The seam jumps by at most one sample step of the waveform.
        assert!(last.unsigned_abs() < 1200, "seam step of {last}");
    }

    #[test]
    fn blip_fades_to_silence() {
        let bytes = build_fading_blip_wav_bytes(660.0, 0.09, 0.5);
        let sample_count = (bytes.len() - 44) / 2;

        let tail = (sample_count - 8..sample_count)
            .map(|index| i32::from(decode_sample(&bytes, index)).abs())
            .max()
            .unwrap_or(0);
        assert!(tail < 600, "tail amplitude {tail}");
    }
}
