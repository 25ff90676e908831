use crate::config::{GameConfig, TerrainProfileConfig};
use crate::gameplay::vehicle::PlayerVehicle;
use crate::states::GameState;
use bevy::prelude::*;
use bevy_rapier2d::prelude::*;
use std::collections::VecDeque;

mod field;
mod mesh;

pub(crate) use field::{resolve_terrain_seed, HeightField};
use mesh::{
    build_chunk_surface, build_surface_curtain_mesh, build_surface_strip_mesh, collider_points,
};

const GROUND_STRIP_THICKNESS: f32 = 26.0;
const GROUND_STRIP_Z: f32 = 2.0;
const GROUND_CURTAIN_Z: f32 = 1.0;
const GROUND_CURTAIN_UV_SCALE: f32 = 0.004;
const GROUND_FRICTION: f32 = 1.35;
const GROUND_RESTITUTION: f32 = 0.0;

pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TerrainChunks>()
            .add_systems(
                OnEnter(GameState::InRun),
                spawn_initial_terrain.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnExit(GameState::InRun), cleanup_terrain);
    }
}

/// Seed pinned for the whole session. Restarting a run rebuilds the same
/// hills because this resource outlives the `InRun` state.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainSeed(pub u64);

#[derive(Component)]
struct TerrainChunkPiece;

#[derive(Debug, Clone)]
struct ChunkRecord {
    index: u64,
    start_x: f32,
    end_x: f32,
    entities: [Entity; 3],
}

/// Built terrain bookkeeping. Chunks enter at the back as the frontier
/// advances and leave strictly from the front, oldest first.
#[derive(Resource, Debug, Default)]
pub struct TerrainChunks {
    queue: VecDeque<ChunkRecord>,
    frontier_x: f32,
    next_chunk_index: u64,
    total_spawned: u64,
    total_evicted: u64,
    starved: bool,
}

impl TerrainChunks {
    pub fn chunk_count(&self) -> usize {
        self.queue.len()
    }

    pub fn frontier_x(&self) -> f32 {
        self.frontier_x
    }

    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }

    pub fn is_starved(&self) -> bool {
        self.starved
    }

    fn record_chunk(&mut self, start_x: f32, end_x: f32, entities: [Entity; 3]) -> u64 {
        let index = self.next_chunk_index;
        self.queue.push_back(ChunkRecord {
            index,
            start_x,
            end_x,
            entities,
        });
        self.frontier_x = end_x;
        self.next_chunk_index += 1;
        self.total_spawned += 1;
        index
    }

    fn take_overflow(&mut self, retention_limit: usize) -> Vec<ChunkRecord> {
        let mut evicted = Vec::new();
        while self.queue.len() > retention_limit {
            if let Some(record) = self.queue.pop_front() {
                self.total_evicted += 1;
                evicted.push(record);
            }
        }
        evicted
    }

    fn reset_for_new_run(&mut self) {
        self.queue.clear();
        self.frontier_x = 0.0;
        self.next_chunk_index = 0;
        self.total_spawned = 0;
        self.total_evicted = 0;
        self.starved = false;
    }
}

/// The streamer tops up as soon as the remaining runway in front of the
/// vehicle drops strictly below the lookahead margin.
fn needs_more_terrain(vehicle_x: f32, frontier_x: f32, lookahead_margin: f32) -> bool {
    vehicle_x > frontier_x - lookahead_margin
}

fn initial_chunk_count(lookahead_margin: f32, chunk_width: f32) -> usize {
    ((lookahead_margin / chunk_width.max(0.001)).floor() as usize) + 1
}

fn curtain_bottom_y(profile: &TerrainProfileConfig, curtain_depth: f32) -> f32 {
    profile.base_height - profile.hill_amplitude - profile.detail_amplitude - curtain_depth
}

fn spawn_initial_terrain(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    config: Res<GameConfig>,
    seed: Option<Res<TerrainSeed>>,
    mut chunks: ResMut<TerrainChunks>,
) {
    let seed_value = match seed {
        Some(seed) => seed.0,
        None => {
            let resolved = resolve_terrain_seed(config.terrain.profile.seed);
            info!("Terrain seed resolved to `{resolved}`.");
            commands.insert_resource(TerrainSeed(resolved));
            resolved
        }
    };

    let field = HeightField::from_profile(&config.terrain.profile, seed_value);
    let streamer = &config.terrain.streamer;
    let seed_chunk_count = initial_chunk_count(streamer.lookahead_margin, streamer.chunk_width);
    for _ in 0..seed_chunk_count {
        if !spawn_next_chunk(
            &mut commands,
            &mut meshes,
            &mut materials,
            &config,
            &field,
            &mut chunks,
        ) {
            break;
        }
    }

    info!(
        "Seeded {} terrain chunks up to x = {:.0}.",
        chunks.chunk_count(),
        chunks.frontier_x()
    );
}

fn spawn_next_chunk(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<ColorMaterial>,
    config: &GameConfig,
    field: &HeightField,
    chunks: &mut TerrainChunks,
) -> bool {
    let streamer = &config.terrain.streamer;
    let start_x = chunks.frontier_x;
    let end_x = start_x + streamer.chunk_width;
    let surface = build_chunk_surface(
        field,
        start_x,
        end_x,
        streamer.sample_spacing,
        GROUND_STRIP_THICKNESS,
    );
    if surface.points.len() < 2 {
        warn!(
            "Skipping degenerate terrain chunk at x = {:.0}: {} surface samples.",
            start_x,
            surface.points.len()
        );
        return false;
    }

    let collider_entity = commands
        .spawn((
            Name::new("TerrainChunkCollider"),
            TerrainChunkPiece,
            RigidBody::Fixed,
            Collider::polyline(collider_points(&surface), None),
            Friction::coefficient(GROUND_FRICTION),
            Restitution::coefficient(GROUND_RESTITUTION),
            Transform::default(),
            GlobalTransform::default(),
        ))
        .id();

    let strip_entity = commands
        .spawn((
            Name::new("TerrainChunkStrip"),
            TerrainChunkPiece,
            Mesh2d(meshes.add(build_surface_strip_mesh(&surface))),
            MeshMaterial2d(materials.add(ColorMaterial::from(Color::srgb(0.30, 0.42, 0.28)))),
            Transform::default(),
            GlobalTransform::default(),
            Visibility::Inherited,
            InheritedVisibility::VISIBLE,
            ViewVisibility::default(),
        ))
        .id();

    let curtain_bottom = curtain_bottom_y(&config.terrain.profile, streamer.curtain_depth);
    let curtain_entity = commands
        .spawn((
            Name::new("TerrainChunkCurtain"),
            TerrainChunkPiece,
            Mesh2d(meshes.add(build_surface_curtain_mesh(&surface, curtain_bottom))),
            MeshMaterial2d(materials.add(ColorMaterial::from(Color::srgb(0.16, 0.20, 0.17)))),
            Transform::default(),
            GlobalTransform::default(),
            Visibility::Inherited,
            InheritedVisibility::VISIBLE,
            ViewVisibility::default(),
        ))
        .id();

    let index = chunks.record_chunk(start_x, end_x, [collider_entity, strip_entity, curtain_entity]);
    debug!(
        "Spawned terrain chunk {} covering x = {:.0}..{:.0}.",
        index, start_x, end_x
    );
    true
}

/// Builds at most one chunk per frame. Vehicles with a sane top speed cover
/// well under a chunk width per frame, so trickling keeps frame times flat
/// without ever letting the runway shrink below the margin.
pub(crate) fn advance_terrain_frontier(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    config: Res<GameConfig>,
    seed: Option<Res<TerrainSeed>>,
    mut chunks: ResMut<TerrainChunks>,
    player_query: Query<&Transform, With<PlayerVehicle>>,
) {
    let Some(seed) = seed else {
        return;
    };
    let Ok(player_transform) = player_query.single() else {
        return;
    };

    let vehicle_x = player_transform.translation.x;
    if vehicle_x > chunks.frontier_x {
        if !chunks.starved {
            warn!(
                "Vehicle at x = {:.0} is ahead of built terrain ending at x = {:.0}.",
                vehicle_x, chunks.frontier_x
            );
            chunks.starved = true;
        }
    } else {
        chunks.starved = false;
    }

    let streamer = &config.terrain.streamer;
    if !needs_more_terrain(vehicle_x, chunks.frontier_x, streamer.lookahead_margin) {
        return;
    }

    let field = HeightField::from_profile(&config.terrain.profile, seed.0);
    spawn_next_chunk(
        &mut commands,
        &mut meshes,
        &mut materials,
        &config,
        &field,
        &mut chunks,
    );
}

pub(crate) fn evict_stale_chunks(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut chunks: ResMut<TerrainChunks>,
) {
    let retention_limit = config.terrain.streamer.retention_limit as usize;
    for record in chunks.take_overflow(retention_limit) {
        for entity in record.entities {
            commands.entity(entity).try_despawn();
        }
        debug!(
            "Evicted terrain chunk {} covering x = {:.0}..{:.0}.",
            record.index, record.start_x, record.end_x
        );
    }
}

fn cleanup_terrain(
    mut commands: Commands,
    mut chunks: ResMut<TerrainChunks>,
    piece_query: Query<Entity, With<TerrainChunkPiece>>,
) {
    for entity in &piece_query {
        commands.entity(entity).try_despawn();
    }
    chunks.reset_for_new_run();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_one_chunk(chunks: &mut TerrainChunks, chunk_width: f32) {
        let start_x = chunks.frontier_x;
        chunks.record_chunk(start_x, start_x + chunk_width, [Entity::PLACEHOLDER; 3]);
    }

    #[test]
    fn seeding_builds_the_full_lookahead_before_the_run() {
        let mut chunks = TerrainChunks::default();
        for _ in 0..initial_chunk_count(2000.0, 1000.0) {
            record_one_chunk(&mut chunks, 1000.0);
        }

        assert_eq!(chunks.chunk_count(), 3);
        assert_eq!(chunks.frontier_x(), 3000.0);
    }

    #[test]
    fn frontier_tops_up_only_past_the_margin() {
        let mut chunks = TerrainChunks::default();
        for _ in 0..3 {
            record_one_chunk(&mut chunks, 1000.0);
        }

        // Sitting exactly on the margin leaves the runway intact.
        assert!(!needs_more_terrain(1000.0, chunks.frontier_x(), 2000.0));
        assert!(needs_more_terrain(1001.0, chunks.frontier_x(), 2000.0));

        record_one_chunk(&mut chunks, 1000.0);
        assert_eq!(chunks.frontier_x(), 4000.0);
        assert!(!needs_more_terrain(1001.0, chunks.frontier_x(), 2000.0));
    }

    #[test]
    fn eviction_pops_the_oldest_chunks_first() {
        let mut chunks = TerrainChunks::default();
        for _ in 0..7 {
            record_one_chunk(&mut chunks, 1000.0);
        }

        let evicted = chunks.take_overflow(5);
        let evicted_indices: Vec<u64> = evicted.iter().map(|record| record.index).collect();
        assert_eq!(evicted_indices, vec![0, 1]);
        assert_eq!(chunks.chunk_count(), 5);
        assert_eq!(chunks.queue.front().map(|record| record.index), Some(2));
        assert_eq!(chunks.total_evicted(), 2);
    }

    #[test]
    fn retention_stays_bounded_across_a_long_run() {
        let mut chunks = TerrainChunks::default();
        for _ in 0..60 {
            record_one_chunk(&mut chunks, 1000.0);
            chunks.take_overflow(5);
            assert!(chunks.chunk_count() <= 5);
        }

        assert_eq!(chunks.total_spawned(), 60);
        assert_eq!(chunks.total_evicted(), 55);
        assert_eq!(chunks.queue.front().map(|record| record.index), Some(55));
        assert_eq!(chunks.frontier_x(), 60_000.0);
    }

    #[test]
    fn chunk_spans_stay_contiguous_through_advance_and_evict() {
        let mut chunks = TerrainChunks::default();
        for step in 0..23 {
            record_one_chunk(&mut chunks, 1000.0);
            if step % 3 == 0 {
                chunks.take_overflow(5);
            }
        }
        chunks.take_overflow(5);

        let records: Vec<&ChunkRecord> = chunks.queue.iter().collect();
        for pair in records.windows(2) {
            assert!(pair[1].start_x > pair[0].start_x);
            assert_eq!(pair[0].end_x.to_bits(), pair[1].start_x.to_bits());
        }
    }

    #[test]
    fn reset_clears_bookkeeping_but_not_the_seed_contract() {
        let mut chunks = TerrainChunks::default();
        for _ in 0..4 {
            record_one_chunk(&mut chunks, 1000.0);
        }

        chunks.reset_for_new_run();
        assert_eq!(chunks.chunk_count(), 0);
        assert_eq!(chunks.frontier_x(), 0.0);
        assert_eq!(chunks.total_spawned(), 0);

        record_one_chunk(&mut chunks, 1000.0);
        assert_eq!(chunks.queue.front().map(|record| record.index), Some(0));
    }
}
