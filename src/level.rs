// The playable level: builds the arena and a fresh set of coordinators every
// time MainScene is entered, and orders the fixed-step gameplay systems.
use bevy::prelude::*;
use fast_poisson::Poisson2D;

use crate::chase::{self, ChaseConfig, ChaseCoordinator, Pursuer};
use crate::contact::{Collider, Tag};
use crate::outcome::{GameStateCoordinator, level_in_play};
use crate::pickup::{Collectible, PackingZone, PickupConfig, PickupCounter};
use crate::scenes::GameScene;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            FixedUpdate,
            (
                LevelStep::Move,
                LevelStep::Carry,
                LevelStep::Pursue,
                LevelStep::Contacts,
                LevelStep::React,
            )
                .chain()
                .run_if(in_state(GameScene::Main).and(level_in_play)),
        )
        .add_systems(
            OnEnter(GameScene::Main),
            (spawn_level, chase::start_zone_sequence).chain(),
        )
        .add_systems(OnExit(GameScene::Main), exit_level)
        .add_systems(FixedUpdate, chase::pursue_player.in_set(LevelStep::Pursue))
        .add_systems(FixedUpdate, chase::catch_on_contact.in_set(LevelStep::React));
    }
}

/// Fixed-step order: the player moves, carried items follow, the pursuer
/// moves and checks its reach, then overlaps are found and reacted to.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelStep {
    Move,
    Carry,
    Pursue,
    Contacts,
    React,
}

/// Spawn points, visited in order. The last one is where the chase begins.
const ZONES: [Vec3; 5] = [
    Vec3::new(-30.0, 0.0, -45.0),
    Vec3::new(25.0, 0.0, -38.0),
    Vec3::new(-18.0, 0.0, -26.0),
    Vec3::new(14.0, 0.0, -16.0),
    Vec3::new(0.0, 0.0, -8.0),
];

const ARENA_SIZE: f32 = 120.0;
const COLLECTIBLE_COUNT: usize = 6;
const COLLECTIBLE_RADIUS: f32 = 0.35;
/// Square around the player start that collectibles are scattered over.
const SCATTER_SIZE: f32 = 30.0;
const SCATTER_SPACING: f32 = 5.0;
const SCATTER_SEED: u64 = 7;
const PACKING_ZONE: Vec3 = Vec3::new(0.0, 0.5, 16.0);
const PACKING_RADIUS: f32 = 1.5;
const SCANNER_SPOT: Vec3 = Vec3::new(2.0, 0.6, 5.0);
const PURSUER_RADIUS: f32 = 0.75;

/// Blue-noise spots for collectibles, centred on the player start.
pub fn collectible_spots(count: usize, seed: u64) -> Vec<Vec3> {
    let half = SCATTER_SIZE * 0.5;
    Poisson2D::new()
        .with_dimensions([SCATTER_SIZE, SCATTER_SIZE], SCATTER_SPACING)
        .with_seed(seed)
        .generate()
        .into_iter()
        .take(count)
        .map(|[x, z]| Vec3::new(x - half, COLLECTIBLE_RADIUS, z - half + 4.0))
        .collect()
}

fn spawn_level(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    chase_config: Res<ChaseConfig>,
    pickup_config: Res<PickupConfig>,
) {
    commands.insert_resource(GlobalAmbientLight {
        color: Color::srgb(0.3, 0.3, 0.45),
        brightness: 30.0,
        affects_lightmapped_meshes: false,
    });
    commands.spawn((
        DirectionalLight {
            illuminance: 800.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
        DespawnOnExit(GameScene::Main),
    ));

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(ARENA_SIZE, ARENA_SIZE))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.12, 0.14, 0.1),
            perceptual_roughness: 0.95,
            ..default()
        })),
        DespawnOnExit(GameScene::Main),
    ));

    // Hidden until the first zone spawn places it.
    commands.spawn((
        Pursuer::default(),
        Tag::Enemy,
        Collider {
            radius: PURSUER_RADIUS,
        },
        Mesh3d(meshes.add(Capsule3d::new(PURSUER_RADIUS * 0.6, 1.4))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.05, 0.02, 0.02),
            emissive: LinearRgba::rgb(0.4, 0.0, 0.0),
            ..default()
        })),
        Transform::default(),
        Visibility::Hidden,
        DespawnOnExit(GameScene::Main),
    ));

    let item_mesh = meshes.add(Cuboid::from_length(COLLECTIBLE_RADIUS * 2.0));
    let item_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.75, 0.6, 0.35),
        ..default()
    });
    for spot in collectible_spots(COLLECTIBLE_COUNT, SCATTER_SEED) {
        commands.spawn((
            Collectible,
            Tag::Collectible,
            Collider {
                radius: COLLECTIBLE_RADIUS,
            },
            Mesh3d(item_mesh.clone()),
            MeshMaterial3d(item_material.clone()),
            Transform::from_translation(spot),
            DespawnOnExit(GameScene::Main),
        ));
    }

    commands.spawn((
        PackingZone,
        Tag::PackingZone,
        Collider {
            radius: PACKING_RADIUS,
        },
        Mesh3d(meshes.add(Cylinder::new(PACKING_RADIUS, 0.2))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgba(0.2, 0.5, 0.9, 0.5),
            alpha_mode: AlphaMode::Blend,
            ..default()
        })),
        Transform::from_translation(PACKING_ZONE),
        DespawnOnExit(GameScene::Main),
    ));

    commands.spawn((
        Tag::Scanner,
        Mesh3d(meshes.add(Cuboid::new(0.15, 0.2, 0.5))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.2, 0.22),
            emissive: LinearRgba::rgb(0.0, 0.6, 0.3),
            ..default()
        })),
        Transform::from_translation(SCANNER_SPOT),
        DespawnOnExit(GameScene::Main),
    ));

    commands.insert_resource(ChaseCoordinator::new(ZONES, &chase_config));
    commands.insert_resource(PickupCounter::new(pickup_config.threshold));
    commands.insert_resource(GameStateCoordinator::default());
    info!("level ready: {} zones, {} collectibles", ZONES.len(), COLLECTIBLE_COUNT);
}

fn exit_level(mut commands: Commands) {
    commands.insert_resource(GlobalAmbientLight::NONE);
}
