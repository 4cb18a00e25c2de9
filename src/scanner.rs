// The handheld scanner: while carried, Space fires a ray that knocks the
// pursuer back one zone.
use bevy::math::bounding::{BoundingSphere, RayCast3d};
use bevy::prelude::*;

use crate::chase::{ChaseCoordinator, Pursuer, PursuerBody};
use crate::contact::{Collider, Tag};
use crate::outcome::level_in_play;
use crate::pickup::Held;
use crate::player::Player;
use crate::scenes::GameScene;

pub struct ScannerPlugin;

impl Plugin for ScannerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ScannerConfig>().add_systems(
            Update,
            fire_scanner.run_if(in_state(GameScene::Main).and(level_in_play)),
        );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ScannerConfig {
    pub range: f32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { range: 50.0 }
    }
}

/// Distance along the ray to the sphere, if it is hit within `range`.
pub fn scan_hit(origin: Vec3, direction: Dir3, range: f32, center: Vec3, radius: f32) -> Option<f32> {
    RayCast3d::new(origin, direction, range).sphere_intersection_at(&BoundingSphere::new(center, radius))
}

fn fire_scanner(
    keyboard: Res<ButtonInput<KeyCode>>,
    config: Res<ScannerConfig>,
    chase: Option<ResMut<ChaseCoordinator>>,
    held: Query<&Tag, With<Held>>,
    player: Query<&Transform, With<Player>>,
    mut pursuer: Query<
        (&mut Transform, &mut Pursuer, &mut Visibility, &Collider),
        Without<Player>,
    >,
) {
    if !keyboard.just_pressed(KeyCode::Space) {
        return;
    }
    if !held.iter().any(|tag| *tag == Tag::Scanner) {
        return;
    }
    let (Some(mut chase), Ok(eye)) = (chase, player.single()) else {
        return;
    };
    let Ok((mut transform, mut state, mut visibility, collider)) = pursuer.single_mut() else {
        return;
    };
    if *visibility == Visibility::Hidden {
        return;
    }

    let hit = scan_hit(
        eye.translation,
        eye.forward(),
        config.range,
        transform.translation,
        collider.radius,
    );
    if hit.is_none() {
        debug!("scan missed");
        return;
    }

    let mut body = PursuerBody {
        transform: &mut transform,
        pursuer: &mut state,
        visibility: &mut visibility,
    };
    if let Some(zone) = chase.knock_back(&mut body) {
        info!("scanner hit, pursuer pushed back to zone {zone}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_a_sphere_ahead() {
        let hit = scan_hit(Vec3::ZERO, Dir3::NEG_Z, 50.0, Vec3::new(0.0, 0.0, -10.0), 1.0);
        assert!(hit.is_some_and(|d| (d - 9.0).abs() < 1e-4));
    }

    #[test]
    fn ray_misses_behind_beside_and_beyond_range() {
        assert!(scan_hit(Vec3::ZERO, Dir3::NEG_Z, 50.0, Vec3::new(0.0, 0.0, 10.0), 1.0).is_none());
        assert!(scan_hit(Vec3::ZERO, Dir3::NEG_Z, 50.0, Vec3::new(5.0, 0.0, -10.0), 1.0).is_none());
        assert!(scan_hit(Vec3::ZERO, Dir3::NEG_Z, 50.0, Vec3::new(0.0, 0.0, -80.0), 1.0).is_none());
    }
}
