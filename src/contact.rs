// Sphere overlap tests standing in for trigger/collision callbacks.
use bevy::prelude::*;
use std::collections::HashSet;

use crate::level::LevelStep;
use crate::scenes::GameScene;

pub struct ContactPlugin;

impl Plugin for ContactPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<Contact>()
            .init_resource::<ActiveContacts>()
            .add_systems(FixedUpdate, detect_contacts.in_set(LevelStep::Contacts))
            .add_systems(OnExit(GameScene::Main), clear_contacts);
    }
}

/// What an entity is, for contact filtering.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Player,
    Enemy,
    Collectible,
    PackingZone,
    Scanner,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct Collider {
    pub radius: f32,
}

/// Written once when two colliders start overlapping.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: Entity,
    pub b: Entity,
}

/// Pairs overlapping as of the last check, ordered (lower, higher).
#[derive(Resource, Default)]
pub struct ActiveContacts(HashSet<(Entity, Entity)>);

fn ordered(a: Entity, b: Entity) -> (Entity, Entity) {
    if a < b { (a, b) } else { (b, a) }
}

pub fn detect_contacts(
    colliders: Query<(Entity, &Transform, &Collider, Option<&Visibility>)>,
    mut active: ResMut<ActiveContacts>,
    mut contacts: MessageWriter<Contact>,
) {
    let bodies: Vec<(Entity, Vec3, f32)> = colliders
        .iter()
        .filter(|(_, _, _, visibility)| !matches!(visibility, Some(Visibility::Hidden)))
        .map(|(entity, transform, collider, _)| (entity, transform.translation, collider.radius))
        .collect();

    let mut overlapping = HashSet::new();
    for (i, &(a, pos_a, radius_a)) in bodies.iter().enumerate() {
        for &(b, pos_b, radius_b) in &bodies[i + 1..] {
            if pos_a.distance(pos_b) <= radius_a + radius_b {
                overlapping.insert(ordered(a, b));
            }
        }
    }

    for &(a, b) in overlapping.difference(&active.0) {
        contacts.write(Contact { a, b });
    }
    active.0 = overlapping;
}

fn clear_contacts(mut active: ResMut<ActiveContacts>) {
    active.0.clear();
}
