// Collectibles: carry them around, drop them in the packing zone, win once
// enough are packed.
use bevy::prelude::*;
use std::collections::HashSet;

use crate::contact::{Contact, Tag};
use crate::level::LevelStep;
use crate::outcome::level_in_play;
use crate::player::{Player, PlayerControl};
use crate::scenes::GameScene;

pub struct PickupPlugin;

impl Plugin for PickupPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PickupConfig>()
            .add_message::<AllPacked>()
            .add_systems(
                Update,
                grab_or_drop.run_if(in_state(GameScene::Main).and(level_in_play)),
            )
            .add_systems(FixedUpdate, carry_held.in_set(LevelStep::Carry))
            .add_systems(FixedUpdate, count_packed.in_set(LevelStep::React))
            .add_systems(OnExit(GameScene::Main), |mut commands: Commands| {
                commands.remove_resource::<PickupCounter>();
            });
    }
}

#[derive(Resource, Debug, Clone)]
pub struct PickupConfig {
    /// Packed items needed to win.
    pub threshold: u32,
    pub hold_distance: f32,
    /// Where a held item sits, in the player's local frame.
    pub hold_offset: Vec3,
    pub throw_distance: f32,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            threshold: 4,
            hold_distance: 3.0,
            hold_offset: Vec3::new(0.0, 0.0, -2.0),
            throw_distance: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupOutcome {
    Counted(u32),
    /// This item was already counted.
    Duplicate,
    /// The count just reached the threshold. Happens once per level.
    ThresholdReached,
}

/// Counts packed items for one level instance.
#[derive(Resource, Debug)]
pub struct PickupCounter {
    threshold: u32,
    count: u32,
    counted: HashSet<u64>,
    fired: bool,
}

impl PickupCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            count: 0,
            counted: HashSet::new(),
            fired: false,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Counts `item` unless it was counted before.
    pub fn record(&mut self, item: u64) -> PickupOutcome {
        if !self.counted.insert(item) {
            return PickupOutcome::Duplicate;
        }
        self.count = self.count.saturating_add(1);
        if !self.fired && self.count >= self.threshold {
            self.fired = true;
            return PickupOutcome::ThresholdReached;
        }
        PickupOutcome::Counted(self.count)
    }
}

#[derive(Message, Debug, Clone, Copy)]
pub struct AllPacked;

#[derive(Component)]
pub struct Collectible;

#[derive(Component)]
pub struct PackingZone;

/// Marks the item currently in the player's hands.
#[derive(Component)]
pub struct Held;

fn grab_or_drop(
    mut commands: Commands,
    mouse: Res<ButtonInput<MouseButton>>,
    config: Res<PickupConfig>,
    player: Query<(&Transform, &PlayerControl), With<Player>>,
    items: Query<(Entity, &Transform, &Tag), (Without<Player>, Without<Held>)>,
    mut held: Query<(Entity, &mut Transform), (With<Held>, Without<Player>)>,
) {
    let Ok((player_transform, control)) = player.single() else {
        return;
    };
    if !control.enabled {
        return;
    }

    if let Ok((entity, mut transform)) = held.single_mut() {
        if mouse.just_pressed(MouseButton::Right) {
            let forward = player_transform.forward();
            transform.translation += *forward * config.throw_distance;
            commands.entity(entity).remove::<Held>();
        } else if mouse.just_released(MouseButton::Left) {
            commands.entity(entity).remove::<Held>();
        }
        return;
    }

    if !mouse.just_pressed(MouseButton::Left) {
        return;
    }
    let origin = player_transform.translation;
    let nearest = items
        .iter()
        .filter(|(_, _, tag)| matches!(tag, Tag::Collectible | Tag::Scanner))
        .map(|(entity, transform, _)| (entity, transform.translation.distance(origin)))
        .filter(|(_, dist)| *dist <= config.hold_distance)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((entity, _)) = nearest {
        commands.entity(entity).insert(Held);
    }
}

fn carry_held(
    config: Res<PickupConfig>,
    player: Query<&Transform, With<Player>>,
    mut held: Query<&mut Transform, (With<Held>, Without<Player>)>,
) {
    let Ok(player_transform) = player.single() else {
        return;
    };
    for mut transform in &mut held {
        transform.translation =
            player_transform.translation + player_transform.rotation * config.hold_offset;
        transform.rotation = player_transform.rotation;
    }
}

fn count_packed(
    counter: Option<ResMut<PickupCounter>>,
    mut contacts: MessageReader<Contact>,
    tags: Query<&Tag>,
    mut packed: MessageWriter<AllPacked>,
) {
    let Some(mut counter) = counter else {
        contacts.clear();
        return;
    };
    for contact in contacts.read() {
        let (Ok(a), Ok(b)) = (tags.get(contact.a), tags.get(contact.b)) else {
            continue;
        };
        let item = match (a, b) {
            (Tag::Collectible, Tag::PackingZone) => contact.a,
            (Tag::PackingZone, Tag::Collectible) => contact.b,
            _ => continue,
        };
        match counter.record(item.to_bits()) {
            PickupOutcome::ThresholdReached => {
                info!("all {} items packed", counter.count());
                packed.write(AllPacked);
            }
            PickupOutcome::Counted(count) => debug!("packed {count} items"),
            PickupOutcome::Duplicate => {}
        }
    }
}
