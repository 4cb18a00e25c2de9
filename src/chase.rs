// Chase: zone progression hands over to a pursuit that ends the level when
// the pursuer reaches the player.
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::contact::{Contact, Tag};
use crate::outcome::level_in_play;
use crate::player::Player;
use crate::scenes::GameScene;
use crate::zone::{Advance, Spawner, ZoneSequencer, ZoneTiming};

pub struct ChasePlugin;

impl Plugin for ChasePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ChaseConfig>()
            .add_message::<PlayerCaught>()
            .add_systems(
                Update,
                tick_zones.run_if(in_state(GameScene::Main).and(level_in_play)),
            )
            .add_systems(OnExit(GameScene::Main), teardown_chase);
    }
}

#[derive(Resource, Debug, Clone)]
pub struct ChaseConfig {
    pub min_delay: f32,
    pub max_delay: f32,
    pub settle_delay: f32,
    pub spawn_lift: f32,
    pub spawn_jitter: f32,
    /// Straight-line distance at which the pursuer catches the player.
    pub catch_distance: f32,
    pub run_speed: f32,
    /// Fixed seed for delays and jitter. Random when unset.
    pub seed: Option<u64>,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        let timing = ZoneTiming::default();
        Self {
            min_delay: timing.min_delay,
            max_delay: timing.max_delay,
            settle_delay: timing.settle_delay,
            spawn_lift: timing.spawn_lift,
            spawn_jitter: timing.spawn_jitter,
            catch_distance: 1.5,
            run_speed: 5.0,
            seed: None,
        }
    }
}

impl ChaseConfig {
    pub fn zone_timing(&self) -> ZoneTiming {
        ZoneTiming {
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            settle_delay: self.settle_delay,
            spawn_lift: self.spawn_lift,
            spawn_jitter: self.spawn_jitter,
        }
    }

    fn rng(&self) -> StdRng {
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        StdRng::seed_from_u64(seed)
    }
}

/// The pursuer as the chase sees it.
pub trait PursuerHandle {
    fn position(&self) -> Vec3;
    fn set_chasing(&mut self, chasing: bool);
    fn move_towards(&mut self, target: Vec3, speed: f32, dt: f32);
}

/// Inclusive distance test between pursuer and target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityGate {
    pub catch_distance: f32,
}

impl ProximityGate {
    pub fn in_reach(&self, pursuer: Vec3, target: Vec3) -> bool {
        pursuer.distance(target) <= self.catch_distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaseState {
    pub current_zone_index: Option<usize>,
    pub is_chasing: bool,
    pub has_triggered_terminal: bool,
}

/// Returned exactly once per level, by whichever detection path got there first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caught;

#[derive(Message, Debug, Clone, Copy)]
pub struct PlayerCaught;

/// Owns the chase state for one level instance.
#[derive(Resource)]
pub struct ChaseCoordinator {
    sequencer: ZoneSequencer,
    gate: ProximityGate,
    run_speed: f32,
    is_chasing: bool,
    has_triggered_terminal: bool,
}

impl ChaseCoordinator {
    pub fn new(zones: impl IntoIterator<Item = Vec3>, config: &ChaseConfig) -> Self {
        Self {
            sequencer: ZoneSequencer::new(zones, config.zone_timing(), config.rng()),
            gate: ProximityGate {
                catch_distance: config.catch_distance,
            },
            run_speed: config.run_speed,
            is_chasing: false,
            has_triggered_terminal: false,
        }
    }

    pub fn state(&self) -> ChaseState {
        ChaseState {
            current_zone_index: self.sequencer.current_zone(),
            is_chasing: self.is_chasing,
            has_triggered_terminal: self.has_triggered_terminal,
        }
    }

    pub fn sequencer(&self) -> &ZoneSequencer {
        &self.sequencer
    }

    pub fn start<P: Spawner + PursuerHandle>(&mut self, pursuer: &mut P) -> Advance {
        let step = self.sequencer.start(pursuer);
        self.follow(step, pursuer);
        step
    }

    /// Per-frame tick: runs the pending zone wait.
    pub fn tick<P: Spawner + PursuerHandle>(&mut self, dt: f32, pursuer: &mut P) -> Option<Advance> {
        if self.has_triggered_terminal {
            return None;
        }
        let step = self.sequencer.tick(dt, pursuer)?;
        self.follow(step, pursuer);
        Some(step)
    }

    pub fn advance<P: Spawner + PursuerHandle>(&mut self, pursuer: &mut P) -> Advance {
        if self.has_triggered_terminal {
            return match self.sequencer.current_zone() {
                Some(index) => Advance::Holding(index),
                None => Advance::Empty,
            };
        }
        let step = self.sequencer.advance(pursuer);
        self.follow(step, pursuer);
        step
    }

    pub fn spawn_at_zone(&mut self, index: usize, spawner: &mut impl Spawner) -> bool {
        self.sequencer.spawn_at_zone(index, spawner)
    }

    /// Pushes the pursuer back one zone. Has no effect once the chase is on.
    pub fn knock_back(&mut self, spawner: &mut impl Spawner) -> Option<usize> {
        if self.is_chasing || self.has_triggered_terminal {
            return None;
        }
        let index = self.sequencer.step_back(spawner)?;
        debug!("pursuer knocked back to zone {index}");
        Some(index)
    }

    /// Fixed-step tick: moves the pursuer, then tests the post-move distance.
    pub fn fixed_tick(
        &mut self,
        dt: f32,
        pursuer: &mut impl PursuerHandle,
        target: Vec3,
    ) -> Option<Caught> {
        if !self.is_chasing || self.has_triggered_terminal {
            return None;
        }
        pursuer.move_towards(target, self.run_speed, dt);
        self.check_proximity(pursuer, target)
    }

    /// Distance-polling path.
    pub fn check_proximity(
        &mut self,
        pursuer: &mut impl PursuerHandle,
        target: Vec3,
    ) -> Option<Caught> {
        if !self.is_chasing || !self.gate.in_reach(pursuer.position(), target) {
            return None;
        }
        self.trigger_caught(pursuer)
    }

    /// Contact-event path. Only an enemy/player pair counts.
    pub fn on_contact(&mut self, a: Tag, b: Tag, pursuer: &mut impl PursuerHandle) -> Option<Caught> {
        let pair = matches!((a, b), (Tag::Enemy, Tag::Player) | (Tag::Player, Tag::Enemy));
        if !pair {
            return None;
        }
        self.trigger_caught(pursuer)
    }

    /// The single guarded terminal entry point both detection paths share.
    pub fn trigger_caught(&mut self, pursuer: &mut impl PursuerHandle) -> Option<Caught> {
        if self.has_triggered_terminal {
            return None;
        }
        self.has_triggered_terminal = true;
        self.is_chasing = false;
        self.sequencer.cancel();
        pursuer.set_chasing(false);
        info!("player caught");
        Some(Caught)
    }

    /// Abandons any pending wait. Nothing else changes.
    pub fn teardown(&mut self) {
        self.sequencer.cancel();
    }

    fn follow(&mut self, step: Advance, pursuer: &mut impl PursuerHandle) {
        match step {
            Advance::FinalReached(index) => {
                self.is_chasing = true;
                pursuer.set_chasing(true);
                info!("final zone {index} reached, chase begins");
            }
            Advance::Moved(index) => debug!("pursuer moved to zone {index}"),
            Advance::Empty | Advance::Holding(_) => {}
        }
    }
}

#[derive(Component, Default)]
pub struct Pursuer {
    pub chasing: bool,
}

/// Borrowed view of the pursuer entity handed to the chase.
pub struct PursuerBody<'a> {
    pub transform: &'a mut Transform,
    pub pursuer: &'a mut Pursuer,
    pub visibility: &'a mut Visibility,
}

impl Spawner for PursuerBody<'_> {
    fn spawn_enemy_at(&mut self, position: Vec3) {
        self.transform.translation = position;
        *self.visibility = Visibility::Inherited;
    }
}

impl PursuerHandle for PursuerBody<'_> {
    fn position(&self) -> Vec3 {
        self.transform.translation
    }

    fn set_chasing(&mut self, chasing: bool) {
        self.pursuer.chasing = chasing;
    }

    fn move_towards(&mut self, target: Vec3, speed: f32, dt: f32) {
        // Stay upright: pursue along the ground plane only.
        let mut offset = target - self.transform.translation;
        offset.y = 0.0;
        let dist = offset.length();
        if dist <= f32::EPSILON {
            return;
        }
        let dir = offset / dist;
        self.transform.translation += dir * (speed * dt).min(dist);
        let facing = self.transform.translation + dir;
        self.transform.look_at(facing, Vec3::Y);
    }
}

type PursuerQuery<'w, 's> =
    Query<'w, 's, (&'static mut Transform, &'static mut Pursuer, &'static mut Visibility), Without<Player>>;

/// Runs on level entry, after the level entities exist.
pub fn start_zone_sequence(mut chase: ResMut<ChaseCoordinator>, mut pursuer: PursuerQuery) {
    let Ok((mut transform, mut state, mut visibility)) = pursuer.single_mut() else {
        warn!("no pursuer in level, zone sequence not started");
        return;
    };
    let mut body = PursuerBody {
        transform: &mut transform,
        pursuer: &mut state,
        visibility: &mut visibility,
    };
    if chase.start(&mut body) == Advance::Empty {
        warn!("level has no zones");
    }
}

fn tick_zones(
    chase: Option<ResMut<ChaseCoordinator>>,
    mut pursuer: PursuerQuery,
    time: Res<Time>,
) {
    let Some(mut chase) = chase else {
        return;
    };
    let Ok((mut transform, mut state, mut visibility)) = pursuer.single_mut() else {
        return;
    };
    let mut body = PursuerBody {
        transform: &mut transform,
        pursuer: &mut state,
        visibility: &mut visibility,
    };
    chase.tick(time.delta_secs(), &mut body);
}

/// Fixed step: pursuit movement and the distance check, after the player moved.
pub fn pursue_player(
    chase: Option<ResMut<ChaseCoordinator>>,
    mut pursuer: PursuerQuery,
    player: Query<&Transform, With<Player>>,
    time: Res<Time>,
    mut caught: MessageWriter<PlayerCaught>,
) {
    let Some(mut chase) = chase else {
        return;
    };
    let Ok(player_transform) = player.single() else {
        return;
    };
    let Ok((mut transform, mut state, mut visibility)) = pursuer.single_mut() else {
        return;
    };
    let mut body = PursuerBody {
        transform: &mut transform,
        pursuer: &mut state,
        visibility: &mut visibility,
    };
    if chase
        .fixed_tick(time.delta_secs(), &mut body, player_transform.translation)
        .is_some()
    {
        caught.write(PlayerCaught);
    }
}

/// Fixed step: the contact-event path into the same guard.
pub fn catch_on_contact(
    chase: Option<ResMut<ChaseCoordinator>>,
    mut contacts: MessageReader<Contact>,
    tags: Query<&Tag>,
    mut pursuer: PursuerQuery,
    mut caught: MessageWriter<PlayerCaught>,
) {
    let Some(mut chase) = chase else {
        contacts.clear();
        return;
    };
    let Ok((mut transform, mut state, mut visibility)) = pursuer.single_mut() else {
        contacts.clear();
        return;
    };
    let mut body = PursuerBody {
        transform: &mut transform,
        pursuer: &mut state,
        visibility: &mut visibility,
    };
    for contact in contacts.read() {
        let (Ok(a), Ok(b)) = (tags.get(contact.a), tags.get(contact.b)) else {
            continue;
        };
        if chase.on_contact(*a, *b, &mut body).is_some() {
            caught.write(PlayerCaught);
        }
    }
}

fn teardown_chase(mut commands: Commands, chase: Option<ResMut<ChaseCoordinator>>) {
    if let Some(mut chase) = chase {
        chase.teardown();
    }
    commands.remove_resource::<ChaseCoordinator>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockPursuer {
        position: Vec3,
        chasing: bool,
        spawns: Vec<Vec3>,
    }

    impl Spawner for MockPursuer {
        fn spawn_enemy_at(&mut self, position: Vec3) {
            self.position = position;
            self.spawns.push(position);
        }
    }

    impl PursuerHandle for MockPursuer {
        fn position(&self) -> Vec3 {
            self.position
        }

        fn set_chasing(&mut self, chasing: bool) {
            self.chasing = chasing;
        }

        fn move_towards(&mut self, target: Vec3, speed: f32, dt: f32) {
            let offset = target - self.position;
            let step = (speed * dt).min(offset.length());
            self.position += offset.normalize_or_zero() * step;
        }
    }

    fn config() -> ChaseConfig {
        ChaseConfig {
            min_delay: 3.0,
            max_delay: 5.0,
            settle_delay: 0.0,
            spawn_lift: 0.0,
            spawn_jitter: 0.0,
            catch_distance: 1.5,
            run_speed: 5.0,
            seed: Some(42),
        }
    }

    fn zones(count: usize) -> Vec<Vec3> {
        (0..count).map(|i| Vec3::new(0.0, 0.0, -20.0 * i as f32)).collect()
    }

    fn chasing_coordinator(pursuer: &mut MockPursuer) -> ChaseCoordinator {
        let mut chase = ChaseCoordinator::new(zones(1), &config());
        chase.start(pursuer);
        chase
    }

    #[test]
    fn three_zones_end_in_pursuit_at_the_last_index() {
        let mut chase = ChaseCoordinator::new(zones(3), &config());
        let mut pursuer = MockPursuer::default();
        chase.start(&mut pursuer);
        for _ in 0..200 {
            chase.tick(0.1, &mut pursuer);
        }
        let state = chase.state();
        assert_eq!(state.current_zone_index, Some(2));
        assert!(state.is_chasing);
        assert!(!state.has_triggered_terminal);
        assert!(pursuer.chasing);
        assert_eq!(pursuer.spawns.len(), 3);
    }

    #[test]
    fn second_trigger_is_a_no_op() {
        let mut pursuer = MockPursuer::default();
        let mut chase = chasing_coordinator(&mut pursuer);

        assert_eq!(chase.trigger_caught(&mut pursuer), Some(Caught));
        let snapshot = chase.state();
        assert_eq!(chase.trigger_caught(&mut pursuer), None);
        assert_eq!(chase.state(), snapshot);
        assert!(snapshot.has_triggered_terminal);
        assert!(!snapshot.is_chasing);
        assert!(!pursuer.chasing);
    }

    #[test]
    fn catch_fires_at_exactly_the_threshold() {
        let target = Vec3::new(10.0, 0.0, 0.0);

        let mut pursuer = MockPursuer::default();
        let mut chase = chasing_coordinator(&mut pursuer);
        pursuer.position = target - Vec3::new(1.5, 0.0, 0.0);
        assert_eq!(chase.check_proximity(&mut pursuer, target), Some(Caught));

        let mut pursuer = MockPursuer::default();
        let mut chase = chasing_coordinator(&mut pursuer);
        pursuer.position = target - Vec3::new(1.51, 0.0, 0.0);
        assert_eq!(chase.check_proximity(&mut pursuer, target), None);
    }

    #[test]
    fn gate_is_inclusive() {
        let gate = ProximityGate { catch_distance: 3.0 };
        assert!(gate.in_reach(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)));
        assert!(gate.in_reach(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)));
        assert!(!gate.in_reach(Vec3::ZERO, Vec3::new(0.0, 3.01, 0.0)));
    }

    #[test]
    fn pursuit_uses_post_move_positions() {
        let mut pursuer = MockPursuer::default();
        let mut chase = chasing_coordinator(&mut pursuer);
        // 2.0 away; one step of 5 * 0.1 brings it to 1.5.
        let target = pursuer.position + Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(chase.fixed_tick(0.1, &mut pursuer, target), Some(Caught));
    }

    #[test]
    fn no_pursuit_before_the_final_zone() {
        let mut chase = ChaseCoordinator::new(zones(3), &config());
        let mut pursuer = MockPursuer::default();
        chase.start(&mut pursuer);
        let before = pursuer.position;
        assert_eq!(chase.fixed_tick(1.0, &mut pursuer, before + Vec3::X), None);
        assert_eq!(pursuer.position, before);
    }

    #[test]
    fn contact_and_polling_share_one_guard() {
        let mut pursuer = MockPursuer::default();
        let mut chase = chasing_coordinator(&mut pursuer);
        assert_eq!(
            chase.on_contact(Tag::Player, Tag::Enemy, &mut pursuer),
            Some(Caught)
        );
        assert_eq!(chase.on_contact(Tag::Enemy, Tag::Player, &mut pursuer), None);
        let target = pursuer.position;
        assert_eq!(chase.check_proximity(&mut pursuer, target), None);
    }

    #[test]
    fn unrelated_contacts_are_ignored() {
        let mut pursuer = MockPursuer::default();
        let mut chase = chasing_coordinator(&mut pursuer);
        assert_eq!(chase.on_contact(Tag::Enemy, Tag::Collectible, &mut pursuer), None);
        assert_eq!(chase.on_contact(Tag::Player, Tag::PackingZone, &mut pursuer), None);
        assert!(!chase.state().has_triggered_terminal);
    }

    #[test]
    fn knock_back_only_before_the_chase() {
        let mut chase = ChaseCoordinator::new(zones(3), &config());
        let mut pursuer = MockPursuer::default();
        chase.start(&mut pursuer);
        assert_eq!(chase.knock_back(&mut pursuer), None);
        chase.advance(&mut pursuer);
        assert_eq!(chase.knock_back(&mut pursuer), Some(0));
        assert_eq!(chase.knock_back(&mut pursuer), None);

        chase.advance(&mut pursuer);
        chase.advance(&mut pursuer);
        assert!(chase.state().is_chasing);
        assert_eq!(chase.knock_back(&mut pursuer), None);
        assert_eq!(chase.state().current_zone_index, Some(2));
    }

    #[test]
    fn teardown_drops_the_pending_wait() {
        let mut chase = ChaseCoordinator::new(zones(3), &config());
        let mut pursuer = MockPursuer::default();
        chase.start(&mut pursuer);
        chase.teardown();
        for _ in 0..100 {
            assert_eq!(chase.tick(1.0, &mut pursuer), None);
        }
        assert_eq!(pursuer.spawns.len(), 1);
        assert_eq!(chase.state().current_zone_index, Some(0));
    }

    #[test]
    fn caught_stops_zone_progression() {
        let mut chase = ChaseCoordinator::new(zones(3), &config());
        let mut pursuer = MockPursuer::default();
        chase.start(&mut pursuer);
        chase.on_contact(Tag::Enemy, Tag::Player, &mut pursuer);
        assert_eq!(chase.advance(&mut pursuer), Advance::Holding(0));
        assert_eq!(chase.tick(100.0, &mut pursuer), None);
        assert!(!chase.state().is_chasing);
    }

    #[test]
    fn empty_level_never_chases() {
        let mut chase = ChaseCoordinator::new(Vec::new(), &config());
        let mut pursuer = MockPursuer::default();
        assert_eq!(chase.start(&mut pursuer), Advance::Empty);
        assert_eq!(chase.advance(&mut pursuer), Advance::Empty);
        assert!(!chase.spawn_at_zone(0, &mut pursuer));
        assert_eq!(chase.state().current_zone_index, None);
        assert!(!chase.state().is_chasing);
    }
}
