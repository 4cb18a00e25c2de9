// Zone progression: walks the pursuer through an ordered list of spawn points
// on randomised delays, then hands over to the chase.
use bevy::prelude::*;
use rand::Rng;
use rand::rngs::StdRng;

/// An ordered spawn point. Indices follow insertion order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub index: usize,
    pub position: Vec3,
}

/// Places (or relocates) the pursuer. The sequencer never touches the
/// pursuer's body directly.
pub trait Spawner {
    fn spawn_enemy_at(&mut self, position: Vec3);
}

/// Delay and placement parameters for the sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneTiming {
    pub min_delay: f32,
    pub max_delay: f32,
    /// Fixed wait added in front of every random delay.
    pub settle_delay: f32,
    pub spawn_lift: f32,
    pub spawn_jitter: f32,
}

impl Default for ZoneTiming {
    fn default() -> Self {
        Self {
            min_delay: 3.0,
            max_delay: 5.0,
            settle_delay: 10.0,
            spawn_lift: 0.5,
            spawn_jitter: 10.0,
        }
    }
}

impl ZoneTiming {
    /// Delay bounds with negatives clamped and a reversed range swapped.
    pub fn delay_range(&self) -> (f32, f32) {
        let lo = self.min_delay.max(0.0);
        let hi = self.max_delay.max(0.0);
        if lo > hi { (hi, lo) } else { (lo, hi) }
    }
}

/// What a call into the sequencer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// No zones configured.
    Empty,
    /// Moved to (or started at) this zone and scheduled the next wait.
    Moved(usize),
    /// Reached the last zone; the chase takes over from here.
    FinalReached(usize),
    /// Already at the last zone, nothing changed.
    Holding(usize),
}

pub struct ZoneSequencer {
    zones: Vec<Zone>,
    timing: ZoneTiming,
    current: usize,
    /// Seconds left on the pending wait, if any.
    wait: Option<f32>,
    finished: bool,
    rng: StdRng,
}

impl ZoneSequencer {
    pub fn new(positions: impl IntoIterator<Item = Vec3>, timing: ZoneTiming, rng: StdRng) -> Self {
        let zones = positions
            .into_iter()
            .enumerate()
            .map(|(index, position)| Zone { index, position })
            .collect();
        Self {
            zones,
            timing,
            current: 0,
            wait: None,
            finished: false,
            rng,
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn current_zone(&self) -> Option<usize> {
        if self.zones.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    /// Jumps to `index`. Out-of-range indices are ignored.
    pub fn set_current_zone(&mut self, index: usize) -> bool {
        if index >= self.zones.len() {
            return false;
        }
        self.current = index;
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn pending_wait(&self) -> Option<f32> {
        self.wait
    }

    /// Spawns at the first zone and schedules the first wait.
    pub fn start(&mut self, spawner: &mut impl Spawner) -> Advance {
        if self.zones.is_empty() {
            return Advance::Empty;
        }
        self.current = 0;
        self.finished = false;
        self.spawn_at_zone(0, spawner);
        self.settle()
    }

    /// Counts down the pending wait and advances once it runs out.
    pub fn tick(&mut self, dt: f32, spawner: &mut impl Spawner) -> Option<Advance> {
        let remaining = self.wait.as_mut()?;
        *remaining -= dt;
        if *remaining > 0.0 {
            return None;
        }
        self.wait = None;
        Some(self.advance(spawner))
    }

    /// Moves to the next zone in order. The last zone is terminal: it is
    /// never wrapped past.
    pub fn advance(&mut self, spawner: &mut impl Spawner) -> Advance {
        if self.zones.is_empty() {
            return Advance::Empty;
        }
        if self.finished {
            return Advance::Holding(self.current);
        }
        self.current = (self.current + 1).min(self.zones.len() - 1);
        self.spawn_at_zone(self.current, spawner);
        self.settle()
    }

    /// Steps back one zone, respawns there and restarts the wait. Ignored at
    /// the first zone and once the last zone was reached.
    pub fn step_back(&mut self, spawner: &mut impl Spawner) -> Option<usize> {
        if self.zones.is_empty() || self.finished || self.current == 0 {
            return None;
        }
        self.current -= 1;
        self.spawn_at_zone(self.current, spawner);
        self.schedule_wait();
        Some(self.current)
    }

    /// Places the pursuer at `index`, lifted and jittered along z.
    pub fn spawn_at_zone(&mut self, index: usize, spawner: &mut impl Spawner) -> bool {
        let Some(zone) = self.zones.get(index).copied() else {
            return false;
        };
        let jitter = self.timing.spawn_jitter.abs();
        let offset_z = if jitter > 0.0 {
            self.rng.random_range(-jitter..=jitter)
        } else {
            0.0
        };
        let position = zone.position + Vec3::new(0.0, self.timing.spawn_lift, offset_z);
        spawner.spawn_enemy_at(position);
        true
    }

    /// Drops the pending wait without side effects.
    pub fn cancel(&mut self) {
        self.wait = None;
    }

    fn settle(&mut self) -> Advance {
        if self.current + 1 == self.zones.len() {
            self.finished = true;
            self.wait = None;
            Advance::FinalReached(self.current)
        } else {
            self.schedule_wait();
            Advance::Moved(self.current)
        }
    }

    fn schedule_wait(&mut self) {
        let (lo, hi) = self.timing.delay_range();
        let delay = self.rng.random_range(lo..=hi);
        self.wait = Some(self.timing.settle_delay.max(0.0) + delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[derive(Default)]
    struct RecordingSpawner(Vec<Vec3>);

    impl Spawner for RecordingSpawner {
        fn spawn_enemy_at(&mut self, position: Vec3) {
            self.0.push(position);
        }
    }

    fn timing(min_delay: f32, max_delay: f32) -> ZoneTiming {
        ZoneTiming {
            min_delay,
            max_delay,
            settle_delay: 0.0,
            spawn_lift: 0.5,
            spawn_jitter: 0.0,
        }
    }

    fn sequencer(count: usize, seed: u64) -> ZoneSequencer {
        let positions = (0..count).map(|i| Vec3::new(i as f32 * 10.0, 0.0, 0.0));
        ZoneSequencer::new(positions, timing(3.0, 5.0), StdRng::seed_from_u64(seed))
    }

    fn spawned_indices(spawner: &RecordingSpawner) -> Vec<usize> {
        spawner.0.iter().map(|p| (p.x / 10.0).round() as usize).collect()
    }

    #[test]
    fn walks_three_zones_then_holds_at_the_last() {
        let mut seq = sequencer(3, 7);
        let mut spawner = RecordingSpawner::default();

        assert_eq!(seq.start(&mut spawner), Advance::Moved(0));
        let mut steps = Vec::new();
        for _ in 0..100 {
            if let Some(step) = seq.tick(0.25, &mut spawner) {
                steps.push(step);
            }
        }

        assert_eq!(steps, vec![Advance::Moved(1), Advance::FinalReached(2)]);
        assert_eq!(spawned_indices(&spawner), vec![0, 1, 2]);
        assert_eq!(seq.current_zone(), Some(2));
        assert!(seq.is_finished());
        assert_eq!(seq.pending_wait(), None);
        assert_eq!(seq.advance(&mut spawner), Advance::Holding(2));
        assert_eq!(spawner.0.len(), 3);
    }

    #[test]
    fn visits_every_index_once_in_order() {
        for count in 1..8 {
            let mut seq = sequencer(count, count as u64);
            let mut spawner = RecordingSpawner::default();
            seq.start(&mut spawner);
            while !seq.is_finished() {
                seq.tick(1.0, &mut spawner);
            }
            let expected: Vec<usize> = (0..count).collect();
            assert_eq!(spawned_indices(&spawner), expected);
        }
    }

    #[test]
    fn delays_stay_within_the_configured_range() {
        for seed in 0..200 {
            let mut seq = sequencer(4, seed);
            let mut spawner = RecordingSpawner::default();
            seq.start(&mut spawner);
            let wait = seq.pending_wait().unwrap();
            assert!((3.0..=5.0).contains(&wait), "wait {wait} out of range");
        }
    }

    #[test]
    fn nothing_advances_before_the_wait_elapses() {
        let mut seq = sequencer(3, 1);
        let mut spawner = RecordingSpawner::default();
        seq.start(&mut spawner);
        assert_eq!(seq.tick(2.9, &mut spawner), None);
        assert_eq!(seq.current_zone(), Some(0));
    }

    #[test]
    fn settle_delay_precedes_the_random_delay() {
        let mut t = timing(3.0, 5.0);
        t.settle_delay = 10.0;
        let mut seq = ZoneSequencer::new(
            [Vec3::ZERO, Vec3::X],
            t,
            StdRng::seed_from_u64(3),
        );
        seq.start(&mut RecordingSpawner::default());
        let wait = seq.pending_wait().unwrap();
        assert!((13.0..=15.0).contains(&wait));
    }

    #[test]
    fn empty_zone_list_is_inert() {
        let mut seq = sequencer(0, 0);
        let mut spawner = RecordingSpawner::default();
        assert_eq!(seq.start(&mut spawner), Advance::Empty);
        assert_eq!(seq.advance(&mut spawner), Advance::Empty);
        assert_eq!(seq.tick(100.0, &mut spawner), None);
        assert!(!seq.spawn_at_zone(0, &mut spawner));
        assert_eq!(seq.step_back(&mut spawner), None);
        assert_eq!(seq.current_zone(), None);
        assert!(spawner.0.is_empty());
    }

    #[test]
    fn single_zone_starts_the_chase_immediately() {
        let mut seq = sequencer(1, 0);
        let mut spawner = RecordingSpawner::default();
        assert_eq!(seq.start(&mut spawner), Advance::FinalReached(0));
        assert_eq!(seq.pending_wait(), None);
    }

    #[test]
    fn step_back_stops_at_the_first_zone() {
        let mut seq = sequencer(4, 9);
        let mut spawner = RecordingSpawner::default();
        seq.start(&mut spawner);
        seq.advance(&mut spawner);
        assert_eq!(seq.step_back(&mut spawner), Some(0));
        assert_eq!(spawned_indices(&spawner), vec![0, 1, 0]);

        // Nearly through the wait at zone 0: a further step back changes nothing.
        let wait = seq.pending_wait().unwrap();
        seq.tick(wait - 0.5, &mut spawner);
        let before = seq.pending_wait();
        assert_eq!(seq.step_back(&mut spawner), None);
        assert_eq!(seq.pending_wait(), before);
        assert_eq!(seq.current_zone(), Some(0));
        assert_eq!(spawned_indices(&spawner), vec![0, 1, 0]);
    }

    #[test]
    fn step_back_is_ignored_after_the_last_zone() {
        let mut seq = sequencer(2, 9);
        let mut spawner = RecordingSpawner::default();
        seq.start(&mut spawner);
        assert_eq!(seq.advance(&mut spawner), Advance::FinalReached(1));
        assert_eq!(seq.step_back(&mut spawner), None);
        assert_eq!(seq.current_zone(), Some(1));
    }

    #[test]
    fn out_of_range_zone_is_rejected() {
        let mut seq = sequencer(3, 0);
        assert!(!seq.set_current_zone(3));
        assert!(seq.set_current_zone(2));
        assert_eq!(seq.current_zone(), Some(2));
    }

    #[test]
    fn spawn_is_lifted_and_jittered_along_z() {
        let mut t = timing(1.0, 1.0);
        t.spawn_jitter = 10.0;
        let zone = Vec3::new(4.0, 1.0, -20.0);
        let mut seq = ZoneSequencer::new([zone], t, StdRng::seed_from_u64(11));
        let mut spawner = RecordingSpawner::default();
        for _ in 0..50 {
            seq.spawn_at_zone(0, &mut spawner);
        }
        for p in &spawner.0 {
            assert_eq!(p.x, 4.0);
            assert_eq!(p.y, 1.5);
            assert!((-30.0..=-10.0).contains(&p.z));
        }
    }

    #[test]
    fn reversed_delay_range_is_swapped() {
        let t = timing(5.0, -1.0);
        assert_eq!(t.delay_range(), (0.0, 5.0));
    }
}
