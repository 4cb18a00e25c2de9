// Player settings and their persistence between runs.
use std::collections::BTreeMap;
use std::path::PathBuf;

use bevy::audio::{GlobalVolume, Volume};
use bevy::prelude::*;
use bevy::window::WindowFocused;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, load_settings)
            .add_systems(Update, apply_volume.run_if(resource_changed::<GameSettings>))
            .add_systems(Last, save_settings);
    }
}

const WALK_SPEED: &str = "WalkSpeed";
const RUN_SPEED: &str = "RunSpeed";
const JUMP_FORCE: &str = "JumpForce";
const WALK_ANIM_SPEED: &str = "WalkAnimSpeed";
const RUN_ANIM_SPEED: &str = "RunAnimSpeed";
const MASTER_VOLUME: &str = "MasterVolume";

/// Player-facing settings, persisted between runs.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct GameSettings {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub jump_force: f32,
    pub walk_animation_speed: f32,
    pub run_animation_speed: f32,
    master_volume: f32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            walk_speed: 15.0,
            run_speed: 37.5,
            jump_force: 5.0,
            walk_animation_speed: 1.0,
            run_animation_speed: 2.5,
            master_volume: 1.0,
        }
    }
}

impl GameSettings {
    /// Reads every setting, falling back to the default for missing keys.
    pub fn load(store: &impl PersistenceStore) -> Self {
        let d = Self::default();
        let mut settings = Self {
            walk_speed: store.get_float(WALK_SPEED, d.walk_speed),
            run_speed: store.get_float(RUN_SPEED, d.run_speed),
            jump_force: store.get_float(JUMP_FORCE, d.jump_force),
            walk_animation_speed: store.get_float(WALK_ANIM_SPEED, d.walk_animation_speed),
            run_animation_speed: store.get_float(RUN_ANIM_SPEED, d.run_animation_speed),
            master_volume: d.master_volume,
        };
        settings.set_master_volume(store.get_float(MASTER_VOLUME, d.master_volume));
        settings
    }

    pub fn store(&self, store: &mut impl PersistenceStore) {
        store.set_float(WALK_SPEED, self.walk_speed);
        store.set_float(RUN_SPEED, self.run_speed);
        store.set_float(JUMP_FORCE, self.jump_force);
        store.set_float(WALK_ANIM_SPEED, self.walk_animation_speed);
        store.set_float(RUN_ANIM_SPEED, self.run_animation_speed);
        store.set_float(MASTER_VOLUME, self.master_volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = if volume.is_nan() {
            1.0
        } else {
            volume.clamp(0.0, 1.0)
        };
    }
}

/// Key/value float storage that survives restarts.
pub trait PersistenceStore {
    fn get_float(&self, key: &str, default: f32) -> f32;
    fn set_float(&mut self, key: &str, value: f32);
    fn save(&mut self) -> Result<(), PrefsError>;
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("no config directory on this platform")]
    NoConfigDir,
    #[error("prefs i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("prefs file is malformed: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not serialize prefs: {0}")]
    Serialize(#[from] ron::Error),
}

/// On-disk layout of the prefs file.
#[derive(Serialize, Deserialize, Debug, Default)]
struct PrefsFile {
    #[serde(default)]
    values: BTreeMap<String, f32>,
}

/// Prefs stored as RON. Without a path it only lives in memory.
#[derive(Resource, Debug, Default)]
pub struct RonPrefs {
    path: Option<PathBuf>,
    file: PrefsFile,
}

impl RonPrefs {
    pub fn default_path() -> Result<PathBuf, PrefsError> {
        let dir = dirs::config_dir().ok_or(PrefsError::NoConfigDir)?;
        Ok(dir.join("zone-chase").join("prefs.ron"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            file: PrefsFile::default(),
        }
    }

    /// Replaces the in-memory values with the file's. A missing file is not
    /// an error.
    pub fn load(&mut self) -> Result<(), PrefsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            info!("no prefs at {}, using defaults", path.display());
            return Ok(());
        }
        let contents = std::fs::read_to_string(path)?;
        self.file = ron::from_str(&contents)?;
        info!("loaded prefs from {}", path.display());
        Ok(())
    }
}

impl PersistenceStore for RonPrefs {
    fn get_float(&self, key: &str, default: f32) -> f32 {
        self.file.values.get(key).copied().unwrap_or(default)
    }

    fn set_float(&mut self, key: &str, value: f32) {
        self.file.values.insert(key.to_string(), value);
    }

    fn save(&mut self) -> Result<(), PrefsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = ron::ser::to_string_pretty(&self.file, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, serialized)?;
        debug!("saved prefs to {}", path.display());
        Ok(())
    }
}

fn open_prefs() -> RonPrefs {
    let path = match RonPrefs::default_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("{e}, settings will not persist");
            return RonPrefs::default();
        }
    };
    let mut prefs = RonPrefs::at(path);
    if let Err(e) = prefs.load() {
        error!("failed to load prefs: {e}. Using defaults.");
    }
    prefs
}

fn load_settings(mut commands: Commands) {
    let prefs = open_prefs();
    let settings = GameSettings::load(&prefs);
    commands.insert_resource(prefs);
    commands.insert_resource(settings);
}

fn apply_volume(settings: Res<GameSettings>, volume: Option<ResMut<GlobalVolume>>) {
    if let Some(mut volume) = volume {
        *volume = GlobalVolume::new(Volume::Linear(settings.master_volume()));
    }
}

fn save_settings(
    mut focus: MessageReader<WindowFocused>,
    mut exit: MessageReader<AppExit>,
    settings: Option<Res<GameSettings>>,
    prefs: Option<ResMut<RonPrefs>>,
) {
    let lost_focus = focus.read().filter(|ev| !ev.focused).count() > 0;
    let exiting = exit.read().count() > 0;
    if !(lost_focus || exiting) {
        return;
    }
    let (Some(settings), Some(mut prefs)) = (settings, prefs) else {
        return;
    };
    settings.store(&mut *prefs);
    if let Err(e) = prefs.save() {
        error!("failed to save prefs: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        values: HashMap<String, f32>,
    }

    impl PersistenceStore for MemoryStore {
        fn get_float(&self, key: &str, default: f32) -> f32 {
            self.values.get(key).copied().unwrap_or(default)
        }

        fn set_float(&mut self, key: &str, value: f32) {
            self.values.insert(key.to_string(), value);
        }

        fn save(&mut self) -> Result<(), PrefsError> {
            Ok(())
        }
    }

    #[test]
    fn empty_store_yields_defaults() {
        let settings = GameSettings::load(&MemoryStore::default());
        assert_eq!(settings, GameSettings::default());
        assert_eq!(settings.walk_speed, 15.0);
        assert_eq!(settings.run_speed, 37.5);
    }

    #[test]
    fn stored_values_survive_a_round_trip() {
        let mut store = MemoryStore::default();
        let mut settings = GameSettings {
            walk_speed: 9.0,
            ..default()
        };
        settings.set_master_volume(0.25);
        settings.store(&mut store);
        assert_eq!(GameSettings::load(&store), settings);
    }

    #[test]
    fn master_volume_is_clamped() {
        let mut settings = GameSettings::default();
        settings.set_master_volume(3.0);
        assert_eq!(settings.master_volume(), 1.0);
        settings.set_master_volume(-1.0);
        assert_eq!(settings.master_volume(), 0.0);

        let mut store = MemoryStore::default();
        store.set_float(MASTER_VOLUME, 7.5);
        assert_eq!(GameSettings::load(&store).master_volume(), 1.0);
    }

    #[test]
    fn in_memory_prefs_keep_values_and_save_nowhere() {
        let mut prefs = RonPrefs::default();
        prefs.set_float(RUN_SPEED, 20.0);
        assert_eq!(prefs.get_float(RUN_SPEED, 0.0), 20.0);
        assert_eq!(prefs.get_float(WALK_SPEED, 1.0), 1.0);
        assert!(prefs.save().is_ok());
        assert!(prefs.load().is_ok());
    }

    #[test]
    fn prefs_file_round_trips_through_disk() {
        let path = std::env::temp_dir()
            .join(format!("zone-chase-test-{}", std::process::id()))
            .join("prefs.ron");
        let mut prefs = RonPrefs::at(path.clone());
        prefs.set_float(WALK_SPEED, 11.0);
        prefs.save().unwrap();

        let mut reloaded = RonPrefs::at(path.clone());
        reloaded.load().unwrap();
        assert_eq!(reloaded.get_float(WALK_SPEED, 0.0), 11.0);

        std::fs::write(&path, "not ron (").unwrap();
        let mut broken = RonPrefs::at(path.clone());
        assert!(matches!(broken.load(), Err(PrefsError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
