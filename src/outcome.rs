// Terminal transitions for a level: game over when caught, win when packed.
use std::str::FromStr;

use bevy::prelude::*;
use bevy::window::CursorOptions;
use thiserror::Error;

use crate::chase::PlayerCaught;
use crate::pickup::AllPacked;
use crate::player::{Player, PlayerControl, PlayerRig, Sinking};
use crate::scenes::GameScene;
use crate::transition::SceneFader;

pub struct OutcomePlugin;

impl Plugin for OutcomePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (resolve_outcome, drive_fallback)
                .chain()
                .run_if(in_state(GameScene::Main)),
        )
        .add_systems(OnExit(GameScene::Main), |mut commands: Commands| {
            commands.remove_resource::<GameStateCoordinator>();
        });
    }
}

/// Wait before the direct load when the fade could not be started.
const FALLBACK_DELAY: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GameState {
    #[default]
    Playing,
    GameOver,
    Won,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    GameOver,
    Won,
}

/// How far the scene change for a terminal state got.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presentation {
    Idle,
    Fading(GameScene),
    Fallback { scene: GameScene, remaining: f32 },
    Loaded(GameScene),
    /// Every load path failed. Gameplay state is unaffected.
    Degraded(GameScene),
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("scene transition service unavailable")]
    Unavailable,
    #[error("a fade is already running")]
    Busy,
    #[error("unknown scene '{0}'")]
    UnknownScene(String),
    #[error("no scene at build index {0}")]
    UnknownBuildIndex(usize),
}

/// Fade-then-load presentation of a scene change.
pub trait SceneTransition {
    fn fade_to_scene(&mut self, scene: GameScene) -> Result<(), TransitionError>;
}

/// Immediate scene loads, by identifier or by build index.
pub trait SceneLoader {
    fn load_scene(&mut self, name: &str) -> Result<(), TransitionError>;
    fn load_scene_index(&mut self, index: usize) -> Result<(), TransitionError>;
}

pub trait PlayerControls {
    fn disable_input(&mut self);
    fn release_cursor(&mut self);
}

impl SceneLoader for NextState<GameScene> {
    fn load_scene(&mut self, name: &str) -> Result<(), TransitionError> {
        let scene = GameScene::from_str(name)
            .map_err(|_| TransitionError::UnknownScene(name.to_string()))?;
        self.set(scene);
        Ok(())
    }

    fn load_scene_index(&mut self, index: usize) -> Result<(), TransitionError> {
        let scene =
            GameScene::from_build_index(index).ok_or(TransitionError::UnknownBuildIndex(index))?;
        self.set(scene);
        Ok(())
    }
}

/// Owns the level's terminal state. A fresh one is built for every level load.
#[derive(Resource, Debug)]
pub struct GameStateCoordinator {
    state: GameState,
    presentation: Presentation,
    game_over_scene: GameScene,
    win_scene: GameScene,
}

impl Default for GameStateCoordinator {
    fn default() -> Self {
        Self {
            state: GameState::Playing,
            presentation: Presentation::Idle,
            game_over_scene: GameScene::GameOver,
            win_scene: GameScene::Win,
        }
    }
}

impl GameStateCoordinator {
    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == GameState::Playing
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn player_caught(
        &mut self,
        controls: &mut impl PlayerControls,
        fader: Option<&mut dyn SceneTransition>,
    ) -> bool {
        self.enter(Terminal::GameOver, controls, fader)
    }

    pub fn player_won(
        &mut self,
        controls: &mut impl PlayerControls,
        fader: Option<&mut dyn SceneTransition>,
    ) -> bool {
        self.enter(Terminal::Won, controls, fader)
    }

    /// Enters a terminal state at most once. Returns whether anything changed.
    pub fn enter(
        &mut self,
        terminal: Terminal,
        controls: &mut impl PlayerControls,
        fader: Option<&mut dyn SceneTransition>,
    ) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        let scene = match terminal {
            Terminal::GameOver => {
                self.state = GameState::GameOver;
                self.game_over_scene
            }
            Terminal::Won => {
                self.state = GameState::Won;
                self.win_scene
            }
        };
        info!("level over: {:?}", self.state);

        controls.disable_input();
        controls.release_cursor();

        let faded = match fader {
            Some(fader) => fader.fade_to_scene(scene),
            None => Err(TransitionError::Unavailable),
        };
        self.presentation = match faded {
            Ok(()) => Presentation::Fading(scene),
            Err(e) => {
                warn!("fade to {scene} failed ({e}), loading directly");
                Presentation::Fallback {
                    scene,
                    remaining: FALLBACK_DELAY,
                }
            }
        };
        true
    }

    /// Runs a pending fallback load once its delay has passed. Tries the
    /// scene identifier first, then the build index.
    pub fn tick(&mut self, dt: f32, loader: &mut impl SceneLoader) {
        let Presentation::Fallback { scene, remaining } = &mut self.presentation else {
            return;
        };
        *remaining -= dt;
        if *remaining > 0.0 {
            return;
        }
        let scene = *scene;

        let loaded = loader.load_scene(scene.as_ref()).or_else(|e| {
            warn!("load of {scene} by name failed ({e}), trying build index");
            loader.load_scene_index(scene.build_index())
        });
        self.presentation = match loaded {
            Ok(()) => Presentation::Loaded(scene),
            Err(e) => {
                error!("could not load {scene}: {e}");
                Presentation::Degraded(scene)
            }
        };
    }
}

/// Only while the level has not ended.
pub fn level_in_play(outcome: Option<Res<GameStateCoordinator>>) -> bool {
    outcome.is_some_and(|outcome| outcome.is_playing())
}

fn resolve_outcome(
    mut commands: Commands,
    outcome: Option<ResMut<GameStateCoordinator>>,
    mut caught: MessageReader<PlayerCaught>,
    mut packed: MessageReader<AllPacked>,
    mut player: Query<(Entity, &Transform, &mut PlayerControl), With<Player>>,
    mut cursor: Query<&mut CursorOptions>,
    mut fader: Option<ResMut<SceneFader>>,
) {
    let was_caught = caught.read().count() > 0;
    let was_packed = packed.read().count() > 0;
    let Some(mut outcome) = outcome else {
        return;
    };
    let terminal = match (was_caught, was_packed) {
        (true, _) => Terminal::GameOver,
        (false, true) => Terminal::Won,
        (false, false) => return,
    };

    let mut player = player.single_mut().ok();
    let mut cursor = cursor.single_mut().ok();
    let mut rig = PlayerRig {
        control: player.as_mut().map(|(_, _, control)| &mut **control),
        cursor: cursor.as_deref_mut(),
    };
    let fader = fader
        .as_deref_mut()
        .map(|fader| fader as &mut dyn SceneTransition);

    if !outcome.enter(terminal, &mut rig, fader) {
        return;
    }
    if terminal == Terminal::GameOver {
        if let Some((entity, transform, _)) = player {
            commands
                .entity(entity)
                .insert(Sinking::from(transform.translation));
        }
    }
}

fn drive_fallback(
    outcome: Option<ResMut<GameStateCoordinator>>,
    mut next: ResMut<NextState<GameScene>>,
    time: Res<Time>,
) {
    if let Some(mut outcome) = outcome {
        outcome.tick(time.delta_secs(), &mut *next);
    }
}
