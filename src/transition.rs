// Full-screen fade between scenes, plus the splash card that opens the game.

use bevy::picking::Pickable;
use bevy::prelude::*;

use crate::outcome::{SceneTransition, TransitionError};
use crate::scenes::GameScene;

pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_overlay)
            .add_systems(OnEnter(GameScene::Splash), spawn_splash)
            .add_systems(Update, run_fade)
            .add_systems(
                Update,
                advance_splash.run_if(in_state(GameScene::Splash)),
            );
    }
}

const FADE: f32 = 1.0;
const HOLD: f32 = 0.1;
const SPLASH: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Out(f32),
    Hold(f32),
    In(f32),
}

#[derive(Debug, Clone, Copy)]
struct FadeJob {
    scene: GameScene,
    phase: Phase,
}

/// One frame of fade progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    pub alpha: f32,
    /// Set on the frame the screen is fully covered and the scene should change.
    pub switch_to: Option<GameScene>,
}

/// Drives the overlay. At most one fade runs at a time.
#[derive(Resource, Debug, Default)]
pub struct SceneFader {
    overlay: Option<Entity>,
    job: Option<FadeJob>,
}

impl SceneFader {
    pub fn new(overlay: Entity) -> Self {
        Self {
            overlay: Some(overlay),
            job: None,
        }
    }

    pub fn is_fading(&self) -> bool {
        self.job.is_some()
    }

    pub fn advance(&mut self, dt: f32) -> FadeStep {
        let Some(job) = self.job.as_mut() else {
            return FadeStep {
                alpha: 0.0,
                switch_to: None,
            };
        };

        let mut switch_to = None;
        let mut done = false;
        let alpha = match &mut job.phase {
            Phase::Out(elapsed) => {
                *elapsed += dt;
                if *elapsed >= FADE {
                    job.phase = Phase::Hold(0.0);
                    1.0
                } else {
                    *elapsed / FADE
                }
            }
            Phase::Hold(elapsed) => {
                *elapsed += dt;
                if *elapsed >= HOLD {
                    switch_to = Some(job.scene);
                    job.phase = Phase::In(0.0);
                }
                1.0
            }
            Phase::In(elapsed) => {
                *elapsed += dt;
                done = *elapsed >= FADE;
                (1.0 - *elapsed / FADE).max(0.0)
            }
        };
        if done {
            self.job = None;
        }
        FadeStep { alpha, switch_to }
    }
}

impl SceneTransition for SceneFader {
    fn fade_to_scene(&mut self, scene: GameScene) -> Result<(), TransitionError> {
        if self.overlay.is_none() {
            return Err(TransitionError::Unavailable);
        }
        if self.job.is_some() {
            return Err(TransitionError::Busy);
        }
        debug!("fading to {scene}");
        self.job = Some(FadeJob {
            scene,
            phase: Phase::Out(0.0),
        });
        Ok(())
    }
}

/// Fades to `scene`, or switches straight away when no fade can run.
pub fn go_to(fader: Option<&mut SceneFader>, next: &mut NextState<GameScene>, scene: GameScene) {
    let faded = match fader {
        Some(fader) => fader.fade_to_scene(scene),
        None => Err(TransitionError::Unavailable),
    };
    match faded {
        Ok(()) => {}
        Err(TransitionError::Busy) => debug!("ignoring switch to {scene}, already fading"),
        Err(e) => {
            warn!("fade to {scene} failed ({e}), switching directly");
            next.set(scene);
        }
    }
}

fn spawn_overlay(mut commands: Commands) {
    let overlay = commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                ..default()
            },
            BackgroundColor(Color::NONE),
            GlobalZIndex(100),
            Pickable::IGNORE,
        ))
        .id();
    commands.insert_resource(SceneFader::new(overlay));
}

fn run_fade(
    time: Res<Time>,
    fader: Option<ResMut<SceneFader>>,
    mut next: ResMut<NextState<GameScene>>,
    mut backgrounds: Query<&mut BackgroundColor>,
) {
    let Some(mut fader) = fader else {
        return;
    };
    if !fader.is_fading() {
        return;
    }
    let step = fader.advance(time.delta_secs());
    if let Some(mut bg) = fader.overlay.and_then(|e| backgrounds.get_mut(e).ok()) {
        bg.0 = Color::srgba(0.0, 0.0, 0.0, step.alpha);
    }
    if let Some(scene) = step.switch_to {
        info!("switching to {scene}");
        next.set(scene);
    }
}

#[derive(Resource)]
struct SplashTimer(Timer);

fn spawn_splash(mut commands: Commands) {
    commands.insert_resource(SplashTimer(Timer::from_seconds(SPLASH, TimerMode::Once)));
    commands.spawn((Camera2d, DespawnOnExit(GameScene::Splash)));
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(Color::BLACK),
            DespawnOnExit(GameScene::Splash),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("Zone Chase"),
                TextFont {
                    font_size: 48.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
        });
}

fn advance_splash(
    time: Res<Time>,
    mut timer: ResMut<SplashTimer>,
    mut fader: Option<ResMut<SceneFader>>,
    mut next: ResMut<NextState<GameScene>>,
) {
    if timer.0.tick(time.delta()).just_finished() {
        go_to(fader.as_deref_mut(), &mut next, GameScene::Intro);
    }
}
