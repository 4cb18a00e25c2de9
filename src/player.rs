// First-person controller: mouse look, WASD movement with a small jump, cursor
// capture, and the sink played when the player is caught.
use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions};

use crate::contact::{Collider, Tag};
use crate::level::LevelStep;
use crate::outcome::{PlayerControls, level_in_play};
use crate::scenes::GameScene;
use crate::settings::GameSettings;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameScene::Main), spawn_player)
            .add_systems(
                Update,
                (toggle_cursor_grab, mouse_look)
                    .chain()
                    .run_if(in_state(GameScene::Main).and(level_in_play)),
            )
            .add_systems(Update, sink_player.run_if(in_state(GameScene::Main)))
            .add_systems(FixedUpdate, player_movement.in_set(LevelStep::Move));
    }
}

#[derive(Component)]
pub struct Player;

/// Tracks the player's yaw and pitch for composed camera rotation.
#[derive(Component, Default)]
pub struct PlayerLook {
    pub yaw: f32,
    pub pitch: f32,
}

/// Gates movement and look input.
#[derive(Component)]
pub struct PlayerControl {
    pub enabled: bool,
}

const EYE_HEIGHT: f32 = 1.5;
const MOUSE_SENSITIVITY: f32 = 0.003;
const MAX_PITCH: f32 = 1.3;
const PLAYER_RADIUS: f32 = 0.5;
pub const PLAYER_START: Vec3 = Vec3::new(0.0, EYE_HEIGHT, 8.0);

const GRAVITY: f32 = 9.81;
const JUMP_KEY: KeyCode = KeyCode::KeyJ;

const SINK_DURATION: f32 = 2.0;
const SINK_DEPTH: f32 = 5.0;

fn spawn_player(mut commands: Commands) {
    commands.spawn((
        Player,
        PlayerLook::default(),
        PlayerControl { enabled: true },
        Jump::default(),
        Tag::Player,
        Collider {
            radius: PLAYER_RADIUS,
        },
        Camera3d::default(),
        Projection::from(PerspectiveProjection {
            fov: std::f32::consts::FRAC_PI_2 * 0.8,
            near: 0.01,
            ..default()
        }),
        Transform::from_translation(PLAYER_START),
        DespawnOnExit(GameScene::Main),
    ));
}

/// The coordinator's view of the player: input gate plus window cursor.
pub struct PlayerRig<'a> {
    pub control: Option<&'a mut PlayerControl>,
    pub cursor: Option<&'a mut CursorOptions>,
}

impl PlayerControls for PlayerRig<'_> {
    fn disable_input(&mut self) {
        if let Some(control) = self.control.as_deref_mut() {
            control.enabled = false;
        }
    }

    fn release_cursor(&mut self) {
        if let Some(cursor) = self.cursor.as_deref_mut() {
            release(cursor);
        }
    }
}

pub fn release(cursor: &mut CursorOptions) {
    cursor.grab_mode = CursorGrabMode::None;
    cursor.visible = true;
}

fn toggle_cursor_grab(
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut cursor: Query<&mut CursorOptions>,
    control: Query<&PlayerControl, With<Player>>,
) {
    let Ok(mut cursor) = cursor.single_mut() else {
        return;
    };
    if !control.single().is_ok_and(|control| control.enabled) {
        return;
    }

    if mouse.just_pressed(MouseButton::Left) {
        cursor.grab_mode = CursorGrabMode::Locked;
        cursor.visible = false;
    }
    if keyboard.just_pressed(KeyCode::Escape) {
        release(&mut cursor);
    }
}

fn mouse_look(
    mut motion: MessageReader<MouseMotion>,
    mut query: Query<(&mut Transform, &mut PlayerLook, &PlayerControl), With<Player>>,
    cursor: Query<&CursorOptions>,
) {
    let Ok(cursor) = cursor.single() else {
        return;
    };
    if cursor.grab_mode != CursorGrabMode::Locked {
        motion.clear();
        return;
    }

    let mut delta = Vec2::ZERO;
    for ev in motion.read() {
        delta += ev.delta;
    }
    if delta == Vec2::ZERO {
        return;
    }

    let Ok((mut transform, mut look, control)) = query.single_mut() else {
        return;
    };
    if !control.enabled {
        return;
    }
    look.yaw -= delta.x * MOUSE_SENSITIVITY;
    look.pitch = (look.pitch - delta.y * MOUSE_SENSITIVITY).clamp(-MAX_PITCH, MAX_PITCH);
    transform.rotation = Quat::from_rotation_y(look.yaw) * Quat::from_rotation_x(look.pitch);
}

/// Vertical speed of a jump in progress. Zero while standing.
#[derive(Component, Debug, Default)]
pub struct Jump {
    velocity: f32,
}

impl Jump {
    pub fn is_airborne(&self) -> bool {
        self.velocity != 0.0
    }

    /// Starts a jump when standing at eye height.
    pub fn launch(&mut self, force: f32, height: f32) {
        if !self.is_airborne() && height <= EYE_HEIGHT {
            self.velocity = force;
        }
    }

    /// Applies gravity for `dt` and returns the new height, landing at eye height.
    pub fn fall(&mut self, height: f32, dt: f32) -> f32 {
        if !self.is_airborne() {
            return height;
        }
        self.velocity -= GRAVITY * dt;
        let next = height + self.velocity * dt;
        if next <= EYE_HEIGHT {
            self.velocity = 0.0;
            return EYE_HEIGHT;
        }
        next
    }
}

fn player_movement(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut query: Query<
        (&mut Transform, &PlayerLook, &PlayerControl, Option<&mut Jump>),
        With<Player>,
    >,
    settings: Res<GameSettings>,
    time: Res<Time>,
) {
    let Ok((mut transform, look, control, jump)) = query.single_mut() else {
        return;
    };
    if !control.enabled {
        return;
    }

    // Move on the ground plane regardless of pitch.
    let yaw = Quat::from_rotation_y(look.yaw);
    let forward = yaw * Vec3::NEG_Z;
    let right = yaw * Vec3::X;

    let mut movement = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        movement += forward;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        movement -= forward;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        movement += right;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        movement -= right;
    }

    let speed = if keyboard.pressed(KeyCode::ShiftLeft) {
        settings.run_speed
    } else {
        settings.walk_speed
    };

    transform.translation += movement.normalize_or_zero() * speed * time.delta_secs();

    if let Some(mut jump) = jump {
        if keyboard.pressed(JUMP_KEY) {
            jump.launch(settings.jump_force, transform.translation.y);
        }
        transform.translation.y = jump.fall(transform.translation.y, time.delta_secs());
    }
}

/// The caught player sinks into the ground over a couple of seconds.
#[derive(Component, Debug)]
pub struct Sinking {
    start: Vec3,
    elapsed: f32,
}

impl From<Vec3> for Sinking {
    fn from(start: Vec3) -> Self {
        Self {
            start,
            elapsed: 0.0,
        }
    }
}

impl Sinking {
    /// Advances the tween. Returns the new position and whether it finished.
    pub fn advance(&mut self, dt: f32) -> (Vec3, bool) {
        self.elapsed += dt;
        let t = (self.elapsed / SINK_DURATION).min(1.0);
        let end = self.start - Vec3::Y * SINK_DEPTH;
        (self.start.lerp(end, t), t >= 1.0)
    }
}

fn sink_player(
    mut commands: Commands,
    mut query: Query<(Entity, &mut Transform, &mut Sinking)>,
    time: Res<Time>,
) {
    for (entity, mut transform, mut sinking) in &mut query {
        let (position, done) = sinking.advance(time.delta_secs());
        transform.translation = position;
        if done {
            commands.entity(entity).remove::<Sinking>();
        }
    }
}
