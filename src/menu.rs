// Intro, game over and win screens.

use bevy::prelude::*;
use bevy::window::CursorOptions;

use crate::player::release;
use crate::scenes::GameScene;
use crate::transition::{SceneFader, go_to};

pub struct MenuPlugin;

impl Plugin for MenuPlugin {
    fn build(&self, app: &mut App) {
        for scene in [GameScene::Intro, GameScene::GameOver, GameScene::Win] {
            app.add_systems(OnEnter(scene), (setup_screen, release_cursor))
                .add_systems(
                    Update,
                    (button_visuals, button_actions).run_if(in_state(scene)),
                );
        }
    }
}

const NORMAL_BUTTON: Color = Color::srgb(0.15, 0.15, 0.15);
const HOVERED_BUTTON: Color = Color::srgb(0.25, 0.25, 0.25);
const PRESSED_BUTTON: Color = Color::srgb(0.35, 0.35, 0.35);

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
enum MenuButton {
    Start,
    Restart,
    MainMenu,
    #[cfg(not(target_arch = "wasm32"))]
    Quit,
}

impl MenuButton {
    fn label(self) -> &'static str {
        match self {
            MenuButton::Start => "Start",
            MenuButton::Restart => "Restart",
            MenuButton::MainMenu => "Main Menu",
            #[cfg(not(target_arch = "wasm32"))]
            MenuButton::Quit => "Quit",
        }
    }

    /// The scene this button leads to. `None` quits.
    fn target(self) -> Option<GameScene> {
        match self {
            MenuButton::Start | MenuButton::Restart => Some(GameScene::Main),
            MenuButton::MainMenu => Some(GameScene::Intro),
            #[cfg(not(target_arch = "wasm32"))]
            MenuButton::Quit => None,
        }
    }
}

/// Title and buttons shown on each menu scene.
fn layout(scene: GameScene) -> (&'static str, Vec<MenuButton>) {
    let buttons = match scene {
        GameScene::GameOver | GameScene::Win => vec![
            MenuButton::Restart,
            MenuButton::MainMenu,
            #[cfg(not(target_arch = "wasm32"))]
            MenuButton::Quit,
        ],
        _ => vec![
            MenuButton::Start,
            #[cfg(not(target_arch = "wasm32"))]
            MenuButton::Quit,
        ],
    };

    let title = match scene {
        GameScene::GameOver => "It caught you",
        GameScene::Win => "Everything is packed",
        _ => "Zone Chase",
    };
    (title, buttons)
}

fn setup_screen(mut commands: Commands, scene: Res<State<GameScene>>) {
    let scene = *scene.get();
    let (title, buttons) = layout(scene);

    commands.spawn((Camera2d, DespawnOnExit(scene)));
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(24.0),
                ..default()
            },
            BackgroundColor(Color::BLACK),
            DespawnOnExit(scene),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new(title),
                TextFont {
                    font_size: 48.0,
                    ..default()
                },
                TextColor(Color::WHITE),
                Node {
                    margin: UiRect::bottom(Val::Px(32.0)),
                    ..default()
                },
            ));
            for button in buttons {
                spawn_button(parent, button);
            }
        });
}

fn spawn_button(parent: &mut ChildSpawnerCommands, marker: MenuButton) {
    parent
        .spawn((
            marker,
            Button,
            Node {
                width: Val::Px(200.0),
                height: Val::Px(50.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(2.0)),
                ..default()
            },
            BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.3)),
            BackgroundColor(NORMAL_BUTTON),
        ))
        .with_children(|btn| {
            btn.spawn((
                Text::new(marker.label()),
                TextFont {
                    font_size: 24.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
        });
}

fn release_cursor(mut cursor: Query<&mut CursorOptions>) {
    for mut cursor in &mut cursor {
        release(&mut cursor);
    }
}

fn button_visuals(
    mut query: Query<
        (&Interaction, &mut BackgroundColor, &mut BorderColor),
        (Changed<Interaction>, With<MenuButton>),
    >,
) {
    for (interaction, mut bg, mut border) in &mut query {
        match *interaction {
            Interaction::Pressed => {
                *bg = PRESSED_BUTTON.into();
                *border = BorderColor::all(Color::WHITE);
            }
            Interaction::Hovered => {
                *bg = HOVERED_BUTTON.into();
                *border = BorderColor::all(Color::WHITE);
            }
            Interaction::None => {
                *bg = NORMAL_BUTTON.into();
                *border = BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.3));
            }
        }
    }
}

fn button_actions(
    query: Query<(&Interaction, &MenuButton), Changed<Interaction>>,
    mut fader: Option<ResMut<SceneFader>>,
    mut next: ResMut<NextState<GameScene>>,
    #[cfg(not(target_arch = "wasm32"))] mut exit: MessageWriter<AppExit>,
) {
    for (interaction, button) in &query {
        if *interaction != Interaction::Pressed {
            continue;
        }
        match button.target() {
            Some(scene) => go_to(fader.as_deref_mut(), &mut next, scene),
            #[cfg(not(target_arch = "wasm32"))]
            None => {
                exit.write(AppExit::Success);
            }
            #[cfg(target_arch = "wasm32")]
            None => {}
        }
    }
}
