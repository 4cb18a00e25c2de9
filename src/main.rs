// Main
mod chase;
mod contact;
mod level;
mod menu;
mod outcome;
mod pickup;
mod player;
mod scanner;
mod scenes;
mod settings;
mod transition;
mod zone;

use bevy::prelude::*;
use chase::ChasePlugin;
use contact::ContactPlugin;
use level::LevelPlugin;
use menu::MenuPlugin;
use outcome::OutcomePlugin;
use pickup::PickupPlugin;
use player::PlayerPlugin;
use scanner::ScannerPlugin;
use scenes::GameScene;
use settings::SettingsPlugin;
use transition::TransitionPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Zone Chase".into(),
                ..default()
            }),
            ..default()
        }))
        .init_state::<GameScene>()
        .add_plugins((
            SettingsPlugin,
            TransitionPlugin,
            MenuPlugin,
            LevelPlugin,
            PlayerPlugin,
            ContactPlugin,
            ChasePlugin,
            PickupPlugin,
            ScannerPlugin,
            OutcomePlugin,
        ))
        .run();
}
