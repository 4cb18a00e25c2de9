// Game scenes and their load identifiers.
use bevy::prelude::*;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Every scene the game can load. The string form is the identifier used by
/// load-by-name, the declaration order is the build index.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    States,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum GameScene {
    #[default]
    #[strum(serialize = "SplashScene")]
    Splash,
    #[strum(serialize = "IntroScene")]
    Intro,
    #[strum(serialize = "MainScene")]
    Main,
    #[strum(serialize = "GameOverScene")]
    GameOver,
    #[strum(serialize = "WinScene")]
    Win,
}

impl GameScene {
    pub fn build_index(self) -> usize {
        self as usize
    }

    pub fn from_build_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn identifiers_round_trip_through_names() {
        assert_eq!(GameScene::GameOver.as_ref(), "GameOverScene");
        assert_eq!(GameScene::from_str("WinScene").ok(), Some(GameScene::Win));
        assert!(GameScene::from_str("NoSuchScene").is_err());
    }

    #[test]
    fn build_indices_follow_declaration_order() {
        assert_eq!(GameScene::Splash.build_index(), 0);
        assert_eq!(GameScene::Main.build_index(), 2);
        assert_eq!(GameScene::from_build_index(3), Some(GameScene::GameOver));
        assert_eq!(GameScene::from_build_index(5), None);
    }
}
