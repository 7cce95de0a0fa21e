//! Media naming: maps teams, colors and matchups onto mixer source names.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

/// Side of the pitch reported by telemetry (`winner_team_num`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Team number 0.
    Blue,
    /// Team number 1.
    Orange,
}

impl Side {
    /// Map a telemetry team number onto a side.
    pub fn from_team_num(team_num: i64) -> Option<Self> {
        match team_num {
            0 => Some(Self::Blue),
            1 => Some(Self::Orange),
            _ => None,
        }
    }

    /// Color used for the victory video of this side.
    pub fn color(self) -> TeamColor {
        match self {
            Self::Blue => TeamColor::Blau,
            Self::Orange => TeamColor::Pink,
        }
    }

    /// Label shown to operators.
    pub fn label(self) -> &'static str {
        match self {
            Self::Blue => "Blue/Cyan",
            Self::Orange => "Orange/Pink",
        }
    }
}

/// Color variant of a victory video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamColor {
    /// Blue side rendition.
    Blau,
    /// Orange side rendition.
    Pink,
}

impl TeamColor {
    /// Every known color.
    pub const ALL: [TeamColor; 2] = [TeamColor::Blau, TeamColor::Pink];

    /// Token used inside file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blau => "BLAU",
            Self::Pink => "PINK",
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamColor {
    type Err = MediaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| MediaError::UnknownColor(value.to_string()))
    }
}

/// Reasons a media reference cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Team is not part of the configured vocabulary.
    #[error("Unknown team '{0}'")]
    UnknownTeam(String),
    /// Color is neither BLAU nor PINK.
    #[error("Unknown color '{0}'. Valid colors: BLAU, PINK")]
    UnknownColor(String),
}

/// Resolved name of a playable source on the video mixers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    /// Victory video for `team` in `color`, e.g. `WIN HSMW BLAU.mp4`.
    ///
    /// The color token is always the last word and comes from a closed set, so
    /// distinct (team, color) pairs never collide.
    pub fn victory(teams: &[String], team: &str, color: TeamColor) -> Result<Self, MediaError> {
        if !teams.iter().any(|known| known == team) {
            return Err(MediaError::UnknownTeam(team.to_string()));
        }
        Ok(Self(format!("WIN {team} {color}.mp4")))
    }

    /// Matchup video for a pairing, e.g. `HSMW vs UIA.mp4`.
    pub fn matchup(aliases: &HashMap<String, String>, blue: &str, orange: &str) -> Self {
        let alias = |team: &str| {
            aliases
                .get(team)
                .cloned()
                .unwrap_or_else(|| team.to_string())
        };
        Self(format!("{} vs {}.mp4", alias(blue), alias(orange)))
    }

    /// Source name as known by the mixer.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
