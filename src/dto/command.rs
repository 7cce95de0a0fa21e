use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use validator::Validate;

use crate::{
    error::AppError,
    state::{
        matches::MatchEntry,
        media::{MediaReference, Side, TeamColor},
    },
};

/// Request decoded from one command-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play the matchup video of the current match.
    PlayMatchup,
    /// Hide every matchup video immediately.
    HideMatchup,
    /// Play the victory video of `team` in `color`.
    PlayVideo {
        /// Team name from the configured vocabulary.
        team: String,
        /// Jersey color of the video.
        color: TeamColor,
    },
    /// Play the victory audio stinger.
    PlayAudio,
    /// Simulate a match end won by `side` of the current match.
    TriggerWin {
        /// Winning side.
        side: Side,
    },
    /// Select another match.
    SetMatch {
        /// Requested zero-based index, range-checked by the registry.
        match_index: i64,
    },
    /// Read the current match.
    GetCurrentMatch,
    /// Read every configured match.
    ListMatches,
}

#[derive(Debug, Deserialize)]
struct PlayVideoParams {
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct TriggerWinParams {
    #[serde(default)]
    #[validate(range(min = 0, max = 1))]
    team_num: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SetMatchParams {
    #[serde(default)]
    match_index: Option<i64>,
}

impl Command {
    /// Decode and validate a raw text frame.
    ///
    /// Validation happens entirely here or in the scheduler's resolution step,
    /// so a rejected command never reaches a mixer.
    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| AppError::InvalidJson)?;
        let Value::Object(fields) = value else {
            return Err(AppError::BadRequest(
                "Command must be a JSON object".to_string(),
            ));
        };
        let name = fields
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();

        match name.as_str() {
            "play_matchup" => Ok(Self::PlayMatchup),
            "hide_matchup" => Ok(Self::HideMatchup),
            "play_audio" => Ok(Self::PlayAudio),
            "get_current_match" => Ok(Self::GetCurrentMatch),
            "list_matches" => Ok(Self::ListMatches),
            "play_video" => {
                let params: PlayVideoParams = params(fields)?;
                let (Some(team), Some(color)) = (
                    params.team.filter(|team| !team.is_empty()),
                    params.color.filter(|color| !color.is_empty()),
                ) else {
                    return Err(AppError::BadRequest(
                        "Missing 'team' or 'color' parameter".to_string(),
                    ));
                };
                Ok(Self::PlayVideo {
                    team,
                    color: color.parse()?,
                })
            }
            "trigger_win" => {
                let params: TriggerWinParams = params(fields)?;
                params.validate()?;
                let side = params
                    .team_num
                    .and_then(Side::from_team_num)
                    .ok_or_else(|| {
                        AppError::BadRequest(
                            "Missing 'team_num' parameter (0=blue, 1=orange)".to_string(),
                        )
                    })?;
                Ok(Self::TriggerWin { side })
            }
            "set_match" => {
                let params: SetMatchParams = params(fields)?;
                let match_index = params.match_index.ok_or_else(|| {
                    AppError::BadRequest("Missing 'match_index' parameter".to_string())
                })?;
                Ok(Self::SetMatch { match_index })
            }
            _ => Err(AppError::UnknownCommand(name)),
        }
    }

    /// Canonical command name echoed in responses.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayMatchup => "play_matchup",
            Self::HideMatchup => "hide_matchup",
            Self::PlayVideo { .. } => "play_video",
            Self::PlayAudio => "play_audio",
            Self::TriggerWin { .. } => "trigger_win",
            Self::SetMatch { .. } => "set_match",
            Self::GetCurrentMatch => "get_current_match",
            Self::ListMatches => "list_matches",
        }
    }
}

fn params<T: DeserializeOwned>(fields: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|err| AppError::BadRequest(format!("Invalid parameters: {err}")))
}

/// Outcome field of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The command ran.
    Success,
    /// The command was rejected or failed.
    Error,
}

/// Position and teams of a match as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// Zero-based position.
    pub match_index: usize,
    /// One-based sequence number.
    pub match_number: usize,
    /// Team on the blue side.
    pub blue_team: String,
    /// Team on the orange side.
    pub orange_team: String,
}

impl From<MatchEntry> for MatchSummary {
    fn from(entry: MatchEntry) -> Self {
        Self {
            match_index: entry.index,
            match_number: entry.number(),
            blue_team: entry.pairing.blue_team,
            orange_team: entry.pairing.orange_team,
        }
    }
}

/// Command-specific part of a response, flattened next to `status` and `command`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    /// Human-readable confirmation or error description.
    Message {
        /// Text shown to the operator.
        message: String,
    },
    /// Confirmation plus the resolved source.
    Started {
        /// Text shown to the operator.
        message: String,
        /// Source that was started.
        video: MediaReference,
    },
    /// Victory video that was started.
    Video {
        /// Source that was started.
        video: MediaReference,
    },
    /// Simulated match end.
    Win {
        /// Side label, `Blue/Cyan` or `Orange/Pink`.
        team: &'static str,
        /// Winning team.
        team_name: String,
        /// Victory video that was started.
        video: MediaReference,
    },
    /// Matchup items hidden by `hide_matchup`.
    Hidden {
        /// Text shown to the operator.
        message: String,
        /// Items hidden across all mixers.
        hidden: usize,
    },
    /// A single match.
    Match(MatchSummary),
    /// Every configured match.
    Matches {
        /// Matches in configured order.
        matches: Vec<MatchSummary>,
        /// Selected match, `None` when none is configured.
        current_match_index: Option<usize>,
    },
}

/// Exactly one of these is sent back for every inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    /// Success or error.
    pub status: ResponseStatus,
    /// Echo of the executed command; absent on errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'static str>,
    /// Command-specific fields.
    #[serde(flatten)]
    pub outcome: CommandOutcome,
}

impl CommandResponse {
    /// Successful execution of `command`.
    pub fn success(command: &Command, outcome: CommandOutcome) -> Self {
        Self {
            status: ResponseStatus::Success,
            command: Some(command.name()),
            outcome,
        }
    }

    /// Failure with a description and no command echo.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            command: None,
            outcome: CommandOutcome::Message {
                message: message.into(),
            },
        }
    }
}

impl From<AppError> for CommandResponse {
    fn from(err: AppError) -> Self {
        Self::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_play_video() {
        let command =
            Command::from_json_str(r#"{"command":"play_video","team":"HSMW","color":"blau"}"#)
                .unwrap();
        assert_eq!(
            command,
            Command::PlayVideo {
                team: "HSMW".into(),
                color: TeamColor::Blau
            }
        );
    }

    #[test]
    fn command_names_are_case_insensitive() {
        let command = Command::from_json_str(r#"{"command":"PLAY_Audio"}"#).unwrap();
        assert_eq!(command, Command::PlayAudio);
        assert_eq!(command.name(), "play_audio");
    }

    #[test]
    fn non_json_payload_is_rejected() {
        let err = Command::from_json_str("not json at all").unwrap_err();
        assert!(matches!(err, AppError::InvalidJson));
    }

    #[test]
    fn missing_color_is_reported() {
        let err = Command::from_json_str(r#"{"command":"play_video","team":"HSMW"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Missing 'team' or 'color' parameter");

        let err =
            Command::from_json_str(r#"{"command":"play_video","team":"","color":"PINK"}"#)
                .unwrap_err();
        assert_eq!(err.to_string(), "Missing 'team' or 'color' parameter");
    }

    #[test]
    fn unknown_color_is_a_validation_error() {
        let err = Command::from_json_str(r#"{"command":"play_video","team":"HSMW","color":"GREEN"}"#)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn trigger_win_maps_team_num_to_side() {
        let command = Command::from_json_str(r#"{"command":"trigger_win","team_num":1}"#).unwrap();
        assert_eq!(command, Command::TriggerWin { side: Side::Orange });

        let err = Command::from_json_str(r#"{"command":"trigger_win","team_num":2}"#).unwrap_err();
        assert!(err.to_string().starts_with("validation failed"));

        let err = Command::from_json_str(r#"{"command":"trigger_win"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing 'team_num' parameter (0=blue, 1=orange)"
        );
    }

    #[test]
    fn set_match_keeps_negative_index_for_registry_check() {
        let command = Command::from_json_str(r#"{"command":"set_match","match_index":-1}"#).unwrap();
        assert_eq!(command, Command::SetMatch { match_index: -1 });
    }

    #[test]
    fn unknown_command_lists_valid_commands() {
        let err = Command::from_json_str(r#"{"command":"dance"}"#).unwrap_err();
        assert!(err.to_string().starts_with("Unknown command: dance. Valid commands:"));
    }

    #[test]
    fn success_response_shape() {
        let command = Command::PlayVideo {
            team: "HSMW".into(),
            color: TeamColor::Blau,
        };
        let teams = vec!["HSMW".to_string()];
        let video = MediaReference::victory(&teams, "HSMW", TeamColor::Blau).unwrap();
        let response = CommandResponse::success(&command, CommandOutcome::Video { video });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": "success", "command": "play_video", "video": "WIN HSMW BLAU.mp4"})
        );
    }

    #[test]
    fn error_response_shape() {
        let response = CommandResponse::from(AppError::InvalidJson);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": "error", "message": "Invalid JSON"})
        );
    }
}
