use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::state::media::Side;

const MATCH_ENDED: &str = "game:match_ended";
const GOAL_SCORED: &str = "game:goal_scored";

/// Event envelope sent by the telemetry source.
#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Telemetry events the director reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A match finished; `winner` is the winning side.
    MatchEnded {
        /// Side that won.
        winner: Side,
    },
    /// A goal was scored.
    GoalScored,
    /// Any other event; ignored.
    Other(String),
}

/// Reasons a telemetry frame cannot be decoded.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// Not a JSON event envelope.
    #[error("malformed telemetry event: {0}")]
    Json(#[from] serde_json::Error),
    /// `game:match_ended` without a usable winner.
    #[error("match ended without a valid winner_team_num (got {0})")]
    InvalidWinner(Value),
}

impl TelemetryEvent {
    /// Decode one raw frame.
    pub fn from_json_str(raw: &str) -> Result<Self, EventDecodeError> {
        let RawEvent { event, data } = serde_json::from_str(raw)?;
        match event.as_str() {
            MATCH_ENDED => {
                let winner_num = data.get("winner_team_num").cloned().unwrap_or(Value::Null);
                let winner = winner_num
                    .as_i64()
                    .and_then(Side::from_team_num)
                    .ok_or(EventDecodeError::InvalidWinner(winner_num))?;
                Ok(Self::MatchEnded { winner })
            }
            GOAL_SCORED => Ok(Self::GoalScored),
            _ => Ok(Self::Other(event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_match_ended() {
        let event = TelemetryEvent::from_json_str(
            r#"{"event":"game:match_ended","data":{"winner_team_num":1,"game":{}}}"#,
        )
        .unwrap();
        assert_eq!(event, TelemetryEvent::MatchEnded { winner: Side::Orange });
    }

    #[test]
    fn decodes_goal_scored_and_other_events() {
        let goal = TelemetryEvent::from_json_str(r#"{"event":"game:goal_scored","data":{}}"#);
        assert_eq!(goal.unwrap(), TelemetryEvent::GoalScored);

        let other = TelemetryEvent::from_json_str(r#"{"event":"game:update_state"}"#);
        assert_eq!(other.unwrap(), TelemetryEvent::Other("game:update_state".into()));
    }

    #[test]
    fn match_ended_without_winner_is_rejected() {
        let err = TelemetryEvent::from_json_str(r#"{"event":"game:match_ended","data":{}}"#)
            .unwrap_err();
        assert!(matches!(err, EventDecodeError::InvalidWinner(Value::Null)));

        let err = TelemetryEvent::from_json_str(
            r#"{"event":"game:match_ended","data":{"winner_team_num":7}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, EventDecodeError::InvalidWinner(_)));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            TelemetryEvent::from_json_str("{{{"),
            Err(EventDecodeError::Json(_))
        ));
    }
}
