//! Show a source, restart it, and guarantee it is hidden again.
//!
//! Every entry point (telemetry events and commands) goes through [`play`], so
//! the one-pending-hide-per-key rule holds regardless of who triggered playback.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    backend::BackendRole,
    error::PlaybackError,
    state::{
        HideKey, SharedState,
        matches::MatchEntry,
        media::{MediaReference, Side, TeamColor},
    },
};

/// Result of [`announce_winner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinAnnouncement {
    /// Winning side.
    pub side: Side,
    /// Winning team name from the current match.
    pub team_name: String,
    /// Victory video that was started.
    pub video: MediaReference,
}

/// Show `source` in `scene` on `role`, restart it, and hide it after `hide_after`.
///
/// A hide already pending for the same (backend, scene, source) is cancelled and
/// replaced. Once the source has been located a hide is always scheduled, even if
/// showing or restarting it fails afterwards.
pub async fn play(
    state: &SharedState,
    role: BackendRole,
    scene: &str,
    source: &str,
    hide_after: Duration,
) -> Result<(), PlaybackError> {
    let mixer = state
        .connections()
        .mixer(role)
        .ok_or(PlaybackError::BackendUnavailable(role))?;
    let item_id = mixer
        .get_scene_item(scene, source)
        .await
        .map_err(|err| PlaybackError::from_mixer(role, scene, source, err))?;

    let key = HideKey::new(role, scene, source);
    let generation = state.hide_timers().reserve(&key);

    let shown = async {
        mixer.set_item_visible(scene, item_id, true).await?;
        mixer.restart_media(source).await
    }
    .await
    .map_err(|err| PlaybackError::from_mixer(role, scene, source, err));

    let hide = tokio::spawn(hide_after_delay(
        state.clone(),
        key.clone(),
        generation,
        item_id,
        hide_after,
    ));
    state
        .hide_timers()
        .arm(&key, generation, hide.abort_handle());

    shown?;
    info!(%role, scene, source, hide_after_secs = hide_after.as_secs_f64(), "media started");
    Ok(())
}

async fn hide_after_delay(
    state: SharedState,
    key: HideKey,
    generation: u64,
    item_id: i64,
    delay: Duration,
) {
    sleep(delay).await;
    if !state.hide_timers().fire(&key, generation) {
        return;
    }

    let Some(mixer) = state.connections().mixer(key.backend) else {
        info!(
            role = %key.backend,
            scene = %key.scene,
            source = %key.source,
            "video mixer not connected; dropping hide"
        );
        return;
    };

    match mixer.set_item_visible(&key.scene, item_id, false).await {
        Ok(()) => debug!(role = %key.backend, scene = %key.scene, source = %key.source, "media hidden"),
        Err(err) => warn!(
            role = %key.backend,
            scene = %key.scene,
            source = %key.source,
            error = %err,
            "failed to hide media"
        ),
    }
}

/// Run [`play`] concurrently on every connected video mixer.
///
/// Succeeds when at least one mixer played; a mixer that is missing or fails
/// never prevents the others from playing.
pub async fn play_everywhere(
    state: &SharedState,
    scene: &str,
    source: &str,
    hide_after: Duration,
) -> Result<(), PlaybackError> {
    let roles: Vec<BackendRole> = state
        .connections()
        .available_mixers()
        .into_iter()
        .map(|(role, _)| role)
        .collect();
    if roles.is_empty() {
        warn!(scene, source, "no video mixer connected");
        return Err(PlaybackError::BackendUnavailable(
            BackendRole::VideoMixerPrimary,
        ));
    }

    let results = join_all(
        roles
            .iter()
            .map(|role| play(state, *role, scene, source, hide_after)),
    )
    .await;

    let mut first_error = None;
    let mut played = false;
    for (role, result) in roles.iter().zip(results) {
        match result {
            Ok(()) => played = true,
            Err(err) => {
                warn!(%role, scene, source, error = %err, "playback failed");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) if !played => Err(err),
        _ => Ok(()),
    }
}

/// Play the victory video of `team` in `color` on every connected mixer.
///
/// The team is checked against the configured vocabulary before anything is sent.
pub async fn play_video(
    state: &SharedState,
    team: &str,
    color: TeamColor,
) -> Result<MediaReference, PlaybackError> {
    let config = state.config();
    let video = MediaReference::victory(&config.teams, team, color)?;
    play_everywhere(
        state,
        &config.scenes.win_scene,
        video.as_str(),
        config.delays.video(),
    )
    .await?;
    Ok(video)
}

/// Play the victory audio stinger.
pub async fn play_audio(state: &SharedState) -> Result<(), PlaybackError> {
    let config = state.config();
    play_everywhere(
        state,
        &config.scenes.audio_scene,
        &config.scenes.audio_source,
        config.delays.audio(),
    )
    .await
}

/// Play the matchup video of the current match, plus its audio stinger.
///
/// The finale stinger is used for the last configured match. A failing stinger
/// is logged and does not fail the matchup.
pub async fn play_matchup(state: &SharedState) -> Result<MediaReference, PlaybackError> {
    let config = state.config();
    let (current, is_final) = {
        let registry = state.matches().read().await;
        let current = registry.current()?;
        let is_final = registry.is_final(current.index);
        (current, is_final)
    };
    let video = MediaReference::matchup(
        &config.matchup_aliases,
        &current.pairing.blue_team,
        &current.pairing.orange_team,
    );
    let audio_source = if is_final {
        &config.scenes.matchup_audio_finale_source
    } else {
        &config.scenes.matchup_audio_source
    };

    let (video_result, audio_result) = tokio::join!(
        play_everywhere(
            state,
            &config.scenes.matchup_scene,
            video.as_str(),
            config.delays.matchup(),
        ),
        play_everywhere(
            state,
            &config.scenes.audio_scene,
            audio_source,
            config.delays.audio(),
        ),
    );
    if let Err(err) = audio_result {
        warn!(source = %audio_source, error = %err, "matchup audio failed");
    }
    video_result?;

    info!(
        match_number = current.number(),
        video = %video,
        finale = is_final,
        "matchup started"
    );
    Ok(video)
}

/// Hide every item of the matchup scene now and cancel its pending hides.
///
/// Returns how many items were hidden across all mixers.
pub async fn hide_matchup(state: &SharedState) -> Result<usize, PlaybackError> {
    let scene = state.config().scenes.matchup_scene.clone();
    let cancelled = state
        .hide_timers()
        .cancel_where(|key| key.scene == scene);
    debug!(scene = %scene, cancelled, "cancelled pending matchup hides");

    let mixers = state.connections().available_mixers();
    if mixers.is_empty() {
        return Err(PlaybackError::BackendUnavailable(
            BackendRole::VideoMixerPrimary,
        ));
    }

    let mut hidden = 0;
    let mut first_error = None;
    let mut reached = false;
    for (role, mixer) in mixers {
        let items = match mixer.scene_items(&scene).await {
            Ok(items) => items,
            Err(err) => {
                let err = PlaybackError::from_mixer(role, &scene, "*", err);
                warn!(%role, error = %err, "cannot list matchup items");
                first_error.get_or_insert(err);
                continue;
            }
        };
        reached = true;
        for item in items {
            match mixer.set_item_visible(&scene, item.id, false).await {
                Ok(()) => hidden += 1,
                Err(err) => warn!(
                    %role,
                    source = %item.source_name,
                    error = %err,
                    "failed to hide matchup item"
                ),
            }
        }
    }

    match first_error {
        Some(err) if !reached => Err(err),
        _ => {
            info!(hidden, "matchup hidden");
            Ok(hidden)
        }
    }
}

/// Goal celebration: goal video and goal audio, independently.
pub async fn play_goal(state: &SharedState) {
    let config = state.config();
    let (video, audio) = tokio::join!(
        play_everywhere(
            state,
            &config.scenes.goal_video_scene,
            &config.scenes.goal_video_source,
            config.delays.video(),
        ),
        play_everywhere(
            state,
            &config.scenes.audio_scene,
            &config.scenes.goal_audio_source,
            config.delays.audio(),
        ),
    );
    if let Err(err) = video {
        warn!(error = %err, "goal video failed");
    }
    if let Err(err) = audio {
        warn!(error = %err, "goal audio failed");
    }
}

/// Play the victory video of the team on `side` of the current match, then the audio stinger.
///
/// Both plays are always attempted; the video error wins if both fail.
pub async fn announce_winner(
    state: &SharedState,
    side: Side,
) -> Result<WinAnnouncement, PlaybackError> {
    let current: MatchEntry = state.matches().read().await.current()?;
    let team_name = current.pairing.team(side).to_string();
    info!(
        match_number = current.number(),
        side = side.label(),
        team = %team_name,
        "match won"
    );

    let video = play_video(state, &team_name, side.color()).await;
    let audio = play_audio(state).await;

    let video = video?;
    audio?;
    Ok(WinAnnouncement {
        side,
        team_name,
        video,
    })
}
