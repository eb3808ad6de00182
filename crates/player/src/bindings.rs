use crate::PlayerController;
use soundcloudify_channel::HandlerTable;
use tracing::{debug, warn};

pub const PLAYBACK_ERROR_NOTICE: &str = "Unable to play this track";

/// Wires background notifications to the player. `notify` shows a short
/// user-facing notice.
pub fn bind_player_events<N>(table: &mut HandlerTable<PlayerController>, mut notify: N)
where
    N: FnMut(&str) + Send + 'static,
{
    table.on_time_update(|player, update| player.update_state(update));

    table.on_track_changed(|player, state| {
        debug!("track changed from background");
        player.replace_state(state);
    });

    table.on_error(move |player| {
        warn!(
            title = player.state().current_track.as_ref().map(|t| t.title.as_str()),
            "background reported a playback error"
        );
        notify(PLAYBACK_ERROR_NOTICE);
        player.mark_current_track_error();
    });

    table.on_ended(|player| player.stop());
}
