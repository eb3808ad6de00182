//! The playback controller: owns the playlist and the playback state, and is
//! the only thing that mutates them. Every mutation is persisted and, where
//! the background process needs to act, mirrored as a command.

mod bindings;

pub use bindings::{bind_player_events, PLAYBACK_ERROR_NOTICE};

use soundcloudify_channel::{Command, CommandSink, TimeUpdate};
use soundcloudify_core::{PlaybackState, RemoteId, RepeatMode, Track};
use soundcloudify_store::{Persistence, Session};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("no track at index {index} (playlist has {len})")]
    TrackNotFound { index: usize, len: usize },
}

pub struct PlayerController {
    tracks: Vec<Track>,
    state: PlaybackState,
    commands: Box<dyn CommandSink>,
    persistence: Persistence,
}

impl std::fmt::Debug for PlayerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerController")
            .field("tracks", &self.tracks.len())
            .field("state", &self.state)
            .finish()
    }
}

impl PlayerController {
    pub fn new(
        session: Session,
        commands: impl CommandSink + 'static,
        persistence: Persistence,
    ) -> Self {
        Self {
            tracks: session.tracks,
            state: session.state,
            commands: Box::new(commands),
            persistence,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Prepends a copy of `track` with a fresh entry id. With `and_play` the
    /// new entry starts playing right away.
    pub fn add(&mut self, track: &Track, and_play: bool) {
        let entry = track.fresh_copy();
        debug!(id = %entry.id, title = %entry.title, and_play, "adding track");
        self.tracks.insert(0, entry);
        self.persist_list();

        if and_play {
            self.begin(0);
            self.persist_state();
        } else if self.state.current_track.is_some() {
            // The current entry moved down by one.
            self.state.current_index += 1;
            self.persist_state();
        }
    }

    /// Queues a copy of `track` right after the current entry.
    pub fn play_next(&mut self, track: &Track) {
        let entry = track.fresh_copy();
        let at = (self.state.current_index + 1).min(self.tracks.len());
        debug!(id = %entry.id, at, "queueing track to play next");
        self.tracks.insert(at, entry);
        self.persist_list();
    }

    /// Replaces the whole playlist and starts from its first entry.
    pub fn play_all(&mut self, tracks: Vec<Track>) -> Result<(), PlayerError> {
        if tracks.is_empty() {
            return Err(PlayerError::TrackNotFound { index: 0, len: 0 });
        }

        self.tracks = tracks;
        for track in self.tracks.iter_mut() {
            track.ensure_uuid();
        }
        self.persist_list();

        self.state.reset_playback();
        self.play(0)
    }

    /// Removes the entry at `index`. Removing the current entry moves playback
    /// to whatever takes its place (the new last entry when the tail was
    /// removed); removing the last remaining entry stops playback.
    pub fn remove(&mut self, index: usize) {
        if index >= self.tracks.len() {
            debug!(index, len = self.tracks.len(), "remove out of range; ignoring");
            return;
        }

        let removed = self.tracks.remove(index);
        debug!(index, title = %removed.title, "removed track");

        if self.state.current_track.is_some() && index == self.state.current_index {
            if self.tracks.is_empty() {
                self.state.reset_playback();
                self.commands.send(Command::Clear);
            } else {
                self.begin(index.min(self.tracks.len() - 1));
            }
        } else if index < self.state.current_index {
            self.state.current_index -= 1;
        }

        self.persist_list();
        self.persist_state();
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.state.reset_playback();
        self.commands.send(Command::Clear);
        self.persist_list();
        self.persist_state();
    }

    /// Starts the entry at `index` from the beginning. Fails without touching
    /// any state when there is no such entry.
    pub fn play(&mut self, index: usize) -> Result<(), PlayerError> {
        if index >= self.tracks.len() {
            return Err(PlayerError::TrackNotFound {
                index,
                len: self.tracks.len(),
            });
        }
        self.begin(index);
        self.persist_state();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.state.playing = false;
        self.persist_state();
        self.commands.send(Command::Pause);
    }

    pub fn resume(&mut self) {
        self.state.playing = true;
        self.persist_state();
        self.commands.send(Command::Resume);
    }

    /// Local-only: the background process already stopped on its own.
    pub fn stop(&mut self) {
        self.state.playing = false;
        self.state.current_time = 0.0;
        self.persist_state();
    }

    /// Toggles the current entry, or plays `index` if it names another one.
    /// With nothing loaded yet, plays `index` (or the current index).
    pub fn play_pause(&mut self, index: Option<usize>) -> Result<(), PlayerError> {
        if self.state.current_track.is_none() {
            return self.play(index.unwrap_or(self.state.current_index));
        }

        match index {
            Some(index) if index != self.state.current_index => self.play(index),
            _ => {
                if self.state.playing {
                    self.pause();
                } else {
                    self.resume();
                }
                Ok(())
            }
        }
    }

    /// The background process resolves repeat and shuffle, so advancing is
    /// only a request.
    pub fn next(&mut self) {
        self.commands.send(Command::Next);
    }

    pub fn previous(&mut self) {
        self.commands.send(Command::Prev);
    }

    pub fn seek(&mut self, fraction: f64) {
        if !fraction.is_finite() {
            warn!(fraction, "ignoring seek to non-finite position");
            return;
        }
        let xpos = fraction.clamp(0.0, 1.0);
        self.state.current_time = xpos * self.state.duration;
        self.commands.send(Command::Seek { xpos });
    }

    /// Mirrors a progress tick. When nothing is current (e.g. after a reload
    /// while the background kept playing) the reported track is adopted.
    pub fn update_state(&mut self, update: TimeUpdate) {
        if self.state.current_track.is_none() {
            if let Some(track) = update.track {
                debug!(title = %track.title, "adopting track reported by background");
                self.adopt_current(track, None);
                self.state.playing = true;
            }
        }
        self.state.current_time = update.current_time;
        self.state.duration = update.duration;
    }

    /// Takes over a full state pushed by the background process.
    pub fn replace_state(&mut self, mut state: PlaybackState) {
        state.volume = state.volume.clamp(0.0, 1.0);
        let current = state.current_track.take();
        let hint = state.current_index;
        self.state = state;

        match current {
            Some(track) => self.adopt_current(track, Some(hint)),
            None => self.state.current_index = 0,
        }
        self.persist_state();
    }

    pub fn is_playing(&self, track_id: &RemoteId) -> bool {
        self.state
            .current_track
            .as_ref()
            .is_some_and(|track| &track.id == track_id)
    }

    /// Applies and forwards the volume at once; the save waits for the slider
    /// to settle.
    pub fn set_volume(&mut self, volume: f64) {
        if !volume.is_finite() {
            warn!(volume, "ignoring non-finite volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        self.commands.send(Command::Volume { volume });
        self.persistence.save_state_debounced(&self.state);
    }

    pub fn toggle_repeat(&mut self) -> RepeatMode {
        self.state.repeat = self.state.repeat.cycle();
        self.persist_state();
        info!(repeat = self.state.repeat.as_str(), "toggle repeat");
        self.state.repeat
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.state.shuffle = !self.state.shuffle;
        self.persist_state();
        info!(shuffle = self.state.shuffle, "toggle shuffle");
        self.state.shuffle
    }

    pub fn mark_current_track_error(&mut self) {
        let Some(current) = self.state.current_track.as_mut() else {
            warn!("playback error reported with no current track");
            return;
        };
        current.error = true;

        let index = self
            .tracks
            .iter()
            .position(|t| t.same_entry(current))
            .unwrap_or(self.state.current_index);
        if let Some(entry) = self.tracks.get_mut(index) {
            entry.error = true;
        }
        info!(id = %current.id, title = %current.title, "track error");

        self.persist_state();
        self.persist_list();
    }

    fn begin(&mut self, index: usize) {
        let track = self.tracks[index].clone();
        debug!(index, title = %track.title, "play");
        self.state.playing = true;
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        self.state.current_index = index;
        self.state.current_track = Some(track.clone());
        self.commands.send(Command::Play { track });
    }

    /// Makes `track` current, pointing the index at its playlist entry. A
    /// track the playlist does not know is prepended so the index stays valid.
    fn adopt_current(&mut self, mut track: Track, hint: Option<usize>) {
        let by_entry = self.tracks.iter().position(|t| t.same_entry(&track));
        let by_hint = hint
            .filter(|&i| self.tracks.get(i).is_some_and(|t| t.id == track.id));

        let index = match by_entry.or(by_hint) {
            Some(index) => index,
            None => {
                track.ensure_uuid();
                self.tracks.insert(0, track.clone());
                self.persist_list();
                0
            }
        };

        track.uuid = self.tracks[index].uuid.clone();
        self.state.current_index = index;
        self.state.current_track = Some(track);
    }

    fn persist_list(&self) {
        self.persistence.save_list(&self.tracks);
    }

    fn persist_state(&self) {
        self.persistence.save_state(&self.state);
    }
}
