use crate::NowPlayingStore;
use soundcloudify_core::{PlaybackState, Track};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum PersistRequest {
    List(Vec<Track>),
    State(PlaybackState),
    /// Saved once no further debounced save arrives for the quiet period.
    StateDebounced(PlaybackState),
    Flush(oneshot::Sender<()>),
}

/// Non-blocking handle the player uses to persist its data. Writes happen in
/// order on the writer task.
#[derive(Debug, Clone)]
pub struct Persistence {
    tx: mpsc::UnboundedSender<PersistRequest>,
}

impl Persistence {
    /// A handle plus the raw request stream, for callers that run the writer
    /// themselves or only want to observe requests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PersistRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn save_list(&self, tracks: &[Track]) {
        self.submit(PersistRequest::List(tracks.to_vec()));
    }

    pub fn save_state(&self, state: &PlaybackState) {
        self.submit(PersistRequest::State(state.clone()));
    }

    pub fn save_state_debounced(&self, state: &PlaybackState) {
        self.submit(PersistRequest::StateDebounced(state.clone()));
    }

    /// Waits until every request sent so far, including a pending debounced
    /// save, has been written. Returns `false` if the writer is gone.
    pub async fn flush(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistRequest::Flush(done_tx)).is_err() {
            return false;
        }
        done_rx.await.is_ok()
    }

    fn submit(&self, request: PersistRequest) {
        if self.tx.send(request).is_err() {
            warn!("persistence writer stopped; save dropped");
        }
    }
}

pub fn spawn_writer(
    store: Arc<dyn NowPlayingStore>,
    debounce: Duration,
) -> (Persistence, JoinHandle<()>) {
    let (persistence, rx) = Persistence::channel();
    let handle = tokio::spawn(run_writer(store, rx, debounce));
    (persistence, handle)
}

/// Applies requests in arrival order. At most one debounced state save is
/// pending; each new one replaces it and restarts the quiet period, and an
/// immediate state save makes it redundant. Runs until every handle is
/// dropped, flushing the pending save on the way out.
async fn run_writer(
    store: Arc<dyn NowPlayingStore>,
    mut rx: mpsc::UnboundedReceiver<PersistRequest>,
    debounce: Duration,
) {
    let mut pending: Option<(PlaybackState, Instant)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);
        tokio::select! {
            request = rx.recv() => match request {
                Some(PersistRequest::List(tracks)) => {
                    if let Err(err) = store.save_list(&tracks).await {
                        warn!(store = store.name(), error = %err, "failed to save playlist");
                    }
                }
                Some(PersistRequest::State(state)) => {
                    if pending.take().is_some() {
                        debug!("pending debounced save superseded");
                    }
                    write_state(store.as_ref(), &state).await;
                }
                Some(PersistRequest::StateDebounced(state)) => {
                    pending = Some((state, Instant::now() + debounce));
                }
                Some(PersistRequest::Flush(done)) => {
                    if let Some((state, _)) = pending.take() {
                        write_state(store.as_ref(), &state).await;
                    }
                    let _ = done.send(());
                }
                None => {
                    if let Some((state, _)) = pending.take() {
                        write_state(store.as_ref(), &state).await;
                    }
                    break;
                }
            },
            _ = wait_until(deadline) => {
                if let Some((state, _)) = pending.take() {
                    debug!(volume = state.volume, "quiet period over; saving state");
                    write_state(store.as_ref(), &state).await;
                }
            }
        }
    }

    debug!("persistence writer stopped");
}

async fn write_state(store: &dyn NowPlayingStore, state: &PlaybackState) {
    if let Err(err) = store.save_state(state).await {
        warn!(store = store.name(), error = %err, "failed to save playback state");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::spawn_writer;
    use crate::MemoryStore;
    use soundcloudify_core::{PlaybackState, Track};
    use std::sync::Arc;
    use std::time::Duration;

    const QUIET: Duration = Duration::from_millis(500);

    fn with_volume(volume: f64) -> PlaybackState {
        PlaybackState::with_volume(volume)
    }

    #[tokio::test(start_paused = true)]
    async fn slider_drag_results_in_one_save_of_the_last_value() {
        let store = MemoryStore::new();
        let (persistence, _task) = spawn_writer(Arc::new(store.clone()), QUIET);

        for step in 1..=8 {
            persistence.save_state_debounced(&with_volume(step as f64 / 10.0));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(store.state_saves().is_empty());

        tokio::time::sleep(Duration::from_millis(450)).await;
        let saves = store.state_saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].volume, 0.8);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_quiet_periods_save_separately() {
        let store = MemoryStore::new();
        let (persistence, _task) = spawn_writer(Arc::new(store.clone()), QUIET);

        persistence.save_state_debounced(&with_volume(0.2));
        tokio::time::sleep(Duration::from_millis(600)).await;
        persistence.save_state_debounced(&with_volume(0.3));
        tokio::time::sleep(Duration::from_millis(600)).await;

        let volumes: Vec<f64> = store.state_saves().iter().map(|s| s.volume).collect();
        assert_eq!(volumes, vec![0.2, 0.3]);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_save_supersedes_pending_one() {
        let store = MemoryStore::new();
        let (persistence, _task) = spawn_writer(Arc::new(store.clone()), QUIET);

        persistence.save_state_debounced(&with_volume(0.1));
        let mut paused = with_volume(0.1);
        paused.playing = false;
        paused.current_time = 12.0;
        persistence.save_state(&paused);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.state_saves(), vec![paused]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_pending_save_and_lists_in_order() {
        let store = MemoryStore::new();
        let (persistence, _task) = spawn_writer(Arc::new(store.clone()), QUIET);

        persistence.save_list(&[Track::new(1, "A")]);
        persistence.save_state_debounced(&with_volume(0.6));
        assert!(persistence.flush().await);

        assert_eq!(store.list_saves().len(), 1);
        assert_eq!(store.state_saves().len(), 1);
        assert_eq!(store.state_saves()[0].volume, 0.6);
    }

    #[tokio::test]
    async fn dropping_every_handle_flushes_and_stops() {
        let store = MemoryStore::new();
        let (persistence, task) = spawn_writer(Arc::new(store.clone()), QUIET);

        persistence.save_state_debounced(&with_volume(0.9));
        drop(persistence);
        task.await.unwrap();

        assert_eq!(store.state_saves().len(), 1);
    }
}
