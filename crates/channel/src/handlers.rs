use crate::{Event, EventKind, TimeUpdate};
use soundcloudify_core::PlaybackState;

pub type Handler<C> = Box<dyn FnMut(&mut C, Event) + Send>;

/// One optional handler per event kind. Handlers receive the context they
/// act on (usually the player) by `&mut`, so nothing needs shared ownership.
pub struct HandlerTable<C> {
    slots: [Option<Handler<C>>; EventKind::COUNT],
}

impl<C> Default for HandlerTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> HandlerTable<C> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Installs `handler` for `kind`, silently replacing any previous one.
    /// Returns whether a handler was replaced.
    pub fn register<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: FnMut(&mut C, Event) + Send + 'static,
    {
        self.slots[kind.slot()]
            .replace(Box::new(handler))
            .is_some()
    }

    pub fn on_time_update<F>(&mut self, mut handler: F) -> bool
    where
        F: FnMut(&mut C, TimeUpdate) + Send + 'static,
    {
        self.register(EventKind::TimeUpdate, move |ctx, event| {
            if let Event::TimeUpdate(update) = event {
                handler(ctx, update);
            }
        })
    }

    pub fn on_ended<F>(&mut self, mut handler: F) -> bool
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        self.register(EventKind::Ended, move |ctx, _| handler(ctx))
    }

    pub fn on_track_changed<F>(&mut self, mut handler: F) -> bool
    where
        F: FnMut(&mut C, PlaybackState) + Send + 'static,
    {
        self.register(EventKind::TrackChanged, move |ctx, event| {
            if let Event::TrackChanged(state) = event {
                handler(ctx, *state);
            }
        })
    }

    pub fn on_error<F>(&mut self, mut handler: F) -> bool
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        self.register(EventKind::Error, move |ctx, _| handler(ctx))
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.slots[kind.slot()].is_some()
    }

    /// Runs the handler for the event's kind. Returns `false` when none is
    /// registered and the event was dropped.
    pub fn dispatch(&mut self, ctx: &mut C, event: Event) -> bool {
        let kind = event.kind();
        match self.slots[kind.slot()].as_mut() {
            Some(handler) => {
                handler(ctx, event);
                true
            }
            None => {
                tracing::debug!(?kind, "no handler registered; event dropped");
                false
            }
        }
    }
}

impl<C> std::fmt::Debug for HandlerTable<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|kind| self.is_registered(*kind))
            .collect();
        f.debug_struct("HandlerTable")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::HandlerTable;
    use crate::{Event, EventKind, TimeUpdate};

    #[derive(Default)]
    struct Log(Vec<String>);

    #[test]
    fn dispatches_to_the_matching_kind_only() {
        let mut table = HandlerTable::<Log>::new();
        table.on_ended(|log| log.0.push("ended".into()));
        table.on_time_update(|log, update| log.0.push(format!("time {}", update.current_time)));

        let mut log = Log::default();
        assert!(table.dispatch(&mut log, Event::Ended));
        assert!(table.dispatch(
            &mut log,
            Event::TimeUpdate(TimeUpdate {
                track: None,
                current_time: 3.0,
                duration: 10.0,
            })
        ));
        assert!(!table.dispatch(&mut log, Event::Error));

        assert_eq!(log.0, vec!["ended".to_string(), "time 3".to_string()]);
    }

    #[test]
    fn re_registration_replaces_previous_handler() {
        let mut table = HandlerTable::<Log>::new();
        assert!(!table.on_error(|log| log.0.push("first".into())));
        assert!(table.on_error(|log| log.0.push("second".into())));
        assert!(table.is_registered(EventKind::Error));

        let mut log = Log::default();
        table.dispatch(&mut log, Event::Error);
        assert_eq!(log.0, vec!["second".to_string()]);
    }
}
