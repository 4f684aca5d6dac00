use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use crate::api::{Command, EngineErrorEvent, Event, Session};
use crate::output::OutputSink;
use crate::render::{RenderOrchestrator, RunCounter};
use crate::settings::SettingsStore;
use crate::slot::EngineSlot;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Receiver for events emitted by the session thread.
pub type SessionEventReceiver = mpsc::Receiver<Event>;

/// Handle used to send commands to a session running on its own thread.
#[derive(Debug, Clone)]
pub struct SessionClient {
    commands: mpsc::SyncSender<Command>,
    runs: RunCounter,
}

impl SessionClient {
    pub fn send(&self, command: Command) -> Result<(), mpsc::SendError<Command>> {
        self.commands.send(command)
    }

    /// Queues a preview and returns its run id.
    ///
    /// The id is taken now, so any preview still queued or running becomes
    /// stale immediately.
    pub fn request_preview(&self) -> Result<u64, mpsc::SendError<Command>> {
        let run_id = self.runs.begin();
        self.send(Command::Preview {
            run_id: Some(run_id),
        })?;
        Ok(run_id)
    }

    pub fn runs(&self) -> &RunCounter {
        &self.runs
    }
}

/// Spawns a session worker thread.
///
/// Render progress is forwarded as [`Event::Progress`] while a render runs
/// and dropped when the event channel is full. The worker exits when every
/// client is dropped or the event receiver goes away.
pub fn spawn_session_bridge<S>(
    engines: Arc<EngineSlot>,
    sink: S,
    settings: Option<SettingsStore>,
) -> (SessionClient, SessionEventReceiver)
where
    S: OutputSink + 'static,
{
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let runs = RunCounter::default();

    let progress_tx = event_tx.clone();
    let renderer = RenderOrchestrator::new(engines)
        .with_run_counter(runs.clone())
        .with_progress_observer(Arc::new(move |percent: u8| {
            let _ = progress_tx.try_send(Event::Progress { percent });
        }));
    let mut session = Session::new(renderer, sink);
    if let Some(store) = settings {
        session = session.with_settings_store(store);
    }

    thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            match session.handle_command(command) {
                Ok(events) => {
                    for event in events {
                        if event_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    if event_tx
                        .send(Event::Error(EngineErrorEvent::from_error(&error)))
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    });

    (
        SessionClient {
            commands: command_tx,
            runs,
        },
        event_rx,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use media_ffmpeg::{MockJournal, MockLoader};

    use super::{SessionEventReceiver, spawn_session_bridge};
    use crate::api::{Command, EngineErrorKind, Event};
    use crate::output::DirectorySink;
    use crate::slot::EngineSlot;

    fn sink() -> DirectorySink {
        DirectorySink::new(std::env::temp_dir().join(format!(
            "clipmix-bridge-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        )))
    }

    fn next_non_progress(events: &SessionEventReceiver) -> Event {
        loop {
            let event = events
                .recv_timeout(Duration::from_secs(1))
                .expect("event before timeout");
            if !matches!(event, Event::Progress { .. }) {
                return event;
            }
        }
    }

    #[test]
    fn bridge_emits_error_event_when_command_fails() {
        let slot = Arc::new(EngineSlot::new(MockLoader::new(MockJournal::default())));
        let (client, events) = spawn_session_bridge(slot, sink(), None);

        client.send(Command::Export).expect("send export");
        let event = next_non_progress(&events);

        match event {
            Event::Error(error) => {
                assert_eq!(error.kind, EngineErrorKind::Validation);
                assert_eq!(error.message, "No file to export. Please upload a file first.");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn bridge_forwards_session_changes() {
        let slot = Arc::new(EngineSlot::new(MockLoader::new(MockJournal::default())));
        let (client, events) = spawn_session_bridge(slot, sink(), None);

        client
            .send(Command::SetFadeIn { seconds: 1.5 })
            .expect("send fade");
        let event = events
            .recv_timeout(Duration::from_secs(1))
            .expect("session event");

        assert!(matches!(event, Event::SessionChanged(snapshot) if snapshot.fade_in == 1.5));
    }
}
