//! Debounced publishing of form state.
//!
//! [`FormSync`] owns a background task that holds the latest unsent snapshot and a
//! [`DebounceTimer`]. Every observed snapshot re-arms the timer; when the quiet window passes
//! without another edit the snapshot goes out as a `typing` envelope. Submit and clear bypass
//! the timer and cancel it.
//!
//! Typing and reset publishes are fire-and-forget: failures are logged and dropped so the form
//! stays usable while the relay is down. A submit publish is awaited by the caller.

use crate::{DebounceTimer, PublishError, Publisher};
use chrono::Utc;
use relay_core::{PatientForm, PatientRecord, SyncEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Command {
    Observe(PatientForm),
    Submit {
        envelope: SyncEnvelope,
        done: oneshot::Sender<Result<(), PublishError>>,
    },
    Clear,
}

/// Handle to the debouncing task.
///
/// Dropping the handle (or calling [`FormSync::shutdown`]) stops the task; a publish that is
/// still waiting for its quiet window is discarded.
pub struct FormSync {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl FormSync {
    /// Starts the task. Must be called inside a Tokio runtime.
    pub fn spawn(publisher: Arc<dyn Publisher>, quiet_window: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(publisher, DebounceTimer::new(quiet_window), rx));
        Self { commands, task }
    }

    /// Records the current form value and restarts the quiet window.
    pub fn observe(&self, snapshot: PatientForm) {
        self.send(Command::Observe(snapshot));
    }

    /// Publishes a `submitted` envelope right away, cancelling any pending typing publish, and
    /// waits for the relay to acknowledge it.
    pub async fn submit(&self, record: &PatientRecord) -> Result<(), PublishError> {
        let (done, result) = oneshot::channel();
        let envelope = SyncEnvelope::submitted(record, Utc::now());
        self.commands
            .send(Command::Submit { envelope, done })
            .map_err(|_| PublishError::Closed)?;
        result.await.map_err(|_| PublishError::Closed)?
    }

    /// Publishes a `reset` envelope right away, cancelling any pending typing publish.
    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(self) {
        let Self { commands, task } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!("form sync task ended abnormally: {e}");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("form sync task is gone; edit not relayed");
        }
    }
}

async fn run(
    publisher: Arc<dyn Publisher>,
    mut timer: DebounceTimer,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<PatientForm> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Observe(snapshot)) => {
                    pending = Some(snapshot);
                    timer.arm();
                }
                Some(Command::Submit { envelope, done }) => {
                    timer.cancel();
                    pending = None;
                    let publisher = publisher.clone();
                    tokio::spawn(async move {
                        let result = publisher.publish(&envelope).await;
                        if let Err(e) = &result {
                            tracing::error!("submission publish failed: {e}");
                        }
                        let _ = done.send(result);
                    });
                }
                Some(Command::Clear) => {
                    timer.cancel();
                    pending = None;
                    fire_and_forget(&publisher, SyncEnvelope::reset(Utc::now()));
                }
                None => break,
            },
            () = timer.expired() => {
                if let Some(snapshot) = pending.take() {
                    fire_and_forget(&publisher, SyncEnvelope::typing(snapshot, Utc::now()));
                }
            }
        }
    }

    if timer.cancel() {
        tracing::debug!("form sync stopped with an unsent edit; discarded");
    }
}

fn fire_and_forget(publisher: &Arc<dyn Publisher>, envelope: SyncEnvelope) {
    let publisher = publisher.clone();
    tokio::spawn(async move {
        match publisher.publish(&envelope).await {
            Ok(()) => tracing::debug!("synced {} envelope", envelope.status),
            Err(e) => tracing::warn!("sync failed for {} envelope: {e}", envelope.status),
        }
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use relay_core::{Field, SyncStatus};
    use tokio::time::{sleep, timeout};

    const QUIET: Duration = Duration::from_millis(500);

    /// Records every envelope it is given; optionally fails them all.
    pub(crate) struct Recorder {
        sent: mpsc::UnboundedSender<SyncEnvelope>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(&self, envelope: &SyncEnvelope) -> Result<(), PublishError> {
            let _ = self.sent.send(envelope.clone());
            if self.fail {
                Err(PublishError::Rejected {
                    status: 500,
                    message: "Failed to sync: broker down".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn recorder(fail: bool) -> (Arc<dyn Publisher>, mpsc::UnboundedReceiver<SyncEnvelope>) {
        let (sent, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { sent, fail }), rx)
    }

    pub(crate) fn valid_form() -> PatientForm {
        let mut form = PatientForm::default();
        for (field, value) in [
            (Field::FirstName, "Elon"),
            (Field::LastName, "Musk"),
            (Field::DateOfBirth, "1971-06-28"),
            (Field::Gender, "male"),
            (Field::PhoneNumber, "0812345678"),
            (Field::Email, "elon@example.com"),
            (Field::Address, "1 Rocket Road"),
            (Field::PreferredLanguage, "English"),
            (Field::Nationality, "American"),
        ] {
            form.set(field, value);
        }
        form
    }

    fn named(first: &str) -> PatientForm {
        let mut form = PatientForm::default();
        form.set(Field::FirstName, first);
        form
    }

    async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<SyncEnvelope>) {
        let next = timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err(), "unexpected publish: {next:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_one_window_publishes_once_with_last_value() {
        let (publisher, mut rx) = recorder(false);
        let sync = FormSync::spawn(publisher, QUIET);

        for first in ["E", "El", "Elo", "Elon"] {
            sync.observe(named(first));
            sleep(Duration::from_millis(100)).await;
        }

        let sent = rx.recv().await.expect("one publish");
        assert_eq!(sent.status, SyncStatus::Typing);
        assert_eq!(sent.record.get(Field::FirstName), Some("Elon"));
        assert_quiet(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn each_crossed_window_publishes_latest_value() {
        let (publisher, mut rx) = recorder(false);
        let sync = FormSync::spawn(publisher, QUIET);

        for first in ["A", "B", "C"] {
            sync.observe(named("x"));
            sleep(Duration::from_millis(200)).await;
            sync.observe(named(first));
            sleep(Duration::from_millis(600)).await;
        }

        for expected in ["A", "B", "C"] {
            let sent = rx.recv().await.expect("publish per window");
            assert_eq!(sent.record.get(Field::FirstName), Some(expected));
        }
        assert_quiet(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn submit_bypasses_and_cancels_pending_publish() {
        let (publisher, mut rx) = recorder(false);
        let sync = FormSync::spawn(publisher, QUIET);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let record = valid_form().validate(today).expect("valid");

        sync.observe(named("Elo"));
        sleep(Duration::from_millis(100)).await;
        sync.submit(&record).await.expect("submitted");

        let sent = rx.recv().await.expect("submit publish");
        assert_eq!(sent.status, SyncStatus::Submitted);
        assert_eq!(sent.record, PatientForm::from(&record));
        assert_quiet(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn clear_publishes_reset_immediately() {
        let (publisher, mut rx) = recorder(false);
        let sync = FormSync::spawn(publisher, QUIET);

        sync.observe(named("Elon"));
        sync.clear();

        let sent = rx.recv().await.expect("reset publish");
        assert_eq!(sent.status, SyncStatus::Reset);
        assert!(sent.record.is_empty());
        assert_quiet(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submit_is_returned_to_the_caller() {
        let (publisher, _rx) = recorder(true);
        let sync = FormSync::spawn(publisher, QUIET);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let record = valid_form().validate(today).expect("valid");

        let err = sync.submit(&record).await.expect_err("relay down");
        assert!(matches!(err, PublishError::Rejected { status: 500, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_typing_publish_keeps_sync_running() {
        let (publisher, mut rx) = recorder(true);
        let sync = FormSync::spawn(publisher, QUIET);

        sync.observe(named("E"));
        rx.recv().await.expect("first attempt");
        sync.observe(named("El"));
        let sent = rx.recv().await.expect("second attempt");
        assert_eq!(sent.record.get(Field::FirstName), Some("El"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_pending_publish() {
        let (publisher, mut rx) = recorder(false);
        let sync = FormSync::spawn(publisher, QUIET);

        sync.observe(named("Elon"));
        sync.shutdown().await;

        assert!(timeout(Duration::from_secs(5), rx.recv())
            .await
            .map(|next| next.is_none())
            .unwrap_or(true));
    }
}
