//! The attendee-facing submission form.
//!
//! A [`SubmissionForm`] owns the two text fields and the
//! `Idle -> Sending -> (Sent | Error) -> Idle` state machine. Every error is
//! caught here and turned into an inline message, so the form always returns
//! to an interactive state.
//!
//! The "sent" acknowledgment reverts to the form after a fixed delay or on
//! [`SubmissionForm::dismiss_sent`], for both normal and priority submits.
//! The priority dialog is independent of that timer and stays open until
//! [`SubmissionForm::dismiss_dialog`].

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::RequestChannel;
use crate::request::{NewRequest, RequestId, SubmitKind};

/// Where a form instance is in its submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    /// Waiting for input.
    #[default]
    Idle,
    /// A write is in flight; the submit actions are disabled.
    Sending,
    /// The last write succeeded; the acknowledgment is showing.
    Sent,
    /// The last submit failed; an inline message is showing.
    Error,
}

/// The result of one activation of a submit action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Exactly one request was appended.
    Sent(RequestId),
    /// The song was blank; nothing was written.
    Invalid,
    /// The write failed; fields are preserved for retry.
    Failed,
    /// A write from this form was already in flight; ignored.
    Busy,
}

/// Everything needed to render the form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FormView {
    /// Current song field value.
    pub song: String,
    /// Current note field value.
    pub note: String,
    /// Inline error message, if any.
    pub error: Option<&'static str>,
    /// Submit actions are disabled.
    pub sending: bool,
    /// The "sent" acknowledgment is showing.
    pub sent: bool,
    /// The payment-nudge dialog is open.
    pub dialog_open: bool,
}

#[derive(Debug, Default)]
struct FormInner {
    song: String,
    note: String,
    state: FormState,
    error: Option<&'static str>,
    dialog_open: bool,
}

/// A submission form bound to the shared request channel.
#[derive(Debug)]
pub struct SubmissionForm {
    channel: Arc<dyn RequestChannel>,
    inner: Arc<Mutex<FormInner>>,
    sent_revert: Duration,
    revert_timer: Mutex<Option<JoinHandle<()>>>,
}

impl SubmissionForm {
    /// Create an empty form.
    #[must_use]
    pub fn new(channel: Arc<dyn RequestChannel>, sent_revert: Duration) -> Self {
        Self {
            channel,
            inner: Arc::new(Mutex::new(FormInner::default())),
            sent_revert,
            revert_timer: Mutex::new(None),
        }
    }

    /// Replace both fields unless a write is in flight.
    ///
    /// Returns `false`, leaving the fields alone, while the form is sending.
    pub fn fill(&self, song: impl Into<String>, note: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if inner.state == FormState::Sending {
            return false;
        }
        inner.song = song.into();
        inner.note = note.into();
        true
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FormState {
        self.lock().state
    }

    /// Snapshot for rendering.
    #[must_use]
    pub fn view(&self) -> FormView {
        let inner = self.lock();
        FormView {
            song: inner.song.clone(),
            note: inner.note.clone(),
            error: inner.error,
            sending: inner.state == FormState::Sending,
            sent: inner.state == FormState::Sent,
            dialog_open: inner.dialog_open,
        }
    }

    /// Activate a submit action.
    ///
    /// Validates locally, then appends exactly one request. Activations while
    /// a write is in flight are ignored.
    pub async fn submit(&self, kind: SubmitKind) -> SubmitOutcome {
        let request = {
            let mut inner = self.lock();
            if inner.state == FormState::Sending {
                debug!("Ignoring submit while a write is in flight");
                return SubmitOutcome::Busy;
            }
            inner.error = None;

            match NewRequest::from_input(&inner.song, &inner.note, kind) {
                Ok(request) => {
                    inner.state = FormState::Sending;
                    request
                }
                Err(err) => {
                    inner.state = FormState::Error;
                    inner.error = Some(err.user_message());
                    return SubmitOutcome::Invalid;
                }
            }
        };
        self.cancel_revert();

        match self.channel.append(request).await {
            Ok(id) => {
                {
                    let mut inner = self.lock();
                    inner.song.clear();
                    inner.note.clear();
                    inner.state = FormState::Sent;
                    if kind.is_priority() {
                        inner.dialog_open = true;
                    }
                }
                self.schedule_revert();
                info!(id = %id, kind = %kind, "Request sent");
                SubmitOutcome::Sent(id)
            }
            Err(err) => {
                warn!(error = %err, "Request submission failed");
                let mut inner = self.lock();
                inner.state = FormState::Error;
                inner.error = Some(err.user_message());
                SubmitOutcome::Failed
            }
        }
    }

    /// Return from the acknowledgment to the form ("Request another").
    pub fn dismiss_sent(&self) {
        self.cancel_revert();
        let mut inner = self.lock();
        if inner.state == FormState::Sent {
            inner.state = FormState::Idle;
        }
    }

    /// Close the payment-nudge dialog. Has no effect on stored data.
    pub fn dismiss_dialog(&self) {
        self.lock().dialog_open = false;
    }

    fn schedule_revert(&self) {
        let inner: Weak<Mutex<FormInner>> = Arc::downgrade(&self.inner);
        let delay = self.sent_revert;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    if inner.state == FormState::Sent {
                        inner.state = FormState::Idle;
                    }
                }
            }
        });

        if let Ok(mut timer) = self.revert_timer.lock() {
            if let Some(previous) = timer.replace(handle) {
                previous.abort();
            }
        }
    }

    fn cancel_revert(&self) {
        if let Ok(mut timer) = self.revert_timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormInner> {
        // A poisoned form still holds valid strings and flags
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for SubmissionForm {
    fn drop(&mut self) {
        self.cancel_revert();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::fakes::RecordingChannel;
    use crate::error::{EMPTY_SONG_MESSAGE, RETRY_MESSAGE};

    const REVERT: Duration = Duration::from_secs(3);

    fn form_with(channel: &Arc<RecordingChannel>, song: &str, note: &str) -> SubmissionForm {
        let channel: Arc<dyn RequestChannel> = channel.clone();
        let form = SubmissionForm::new(channel, REVERT);
        assert!(form.fill(song, note));
        form
    }

    #[tokio::test]
    async fn test_blank_song_never_writes() {
        let channel = Arc::new(RecordingChannel::default());
        for song in ["", "   ", "\t\n", " \u{a0} "] {
            let form = form_with(&channel, song, "a note");

            assert_eq!(form.submit(SubmitKind::Normal).await, SubmitOutcome::Invalid);
            assert_eq!(form.submit(SubmitKind::Priority).await, SubmitOutcome::Invalid);

            let view = form.view();
            assert_eq!(view.error, Some(EMPTY_SONG_MESSAGE));
            assert_eq!(view.song, song);
            assert_eq!(view.note, "a note");
            assert!(!view.dialog_open);
        }
        assert!(channel.appended().is_empty());
    }

    #[tokio::test]
    async fn test_normal_submit_appends_once_and_clears() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, "Blinding Lights – The Weeknd", "");

        let outcome = form.submit(SubmitKind::Normal).await;
        assert!(matches!(outcome, SubmitOutcome::Sent(_)));

        let appended = channel.appended();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].song, "Blinding Lights – The Weeknd");
        assert!(appended[0].note.is_none());
        assert!(!appended[0].priority);

        let view = form.view();
        assert!(view.sent);
        assert!(view.song.is_empty());
        assert!(view.note.is_empty());
        assert!(view.error.is_none());
        assert!(!view.dialog_open);
    }

    #[tokio::test]
    async fn test_note_trimmed_and_kept() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, " Song ", "  happy birthday Mo  ");

        form.submit(SubmitKind::Normal).await;

        let appended = channel.appended();
        assert_eq!(appended[0].song, "Song");
        assert_eq!(appended[0].note.as_deref(), Some("happy birthday Mo"));
    }

    #[tokio::test]
    async fn test_priority_submit_opens_dialog() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, "X", "");

        let outcome = form.submit(SubmitKind::Priority).await;
        assert!(matches!(outcome, SubmitOutcome::Sent(_)));
        assert!(channel.appended()[0].priority);
        assert!(form.view().dialog_open);

        form.dismiss_dialog();
        let view = form.view();
        assert!(!view.dialog_open);
        assert_eq!(channel.appended().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_preserves_fields() {
        let channel = Arc::new(RecordingChannel::failing());
        let form = form_with(&channel, "  Song typed ", " note typed ");

        assert_eq!(form.submit(SubmitKind::Normal).await, SubmitOutcome::Failed);

        let view = form.view();
        assert_eq!(form.state(), FormState::Error);
        assert_eq!(view.error, Some(RETRY_MESSAGE));
        assert_eq!(view.song, "  Song typed ");
        assert_eq!(view.note, " note typed ");
        assert!(!view.sending);
        assert!(!view.dialog_open);
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let channel = Arc::new(RecordingChannel::failing());
        let form = form_with(&channel, "Song", "");

        assert_eq!(form.submit(SubmitKind::Normal).await, SubmitOutcome::Failed);
        channel.set_failing(false);
        assert!(matches!(
            form.submit(SubmitKind::Normal).await,
            SubmitOutcome::Sent(_)
        ));

        assert_eq!(channel.appended().len(), 1);
        assert!(form.view().error.is_none());
    }

    #[tokio::test]
    async fn test_second_activation_while_sending_is_ignored() {
        let channel = Arc::new(RecordingChannel::gated());
        let form = Arc::new(form_with(&channel, "Song", ""));

        let in_flight = tokio::spawn({
            let form = Arc::clone(&form);
            async move { form.submit(SubmitKind::Normal).await }
        });
        while form.state() != FormState::Sending {
            tokio::task::yield_now().await;
        }
        assert!(form.view().sending);
        assert!(!form.fill("Other", "typed while sending"));
        assert_eq!(form.view().song, "Song");

        assert_eq!(form.submit(SubmitKind::Normal).await, SubmitOutcome::Busy);
        assert_eq!(form.submit(SubmitKind::Priority).await, SubmitOutcome::Busy);

        channel.release();
        assert!(matches!(in_flight.await.unwrap(), SubmitOutcome::Sent(_)));
        assert_eq!(channel.appended().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sent_reverts_after_delay() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, "Song", "");

        form.submit(SubmitKind::Normal).await;
        assert_eq!(form.state(), FormState::Sent);

        tokio::time::sleep(REVERT - Duration::from_millis(100)).await;
        assert_eq!(form.state(), FormState::Sent);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(form.state(), FormState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dialog_outlives_sent_banner() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, "Song", "");

        form.submit(SubmitKind::Priority).await;
        tokio::time::sleep(REVERT + Duration::from_millis(100)).await;

        let view = form.view();
        assert!(!view.sent);
        assert!(view.dialog_open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_sent() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, "Song", "");

        form.submit(SubmitKind::Normal).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        form.dismiss_sent();
        assert_eq!(form.state(), FormState::Idle);

        // The first timer would fire at 3s; it must not cut the second
        // acknowledgment short.
        assert!(form.fill("Another", ""));
        form.submit(SubmitKind::Normal).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(form.state(), FormState::Sent);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(form.state(), FormState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_cancelled_on_drop() {
        let channel = Arc::new(RecordingChannel::default());
        let form = form_with(&channel, "Song", "");
        form.submit(SubmitKind::Normal).await;

        let inner = Arc::downgrade(&form.inner);
        drop(form);
        tokio::time::sleep(REVERT * 2).await;

        assert!(inner.upgrade().is_none());
    }
}
