//! Submission forms kept alive between page loads.
//!
//! Each rendered form carries a `form_id`. Posts with the same id drive the
//! same [`SubmissionForm`], so its busy guard, revert timer and dialog state
//! carry across requests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::channel::RequestChannel;
use crate::request::RequestId;
use crate::submission::{FormState, SubmissionForm};

/// Forms tracked before the oldest idle ones are dropped.
pub const MAX_SESSIONS: usize = 512;

const MAX_ID_LEN: usize = 64;

/// Registry of live submission forms keyed by form id.
#[derive(Debug)]
pub struct FormSessions {
    channel: Arc<dyn RequestChannel>,
    sent_revert: Duration,
    capacity: usize,
    inner: Mutex<SessionMap>,
}

#[derive(Debug, Default)]
struct SessionMap {
    forms: HashMap<String, Arc<SubmissionForm>>,
    order: VecDeque<String>,
}

impl FormSessions {
    /// Create an empty registry.
    #[must_use]
    pub fn new(channel: Arc<dyn RequestChannel>, sent_revert: Duration) -> Self {
        Self::with_capacity(channel, sent_revert, MAX_SESSIONS)
    }

    /// Create an empty registry holding at most `capacity` idle forms.
    #[must_use]
    pub fn with_capacity(
        channel: Arc<dyn RequestChannel>,
        sent_revert: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            channel,
            sent_revert,
            capacity: capacity.max(1),
            inner: Mutex::new(SessionMap::default()),
        }
    }

    /// The form for `id`, if it is still tracked.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SubmissionForm>> {
        self.lock().forms.get(id).cloned()
    }

    /// The form for `id`, or a new empty one.
    ///
    /// Unknown or malformed ids get a fresh form under a new id, so the
    /// returned id may differ from the one passed in.
    pub fn get_or_open(&self, id: Option<&str>) -> (String, Arc<SubmissionForm>) {
        let id = match id.filter(|id| is_valid_id(id)) {
            Some(id) => id.to_string(),
            None => RequestId::generate().to_string(),
        };

        let mut inner = self.lock();
        if let Some(form) = inner.forms.get(&id) {
            return (id, Arc::clone(form));
        }

        let form = Arc::new(SubmissionForm::new(
            Arc::clone(&self.channel),
            self.sent_revert,
        ));
        self.evict(&mut inner);
        inner.forms.insert(id.clone(), Arc::clone(&form));
        inner.order.push_back(id.clone());
        debug!(form_id = %id, tracked = inner.forms.len(), "Opened form");
        (id, form)
    }

    /// Number of tracked forms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().forms.len()
    }

    /// Whether no forms are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the oldest forms until there is room. In-flight forms are kept.
    fn evict(&self, inner: &mut SessionMap) {
        let mut skipped = 0;
        while inner.forms.len() >= self.capacity && skipped < inner.order.len() {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            let sending = inner
                .forms
                .get(&oldest)
                .is_some_and(|form| form.state() == FormState::Sending);
            if sending {
                inner.order.push_back(oldest);
                skipped += 1;
            } else {
                inner.forms.remove(&oldest);
                debug!(form_id = %oldest, "Evicted form");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionMap> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
