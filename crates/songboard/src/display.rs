//! The DJ-facing live request list.
//!
//! A [`DisplayScreen`] keeps a read-only projection of the request channel.
//! Each snapshot replaces the projection wholesale; nothing is diffed or
//! merged.

use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::debug;

use crate::channel::{RequestChannel, Snapshot, Subscription};
use crate::config::QrConfig;
use crate::error::Result;
use crate::qr;
use crate::request::Request;

/// Placeholder shown when there are no requests.
pub const EMPTY_MESSAGE: &str = "No requests yet — waiting for songs…";

/// One rendered row of the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    /// Request id, for keyed rendering.
    pub id: String,
    /// Server-local `HH:MM`, or `--:--` while pending. Browsers replace it
    /// with the viewer's local time using `datetime`.
    pub time: String,
    /// RFC 3339 timestamp, absent while pending.
    pub datetime: Option<String>,
    /// Song and artist.
    pub song: String,
    /// Dedication, if any.
    pub note: Option<String>,
}

impl From<&Request> for RowView {
    fn from(request: &Request) -> Self {
        Self {
            id: request.id.to_string(),
            time: request.time_label(),
            datetime: request
                .created_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            song: request.song.clone(),
            note: request.note.clone(),
        }
    }
}

/// Everything needed to render the display screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayView {
    /// Rows, newest first.
    pub rows: Vec<RowView>,
    /// Placeholder to show instead of rows, when the list is empty.
    pub empty_message: Option<&'static str>,
    /// Absolute submission URL.
    pub request_url: String,
    /// SVG QR code encoding `request_url`.
    pub qr_svg: String,
}

/// A display screen instance.
#[derive(Debug)]
pub struct DisplayScreen {
    channel: Arc<dyn RequestChannel>,
    qr_style: QrConfig,
    subscription: Option<Subscription>,
    projection: Snapshot,
    request_url: String,
    qr_svg: String,
}

impl DisplayScreen {
    /// Create an inactive screen.
    #[must_use]
    pub fn new(channel: Arc<dyn RequestChannel>, qr_style: QrConfig) -> Self {
        Self {
            channel,
            qr_style,
            subscription: None,
            projection: Vec::<Request>::new().into(),
            request_url: String::new(),
            qr_svg: String::new(),
        }
    }

    /// Subscribe to the channel and compute the QR link for `origin`.
    ///
    /// Any previous subscription is cancelled first. The current set is
    /// loaded before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be opened or the QR code
    /// cannot be encoded.
    pub async fn activate(&mut self, origin: &str) -> Result<()> {
        self.deactivate();

        let request_url = qr::submission_url(origin);
        self.qr_svg = qr::render_svg(&request_url, &self.qr_style)?;
        self.request_url = request_url;

        let mut subscription = self.channel.subscribe().await?;
        if let Some(snapshot) = subscription.next().await {
            self.projection = snapshot;
        }
        self.subscription = Some(subscription);
        debug!(url = %self.request_url, "Display activated");
        Ok(())
    }

    /// Wait for the next snapshot and replace the projection with it.
    ///
    /// Returns `false` when inactive or when the channel has shut down.
    /// Safe to use in `tokio::select!`.
    pub async fn refresh(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.next().await {
            Some(snapshot) => {
                self.projection = snapshot;
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }

    /// Cancel the subscription. No notifications are delivered afterwards.
    pub fn deactivate(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            debug!("Display deactivated");
        }
    }

    /// Whether a subscription is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// The current projection, newest first.
    #[must_use]
    pub fn requests(&self) -> &[Request] {
        &self.projection
    }

    /// Build the render model for the current projection.
    #[must_use]
    pub fn view(&self) -> DisplayView {
        let rows: Vec<RowView> = self.projection.iter().map(RowView::from).collect();
        DisplayView {
            empty_message: rows.is_empty().then_some(EMPTY_MESSAGE),
            rows,
            request_url: self.request_url.clone(),
            qr_svg: self.qr_svg.clone(),
        }
    }
}

impl Drop for DisplayScreen {
    fn drop(&mut self) {
        self.deactivate();
    }
}
