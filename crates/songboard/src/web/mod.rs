//! HTTP surface: the display page with its live feed, the submission form,
//! and a small JSON API.
//!
//! | Route               | Purpose                                  |
//! |---------------------|------------------------------------------|
//! | `GET /`             | Redirect to `/dj`                        |
//! | `GET /dj`           | Display screen                           |
//! | `GET /dj/live`      | WebSocket pushing list snapshots         |
//! | `GET /request`      | Submission form (`?form=ID` resumes one) |
//! | `POST /request`     | Submit the form                          |
//! | `POST /request/dismiss` | Close the acknowledgment or dialog   |
//! | `GET /request/qr.svg` | QR code for the submission link        |
//! | `GET /api/requests` | Current list as JSON                     |
//! | `POST /api/requests`| Append a request from JSON               |
//! | `GET /api/requests/{id}` | One request as JSON                 |

pub mod pages;
pub mod sessions;

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{MatchedPath, Path, Query, Request as HttpRequest, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn, Instrument};

use crate::channel::RequestChannel;
use crate::config::Config;
use crate::display::DisplayScreen;
use crate::error::{Error, Result};
use crate::qr;
use crate::request::{NewRequest, Request, RequestId, SubmitKind};
use crate::submission::SubmitOutcome;
use sessions::FormSessions;

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    channel: Arc<dyn RequestChannel>,
    config: Arc<Config>,
    sessions: Arc<FormSessions>,
}

impl AppState {
    /// Create handler state over a request channel.
    #[must_use]
    pub fn new(channel: Arc<dyn RequestChannel>, config: Arc<Config>) -> Self {
        let sessions = Arc::new(FormSessions::new(
            Arc::clone(&channel),
            config.sent_banner_delay(),
        ));
        Self {
            channel,
            config,
            sessions,
        }
    }

    /// Origin used for the submission link.
    ///
    /// The configured public origin wins; otherwise the request's `Host`
    /// header is used.
    fn origin(&self, headers: &HeaderMap) -> String {
        if let Some(origin) = self.config.public_origin() {
            return origin.to_string();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        format!("{scheme}://{host}")
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/dj", get(display_page))
        .route("/dj/live", get(live_feed))
        .route("/request", get(request_page).post(submit_request))
        .route("/request/dismiss", post(dismiss))
        .route("/request/qr.svg", get(qr_code))
        .route("/api/requests", get(api_list).post(api_submit))
        .route("/api/requests/{id}", get(api_get))
        .layer(middleware::from_fn(trace_requests))
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address is invalid, cannot be bound, or the
/// server fails.
pub async fn serve(config: Arc<Config>, channel: Arc<dyn RequestChannel>) -> Result<()> {
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;

    match config.public_origin() {
        Some(origin) => info!(%addr, request_url = %qr::submission_url(origin), "Listening"),
        None => info!(%addr, "Listening"),
    }

    let app = router(AppState::new(channel, config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn trace_requests(request: HttpRequest, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());

    let span = tracing::info_span!("http.request", method = %method, route = %route);
    async move {
        let response = next.run(request).await;
        debug!(status = response.status().as_u16(), "Handled");
        response
    }
    .instrument(span)
    .await
}

async fn root() -> Redirect {
    Redirect::to("/dj")
}

async fn display_page(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>> {
    let mut screen = DisplayScreen::new(Arc::clone(&state.channel), state.config.qr.clone());
    screen.activate(&state.origin(&headers)).await?;
    let html = pages::render_display_page(&state.config, &screen.view());
    screen.deactivate();
    Ok(Html(html))
}

async fn live_feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let origin = state.origin(&headers);
    ws.on_upgrade(move |socket| {
        let (outgoing, incoming) = socket.split();
        stream_snapshots(outgoing, incoming, state, origin)
    })
}

/// Push a fresh list fragment after every change until the client leaves.
async fn stream_snapshots<S, R>(
    mut outgoing: S,
    mut incoming: R,
    state: AppState,
    origin: String,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, axum::Error>> + Unpin,
{
    let mut screen = DisplayScreen::new(Arc::clone(&state.channel), state.config.qr.clone());
    if let Err(e) = screen.activate(&origin).await {
        warn!(error = %e, "Live feed could not subscribe");
        let _ = outgoing.send(Message::Close(None)).await;
        return;
    }
    debug!("Live feed connected");

    if send_snapshot(&mut outgoing, &screen).await.is_err() {
        screen.deactivate();
        return;
    }

    loop {
        tokio::select! {
            updated = screen.refresh() => {
                if !updated {
                    break;
                }
                if send_snapshot(&mut outgoing, &screen).await.is_err() {
                    break;
                }
            }
            msg = incoming.next() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    screen.deactivate();
    debug!("Live feed closed");
}

async fn send_snapshot<S>(outgoing: &mut S, screen: &DisplayScreen) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let view = screen.view();
    let message = serde_json::json!({
        "type": "snapshot",
        "count": view.rows.len(),
        "html": pages::render_request_list(&view),
    });
    let text = serde_json::to_string(&message)?;
    outgoing
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| Error::internal(format!("websocket send failed: {e}")))
}

/// Query accepted by `GET /request`.
#[derive(Debug, Deserialize)]
pub struct FormQuery {
    #[serde(default)]
    form: Option<String>,
}

async fn request_page(
    State(state): State<AppState>,
    Query(query): Query<FormQuery>,
) -> Html<String> {
    let (id, form) = state.sessions.get_or_open(query.form.as_deref());
    Html(pages::render_request_page(&state.config, &id, &form.view()))
}

/// Fields posted by the submission form.
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    form_id: Option<String>,
    #[serde(default)]
    song: String,
    #[serde(default)]
    note: String,
    #[serde(default)]
    action: SubmitKind,
}

async fn submit_request(
    State(state): State<AppState>,
    Form(input): Form<SubmitForm>,
) -> (StatusCode, Html<String>) {
    let kind = if state.config.priority.enabled {
        input.action
    } else {
        SubmitKind::Normal
    };

    let (id, form) = state.sessions.get_or_open(input.form_id.as_deref());
    let outcome = if form.fill(input.song, input.note) {
        form.submit(kind).await
    } else {
        SubmitOutcome::Busy
    };
    let status = match outcome {
        SubmitOutcome::Sent(_) => StatusCode::OK,
        SubmitOutcome::Busy => {
            debug!(form_id = %id, "Submit while sending");
            StatusCode::CONFLICT
        }
        SubmitOutcome::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitOutcome::Failed => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Html(pages::render_request_page(&state.config, &id, &form.view())))
}

/// What `POST /request/dismiss` closes.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissTarget {
    /// The "sent" acknowledgment ("Request another").
    Sent,
    /// The payment-nudge dialog ("Got it").
    Dialog,
}

/// Fields posted by the dismiss buttons.
#[derive(Debug, Deserialize)]
pub struct DismissForm {
    form_id: String,
    target: DismissTarget,
}

async fn dismiss(State(state): State<AppState>, Form(input): Form<DismissForm>) -> Redirect {
    let Some(form) = state.sessions.get(&input.form_id) else {
        return Redirect::to("/request");
    };
    match input.target {
        DismissTarget::Sent => form.dismiss_sent(),
        DismissTarget::Dialog => form.dismiss_dialog(),
    }
    // Tracked ids are ASCII alphanumerics and '-', safe in a query string.
    Redirect::to(&format!("/request?form={}", input.form_id))
}

async fn qr_code(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let url = qr::submission_url(&state.origin(&headers));
    let svg = qr::render_svg(&url, &state.config.qr)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

async fn api_list(State(state): State<AppState>) -> Result<Json<Vec<Request>>> {
    let snapshot = state.channel.snapshot().await?;
    Ok(Json(snapshot.to_vec()))
}

async fn api_get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Request>> {
    let request = state.channel.get(&RequestId::from_stored(id)).await?;
    Ok(Json(request))
}

/// JSON body accepted by `POST /api/requests`.
#[derive(Debug, Deserialize)]
pub struct ApiSubmission {
    song: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    priority: bool,
}

async fn api_submit(
    State(state): State<AppState>,
    Json(input): Json<ApiSubmission>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let kind = if input.priority && state.config.priority.enabled {
        SubmitKind::Priority
    } else {
        SubmitKind::Normal
    };
    let request = NewRequest::from_input(&input.song, input.note.as_deref().unwrap_or(""), kind)?;
    let id = state.channel.append(request).await?;
    info!(%id, %kind, "Request sent via API");
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}
