//! `songboard` - A live song-request board for DJ events
//!
//! Attendees submit requests from their phones through a simple form. The DJ
//! keeps a display screen open that shows every request newest first, plus a
//! QR code pointing at the form. Both screens share one request channel
//! backed by `SQLite`.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod channel;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod qr;
pub mod request;
pub mod storage;
pub mod submission;
pub mod web;

pub use channel::{Backend, RequestChannel, Snapshot, Subscription, COLLECTION};
pub use config::Config;
pub use display::DisplayScreen;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use request::{NewRequest, Request, RequestId, SubmitKind};
pub use storage::{Storage, StorageStats};
pub use submission::{FormState, SubmissionForm, SubmitOutcome};
