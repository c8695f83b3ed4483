//! Retention policy for persisted crash reports.
//!
//! Core principle: **storage is bounded by caps that can change at any time.**
//!
//! This crate decides which sessions and events survive; it never touches the
//! file system itself. The persistence engine scans storage, builds a
//! [`RankKey`] per session, and applies the returned decisions.
//!
//! - [`cap_events`] keeps the most recent events of one session.
//! - [`cap_open_sessions`] bounds how many open sessions a finalize pass handles.
//! - [`select_survivors`] ranks sessions (high priority first, then most
//!   recent) against the total report cap.
//! - [`RetentionSettings`] carries the caps and parses them from TOML.

mod error;
mod policy;
mod rank;
mod settings;

pub use error::{Error, Result};
pub use policy::{Retain, cap_events, cap_open_sessions, select_survivors, split_oldest};
pub use rank::RankKey;
pub use settings::{
    DEFAULT_MAX_COMPLETE_SESSIONS_COUNT, DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS,
    DEFAULT_MAX_OPEN_SESSIONS, RetentionSettings,
};
