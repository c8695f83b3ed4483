//! File-backed persistence for crash reports.
//!
//! This crate keeps crash reports on local disk between the moment a session
//! starts and the moment its finalized report is uploaded. It must survive
//! process death at any point, so it never trusts in-memory state: every
//! operation re-scans the directory tree and re-reads the current settings.
//!
//! # Overview
//!
//! A session moves through two states:
//!
//! 1. **Open**: a header written by [`ReportPersistence::persist_report`],
//!    followed by event files appended by [`ReportPersistence::persist_event`].
//!
//! 2. **Finalized**: one self-contained report file per session, produced by
//!    [`ReportPersistence::finalize_reports`] or
//!    [`ReportPersistence::finalize_session_with_native_event`] and read back
//!    by [`ReportPersistence::load_finalized_reports`].
//!
//! Retention caps come from a [`SettingsProvider`] and are applied through
//! the `retention` crate, so a cap change takes effect on the next call.
//!
//! # Core Concepts
//!
//! ## ReportPersistence
//!
//! The engine. Its public operations never return errors: failures are logged
//! through `tracing` and the affected record is skipped.
//!
//! ## SessionDirectoryStore
//!
//! The storage seam. [`DirectoryStore`] lays sessions out as plain directories
//! and writes every file through a temp-file rename.
//!
//! ## RecordCodec
//!
//! Turns reports and events into bytes. [`JsonCodec`] is the default.
//!
//! # Example
//!
//! ```no_run
//! use persistence::{
//!     Application, CrashReport, Event, NoCorrelation, ReportPersistence, SessionId,
//!     SessionInfo, SharedSettings,
//! };
//!
//! let engine = ReportPersistence::open("crash-data", SharedSettings::new(), NoCorrelation);
//!
//! let session_id = SessionId::generate();
//! let header = CrashReport::new(
//!     "1.0.0",
//!     Application::default(),
//!     SessionInfo::new(session_id.clone(), 1_700_000_000_000),
//! );
//! engine.persist_report(&header);
//! engine.persist_event(&Event::crash(1_700_000_000_500, "Panic", "boom"), &session_id, true);
//!
//! // On the next launch, finalize everything but the new session.
//! let next = SessionId::generate();
//! engine.finalize_reports(Some(&next), 1_700_000_100_000);
//!
//! for entry in engine.load_finalized_reports() {
//!     println!("{}: {} events", entry.session_id, entry.report.events.len());
//! }
//! ```

mod codec;
mod engine;
mod error;
mod file_store;
mod provider;
mod record;

pub use codec::{JsonCodec, RecordCodec};
pub use engine::{FinalizeSummary, ReportPersistence};
pub use error::{CodecError, Error, Result};
pub use file_store::{
    CORRELATION_FILE, DirectoryStore, EventSlot, PRIORITY_MARKER_FILE, REPORT_FILE, ReportTier,
    START_TIME_FILE, SessionDirectoryStore, USER_FILE,
};
pub use provider::{CorrelationLookup, NoCorrelation, SettingsProvider, SharedSettings};
pub use record::{
    Application, ApplicationExitInfo, CrashReport, Event, EventKind, ExceptionInfo, FilesPayload,
    Frame, NativeFile, ReportWithSessionId, SessionId, SessionInfo,
};

pub use retention::RetentionSettings;
