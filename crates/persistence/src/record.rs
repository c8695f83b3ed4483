//! Report and event records.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

/// A unique, lexically sortable identifier for one app run.
///
/// Ids must sort in creation order; [`SessionId::generate`] prefixes a
/// zero-padded millisecond timestamp to guarantee that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh timestamp-prefixed id.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        Self(format!("{millis:013}-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Session descriptor carried by every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub generator: String,
    pub start_time_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_millis: Option<i64>,
    #[serde(default)]
    pub crashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub high_priority: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_quality_session_id: Option<String>,
}

impl SessionInfo {
    pub fn new(id: impl Into<SessionId>, start_time_millis: i64) -> Self {
        Self {
            id: id.into(),
            generator: String::new(),
            start_time_millis,
            end_time_millis: None,
            crashed: false,
            user_id: None,
            high_priority: false,
            app_quality_session_id: None,
        }
    }
}

/// Application metadata captured at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub identifier: String,
    pub version: String,
    pub display_version: String,
}

/// A crash report: the header written at session start, and after
/// finalization the complete report handed to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashReport {
    pub sdk_version: String,
    pub app: Application,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<String>,
    pub session: SessionInfo,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_payload: Option<FilesPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_exit_info: Option<ApplicationExitInfo>,
}

impl CrashReport {
    pub fn new(sdk_version: impl Into<String>, app: Application, session: SessionInfo) -> Self {
        Self {
            sdk_version: sdk_version.into(),
            app,
            installation_id: None,
            session,
            events: Vec::new(),
            native_payload: None,
            app_exit_info: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }

    /// Set the fields known only once the session is over.
    ///
    /// A `None` user id keeps whatever the header already carried.
    pub fn with_session_end_fields(
        mut self,
        end_time_millis: i64,
        crashed: bool,
        user_id: Option<String>,
    ) -> Self {
        self.session.end_time_millis = Some(end_time_millis);
        self.session.crashed = crashed;
        if user_id.is_some() {
            self.session.user_id = user_id;
        }
        self
    }

    pub fn with_app_quality_session_id(mut self, id: Option<String>) -> Self {
        self.session.app_quality_session_id = id;
        self
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn with_native_payload(mut self, payload: FilesPayload) -> Self {
        self.native_payload = Some(payload);
        self
    }

    pub fn with_app_exit_info(mut self, info: ApplicationExitInfo) -> Self {
        self.app_exit_info = Some(info);
        self
    }

    /// A finalized report is worth uploading only with at least one event or
    /// a native payload.
    pub fn is_complete(&self) -> bool {
        !self.events.is_empty() || self.native_payload.is_some()
    }
}

/// A stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub pc: u64,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub offset: u64,
}

/// A captured exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub exception_type: String,
    pub reason: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

/// Details of a process exit reported by the OS after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationExitInfo {
    pub pid: i32,
    pub process_name: String,
    pub reason_code: i32,
    pub importance: i32,
    pub timestamp_millis: i64,
    pub pss: i64,
    pub rss: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// The kind of event that occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// An uncaught exception terminated the app.
    Crash { exception: ExceptionInfo },
    /// A caught exception reported by the app.
    NonFatal { exception: ExceptionInfo },
    /// The app stopped responding.
    Anr { reason: String },
    /// A log line.
    Log { message: String },
    /// Synthesized from the OS exit record of a native crash.
    NativeExit { exit_info: ApplicationExitInfo },
}

/// An event within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp_millis: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(timestamp_millis: i64, kind: EventKind) -> Self {
        Self {
            timestamp_millis,
            kind,
        }
    }

    pub fn crash(
        timestamp_millis: i64,
        exception_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            timestamp_millis,
            EventKind::Crash {
                exception: ExceptionInfo {
                    exception_type: exception_type.into(),
                    reason: reason.into(),
                    frames: Vec::new(),
                },
            },
        )
    }

    pub fn non_fatal(
        timestamp_millis: i64,
        exception_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            timestamp_millis,
            EventKind::NonFatal {
                exception: ExceptionInfo {
                    exception_type: exception_type.into(),
                    reason: reason.into(),
                    frames: Vec::new(),
                },
            },
        )
    }

    pub fn anr(timestamp_millis: i64, reason: impl Into<String>) -> Self {
        Self::new(
            timestamp_millis,
            EventKind::Anr {
                reason: reason.into(),
            },
        )
    }

    pub fn log(timestamp_millis: i64, message: impl Into<String>) -> Self {
        Self::new(
            timestamp_millis,
            EventKind::Log {
                message: message.into(),
            },
        )
    }

    pub fn native_exit(exit_info: ApplicationExitInfo) -> Self {
        Self::new(exit_info.timestamp_millis, EventKind::NativeExit { exit_info })
    }
}

/// One file of a native crash bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

/// Files produced by the native crash handler, attached verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub files: Vec<NativeFile>,
}

/// A finalized report paired with the session it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWithSessionId {
    pub session_id: SessionId,
    pub report: CrashReport,
}
