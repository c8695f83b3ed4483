//! The report persistence engine.

use std::path::Path;

use retention::{
    RankKey, RetentionSettings, cap_events, cap_open_sessions, select_survivors, split_oldest,
};
use tracing::{debug, info, warn};

use crate::file_store::{
    CORRELATION_FILE, DirectoryStore, EventSlot, PRIORITY_MARKER_FILE, REPORT_FILE, ReportTier,
    START_TIME_FILE, SessionDirectoryStore, USER_FILE,
};
use crate::{
    ApplicationExitInfo, CorrelationLookup, CrashReport, Error, Event, FilesPayload, JsonCodec,
    RecordCodec, ReportWithSessionId, Result, SessionId, SettingsProvider,
};

/// Counts from one [`ReportPersistence::finalize_reports`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeSummary {
    /// Open sessions turned into finalized reports.
    pub finalized: usize,
    /// Open sessions deleted because they had nothing worth reporting.
    pub empty: usize,
    /// Open sessions deleted for exceeding the open-session cap.
    pub over_open_cap: usize,
    /// Sessions or reports deleted by the report cap.
    pub evicted: usize,
    /// Sessions that could not be finalized.
    pub failed: usize,
}

/// A report assembled from an open session, not yet written.
struct Assembled {
    session_id: SessionId,
    report: CrashReport,
    tier: ReportTier,
}

impl Assembled {
    fn rank_key(&self) -> RankKey {
        RankKey::new(self.session_id.as_str(), self.tier.is_high_priority())
    }
}

/// Durable crash-report persistence with bounded retention.
///
/// Every operation re-scans storage and re-reads the settings provider; no
/// state is cached between calls. Public operations never fail: storage and
/// decode errors are logged and the affected record is skipped.
pub struct ReportPersistence {
    store: Box<dyn SessionDirectoryStore>,
    settings: Box<dyn SettingsProvider>,
    correlation: Box<dyn CorrelationLookup>,
    codec: Box<dyn RecordCodec>,
}

impl ReportPersistence {
    /// Create an engine over `store` using the JSON codec.
    pub fn new(
        store: impl SessionDirectoryStore + 'static,
        settings: impl SettingsProvider + 'static,
        correlation: impl CorrelationLookup + 'static,
    ) -> Self {
        Self {
            store: Box::new(store),
            settings: Box::new(settings),
            correlation: Box::new(correlation),
            codec: Box::new(JsonCodec),
        }
    }

    /// Create an engine over a directory-backed store rooted at `root`.
    pub fn open(
        root: impl AsRef<Path>,
        settings: impl SettingsProvider + 'static,
        correlation: impl CorrelationLookup + 'static,
    ) -> Self {
        Self::new(DirectoryStore::new(root.as_ref()), settings, correlation)
    }

    /// Replace the record codec.
    pub fn with_codec(mut self, codec: impl RecordCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    fn settings(&self) -> RetentionSettings {
        self.settings.current_settings().unwrap_or_else(|| {
            debug!("no resolved settings, using default retention caps");
            RetentionSettings::default()
        })
    }

    /// Persist the header of a newly started session.
    pub fn persist_report(&self, report: &CrashReport) {
        let session_id = report.session_id();
        match self.try_persist_report(report) {
            Ok(()) => debug!(%session_id, "persisted report header"),
            Err(e) => warn!(%session_id, error = %e, "could not persist report header"),
        }
    }

    fn try_persist_report(&self, report: &CrashReport) -> Result<()> {
        let session_id = report.session_id();
        let bytes = self.codec.encode_report(report)?;
        self.store.write_session_file(session_id, REPORT_FILE, &bytes)?;
        let start = report.session.start_time_millis.to_string();
        self.store.write_session_file(session_id, START_TIME_FILE, start.as_bytes())
    }

    /// Persist an event for an open session.
    ///
    /// A high-priority event marks the whole session high priority for good.
    /// The correlation id is refreshed from the lookup, and the oldest event
    /// files beyond the current per-session cap are removed.
    pub fn persist_event(&self, event: &Event, session_id: &SessionId, is_high_priority: bool) {
        if let Err(e) = self.try_persist_event(event, session_id, is_high_priority) {
            warn!(%session_id, error = %e, "could not persist event");
        }
    }

    fn try_persist_event(
        &self,
        event: &Event,
        session_id: &SessionId,
        is_high_priority: bool,
    ) -> Result<()> {
        let settings = self.settings();
        let bytes = self.codec.encode_event(event)?;

        let mut slots = self.store.list_event_slots(session_id)?;
        let sequence = match slots.last() {
            Some(last) => last
                .sequence
                .checked_add(1)
                .ok_or_else(|| Error::SequenceExhausted(session_id.clone()))?,
            None => 1,
        };
        let slot = EventSlot::new(sequence, is_high_priority);
        self.store.write_session_file(session_id, &slot.file_name, &bytes)?;
        debug!(%session_id, sequence, is_high_priority, "persisted event");
        slots.push(slot);

        if is_high_priority {
            self.store.write_session_file(session_id, PRIORITY_MARKER_FILE, b"")?;
        }

        match self.correlation.correlation_id_for(session_id) {
            Some(correlation_id) => self.store.write_session_file(
                session_id,
                CORRELATION_FILE,
                correlation_id.as_bytes(),
            )?,
            None => debug!(%session_id, "no correlation id available"),
        }

        let (dropped, _) = split_oldest(slots, settings.max_custom_exception_events);
        for slot in dropped {
            if let Err(e) = self.store.delete_session_file(session_id, &slot.file_name) {
                warn!(%session_id, file = %slot.file_name, error = %e, "could not trim event");
            }
        }
        Ok(())
    }

    /// Record the user id for a session; it overrides the header's at finalize.
    pub fn persist_user_id(&self, session_id: &SessionId, user_id: &str) {
        if let Err(e) = self.store.write_session_file(session_id, USER_FILE, user_id.as_bytes()) {
            warn!(%session_id, error = %e, "could not persist user id");
        }
    }

    /// Finalize every open session except `current_session_id`.
    ///
    /// Each session is assembled in memory first. Only sessions that produce a
    /// complete report compete with the already-finalized reports for the
    /// report cap; losing sessions are deleted without being written, and
    /// existing reports are trimmed only once the winners are on disk.
    pub fn finalize_reports(
        &self,
        current_session_id: Option<&SessionId>,
        timestamp_millis: i64,
    ) -> FinalizeSummary {
        let settings = self.settings();
        let mut summary = FinalizeSummary::default();

        let open: Vec<SessionId> = self
            .store
            .open_session_ids()
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not list open sessions");
                Vec::new()
            })
            .into_iter()
            .filter(|id| Some(id) != current_session_id)
            .collect();

        let (open, over_cap) = cap_open_sessions(open, settings.max_open_sessions);
        for session_id in over_cap {
            debug!(%session_id, "removing session over open-session cap");
            self.delete_session_logged(&session_id);
            summary.over_open_cap += 1;
        }

        let mut assembled = Vec::new();
        for session_id in open {
            let result = self.assemble_session(
                &session_id,
                timestamp_millis,
                settings.max_custom_exception_events,
            );
            match result {
                Ok(Some(finalized)) => assembled.push(finalized),
                Ok(None) => {
                    debug!(%session_id, "nothing to report");
                    self.delete_session_logged(&session_id);
                    summary.empty += 1;
                }
                Err(e) if e.is_io() => {
                    warn!(%session_id, error = %e, "could not read session, leaving it open");
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!(%session_id, error = %e, "dropping session that cannot be finalized");
                    self.delete_session_logged(&session_id);
                    summary.failed += 1;
                }
            }
        }

        let finalized = self.finalized_ids();
        let candidates = assembled.iter().map(Assembled::rank_key).chain(
            finalized
                .iter()
                .map(|(id, tier)| RankKey::new(id.as_str(), tier.is_high_priority())),
        );
        let retain = select_survivors(candidates, settings.max_complete_sessions_count);

        for entry in assembled {
            let session_id = &entry.session_id;
            if retain.is_evicted(session_id.as_str()) {
                debug!(%session_id, "evicting session over report cap");
                self.delete_session_logged(session_id);
                summary.evicted += 1;
                continue;
            }
            match self.write_assembled(&entry) {
                Ok(()) => {
                    self.delete_session_logged(session_id);
                    summary.finalized += 1;
                }
                Err(e) if e.is_io() => {
                    warn!(%session_id, error = %e, "could not finalize session, leaving it open");
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!(%session_id, error = %e, "dropping session that cannot be finalized");
                    self.delete_session_logged(session_id);
                    summary.failed += 1;
                }
            }
        }

        summary.evicted += self.cap_finalized_reports(settings.max_complete_sessions_count);
        info!(
            finalized = summary.finalized,
            evicted = summary.evicted,
            empty = summary.empty,
            over_open_cap = summary.over_open_cap,
            failed = summary.failed,
            "finalized open sessions"
        );
        summary
    }

    /// Build the finalized report of one open session without writing it.
    /// Returns `None` when the session has nothing worth reporting.
    fn assemble_session(
        &self,
        session_id: &SessionId,
        timestamp_millis: i64,
        max_events: usize,
    ) -> Result<Option<Assembled>> {
        let slots = self.store.list_event_slots(session_id)?;
        if slots.is_empty() {
            return Ok(None);
        }
        let high_priority =
            slots.iter().any(|slot| slot.high_priority) || self.has_priority_marker(session_id);

        let header = self.read_header(session_id)?;
        let events = self.read_events(session_id, cap_events(slots, max_events));
        let user_id = self.read_text(session_id, USER_FILE);

        let mut report = header
            .with_session_end_fields(timestamp_millis, false, user_id)
            .with_app_quality_session_id(self.read_text(session_id, CORRELATION_FILE))
            .with_events(events);
        report.session.high_priority = high_priority;
        let mut tier = if high_priority {
            ReportTier::Priority
        } else {
            ReportTier::Normal
        };

        // A native crash may already have been recorded for this session.
        let native = self
            .read_finalized(session_id)
            .filter(|existing| existing.native_payload.is_some());
        if let Some(existing) = native {
            report.native_payload = existing.native_payload;
            report.app_exit_info = existing.app_exit_info;
            report.session.crashed = true;
            report.session.high_priority = true;
            tier = ReportTier::Native;
        }

        if !report.is_complete() {
            return Ok(None);
        }
        Ok(Some(Assembled {
            session_id: session_id.clone(),
            report,
            tier,
        }))
    }

    fn write_assembled(&self, finalized: &Assembled) -> Result<()> {
        let bytes = self.codec.encode_report(&finalized.report)?;
        self.store.write_finalized_report(&finalized.session_id, finalized.tier, &bytes)?;
        debug!(
            session_id = %finalized.session_id,
            tier = ?finalized.tier,
            events = finalized.report.events.len(),
            "wrote finalized report"
        );
        Ok(())
    }

    /// Delete the lowest-ranked finalized reports beyond `max_reports`.
    fn cap_finalized_reports(&self, max_reports: usize) -> usize {
        let finalized = self.finalized_ids();
        if finalized.len() <= max_reports {
            return 0;
        }
        let retain = select_survivors(
            finalized
                .iter()
                .map(|(id, tier)| RankKey::new(id.as_str(), tier.is_high_priority())),
            max_reports,
        );
        let mut removed = 0;
        for (session_id, _) in finalized {
            if !retain.is_kept(session_id.as_str()) {
                debug!(%session_id, "removing finalized report over cap");
                self.delete_report_logged(&session_id);
                removed += 1;
            }
        }
        removed
    }

    /// Attach a native crash to the report of `session_id`.
    ///
    /// Finalizes the session from its open files when it is still open,
    /// otherwise augments the existing finalized report. The result always
    /// ranks in the high-priority tier.
    pub fn finalize_session_with_native_event(
        &self,
        session_id: &SessionId,
        payload: FilesPayload,
        app_exit_info: Option<ApplicationExitInfo>,
    ) {
        match self.try_finalize_native(session_id, payload, app_exit_info) {
            Ok(()) => info!(%session_id, "finalized session with native crash"),
            Err(e) => warn!(%session_id, error = %e, "could not finalize native crash"),
        }
    }

    fn try_finalize_native(
        &self,
        session_id: &SessionId,
        payload: FilesPayload,
        app_exit_info: Option<ApplicationExitInfo>,
    ) -> Result<()> {
        let max_events = self.settings().max_custom_exception_events;

        let (report, from_open) = match self.read_header(session_id) {
            Ok(header) => {
                let slots = self.store.list_event_slots(session_id)?;
                let events = self.read_events(session_id, slots);
                let report = header
                    .with_app_quality_session_id(self.read_text(session_id, CORRELATION_FILE))
                    .with_events(events);
                (report, true)
            }
            Err(e) => match self.read_finalized(session_id) {
                Some(report) => (report, false),
                None => return Err(e),
            },
        };

        let mut report = report.with_native_payload(payload);
        if let Some(user_id) = self.read_text(session_id, USER_FILE) {
            report.session.user_id = Some(user_id);
        }
        if let Some(info) = app_exit_info {
            report.session.end_time_millis = Some(info.timestamp_millis);
            report.events.push(Event::native_exit(info.clone()));
            report = report.with_app_exit_info(info);
        }
        report.events = cap_events(std::mem::take(&mut report.events), max_events);
        report.session.crashed = true;
        report.session.high_priority = true;

        let bytes = self.codec.encode_report(&report)?;
        self.store.write_finalized_report(session_id, ReportTier::Native, &bytes)?;
        if from_open {
            self.delete_session_logged(session_id);
        }
        Ok(())
    }

    /// All finalized reports worth uploading, most recent session first.
    pub fn load_finalized_reports(&self) -> Vec<ReportWithSessionId> {
        let mut reports: Vec<ReportWithSessionId> = self
            .finalized_ids()
            .into_iter()
            .filter_map(|(session_id, _)| {
                let report = self.read_finalized(&session_id)?;
                if !report.is_complete() {
                    debug!(%session_id, "skipping incomplete finalized report");
                    return None;
                }
                Some(ReportWithSessionId { session_id, report })
            })
            .collect();
        reports.sort_by(|a, b| b.session_id.cmp(&a.session_id));
        reports
    }

    /// Whether any finalized report exists, without decoding anything.
    pub fn has_finalized_reports(&self) -> bool {
        !self.finalized_ids().is_empty()
    }

    /// Ids of sessions still open, oldest first.
    pub fn get_open_session_ids(&self) -> Vec<SessionId> {
        self.store.open_session_ids().unwrap_or_else(|e| {
            warn!(error = %e, "could not list open sessions");
            Vec::new()
        })
    }

    /// Start time of an open session, read without decoding the header.
    pub fn get_start_timestamp_millis(&self, session_id: &SessionId) -> Option<i64> {
        if let Some(text) = self.read_text(session_id, START_TIME_FILE) {
            match text.trim().parse() {
                Ok(millis) => return Some(millis),
                Err(e) => debug!(%session_id, error = %e, "malformed start time file"),
            }
        }
        self.read_header(session_id)
            .ok()
            .map(|header| header.session.start_time_millis)
    }

    /// Delete one finalized report, typically after a successful upload.
    pub fn delete_finalized_report(&self, session_id: &SessionId) {
        self.delete_report_logged(session_id);
    }

    /// Delete every open session and finalized report.
    pub fn delete_all_reports(&self) {
        match self.store.delete_all() {
            Ok(()) => info!("deleted all reports"),
            Err(e) => warn!(error = %e, "could not delete all reports"),
        }
    }

    fn read_header(&self, session_id: &SessionId) -> Result<CrashReport> {
        let bytes = self
            .store
            .read_session_file(session_id, REPORT_FILE)?
            .ok_or_else(|| Error::MissingHeader(session_id.clone()))?;
        self.codec.decode_report(&bytes)
    }

    /// Decode the given slots in order; unreadable events are skipped.
    fn read_events(&self, session_id: &SessionId, slots: Vec<EventSlot>) -> Vec<Event> {
        slots
            .into_iter()
            .filter_map(|slot| {
                let decoded = self
                    .store
                    .read_session_file(session_id, &slot.file_name)
                    .and_then(|bytes| bytes.map(|b| self.codec.decode_event(&b)).transpose());
                match decoded {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(
                            %session_id,
                            file = %slot.file_name,
                            error = %e,
                            "skipping unreadable event"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    fn read_finalized(&self, session_id: &SessionId) -> Option<CrashReport> {
        let decoded = self
            .store
            .read_finalized_report(session_id)
            .and_then(|found| found.map(|(_, bytes)| self.codec.decode_report(&bytes)).transpose());
        match decoded {
            Ok(report) => report,
            Err(e) => {
                warn!(%session_id, error = %e, "skipping unreadable finalized report");
                None
            }
        }
    }

    fn read_text(&self, session_id: &SessionId, name: &str) -> Option<String> {
        match self.store.read_session_file(session_id, name) {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok().filter(|s| !s.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!(%session_id, file = name, error = %e, "could not read session file");
                None
            }
        }
    }

    fn has_priority_marker(&self, session_id: &SessionId) -> bool {
        matches!(
            self.store.read_session_file(session_id, PRIORITY_MARKER_FILE),
            Ok(Some(_))
        )
    }

    fn finalized_ids(&self) -> Vec<(SessionId, ReportTier)> {
        self.store.finalized_report_ids().unwrap_or_else(|e| {
            warn!(error = %e, "could not list finalized reports");
            Vec::new()
        })
    }

    fn delete_session_logged(&self, session_id: &SessionId) {
        if let Err(e) = self.store.delete_session(session_id) {
            warn!(%session_id, error = %e, "could not delete session files");
        }
    }

    fn delete_report_logged(&self, session_id: &SessionId) {
        if let Err(e) = self.store.delete_finalized_report(session_id) {
            warn!(%session_id, error = %e, "could not delete finalized report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Application, NoCorrelation, SessionInfo, SharedSettings};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Delegates to a [`DirectoryStore`] but can be told to fail finalized writes.
    struct FlakyStore {
        inner: DirectoryStore,
        fail_finalized_writes: Arc<AtomicBool>,
    }

    impl SessionDirectoryStore for FlakyStore {
        fn write_session_file(&self, id: &SessionId, name: &str, bytes: &[u8]) -> Result<()> {
            self.inner.write_session_file(id, name, bytes)
        }
        fn read_session_file(&self, id: &SessionId, name: &str) -> Result<Option<Vec<u8>>> {
            self.inner.read_session_file(id, name)
        }
        fn delete_session_file(&self, id: &SessionId, name: &str) -> Result<()> {
            self.inner.delete_session_file(id, name)
        }
        fn list_event_slots(&self, id: &SessionId) -> Result<Vec<EventSlot>> {
            self.inner.list_event_slots(id)
        }
        fn open_session_ids(&self) -> Result<Vec<SessionId>> {
            self.inner.open_session_ids()
        }
        fn delete_session(&self, id: &SessionId) -> Result<()> {
            self.inner.delete_session(id)
        }
        fn finalized_report_ids(&self) -> Result<Vec<(SessionId, ReportTier)>> {
            self.inner.finalized_report_ids()
        }
        fn read_finalized_report(&self, id: &SessionId) -> Result<Option<(ReportTier, Vec<u8>)>> {
            self.inner.read_finalized_report(id)
        }
        fn write_finalized_report(
            &self,
            id: &SessionId,
            tier: ReportTier,
            bytes: &[u8],
        ) -> Result<()> {
            if self.fail_finalized_writes.load(Ordering::SeqCst) {
                return Err(Error::io(
                    "writing finalized report",
                    self.inner.root(),
                    std::io::Error::other("disk full"),
                ));
            }
            self.inner.write_finalized_report(id, tier, bytes)
        }
        fn delete_finalized_report(&self, id: &SessionId) -> Result<()> {
            self.inner.delete_finalized_report(id)
        }
        fn delete_all(&self) -> Result<()> {
            self.inner.delete_all()
        }
    }

    fn header(id: &str) -> CrashReport {
        CrashReport::new("1.0.0", Application::default(), SessionInfo::new(id, 1_000))
    }

    fn flaky_engine(dir: &TempDir) -> (ReportPersistence, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            inner: DirectoryStore::new(dir.path()),
            fail_finalized_writes: Arc::clone(&fail),
        };
        let engine = ReportPersistence::new(store, RetentionSettings::default(), NoCorrelation);
        (engine, fail)
    }

    #[test]
    fn test_io_failure_leaves_session_open_for_retry() {
        let dir = TempDir::new().unwrap();
        let (engine, fail) = flaky_engine(&dir);
        let id = SessionId::from("s1");
        engine.persist_report(&header("s1"));
        engine.persist_event(&Event::log(1, "hello"), &id, false);

        fail.store(true, Ordering::SeqCst);
        let summary = engine.finalize_reports(None, 2_000);
        assert_eq!(summary.failed, 1);
        assert_eq!(engine.get_open_session_ids(), vec![id.clone()]);
        assert!(!engine.has_finalized_reports());

        fail.store(false, Ordering::SeqCst);
        let summary = engine.finalize_reports(None, 3_000);
        assert_eq!(summary.finalized, 1);
        assert!(engine.get_open_session_ids().is_empty());
        let reports = engine.load_finalized_reports();
        assert_eq!(reports[0].report.session.end_time_millis, Some(3_000));
    }

    #[test]
    fn test_failed_write_does_not_evict_existing_report() {
        let dir = TempDir::new().unwrap();
        let fail = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            inner: DirectoryStore::new(dir.path()),
            fail_finalized_writes: Arc::clone(&fail),
        };
        let engine = ReportPersistence::new(store, RetentionSettings::new(8, 1), NoCorrelation);
        engine.persist_report(&header("a"));
        engine.persist_event(&Event::log(1, "a"), &"a".into(), false);
        engine.finalize_reports(None, 100);

        engine.persist_report(&header("b"));
        engine.persist_event(&Event::log(1, "b"), &"b".into(), false);
        fail.store(true, Ordering::SeqCst);
        let summary = engine.finalize_reports(None, 200);

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.evicted, 0);
        assert_eq!(engine.get_open_session_ids(), vec![SessionId::from("b")]);
        let reports = engine.load_finalized_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].session_id.as_str(), "a");
    }

    #[test]
    fn test_exhausted_sequence_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());
        let id = SessionId::from("s1");
        let last = format!("event{}", u64::MAX);
        store.write_session_file(&id, &last, b"{}").unwrap();
        let engine =
            ReportPersistence::new(store.clone(), RetentionSettings::default(), NoCorrelation);

        engine.persist_event(&Event::log(1, "overflow"), &id, false);

        let slots = store.list_event_slots(&id).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].file_name, last);
    }

    #[test]
    fn test_missing_header_drops_session() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = flaky_engine(&dir);
        let id = SessionId::from("orphan");
        engine.persist_event(&Event::log(1, "no header"), &id, false);

        let summary = engine.finalize_reports(None, 2_000);
        assert_eq!(summary.failed, 1);
        assert!(engine.get_open_session_ids().is_empty());
        assert!(engine.load_finalized_reports().is_empty());
    }

    #[test]
    fn test_priority_survives_event_trimming() {
        let dir = TempDir::new().unwrap();
        let engine = ReportPersistence::open(
            dir.path(),
            RetentionSettings::new(2, 4),
            NoCorrelation,
        );
        let id = SessionId::from("s1");
        engine.persist_report(&header("s1"));
        engine.persist_event(&Event::crash(1, "Panic", "boom"), &id, true);
        for ts in 2..5 {
            engine.persist_event(&Event::log(ts, "after"), &id, false);
        }

        engine.finalize_reports(None, 10);
        let reports = engine.load_finalized_reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].report.session.high_priority);
        assert_eq!(reports[0].report.events.len(), 2);
        assert!(
            dir.path()
                .join("priority-reports")
                .join("s1")
                .is_file()
        );
    }

    #[test]
    fn test_unresolved_settings_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let engine = ReportPersistence::open(dir.path(), SharedSettings::new(), NoCorrelation);
        let id = SessionId::from("s1");
        engine.persist_report(&header("s1"));
        for ts in 0..20 {
            engine.persist_event(&Event::log(ts, "line"), &id, false);
        }
        engine.finalize_reports(None, 100);

        let reports = engine.load_finalized_reports();
        assert_eq!(
            reports[0].report.events.len(),
            retention::DEFAULT_MAX_CUSTOM_EXCEPTION_EVENTS
        );
    }

    #[test]
    fn test_start_timestamp_prefers_start_time_file() {
        let dir = TempDir::new().unwrap();
        let (engine, _) = flaky_engine(&dir);
        engine.persist_report(&header("s1"));
        assert_eq!(engine.get_start_timestamp_millis(&"s1".into()), Some(1_000));
        assert_eq!(engine.get_start_timestamp_millis(&"missing".into()), None);
    }
}
