//! Record codec: bytes in, records out.

use crate::{CrashReport, Error, Event, Result};

/// Encodes and decodes individual records.
///
/// The engine treats a decode failure as "record absent": it is logged and
/// the record is skipped.
pub trait RecordCodec: Send + Sync {
    fn encode_report(&self, report: &CrashReport) -> Result<Vec<u8>>;
    fn decode_report(&self, bytes: &[u8]) -> Result<CrashReport>;
    fn encode_event(&self, event: &Event) -> Result<Vec<u8>>;
    fn decode_event(&self, bytes: &[u8]) -> Result<Event>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl RecordCodec for JsonCodec {
    fn encode_report(&self, report: &CrashReport) -> Result<Vec<u8>> {
        serde_json::to_vec(report).map_err(|e| Error::encode("report", e))
    }

    fn decode_report(&self, bytes: &[u8]) -> Result<CrashReport> {
        serde_json::from_slice(bytes).map_err(|e| Error::decode("report", e))
    }

    fn encode_event(&self, event: &Event) -> Result<Vec<u8>> {
        serde_json::to_vec(event).map_err(|e| Error::encode("event", e))
    }

    fn decode_event(&self, bytes: &[u8]) -> Result<Event> {
        serde_json::from_slice(bytes).map_err(|e| Error::decode("event", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Application, ApplicationExitInfo, EventKind};

    #[test]
    fn test_event_kind_is_tagged_inline() {
        let bytes = JsonCodec.encode_event(&Event::log(5, "hello")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["kind"], "log");
        assert_eq!(value["message"], "hello");
        assert_eq!(value["timestamp_millis"], 5);
    }

    #[test]
    fn test_native_exit_event_decodes() {
        let info = ApplicationExitInfo {
            pid: 7,
            process_name: "app".into(),
            reason_code: 5,
            importance: 100,
            timestamp_millis: 42,
            pss: 1,
            rss: 2,
            trace: None,
        };
        let event = Event::native_exit(info.clone());
        let decoded = JsonCodec
            .decode_event(&JsonCodec.encode_event(&event).unwrap())
            .unwrap();
        assert_eq!(decoded.timestamp_millis, 42);
        assert!(matches!(decoded.kind, EventKind::NativeExit { exit_info } if exit_info == info));
    }

    #[test]
    fn test_header_without_optional_fields_decodes() {
        let json = r#"{
            "sdk_version": "1.0",
            "app": {"identifier": "com.example", "version": "3", "display_version": "3.0"},
            "session": {"id": "0001", "generator": "gen", "start_time_millis": 1000}
        }"#;
        let report = JsonCodec.decode_report(json.as_bytes()).unwrap();
        assert_eq!(report.session.id.as_str(), "0001");
        assert!(report.events.is_empty());
        assert!(!report.session.high_priority);
        assert_eq!(
            report.app,
            Application {
                identifier: "com.example".into(),
                version: "3".into(),
                display_version: "3.0".into(),
            }
        );
    }

    #[test]
    fn test_truncated_bytes_are_a_decode_error() {
        let err = JsonCodec.decode_event(b"{\"timestamp_millis\": 1, \"ki").unwrap_err();
        assert!(matches!(err, Error::Decode { record: "event", .. }));
    }
}
