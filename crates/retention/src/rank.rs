use std::fmt;

/// Survival rank of a session competing for a retention slot.
///
/// Keys compare lexicographically: any high-priority session outranks every
/// normal one, and within a tier the more recent (lexically greater) session
/// id wins. Greater keys survive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankKey {
    /// Fatal/ANR event persisted, or finalized through the native-crash path.
    pub high_priority: bool,
    /// Timestamp-prefixed session id.
    pub session_id: String,
}

impl RankKey {
    pub fn new(session_id: impl Into<String>, high_priority: bool) -> Self {
        Self {
            high_priority,
            session_id: session_id.into(),
        }
    }

    pub fn normal(session_id: impl Into<String>) -> Self {
        Self::new(session_id, false)
    }

    pub fn high(session_id: impl Into<String>) -> Self {
        Self::new(session_id, true)
    }
}

impl fmt::Display for RankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = if self.high_priority { "high" } else { "normal" };
        write!(f, "{} ({tier})", self.session_id)
    }
}
