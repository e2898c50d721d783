//! Advisory device presence derived from the last poll timestamp.

use std::collections::HashMap;

use maa_core::elapsed_seconds_between;

const ONLINE_WINDOW_SECONDS: u64 = 10;
const RECENTLY_ACTIVE_WINDOW_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    NeverSeen,
    Online,
    RecentlyActive { elapsed_seconds: u64 },
    Offline { elapsed_minutes: u64 },
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverSeen => "never_seen",
            Self::Online => "online",
            Self::RecentlyActive { .. } => "recently_active",
            Self::Offline { .. } => "offline",
        }
    }

    /// Human-readable line for operator status replies.
    pub fn describe(self) -> String {
        match self {
            Self::NeverSeen => "never connected".to_string(),
            Self::Online => "online".to_string(),
            Self::RecentlyActive { elapsed_seconds } => {
                format!("active {elapsed_seconds}s ago")
            }
            Self::Offline { elapsed_minutes } => {
                format!("offline (last seen {elapsed_minutes} min ago)")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    last_seen_unix_ms: HashMap<String, u64>,
}

impl PresenceTracker {
    pub fn touch(&mut self, device_id: &str, now_unix_ms: u64) {
        self.last_seen_unix_ms
            .insert(device_id.to_string(), now_unix_ms);
    }

    pub fn last_seen_unix_ms(&self, device_id: &str) -> Option<u64> {
        self.last_seen_unix_ms.get(device_id).copied()
    }

    pub fn classify(&self, device_id: &str, now_unix_ms: u64) -> PresenceStatus {
        let Some(last_seen) = self.last_seen_unix_ms(device_id) else {
            return PresenceStatus::NeverSeen;
        };
        let elapsed_seconds = elapsed_seconds_between(last_seen, now_unix_ms);
        if elapsed_seconds < ONLINE_WINDOW_SECONDS {
            PresenceStatus::Online
        } else if elapsed_seconds < RECENTLY_ACTIVE_WINDOW_SECONDS {
            PresenceStatus::RecentlyActive { elapsed_seconds }
        } else {
            PresenceStatus::Offline {
                elapsed_minutes: elapsed_seconds / 60,
            }
        }
    }
}
