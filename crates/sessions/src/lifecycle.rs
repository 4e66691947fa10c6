//! Session expiry.
//!
//! Sessions carry an `expires_at` stamped at bootstrap (TTL default 24 h).
//! The sweep is invoked through the `cleanup_expired_sessions` tool; blob
//! artifacts outlive their session and are garbage-collected out of band.

use chrono::{DateTime, Utc};
use serde_json::Value;

use cvt_domain::error::Result;
use cvt_domain::trace::TraceEvent;

use crate::store::SessionStore;

/// Delete every session whose `expires_at` is in the past. Returns the
/// number removed. Records that fail to parse are left untouched.
pub fn cleanup_expired(store: &SessionStore, now: DateTime<Utc>) -> Result<usize> {
    let mut removed = 0;

    for id in store.list_ids()? {
        let Some(envelope) = store.get_raw(&id)? else {
            continue;
        };
        let Some(expires_at) = envelope
            .get("metadata")
            .and_then(|m| m.get("expires_at"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        else {
            continue;
        };

        if now >= expires_at {
            store.delete(&id)?;
            TraceEvent::SessionExpired {
                session_id: id.clone(),
            }
            .emit();
            removed += 1;
        }
    }

    TraceEvent::SessionsCleaned { removed }.emit();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FsBlobStore;
    use crate::primary::FilePrimaryStore;
    use chrono::Duration;
    use cvt_domain::session::SessionRecord;
    use std::sync::Arc;

    fn store(dir: &std::path::Path) -> SessionStore {
        let primary = Arc::new(FilePrimaryStore::new(dir, 65_536).unwrap());
        let blobs = Arc::new(FsBlobStore::new(dir).unwrap());
        SessionStore::new(primary, blobs, 3)
    }

    #[test]
    fn expired_sessions_are_removed_fresh_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let now = Utc::now();

        let mut fresh = SessionRecord::bootstrap(24, now);
        store.put(&mut fresh).unwrap();

        let mut stale = SessionRecord::bootstrap(24, now - Duration::hours(48));
        store.put(&mut stale).unwrap();

        let removed = cleanup_expired(&store, now).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&fresh.session_id.to_string()).is_ok());
        assert!(store.get(&stale.session_id.to_string()).is_err());
    }
}
