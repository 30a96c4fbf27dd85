//! Upcoming events across the lodges a member belongs to.

use chrono::NaiveDate;
use tracing::debug;

use crate::error::LodgeResult;
use crate::models::{Event, Member};
use crate::store::{EventCatalog, MemberDirectory};

/// Events from today onwards in every lodge where the member holds an
/// active membership, soonest first. No memberships means no events.
pub async fn upcoming_events<S>(store: &S, member: &Member, today: NaiveDate) -> LodgeResult<Vec<Event>>
where
    S: MemberDirectory + EventCatalog + ?Sized,
{
    let lodge_ids = store.active_lodge_ids(&member.id).await?;
    if lodge_ids.is_empty() {
        debug!(member_id = %member.id, "Member has no active lodge memberships");
        return Ok(Vec::new());
    }
    Ok(store.upcoming_events(&lodge_ids, today).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{date, event, member, MemoryStore};

    #[tokio::test]
    async fn test_upcoming_events_for_active_lodges() {
        let store = MemoryStore::new();
        *store.memberships.lock().unwrap() = vec![
            ("m1".into(), "l1".into(), true),
            ("m1".into(), "l2".into(), true),
            ("m1".into(), "l3".into(), false),
        ];
        *store.events.lock().unwrap() = vec![
            event("later", "l2", "2026-12-01", 0.0),
            event("soon", "l1", "2026-10-20", 0.0),
            event("past", "l1", "2026-10-01", 0.0),
            event("lapsed", "l3", "2026-11-01", 0.0),
            event("today", "l1", "2026-10-18", 0.0),
        ];

        let events = upcoming_events(&store, &member("m1", None, None), date("2026-10-18"))
            .await
            .unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["today", "soon", "later"]);
    }

    #[tokio::test]
    async fn test_no_memberships() {
        let store = MemoryStore::new();
        let events = upcoming_events(&store, &member("m1", None, None), date("2026-10-18"))
            .await
            .unwrap();
        assert!(events.is_empty());
        assert!(!store.calls().contains(&"upcoming_events"));
    }
}
