//! Claim-filtered watch streams.
//!
//! A view's watch re-checks every event against the consumer's current
//! grant and rewrites it so the client sees a consistent collection: an
//! object that drops out of the claim is reported as deleted, one that
//! comes into the claim is reported as added. The table of last-known
//! match states belongs to a single stream and dies with it.

use std::collections::HashMap;

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::enforcer::GrantResolver;
use crate::error::ClaimError;
use crate::traits::WatchStream;
use crate::types::{GroupResource, ObjectKey, ResourceObject, WatchEvent, WatchEventType};

/// Last-known match state per object for one watch session.
#[derive(Debug, Default)]
pub struct MatchTable {
    seen: HashMap<ObjectKey, bool>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of objects that existed when the watch opened.
    pub fn seed(&mut self, key: ObjectKey, matched: bool) {
        self.seen.insert(key, matched);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Rewrite one upstream event given whether the object matches now.
    ///
    /// | upstream | before    | now       | emitted   |
    /// |----------|-----------|-----------|-----------|
    /// | Added    | -         | match     | Added     |
    /// | Added    | -         | no match  | nothing   |
    /// | Modified | match     | match     | Modified  |
    /// | Modified | no match  | match     | Added     |
    /// | Modified | match     | no match  | Deleted   |
    /// | Modified | no match  | no match  | nothing   |
    /// | Deleted  | match     | any       | Deleted   |
    /// | Deleted  | no match  | any       | nothing   |
    ///
    /// A key never seen before counts as "no match" for Modified and as
    /// "now" for Deleted.
    pub fn translate(&mut self, event: WatchEvent, matched_now: bool) -> Option<WatchEvent> {
        let key = event.object.key();
        match event.event_type {
            WatchEventType::Added => {
                self.seen.insert(key, matched_now);
                matched_now.then(|| WatchEvent::added(event.object))
            }
            WatchEventType::Modified => {
                let before = self.seen.insert(key, matched_now).unwrap_or(false);
                match (before, matched_now) {
                    (true, true) => Some(WatchEvent::modified(event.object)),
                    (false, true) => Some(WatchEvent::added(event.object)),
                    (true, false) => Some(WatchEvent::deleted(event.object)),
                    (false, false) => None,
                }
            }
            WatchEventType::Deleted => {
                let before = self.seen.remove(&key).unwrap_or(matched_now);
                before.then(|| WatchEvent::deleted(event.object))
            }
        }
    }
}

struct WatchState {
    upstream: WatchStream,
    resolver: GrantResolver,
    cancel: CancellationToken,
    table: MatchTable,
    done: bool,
}

impl WatchState {
    /// Yield `err` as the last item; the next poll ends the stream.
    fn fail(mut self, err: ClaimError) -> Option<(Result<WatchEvent, ClaimError>, Self)> {
        warn!(event = "Watch", phase = "Failed", tracked = self.table.len(), error = %err);
        self.done = true;
        Some((Err(err), self))
    }
}

/// Wrap `upstream` so only in-claim events reach the client.
///
/// The grant is re-resolved for every event. The stream ends when
/// `upstream` ends or `cancel` fires, and the table is dropped with it.
/// An upstream or grant error is yielded once and then ends the stream:
/// events lost around the error leave the table stale, so the client has
/// to list and watch again.
pub(crate) fn claim_watch(
    upstream: WatchStream,
    resolver: GrantResolver,
    cancel: CancellationToken,
    table: MatchTable,
) -> WatchStream {
    let state = WatchState {
        upstream,
        resolver,
        cancel,
        table,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            let next = tokio::select! {
                _ = state.cancel.cancelled() => {
                    debug!(event = "Watch", phase = "Cancelled", tracked = state.table.len());
                    return None;
                }
                next = state.upstream.next() => next,
            };

            let event = match next? {
                Ok(event) => event,
                Err(e) => return state.fail(e),
            };

            let resolved = match state.resolver.resolve().await {
                Ok(resolved) => resolved,
                Err(e) => return state.fail(e),
            };

            let matched = resolved
                .grant
                .covers(&event.object.candidate(state.resolver.group_resource()));
            let upstream_type = event.event_type;
            match state.table.translate(event, matched) {
                Some(out) => {
                    debug!(
                        event = "Watch",
                        phase = "Emit",
                        upstream = %upstream_type,
                        emitted = %out.event_type,
                        object = %out.object.key()
                    );
                    #[cfg(feature = "observability")]
                    crate::metrics::record_watch_event(
                        state.resolver.group_resource().to_string(),
                        upstream_type,
                        out.event_type,
                    );
                    return Some((Ok(out), state));
                }
                None => continue,
            }
        }
    })
    .boxed()
}

/// Seed a table from a snapshot of existing objects.
pub(crate) fn seeded_table<'a>(
    group_resource: &GroupResource,
    objects: impl IntoIterator<Item = &'a ResourceObject>,
    covers: impl Fn(&ResourceObject, &GroupResource) -> bool,
) -> MatchTable {
    let mut table = MatchTable::new();
    for object in objects {
        table.seed(object.key(), covers(object, group_resource));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn object(name: &str) -> ResourceObject {
        ResourceObject::namespaced("consumer-ns-1", name)
    }

    fn added(name: &str) -> WatchEvent {
        WatchEvent::added(object(name))
    }

    fn modified(name: &str) -> WatchEvent {
        WatchEvent::modified(object(name))
    }

    fn deleted(name: &str) -> WatchEvent {
        WatchEvent::deleted(object(name))
    }

    #[parameterized(
        added_match = { None, added("a"), true, Some(WatchEventType::Added) },
        added_no_match = { None, added("a"), false, None },
        modified_still_matched = { Some(true), modified("a"), true, Some(WatchEventType::Modified) },
        modified_comes_into_claim = { Some(false), modified("a"), true, Some(WatchEventType::Added) },
        modified_leaves_claim = { Some(true), modified("a"), false, Some(WatchEventType::Deleted) },
        modified_never_matched = { Some(false), modified("a"), false, None },
        modified_unseen_now_matched = { None, modified("a"), true, Some(WatchEventType::Added) },
        deleted_was_matched = { Some(true), deleted("a"), false, Some(WatchEventType::Deleted) },
        deleted_never_matched = { Some(false), deleted("a"), true, None },
        deleted_unseen_matched = { None, deleted("a"), true, Some(WatchEventType::Deleted) },
    )]
    fn test_translate(
        before: Option<bool>,
        event: WatchEvent,
        matched_now: bool,
        expected: Option<WatchEventType>,
    ) {
        let mut table = MatchTable::new();
        if let Some(before) = before {
            table.seed(event.object.key(), before);
        }
        let out = table.translate(event, matched_now);
        assert_eq!(out.map(|e| e.event_type), expected);
    }

    #[test]
    fn test_delete_forgets_object() {
        let mut table = MatchTable::new();
        table.translate(added("a"), true);
        assert_eq!(table.len(), 1);
        table.translate(deleted("a"), true);
        assert!(table.is_empty());
    }

    #[test]
    fn test_seeded_table() {
        let gr = GroupResource::core("configmaps");
        let objects = vec![object("unique"), object("not-unique")];
        let table = seeded_table(&gr, &objects, |o, _| o.name == "unique");
        assert_eq!(table.len(), 2);
    }
}
