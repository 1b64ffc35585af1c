//! The reconciliation engine.
//!
//! A run recomputes, for one topic or the whole corpus, the ordered
//! sequence of eligible posts per topic, derives the topic annotation
//! (first of the sequence) and the per-post forward chain (each eligible
//! post points at the next one), then diffs the result against the stored
//! annotations and applies only actual changes, atomically.
//!
//! Priority groups monopolize: as soon as a topic contains one eligible
//! post by a priority-tracked author, the sequence keeps only
//! priority-authored posts, no matter how early a plain tracked post
//! appeared. The monopoly is gated by *eligible* priority posts; an
//! opted-out or deleted priority post suppresses nothing.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::{params, Connection};
use waymark_types::{Archetype, PostType, TrackedPost};

use crate::store;
use crate::TrackerError;

/// What a reconciliation run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileScope {
    /// One topic: its annotation and those of its current posts.
    Topic(i64),
    /// Every topic with eligible posts, plus every stale annotation.
    All,
}

impl fmt::Display for ReconcileScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(id) => write!(f, "topic {id}"),
            Self::All => f.write_str("all topics"),
        }
    }
}

/// Write counts of one reconciliation run.
///
/// A run over unchanged state reports zeros everywhere, which is how
/// idempotence stays observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Topic annotations inserted or updated.
    pub topics_written: usize,
    /// Topic annotations deleted.
    pub topics_cleared: usize,
    /// Post annotations inserted or updated.
    pub posts_written: usize,
    /// Post annotations deleted.
    pub posts_cleared: usize,
}

impl ReconcileOutcome {
    /// Whether the run changed nothing.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// One eligible post, as selected by the candidate query.
#[derive(Debug, Clone)]
struct Candidate {
    topic_id: i64,
    post_id: i64,
    post_number: i64,
    group_name: String,
    is_priority: bool,
}

/// Recomputes annotations for the given scope and persists the difference.
///
/// All writes of a run commit in a single transaction, so a reader never
/// observes a topic annotation pointing into a half-updated chain. On
/// error nothing is committed and the previous state stands.
pub fn reconcile(
    conn: &Connection,
    scope: ReconcileScope,
) -> Result<ReconcileOutcome, TrackerError> {
    let candidates = load_candidates(conn, scope)?;
    let (desired_topics, desired_posts) = desired_annotations(&candidates);

    let topic_filter = match scope {
        ReconcileScope::Topic(topic_id) => Some(topic_id),
        ReconcileScope::All => None,
    };
    let current_topics = store::topic_annotations_in_scope(conn, topic_filter)?;
    let current_posts = store::post_annotations_in_scope(conn, topic_filter)?;

    let mut outcome = ReconcileOutcome::default();
    let tx = conn.unchecked_transaction()?;

    for (topic_id, record) in &desired_topics {
        if current_topics.get(topic_id) != Some(record) {
            store::set_topic_annotation(&tx, *topic_id, record)?;
            outcome.topics_written += 1;
        }
    }
    for topic_id in current_topics.keys() {
        if !desired_topics.contains_key(topic_id) {
            store::clear_topic_annotation(&tx, *topic_id)?;
            outcome.topics_cleared += 1;
        }
    }

    for (post_id, record) in &desired_posts {
        if current_posts.get(post_id) != Some(record) {
            store::set_post_annotation(&tx, *post_id, record)?;
            outcome.posts_written += 1;
        }
    }
    for post_id in current_posts.keys() {
        if !desired_posts.contains_key(post_id) {
            store::clear_post_annotation(&tx, *post_id)?;
            outcome.posts_cleared += 1;
        }
    }

    tx.commit()?;

    tracing::debug!(
        scope = %scope,
        topics_written = outcome.topics_written,
        topics_cleared = outcome.topics_cleared,
        posts_written = outcome.posts_written,
        posts_cleared = outcome.posts_cleared,
        "reconciliation applied"
    );

    Ok(outcome)
}

/// Selects every eligible post in scope with its author's group, ordered
/// by topic then post id. Post ids are the creation-order proxy: a moved
/// post keeps its id and therefore sorts by original creation time.
fn load_candidates(
    conn: &Connection,
    scope: ReconcileScope,
) -> Result<Vec<Candidate>, TrackerError> {
    const BASE: &str = "SELECT p.topic_id, p.id, p.post_number, g.name, g.track_posts_with_priority
         FROM posts p
         JOIN users u ON u.id = p.user_id
         JOIN topics t ON t.id = p.topic_id
         JOIN groups g ON g.id = u.primary_group_id
         WHERE g.track_posts = 1
           AND p.post_type IN (?1, ?2)
           AND p.deleted_at IS NULL
           AND t.archetype = ?3
           AND t.deleted_at IS NULL
           AND u.id > 0
           AND p.opted_out = 0";

    let map_candidate = |row: &rusqlite::Row| {
        Ok(Candidate {
            topic_id: row.get(0)?,
            post_id: row.get(1)?,
            post_number: row.get(2)?,
            group_name: row.get(3)?,
            is_priority: row.get(4)?,
        })
    };

    let tracked_types = [
        PostType::Regular.as_i64(),
        PostType::ModeratorAction.as_i64(),
    ];

    let mut candidates = Vec::new();
    match scope {
        ReconcileScope::Topic(topic_id) => {
            let sql = format!("{BASE} AND p.topic_id = ?4 ORDER BY p.topic_id, p.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    tracked_types[0],
                    tracked_types[1],
                    Archetype::Regular.as_str(),
                    topic_id,
                ],
                map_candidate,
            )?;
            for row in rows {
                candidates.push(row?);
            }
        }
        ReconcileScope::All => {
            let sql = format!("{BASE} ORDER BY p.topic_id, p.id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    tracked_types[0],
                    tracked_types[1],
                    Archetype::Regular.as_str(),
                ],
                map_candidate,
            )?;
            for row in rows {
                candidates.push(row?);
            }
        }
    }

    Ok(candidates)
}

/// Derives the desired annotation maps from the ordered candidate rows.
///
/// Per topic: apply the priority monopoly, rank the survivors by post id,
/// attach rank 1 to the topic and, for each rank below the last, the next
/// rank's record to the post.
fn desired_annotations(
    candidates: &[Candidate],
) -> (BTreeMap<i64, TrackedPost>, BTreeMap<i64, TrackedPost>) {
    let mut topics = BTreeMap::new();
    let mut posts = BTreeMap::new();

    let mut start = 0;
    while start < candidates.len() {
        let topic_id = candidates[start].topic_id;
        let mut end = start;
        while end < candidates.len() && candidates[end].topic_id == topic_id {
            end += 1;
        }
        let topic_candidates = &candidates[start..end];
        start = end;

        let has_priority = topic_candidates.iter().any(|c| c.is_priority);
        let sequence: Vec<&Candidate> = topic_candidates
            .iter()
            .filter(|c| !has_priority || c.is_priority)
            .collect();

        if let Some(first) = sequence.first() {
            topics.insert(
                topic_id,
                TrackedPost {
                    group: first.group_name.clone(),
                    post_number: first.post_number,
                },
            );
        }
        for pair in sequence.windows(2) {
            posts.insert(
                pair[0].post_id,
                TrackedPost {
                    group: pair[1].group_name.clone(),
                    post_number: pair[1].post_number,
                },
            );
        }
    }

    (topics, posts)
}
