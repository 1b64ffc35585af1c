//! Admin handlers for group tracking attributes.
//!
//! One generic handler serves all four attributes; the closed
//! [`GroupAttribute`] enumeration decides the column, the accepted value
//! kind, and whether the write schedules a full reconciliation.

use crate::api::{forum_error, join_error, pool_error, ApiError};
use crate::worker::enqueue_scopes;
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use serde::Deserialize;
use std::sync::Arc;
use waymark_forum::{set_group_attribute, Group};
use waymark_tracker::dispatch;
use waymark_types::{GroupAttribute, GroupAttributeValue};

/// Maximum length for a tracked-post icon name.
const MAX_ICON_LEN: usize = 64;

#[derive(Deserialize)]
pub struct SetAttributeRequest {
    pub value: GroupAttributeValue,
}

/// PUT /api/admin/groups/{groupId}/{attribute}
///
/// Persists the attribute, invalidates the tracked-groups cache, and
/// enqueues a full run when the attribute affects eligibility. Rejected
/// input mutates nothing and enqueues nothing.
pub async fn set_group_attribute_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((group_id, attribute)): Path<(i64, String)>,
    Json(payload): Json<SetAttributeRequest>,
) -> Result<Json<Group>, ApiError> {
    let attribute: GroupAttribute = attribute
        .parse()
        .map_err(|_| ApiError::NotFound(format!("unknown group attribute: {attribute}")))?;

    if let GroupAttributeValue::Text(Some(ref icon)) = payload.value {
        if icon.is_empty() || icon.len() > MAX_ICON_LEN {
            return Err(ApiError::BadRequest("invalid icon name".to_string()));
        }
    }

    let pool = state.pool.clone();
    let group = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        set_group_attribute(&conn, group_id, attribute, &payload.value).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    state.tracked_groups.invalidate();
    enqueue_scopes(
        &state.reconcile_tx,
        dispatch::on_group_attribute_changed(attribute),
    );

    tracing::info!(
        group_id,
        attribute = attribute.as_str(),
        "group tracking attribute updated"
    );

    Ok(Json(group))
}
