//! Subscription handlers: list, add, delete.

use super::{SubscriptionMap, SubscriptionQuery};
use crate::api::AppState;
use crate::error::{Error, SubscriptionError};
use crate::types::{AddOutcome, RemoveOutcome};
use axum::{
    Json,
    extract::{Query, State},
};
use std::path::PathBuf;

/// GET /wis2/subscriptions/list - Current subscriptions
#[utoipa::path(
    get,
    path = "/wis2/subscriptions/list",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Topic → directory mapping", body = SubscriptionMap)
    )
)]
pub async fn list_subscriptions(State(state): State<AppState>) -> Json<SubscriptionMap> {
    Json(SubscriptionMap(
        state.downloader.controller().list_subscriptions().await,
    ))
}

/// GET /wis2/subscriptions/add - Subscribe to a topic
///
/// Adding a topic that is already subscribed leaves everything unchanged.
#[utoipa::path(
    get,
    path = "/wis2/subscriptions/add",
    tag = "subscriptions",
    params(SubscriptionQuery),
    responses(
        (status = 200, description = "Updated topic → directory mapping", body = SubscriptionMap),
        (status = 400, description = "Missing or invalid topic", body = crate::error::ApiError),
        (status = 502, description = "Broker rejected the request", body = crate::error::ApiError)
    )
)]
pub async fn add_subscription(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Json<SubscriptionMap>, Error> {
    let topic = query.topic.ok_or(SubscriptionError::MissingTopic)?;
    let directory = query
        .directory
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from);

    let controller = state.downloader.controller();
    match controller.add_subscription(&topic, directory).await? {
        AddOutcome::Subscribed => tracing::debug!(topic = %topic, "Subscription added via API"),
        AddOutcome::AlreadySubscribed => {
            tracing::debug!(topic = %topic, "Subscription already present")
        }
    }

    Ok(Json(SubscriptionMap(controller.list_subscriptions().await)))
}

/// GET /wis2/subscriptions/delete - Unsubscribe from a topic
///
/// Deleting an unknown topic is not an error; the mapping is returned
/// unchanged.
#[utoipa::path(
    get,
    path = "/wis2/subscriptions/delete",
    tag = "subscriptions",
    params(SubscriptionQuery),
    responses(
        (status = 200, description = "Updated topic → directory mapping", body = SubscriptionMap),
        (status = 400, description = "Missing topic", body = crate::error::ApiError),
        (status = 502, description = "Broker rejected the request", body = crate::error::ApiError)
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Json<SubscriptionMap>, Error> {
    let topic = query.topic.ok_or(SubscriptionError::MissingTopic)?;

    let controller = state.downloader.controller();
    if controller.remove_subscription(&topic).await? == RemoveOutcome::NotFound {
        tracing::debug!(topic = %topic, "Delete requested for unknown topic");
    }

    Ok(Json(SubscriptionMap(controller.list_subscriptions().await)))
}
