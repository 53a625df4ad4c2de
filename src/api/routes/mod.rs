//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`subscriptions`]: Subscription list/add/delete
//! - [`queue`]: Job queue statistics
//! - [`system`]: Health, events, OpenAPI

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

mod queue;
mod subscriptions;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use queue::*;
pub use subscriptions::*;
pub use system::*;

/// Query parameters for the subscription add/delete routes
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionQuery {
    /// Topic filter, e.g. `cache/a/wis2/+/data/core/weather/#`
    pub topic: Option<String>,
    /// Target directory for new subscriptions (add only; defaults to the
    /// download root)
    pub directory: Option<String>,
}

/// Current subscriptions as a JSON object of topic → directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct SubscriptionMap(#[schema(value_type = Object)] pub BTreeMap<String, PathBuf>);
