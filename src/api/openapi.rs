//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the wis2-downloader admin API using
//! utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the wis2-downloader admin API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "wis2-downloader admin API",
        version = "0.1.0",
        description = "Manage WIS2 topic subscriptions and observe the download pipeline",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Subscriptions
        crate::api::routes::list_subscriptions,
        crate::api::routes::add_subscription,
        crate::api::routes::delete_subscription,

        // Queue
        crate::api::routes::queue_stats,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::Subscription,
        crate::types::QueueStats,
        crate::types::Event,

        crate::config::Config,
        crate::config::BrokerConfig,
        crate::config::BrokerTransport,
        crate::config::ReconnectConfig,
        crate::config::DownloadConfig,
        crate::config::ServerIntegrationConfig,
        crate::config::ApiConfig,

        crate::api::routes::SubscriptionQuery,
        crate::api::routes::SubscriptionMap,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "subscriptions", description = "Topic subscriptions - List, add and remove topics and their target directories"),
        (name = "queue", description = "Job queue - Pending, in-flight and completed job counters"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
