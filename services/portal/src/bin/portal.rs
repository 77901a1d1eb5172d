//! services/portal/src/bin/portal.rs

use axum::http::{header::ACCEPT, header::CONTENT_TYPE, HeaderValue, Method};
use axum::Router;
use portal_lib::{
    adapters::{AvatarImageAdapter, SheetApiAdapter, XlsxAdapter},
    config::Config,
    error::PortalError,
    web::{self, rest::ApiDoc, state::AppState},
};
use portfolio_core::Portfolio;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), PortalError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    if !config.endpoint.is_configured() {
        warn!(
            "SHEET_API_URL is not set; roster reads will fail and {:?} mode applies",
            config.fallback_mode
        );
    }

    // --- 2. Initialize Service Adapters ---
    let gateway = Arc::new(SheetApiAdapter::new(
        config.endpoint.clone(),
        config.request_timeout,
    )?);
    let images = Arc::new(AvatarImageAdapter::new());
    let workbook = Arc::new(XlsxAdapter::new());

    // --- 3. Build the Shared AppState ---
    let portfolio = Arc::new(Portfolio::new(gateway, images, config.fallback_mode));
    let app_state = Arc::new(AppState {
        portfolio,
        workbook,
        config: config.clone(),
    });

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        PortalError::Internal(format!(
            "ALLOWED_ORIGIN '{}' is not a valid header value: {}",
            config.allowed_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let api_router = web::router(app_state).layer(cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
