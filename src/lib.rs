use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod contract;
pub mod email;
pub mod session;
pub mod state;
pub mod storage;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

/// Signature images arrive base64-encoded inside the urlencoded form.
pub const FORM_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::contract::handlers::index,
        crate::contract::handlers::generate,
        crate::contract::handlers::download,
        crate::contract::handlers::api_generate,
        crate::contract::handlers::api_download,
        crate::contract::handlers::health
    ),
    components(
        schemas(
            contract::models::ContractUploadRequest,
            contract::models::ContractResponse,
            contract::handlers::HealthResponse,
            contract::OutputFormat,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Contract Form", description = "Browser signing flow."),
        (name = "Contract API", description = "JSON endpoints for contract generation."),
        (name = "Health", description = "Liveness.")
    )
)]
pub struct ApiDoc;

fn build_cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    tokio::fs::create_dir_all(&config.output_dir).await?;
    if !config.template_path.exists() {
        log::warn!(
            "Contract template {} not found; generation will fail until it exists",
            config.template_path.display()
        );
    }

    let host = config.host.clone();
    let port = config.port;
    let app_state = web::Data::new(AppState::from_config(config).await);

    let prometheus = PrometheusMetricsBuilder::new("contract_signing_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", host, port);

    HttpServer::new(move || {
        let cors = build_cors(&app_state.config.cors_allowed_origins);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .app_data(web::FormConfig::default().limit(FORM_LIMIT_BYTES))
            .configure(contract::handlers::configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
