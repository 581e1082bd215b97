use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use hl7::MessageVariant;
use rx_core::{PrescriptionService, RecordFormat, RxError, load_config};

/// Application state shared across REST API handlers
///
/// Holds the prescription service, which owns the message configuration
/// resolved at startup.
#[derive(Clone)]
struct AppState {
    prescription_service: PrescriptionService,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ConvertRes {
    /// Complete message, segments separated by `\r`
    message: String,
    message_type: String,
    control_id: String,
    /// Segment codes in order
    segments: Vec<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ConvertParams {
    /// Message variant (ORM, ORU, ADT, RDE or a full type code)
    variant: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct AcknowledgementReq {
    /// Reply message, segments separated by `\r`
    message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
struct AcknowledgementRes {
    message_type: Option<String>,
    message_control_id: Option<String>,
    /// accepted, error, rejected or unknown
    status: String,
    ack_code: Option<String>,
    ack_message: Option<String>,
    ack_control_id: Option<String>,
    segments: Vec<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, convert_prescription, read_acknowledgement),
    components(schemas(HealthRes, ConvertRes, AcknowledgementReq, AcknowledgementRes))
)]
struct ApiDoc;

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/prescriptions", post(convert_prescription))
        .route("/acknowledgements", post(read_acknowledgement))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Main entry point for the prescription HL7 service
///
/// Starts the REST server with OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `RXHL7_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `RXHL7_CONFIG`: YAML message configuration (default: built-in defaults)
///
/// # Errors
/// Returns an error if the configuration cannot be loaded, the address cannot
/// be bound, or the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rxhl7_run=info".parse()?)
                .add_directive("rx_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("RXHL7_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let config_path = std::env::var("RXHL7_CONFIG").ok().map(PathBuf::from);

    let config = load_config(config_path.as_deref())?;
    tracing::info!(
        "++ Starting prescription HL7 REST on {} ({})",
        rest_addr,
        config.message_type
    );

    let app = router(AppState {
        prescription_service: PrescriptionService::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Prescription HL7 service is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/prescriptions",
    params(ConvertParams),
    request_body(content = String, description = "Prescription record as JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "HL7 message", body = ConvertRes),
        (status = 422, description = "Record is incomplete or malformed"),
        (status = 500, description = "Internal server error")
    )
)]
/// Convert a prescription record to an HL7 message
///
/// The record is taken as raw JSON text so that shape errors can be reported
/// with the path of the offending field.
///
/// # Returns
/// * `Ok(Json<ConvertRes>)` - The message, its control id and segment codes
/// * `Err((StatusCode, String))` - 422 for record problems, 500 otherwise
async fn convert_prescription(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
    body: String,
) -> Result<Json<ConvertRes>, (StatusCode, String)> {
    let service = &state.prescription_service;

    let result = match params.variant.as_deref() {
        Some(tag) => rx_core::PrescriptionRecord::from_json(&body)
            .and_then(|record| service.convert_as(&record, MessageVariant::from_tag(tag))),
        None => service.convert_text(&body, RecordFormat::Json),
    };

    match result {
        Ok(built) => {
            let message_type = match params.variant.as_deref() {
                Some(tag) => MessageVariant::from_tag(tag).code().to_string(),
                None => service.config().message_type.code().to_string(),
            };
            Ok(Json(ConvertRes {
                message: built.message,
                message_type,
                control_id: built.control_id,
                segments: built.segments,
            }))
        }
        Err(
            e @ (RxError::MissingField(_) | RxError::InvalidInput(_) | RxError::Translation(_)),
        ) => {
            tracing::warn!("Rejected prescription record: {}", e);
            Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => {
            tracing::error!("Failed to convert prescription: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to convert prescription".into(),
            ))
        }
    }
}

#[utoipa::path(
    post,
    path = "/acknowledgements",
    request_body = AcknowledgementReq,
    responses(
        (status = 200, description = "Acknowledgement summary", body = AcknowledgementRes)
    )
)]
/// Summarise a reply from the receiving system
async fn read_acknowledgement(
    State(state): State<AppState>,
    Json(req): Json<AcknowledgementReq>,
) -> Json<AcknowledgementRes> {
    let summary = state.prescription_service.read_acknowledgment(&req.message);
    let ack = summary.acknowledgment;

    Json(AcknowledgementRes {
        message_type: summary.message_type,
        message_control_id: summary.message_control_id,
        status: summary.status.as_str().into(),
        ack_code: ack.as_ref().map(|a| a.code.clone()),
        ack_message: ack.as_ref().map(|a| a.message.clone()),
        ack_control_id: ack.map(|a| a.control_id),
        segments: summary.segments,
    })
}
