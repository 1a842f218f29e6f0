use std::sync::Arc;

use poem::{
    Body, handler,
    http::{Method, StatusCode, Uri},
    web::Data,
};
use poem_openapi::payload::Json;

use crate::{
    AppState,
    core::{
        diagram::{DiagramRequest, GenerationResult},
        error::DiagramError,
        extract::{self, QueryParams},
    },
    schemas::{common::ErrorResponse, generate::GenerateResponse},
};

/// Generate
///
/// Renders the description from `data` (GET) or the raw body (POST) into an
/// SVG or PNG image.
#[handler]
pub async fn generate(
    method: Method,
    uri: &Uri,
    body: Body,
    state: Data<&Arc<AppState>>,
) -> GenerateResponse {
    match dispatch(&method, uri, body, &state).await {
        Ok(result) => {
            tracing::info!(
                "{} /generate: {} bytes of {}",
                method,
                result.bytes.len(),
                result.image_type
            );
            result.into()
        }
        Err(err) => error_response(err),
    }
}

async fn dispatch(
    method: &Method,
    uri: &Uri,
    body: Body,
    state: &AppState,
) -> Result<GenerationResult, DiagramError> {
    let query = QueryParams::parse(uri.query());

    let image_type = extract::image_type(&query)?;
    let description = extract::description(method, &query, body).await?;
    let diagram = DiagramRequest::new(description, image_type, &state.output_dir)
        .with_scale(extract::scale(&query)?);

    state.generator.generate(&diagram).await?;

    let bytes = tokio::fs::read(diagram.output_path())
        .await
        .map_err(DiagramError::ReadArtifact)?;

    Ok(GenerationResult { bytes, image_type })
}

fn error_response(err: DiagramError) -> GenerateResponse {
    let body = Json(ErrorResponse::new(err.to_string()));
    if err.is_client_error() {
        tracing::warn!("[{}] {}", StatusCode::BAD_REQUEST.as_u16(), err);
        GenerateResponse::BadRequest(body)
    } else {
        tracing::error!("[{}] {}", StatusCode::INTERNAL_SERVER_ERROR.as_u16(), err);
        GenerateResponse::InternalServerError(body)
    }
}
