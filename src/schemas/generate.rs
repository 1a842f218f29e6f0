use poem_openapi::{
    ApiResponse,
    payload::{Binary, Json},
};

use super::common::ErrorResponse;
use crate::core::diagram::{GenerationResult, ImageType};

#[derive(ApiResponse)]
pub enum GenerateResponse {
    /// Rendered SVG
    #[oai(status = 200, content_type = "image/svg+xml")]
    Svg(Binary<Vec<u8>>),

    /// Rendered PNG
    #[oai(status = 200, content_type = "image/png")]
    Png(Binary<Vec<u8>>),

    #[oai(status = 400, content_type = "application/json")]
    BadRequest(Json<ErrorResponse>),

    #[oai(status = 500, content_type = "application/json")]
    InternalServerError(Json<ErrorResponse>),
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        // the requested type decides the header, the bytes are not inspected
        match result.image_type {
            ImageType::Svg => GenerateResponse::Svg(Binary(result.bytes)),
            ImageType::Png => GenerateResponse::Png(Binary(result.bytes)),
        }
    }
}
