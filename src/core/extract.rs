//! Pulls the diagram description, image type and scale out of an inbound
//! request. The checks here run in a fixed order because the order decides
//! which error a malformed request receives.

use std::borrow::Cow;

use percent_encoding::percent_decode;
use poem::{Body, http::Method};

use super::{
    diagram::{ImageType, Scale},
    error::{DecodeError, DiagramError},
};

/// Query parameter holding the percent-encoded description for GET requests.
pub const DATA_PARAM: &str = "data";
pub const IMAGE_TYPE_PARAM: &str = "type";
pub const SCALE_PARAM: &str = "scale";

/// Form-decoded query string pairs in their original order. Values stay raw
/// bytes since a description does not have to be UTF-8.
#[derive(Debug, Default, Clone)]
pub struct QueryParams(Vec<(Vec<u8>, Vec<u8>)>);

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .unwrap_or_default()
            .as_bytes()
            .split(|b| *b == b'&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = match pair.iter().position(|b| *b == b'=') {
                    Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                    None => (pair, &[][..]),
                };
                (form_decode(key), form_decode(value))
            })
            .collect();
        Self(pairs)
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(k, _)| k == key.as_bytes())
            .map(|(_, v)| v.as_slice())
    }

    fn get_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .map(String::from_utf8_lossy)
    }
}

/// `application/x-www-form-urlencoded` component decoding: `+` is a space and
/// malformed escapes are kept as they are.
fn form_decode(component: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = component
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();
    percent_decode(&spaced).collect()
}

pub fn image_type(query: &QueryParams) -> Result<ImageType, DiagramError> {
    match query.get_text(IMAGE_TYPE_PARAM) {
        None => Ok(ImageType::default()),
        Some(value) => value.parse().map_err(DiagramError::UnsupportedImageType),
    }
}

pub fn scale(query: &QueryParams) -> Result<Scale, DiagramError> {
    match query.get_text(SCALE_PARAM) {
        None => Ok(Scale::default()),
        Some(value) => value.parse().map_err(DiagramError::InvalidScale),
    }
}

pub async fn description(
    method: &Method,
    query: &QueryParams,
    body: Body,
) -> Result<Vec<u8>, DiagramError> {
    match *method {
        Method::GET => description_from_query(query),
        Method::POST => description_from_body(body).await,
        ref other => Err(DiagramError::UnsupportedMethod(other.to_string())),
    }
}

fn description_from_query(query: &QueryParams) -> Result<Vec<u8>, DiagramError> {
    let value = query
        .get(DATA_PARAM)
        .map(<[u8]>::trim_ascii)
        .unwrap_or_default();
    if value.is_empty() {
        return Err(DiagramError::MissingData);
    }
    Ok(query_unescape(value)?)
}

async fn description_from_body(body: Body) -> Result<Vec<u8>, DiagramError> {
    body.into_vec()
        .await
        .map_err(|e| DiagramError::ReadBody(e.to_string()))
}

/// Strict query unescaping: `+` becomes a space and every `%` must be
/// followed by two hex digits.
pub fn query_unescape(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut offset = 0;

    while offset < bytes.len() {
        match bytes[offset] {
            b'%' => {
                let escape = &bytes[offset..bytes.len().min(offset + 3)];
                let decoded = match escape {
                    [_, hi, lo] => hex_digit(*hi).zip(hex_digit(*lo)),
                    _ => None,
                };
                let Some((hi, lo)) = decoded else {
                    return Err(DecodeError {
                        escape: String::from_utf8_lossy(escape).into_owned(),
                        offset,
                    });
                };
                out.push(hi << 4 | lo);
                offset += 3;
            }
            b'+' => {
                out.push(b' ');
                offset += 1;
            }
            byte => {
                out.push(byte);
                offset += 1;
            }
        }
    }

    Ok(out)
}

fn hex_digit(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
