//! Outbound GET with retry, and decoding of API responses.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use features_protocol::errors::SUPPORTED_ATTRIBUTES_PLACEHOLDER;
use features_protocol::ErrorResult;

use crate::config::RetryPolicy;
use crate::request::Headers;

const NOT_SUPPORTED_PARAMETER: &str = "Not supported query parameter";

/// A decoded API response with its HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Convert an error response into the wire error record.
    pub fn into_error(self) -> ErrorResult {
        error_from_body(self.status, self.body)
    }
}

/// Build a header map from caller headers, skipping hop-by-hop and invalid entries.
pub fn header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.forwardable() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => debug!(header = %name, "Skipping header that is not valid HTTP"),
        }
    }
    map
}

/// GET a JSON document, retrying transport failures with exponential backoff.
///
/// Decoded responses are returned whatever their status; only failures to
/// reach the server (or read its body) are retried.
pub async fn get_json(
    client: &Client,
    url: &str,
    query: &[(String, String)],
    headers: HeaderMap,
    timeout: Duration,
    retry: &RetryPolicy,
) -> Result<ApiResponse, ErrorResult> {
    let mut attempt = 0;
    loop {
        let outcome = send_once(client, url, query, headers.clone(), timeout).await;
        match outcome {
            Ok((status, bytes)) => return decode_body(status, &bytes),
            Err(e) => {
                attempt += 1;
                if attempt >= retry.max_attempts {
                    warn!(
                        url = %url,
                        error = %e,
                        attempts = attempt,
                        "Request failed, giving up"
                    );
                    let code = if e.is_timeout() { 504 } else { 500 };
                    return Err(ErrorResult::api(
                        code,
                        format!(
                            "Request to the feature API failed after {} attempts: {}",
                            attempt, e
                        ),
                    ));
                }

                let delay = retry.delay_for(attempt - 1);
                warn!(
                    url = %url,
                    error = %e,
                    attempt = attempt,
                    max_attempts = retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn send_once(
    client: &Client,
    url: &str,
    query: &[(String, String)],
    headers: HeaderMap,
    timeout: Duration,
) -> Result<(u16, Vec<u8>), reqwest::Error> {
    let response = client
        .get(url)
        .query(query)
        .headers(headers)
        .timeout(timeout)
        .send()
        .await?;
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    Ok((status, bytes.to_vec()))
}

/// Decode a response body as JSON.
///
/// An empty or truncated body is reported as 414: the API cuts responses off
/// when the request URL is too long. Other decode failures keep the status.
pub fn decode_body(status: u16, bytes: &[u8]) -> Result<ApiResponse, ErrorResult> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(body) => Ok(ApiResponse { status, body }),
        Err(e) if e.is_eof() => {
            debug!(status, error = %e, "Empty or truncated response body");
            Err(ErrorResult::api(
                414,
                "The request is too large or too long. Try reducing the length of the query, such as the size or complexity of the search geometry or filter.",
            ))
        }
        Err(e) => Err(ErrorResult::api(
            status,
            format!("The feature API returned a response that is not valid JSON: {}", e),
        )),
    }
}

/// Build an [`ErrorResult`] from an error response body.
///
/// The upstream description is kept (or the whole body when there is none),
/// along with any extra members. "Not supported query parameter" messages are
/// extended with a placeholder for the wrapper's own parameters.
pub fn error_from_body(status: u16, body: Value) -> ErrorResult {
    let mut fields = match body {
        Value::Object(fields) => fields,
        other => return ErrorResult::api(status, other.to_string()),
    };

    fields.remove("code");
    fields.remove("errorSource");
    let help = match fields.remove("help") {
        Some(Value::String(help)) => Some(help),
        _ => None,
    };

    let description = match fields.remove("description") {
        Some(Value::String(text)) if !text.is_empty() => text,
        Some(Value::Null) | Some(Value::String(_)) | None => {
            Value::Object(fields.clone()).to_string()
        }
        Some(other) => other.to_string(),
    };
    let description = if description.starts_with(NOT_SUPPORTED_PARAMETER) {
        format!(
            "{}, key. Additional supported Catalyst parameters for this function are: {}.",
            description.replace("Supported parameters are", "Supported NGD parameters are"),
            SUPPORTED_ATTRIBUTES_PLACEHOLDER
        )
    } else {
        description
    };

    let mut error = ErrorResult::api(status, description).with_extra(fields);
    error.help = help;
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_empty_body_is_414() {
        let err = decode_body(200, b"").unwrap_err();
        assert_eq!(err.code, 414);
        assert_eq!(err.error_source, features_protocol::API_ERROR_SOURCE);

        let err = decode_body(200, br#"{"type": "FeatureCollection", "features": ["#).unwrap_err();
        assert_eq!(err.code, 414);
    }

    #[test]
    fn test_decode_garbage_keeps_status() {
        let err = decode_body(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(err.code, 502);
    }

    #[test]
    fn test_decode_ok() {
        let response = decode_body(404, br#"{"code": 404, "description": "Not Found"}"#).unwrap();
        assert!(response.is_error());
        let err = response.into_error();
        assert_eq!(err.code, 404);
        assert_eq!(err.description, "Not Found");
    }

    #[test]
    fn test_error_without_description_uses_body() {
        let err = error_from_body(400, json!({"detail": "bad bbox"}));
        assert_eq!(err.code, 400);
        assert!(err.description.contains("bad bbox"));
    }

    #[test]
    fn test_error_extra_fields_preserved() {
        let err = error_from_body(
            400,
            json!({"code": 400, "description": "Invalid bbox", "type": "urn:invalid"}),
        );
        assert_eq!(err.extra.get("type"), Some(&json!("urn:invalid")));
        assert!(err.extra.get("code").is_none());
    }

    #[test]
    fn test_not_supported_parameter_rewrite() {
        let err = error_from_body(
            400,
            json!({"description": "Not supported query parameter: wkt. Supported parameters are: bbox, bbox-crs, crs"}),
        );
        assert_eq!(
            err.description,
            "Not supported query parameter: wkt. Supported NGD parameters are: bbox, bbox-crs, crs, key. Additional supported Catalyst parameters for this function are: {attr}."
        );
    }

    #[test]
    fn test_header_map_skips_host() {
        let headers: Headers = [("Host", "x"), ("Accept", "application/json")]
            .into_iter()
            .collect();
        let map = header_map(&headers);
        assert!(map.get("host").is_none());
        assert_eq!(map.get("accept").unwrap(), "application/json");
    }
}
