//! Google Cloud Vision face detection via the `images:annotate` REST API.

use base64::Engine;
use facerelay_core::{DetectorError, FaceDetector, RawAnnotation, Vertex};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const VISION_DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
const VISION_FEATURE_FACES: &str = "FACE_DETECTION";

/// Cloud Vision client. One instance is shared by all requests.
pub struct VisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_results: u32,
}

impl VisionClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
        max_results: u32,
    ) -> Result<Self, DetectorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DetectorError::Request(e.to_string()))?;

        tracing::info!(
            endpoint,
            timeout_secs = timeout.as_secs(),
            max_results,
            "vision client configured"
        );

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            max_results,
        })
    }
}

impl FaceDetector for VisionClient {
    async fn detect(&self, image: &[u8]) -> Result<Vec<RawAnnotation>, DetectorError> {
        let body = annotate_request(image, self.max_results);

        // without_url(): the request URL carries the API key.
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| DetectorError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DetectorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DetectorError::Request(e.without_url().to_string()))?;

        let annotations = parse_annotate_response(&bytes)?;
        tracing::debug!(
            image_bytes = image.len(),
            faces = annotations.len(),
            "vision: annotate complete"
        );
        Ok(annotations)
    }

    fn name(&self) -> &str {
        "google-vision"
    }
}

// --- Wire format ---

#[derive(Serialize)]
struct AnnotateRequest {
    requests: [ImageRequest; 1],
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: [Feature; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    max_results: u32,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceAnnotation {
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

fn annotate_request(image: &[u8], max_results: u32) -> AnnotateRequest {
    AnnotateRequest {
        requests: [ImageRequest {
            image: ImageContent {
                content: base64::engine::general_purpose::STANDARD.encode(image),
            },
            features: [Feature {
                kind: VISION_FEATURE_FACES,
                max_results,
            }],
        }],
    }
}

/// Extract face polygons from an `images:annotate` response body.
///
/// A face without a bounding polygon becomes an annotation with no vertices,
/// which the normalizer discards.
fn parse_annotate_response(body: &[u8]) -> Result<Vec<RawAnnotation>, DetectorError> {
    let parsed: AnnotateResponse =
        serde_json::from_slice(body).map_err(|e| DetectorError::Parse(e.to_string()))?;

    // A single image was submitted, so only the first response matters.
    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(status) = first.error {
        return Err(DetectorError::Provider {
            code: status.code,
            message: status.message,
        });
    }

    Ok(first
        .face_annotations
        .into_iter()
        .map(|face| RawAnnotation::new(face.bounding_poly.map(|p| p.vertices).unwrap_or_default()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(annotate_request(b"hi", 5)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "requests": [{
                    "image": { "content": "aGk=" },
                    "features": [{ "type": "FACE_DETECTION", "maxResults": 5 }]
                }]
            })
        );
    }

    #[test]
    fn test_parse_faces() {
        let body = br#"{
            "responses": [{
                "faceAnnotations": [
                    {
                        "boundingPoly": { "vertices": [
                            {"x": 10, "y": 5}, {"x": 50, "y": 5},
                            {"x": 50, "y": 40}, {"x": 10, "y": 40}
                        ]},
                        "fdBoundingPoly": { "vertices": [{"x": 12, "y": 8}] },
                        "detectionConfidence": 0.98
                    },
                    {
                        "boundingPoly": { "vertices": [{"y": 3}, {"x": 7}] }
                    }
                ]
            }]
        }"#;

        let faces = parse_annotate_response(body).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].vertices.len(), 4);
        assert_eq!(faces[0].vertices[0], Vertex::new(10.0, 5.0));
        assert_eq!(faces[1].vertices[0], Vertex { x: None, y: Some(3.0) });
        assert_eq!(faces[1].vertices[1], Vertex { x: Some(7.0), y: None });
    }

    #[test]
    fn test_parse_no_faces() {
        assert!(parse_annotate_response(br#"{"responses": [{}]}"#).unwrap().is_empty());
        assert!(parse_annotate_response(br#"{"responses": []}"#).unwrap().is_empty());
        assert!(parse_annotate_response(br#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_missing_bounding_poly() {
        let faces =
            parse_annotate_response(br#"{"responses": [{"faceAnnotations": [{}]}]}"#).unwrap();
        assert_eq!(faces, vec![RawAnnotation::default()]);
    }

    #[test]
    fn test_parse_provider_error() {
        let body = br#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
        match parse_annotate_response(body) {
            Err(DetectorError::Provider { code, message }) => {
                assert_eq!(code, 3);
                assert_eq!(message, "Bad image data.");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_annotate_response(b"<html>nope</html>"),
            Err(DetectorError::Parse(_))
        ));
    }

    #[test]
    fn test_client_builds() {
        let client = VisionClient::new(VISION_DEFAULT_ENDPOINT, "k", Duration::from_secs(5), 10).unwrap();
        assert_eq!(client.name(), "google-vision");
        assert_eq!(client.max_results, 10);
    }
}
