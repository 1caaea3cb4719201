//! Layout detection and figure classification oracles
//!
//! Both models run out of process. The HTTP implementations POST the page
//! (or crop) as PNG bytes and read a JSON answer:
//!
//! - detector: `{"detections": [{"box": [x1, y1, x2, y2], "confidence": f, "class_id": n}]}`
//! - classifier: `{"class_id": n, "confidence": f}` (top-1 only)

use crate::geometry::BBox;
use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use reportrag_common::errors::{AppError, Result};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// One detector output, box in image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: i64,
}

/// Top-1 classifier output
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Classification {
    pub class_id: i64,
    pub confidence: f32,
}

/// Document layout detector
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;
}

/// Chart / non-chart figure classifier
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &RgbImage) -> Result<Classification>;
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Deserialize)]
struct RawDetection {
    #[serde(rename = "box")]
    bbox: [f32; 4],
    confidence: f32,
    class_id: i64,
}

async fn post_png<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    oracle: &str,
    url: &str,
    image: &RgbImage,
) -> Result<T> {
    let body = encode_png(image)?;

    let response = client
        .post(url)
        .header("Content-Type", "image/png")
        .body(body)
        .send()
        .await
        .map_err(|e| AppError::oracle(oracle, format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::oracle(oracle, format!("API error {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::oracle(oracle, format!("Failed to parse response: {}", e)))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Detector served over HTTP
pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
}

impl HttpDetector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let response: DetectResponse = post_png(&self.client, "detector", &self.url, image).await?;

        debug!(count = response.detections.len(), "Detections received");

        Ok(response
            .detections
            .into_iter()
            .map(|d| Detection {
                bbox: BBox::new(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]),
                confidence: d.confidence,
                class_id: d.class_id,
            })
            .collect())
    }
}

/// Classifier served over HTTP
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &RgbImage) -> Result<Classification> {
        post_png(&self.client, "classifier", &self.url, image).await
    }
}
