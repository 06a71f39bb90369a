//! Image host adapter.
//!
//! Uploads Telegram photos and stickers to a mauImageServer-style host so IRC
//! users get a plain link. Non-JPEG images are re-encoded to JPEG first.

use std::io::Cursor;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tgirc_core::{config::MisConfig, errors::Error, ports::ImageRelay, Result};

/// Length of generated image names.
pub const NAME_LEN: usize = 5;

const CLIENT_NAME: &str = concat!("tgirc ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct InsertRequest<'a> {
    image: String,
    #[serde(rename = "image-name")]
    name: &'a str,
    #[serde(rename = "image-format")]
    format: &'static str,
    #[serde(rename = "client-name")]
    client: &'static str,
    #[serde(skip_serializing_if = "is_blank")]
    username: &'a str,
    #[serde(rename = "auth-token", skip_serializing_if = "is_blank")]
    auth_token: &'a str,
    hidden: bool,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Debug, Default, Deserialize)]
struct InsertResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Clone, Debug)]
pub struct MisClient {
    cfg: MisConfig,
    http: reqwest::Client,
}

impl MisClient {
    pub fn new(cfg: MisConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { cfg, http })
    }

    /// Upload `data` under a fresh random name and return its public URL.
    pub async fn insert(&self, data: Vec<u8>) -> Result<String> {
        if data.is_empty() {
            return Err(Error::External("refusing to upload an empty image".to_string()));
        }
        let jpeg = tokio::task::spawn_blocking(move || ensure_jpeg(data))
            .await
            .map_err(|e| Error::External(format!("image conversion task failed: {e}")))?;

        let name = image_name();
        let body = InsertRequest {
            image: STANDARD.encode(&jpeg),
            name: &name,
            format: "jpg",
            client: CLIENT_NAME,
            username: &self.cfg.username,
            auth_token: &self.cfg.password,
            hidden: true,
        };

        let resp = self
            .http
            .post(format!("{}/insert", self.cfg.address))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("image host request error: {e}")))?;

        let status = resp.status();
        let parsed: InsertResponse = resp.json().await.unwrap_or_default();
        if !status.is_success() || !parsed.success {
            return Err(Error::External(format!(
                "image host rejected upload ({status})"
            )));
        }

        Ok(format!("{}/{name}.jpg", self.cfg.address))
    }
}

#[async_trait]
impl ImageRelay for MisClient {
    async fn upload(&self, data: Vec<u8>) -> Option<String> {
        match self.insert(data).await {
            Ok(url) => {
                debug!(%url, "image uploaded");
                Some(url)
            }
            Err(e) => {
                warn!("image upload failed: {e}");
                None
            }
        }
    }
}

/// Random `[a-zA-Z0-9]{5}` name.
pub fn image_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_LEN)
        .map(char::from)
        .collect()
}

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// Re-encode to JPEG. Undecodable data is passed through unchanged and left
/// for the host to reject.
pub fn ensure_jpeg(data: Vec<u8>) -> Vec<u8> {
    if is_jpeg(&data) {
        return data;
    }
    let img = match image::load_from_memory(&data) {
        Ok(img) => img,
        Err(e) => {
            warn!("could not decode image, uploading as-is: {e}");
            return data;
        }
    };

    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    match rgb.write_to(&mut out, ImageFormat::Jpeg) {
        Ok(()) => out.into_inner(),
        Err(e) => {
            warn!("could not encode JPEG, uploading as-is: {e}");
            data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    fn png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn names_are_alphanumeric() {
        for _ in 0..50 {
            let name = image_name();
            assert_eq!(name.len(), NAME_LEN);
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn png_is_converted() {
        let out = ensure_jpeg(png());
        assert!(is_jpeg(&out));
    }

    #[test]
    fn jpeg_and_garbage_pass_through() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        assert_eq!(ensure_jpeg(jpeg.clone()), jpeg);
        assert_eq!(ensure_jpeg(b"not an image".to_vec()), b"not an image".to_vec());
    }

    #[test]
    fn request_field_names() {
        let body = InsertRequest {
            image: "AAAA".to_string(),
            name: "abcde",
            format: "jpg",
            client: CLIENT_NAME,
            username: "",
            auth_token: "tok",
            hidden: true,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["image-name"], "abcde");
        assert_eq!(v["image-format"], "jpg");
        assert_eq!(v["auth-token"], "tok");
        assert_eq!(v["hidden"], true);
        assert!(v.get("username").is_none());
    }

    /// Serve one HTTP request with `response_body`, returning the request body.
    async fn one_shot_server(response_body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let len: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while buf.len() < header_end + len {
                let n = sock.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                response_body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8(buf[header_end..].to_vec()).unwrap()
        });
        (addr, task)
    }

    fn client(address: String) -> MisClient {
        MisClient::new(MisConfig {
            address,
            username: "bridge".to_string(),
            password: "secret".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn upload_returns_public_url() {
        let (addr, server) = one_shot_server(r#"{"success":true}"#).await;
        let url = client(addr.clone()).upload(png()).await.unwrap();

        let name = url
            .strip_prefix(&format!("{addr}/"))
            .and_then(|s| s.strip_suffix(".jpg"))
            .unwrap();
        assert_eq!(name.len(), NAME_LEN);

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["image-name"], name);
        assert_eq!(body["username"], "bridge");
        let jpeg = STANDARD.decode(body["image"].as_str().unwrap()).unwrap();
        assert!(is_jpeg(&jpeg));
    }

    #[tokio::test]
    async fn rejected_upload_yields_none() {
        let (addr, _server) = one_shot_server(r#"{"success":false}"#).await;
        assert_eq!(client(addr).upload(png()).await, None);
    }

    #[tokio::test]
    async fn empty_data_is_not_uploaded() {
        let c = client("http://127.0.0.1:9".to_string());
        assert_eq!(c.upload(Vec::new()).await, None);
    }
}
