use base64::{engine::general_purpose::STANDARD, Engine};
use core::fmt::{self, Display};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The image host could not be reached.
    Request,
    /// The image host refused the upload.
    Rejected(String),
    /// The image host answered with something other than an upload result.
    Malformed,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("Image upload request failed."),
            Self::Rejected(reason) => write!(f, "Image upload rejected: {reason}"),
            Self::Malformed => f.write_str("Malformed image upload response."),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        log::error!("image upload transport error: {err}");
        Self::Request
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Client for an imgBB-compatible image host.
pub struct Uploader {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl Uploader {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.imgbb.com/1/upload";

    pub fn new(api_key: String, endpoint: String) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, endpoint, api_key })
    }

    /// Uploads the image and returns its public URL.
    pub async fn upload(&self, name: &str, image: &[u8]) -> Result<String> {
        let encoded = STANDARD.encode(image);
        let form = [("key", self.api_key.as_str()), ("image", encoded.as_str()), ("name", name)];
        let res = self.http.post(&self.endpoint).form(&form).send().await?;

        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            log::warn!("image host responded with {status}");
        }
        parse_response(&bytes)
    }
}

fn parse_response(bytes: &[u8]) -> Result<String> {
    #[derive(Deserialize)]
    struct Upload {
        success: bool,
        data: Option<Data>,
        error: Option<Failure>,
    }

    #[derive(Deserialize)]
    struct Data {
        url: String,
    }

    #[derive(Deserialize)]
    struct Failure {
        message: Option<String>,
    }

    let Upload { success, data, error } = serde_json::from_slice(bytes).map_err(|_| Error::Malformed)?;
    if !success {
        let reason = error.and_then(|failure| failure.message).unwrap_or_else(|| String::from("unknown error"));
        return Err(Error::Rejected(reason));
    }

    data.map(|data| data.url).filter(|url| model::media::is_valid_url(url)).ok_or(Error::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_public_url() {
        let body = br#"{"data":{"id":"2ndCYJK","url":"https://i.ibb.co/w04Prt6/scan.png","size":42},"success":true,"status":200}"#;
        assert_eq!(parse_response(body), Ok(String::from("https://i.ibb.co/w04Prt6/scan.png")));
    }

    #[test]
    fn surfaces_the_rejection_reason() {
        let body = br#"{"status_code":400,"error":{"message":"Invalid API v1 key.","code":100},"success":false}"#;
        assert_eq!(parse_response(body), Err(Error::Rejected(String::from("Invalid API v1 key."))));
        assert_eq!(parse_response(br#"{"success":false}"#), Err(Error::Rejected(String::from("unknown error"))));
    }

    #[test]
    fn rejects_unexpected_bodies() {
        assert_eq!(parse_response(b"502 Bad Gateway"), Err(Error::Malformed));
        assert_eq!(parse_response(br#"{"success":true}"#), Err(Error::Malformed));
        assert_eq!(parse_response(br#"{"success":true,"data":{"url":"nan"}}"#), Err(Error::Malformed));
    }
}
