use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("failed to download image: {0}")]
    Http(#[from] reqwest::Error),
    #[error("downloaded image was empty")]
    EmptyPayload,
    #[error("failed to write image to {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads the image at `url` into `output_dir` (the OS temp directory by
/// default) and returns the path of the written file. The file extension is
/// taken from the response's Content-Type header.
pub fn download_image(url: &str, output_dir: Option<&Path>) -> Result<PathBuf, ImageFetchError> {
    debug!("downloading {url}");

    let client = Client::builder().timeout(DOWNLOAD_TIMEOUT).build()?;
    let response = client.get(url).send()?.error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let extension = extension_from_content_type(content_type.as_deref());

    let bytes = response.bytes()?;
    if bytes.is_empty() {
        return Err(ImageFetchError::EmptyPayload);
    }

    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    fs::create_dir_all(&output_dir).map_err(|source| ImageFetchError::Io {
        path: output_dir.clone(),
        source,
    })?;

    let file_name = format!("memey-{}.{}", timestamp_suffix(), extension);
    let path = output_dir.join(file_name);
    fs::write(&path, &bytes).map_err(|source| ImageFetchError::Io {
        path: path.clone(),
        source,
    })?;

    debug!("saved image to {}", path.display());
    Ok(path)
}

fn extension_from_content_type(content_type: Option<&str>) -> &'static str {
    // Parameters such as "; charset=..." are not part of the media type.
    let media_type = content_type
        .unwrap_or("image/jpeg")
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn timestamp_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or_default()
}
