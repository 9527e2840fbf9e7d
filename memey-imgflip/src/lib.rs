use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const CAPTION_ENDPOINT: &str = "https://api.imgflip.com/caption_image";
pub const MEMES_ENDPOINT: &str = "https://api.imgflip.com/get_memes";

/// The API itself defines no timeout; ten seconds keeps a dead network from
/// hanging the invocation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ImgflipError {
    #[error("request to Imgflip failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Conversion Failed: {message}")]
    Rejected { message: String },
    #[error("Imgflip reported success but returned no result")]
    MalformedResponse,
}

/// How caption text is submitted.
///
/// The simple endpoint fields (`text0`/`text1`) are re-capitalized server
/// side; the boxes form preserves exact casing and is required whenever a
/// text transform was applied locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionMode {
    Simple,
    Boxes,
}

/// A finished caption job: the shareable image URL plus the page hosting it.
#[derive(Debug, Clone)]
pub struct CaptionedImage {
    pub url: String,
    pub page_url: Option<String>,
}

/// A template as the remote list endpoint describes it. Extra fields such as
/// `width`, `height`, and `box_count` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTemplate {
    pub id: u64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionData {
    url: String,
    page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemesData {
    memes: Vec<RemoteTemplate>,
}

fn form_params(
    template_id: u64,
    username: &str,
    password: &str,
    top: Option<&str>,
    bottom: Option<&str>,
    mode: CaptionMode,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("template_id".to_string(), template_id.to_string()),
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ];

    let top = top.unwrap_or_default();
    let bottom = bottom.unwrap_or_default();
    match mode {
        CaptionMode::Simple => {
            params.push(("text0".to_string(), top.to_string()));
            params.push(("text1".to_string(), bottom.to_string()));
        }
        CaptionMode::Boxes => {
            params.push(("boxes[0][text]".to_string(), top.to_string()));
            params.push(("boxes[1][text]".to_string(), bottom.to_string()));
        }
    }
    params
}

fn http_client() -> Result<Client, ImgflipError> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(client)
}

/// Submits one captioning request and returns the resulting image URL.
///
/// A `success: false` response surfaces the server's `error_message`
/// verbatim as [`ImgflipError::Rejected`]; transport failures and
/// unparsable bodies surface as [`ImgflipError::Http`]. No retries.
pub fn caption_image(
    username: &str,
    password: &str,
    template_id: u64,
    top: Option<&str>,
    bottom: Option<&str>,
    mode: CaptionMode,
) -> Result<CaptionedImage, ImgflipError> {
    debug!("captioning template {template_id} in {mode:?} mode");

    let params = form_params(template_id, username, password, top, bottom, mode);
    let response = http_client()?
        .post(CAPTION_ENDPOINT)
        .form(&params)
        .send()?;

    let parsed: ApiResponse<CaptionData> = response.json()?;
    if !parsed.success {
        return Err(ImgflipError::Rejected {
            message: parsed.error_message.unwrap_or_default(),
        });
    }

    let data = parsed.data.ok_or(ImgflipError::MalformedResponse)?;
    debug!("caption ready at {}", data.url);
    Ok(CaptionedImage {
        url: data.url,
        page_url: data.page_url,
    })
}

/// Fetches the current remote template list in one unauthenticated GET.
pub fn fetch_templates() -> Result<Vec<RemoteTemplate>, ImgflipError> {
    debug!("fetching remote template list");

    let response = http_client()?.get(MEMES_ENDPOINT).send()?;
    let parsed: ApiResponse<MemesData> = response.json()?;
    if !parsed.success {
        return Err(ImgflipError::Rejected {
            message: parsed.error_message.unwrap_or_default(),
        });
    }

    let data = parsed.data.ok_or(ImgflipError::MalformedResponse)?;
    debug!("remote list has {} templates", data.memes.len());
    Ok(data.memes)
}

/// Lower-cases the text, then upper-cases every character at an even
/// zero-based index. `"test"` becomes `"TeSt"`; empty input stays empty.
pub fn alternating_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, ch) in text.to_lowercase().chars().enumerate() {
        if index % 2 == 0 {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}
