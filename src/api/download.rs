// Binary downloads of build artifacts.
// Filename resolution from Content-Disposition and chunked reads with progress reporting.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Response;
use reqwest::header::CONTENT_DISPOSITION;

use crate::error::{ApiError, Result};

/// A fully downloaded file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl DownloadedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the file into `dir`, creating it if needed. Returns the written path.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);

        // Write atomically via temp file
        let temp_path = dir.join(format!("{}.part", self.filename));
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&self.bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        Ok(path)
    }
}

/// Progress of a streaming download, reported after every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// 0-100; stays 0 when the total size is unknown.
    pub percent: u8,
    pub bytes_received: u64,
    /// From the Content-Length header, if the server sent one.
    pub bytes_total: Option<u64>,
}

impl DownloadProgress {
    pub fn new(bytes_received: u64, bytes_total: Option<u64>) -> Self {
        let percent = match bytes_total {
            Some(0) => 100,
            Some(total) => ((bytes_received.min(total) * 100) / total) as u8,
            None => 0,
        };
        Self {
            percent,
            bytes_received,
            bytes_total,
        }
    }
}

/// Filename used when the server does not name the artifact.
pub fn default_filename(build_id: &str) -> String {
    format!("build-{}.zip", sanitize_filename(build_id))
}

/// Resolve the filename of a download response, falling back to `fallback`.
pub fn response_filename(response: &Response, fallback: &str) -> String {
    response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
        .unwrap_or_else(|| fallback.to_string())
}

/// Parse the filename out of a Content-Disposition header value.
///
/// `filename*=UTF-8''...` takes precedence over `filename=...`.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let value = value.trim();
                // charset'language'percent-encoded
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = Some(percent_decode(encoded.trim_matches('"')));
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

fn percent_decode(input: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned()
}

/// Strip path separators and other characters unsafe in a filename.
fn sanitize_filename(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    name.chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Read a response body chunk by chunk, reporting progress after each chunk.
pub async fn read_with_progress<F>(response: Response, mut on_progress: F) -> Result<Vec<u8>>
where
    F: FnMut(DownloadProgress),
{
    let total = response.content_length();
    let mut received: u64 = 0;
    let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Decode(format!("download interrupted: {}", e))
            }
        })?;
        received += chunk.len() as u64;
        bytes.extend_from_slice(&chunk);
        on_progress(DownloadProgress::new(received, total));
    }

    Ok(bytes)
}
