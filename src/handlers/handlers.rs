use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, Response},
    Json,
};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::discovery::parsers::to_media_info;
use crate::models::models::{
    non_blank, DownloadRequest, DownloadResponse, InfoRequest, MediaInfo,
};
use crate::service::state::AppState;
use crate::utils::error::{AppError, DOWNLOAD_FAILED, INFO_FAILED};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// The single-page front-end.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /api/info`: metadata and available formats, nothing is downloaded.
pub async fn media_info(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MediaInfo>, AppError> {
    let request: InfoRequest = parse_body(&body, INFO_FAILED)?;
    let url = non_blank(request.url.as_deref()).ok_or(AppError::MissingUrl)?;

    info!("Fetching media info for {url}");
    let raw = state.tool.fetch_info(url).await.map_err(AppError::info)?;

    Ok(Json(to_media_info(raw, state.max_formats)))
}

/// `POST /api/download`: fetches the media into the download directory
/// and returns where it can be picked up.
pub async fn download(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DownloadResponse>, AppError> {
    let request: DownloadRequest = parse_body(&body, DOWNLOAD_FAILED)?;
    let url = non_blank(request.url.as_deref()).ok_or(AppError::MissingUrl)?;
    let format = request.format.as_deref();

    info!("Download requested for {url} (format: {})", format.unwrap_or("best"));
    let file = state
        .downloads
        .download(state.tool.as_ref(), url, format)
        .await
        .map_err(AppError::download)?;

    Ok(Json(DownloadResponse::completed(file.public_url(), file.filename)))
}

/// Bodies are read as JSON whatever Content-Type the client sent. An
/// unreadable body fails like any other error of that endpoint.
fn parse_body<T: DeserializeOwned>(body: &[u8], fallback: &'static str) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::Failed {
        fallback,
        source: e.into(),
    })
}

/// Serve a downloaded file in partial content (Range) if requested, or full
/// if no Range is given.
///
/// Example usage: GET /downloads/video_1700000000000.mp4
pub async fn serve_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    if !is_safe_filename(&filename) {
        return Err(StatusCode::NOT_FOUND);
    }
    let path = state.downloads.dir().join(&filename);

    let meta = tokio::fs::metadata(&path).await.map_err(|_| StatusCode::NOT_FOUND)?;
    if !meta.is_file() {
        return Err(StatusCode::NOT_FOUND);
    }
    let file_size = meta.len();
    let content_type = content_type_for(&filename);

    let range_header = headers.get(header::RANGE).and_then(|val| val.to_str().ok());

    // No Range header: the entire file
    let Some(range_str) = range_header else {
        let file = File::open(&path).await.map_err(|_| StatusCode::NOT_FOUND)?;
        let body = Body::from_stream(ReaderStream::new(file));

        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, file_size)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(body)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR);
    };

    let (start, end) = parse_range_header(range_str, file_size)?;

    if start >= file_size {
        return Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
            .body(Body::empty())
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR);
    }

    let end = end.min(file_size - 1);
    let chunk_size = end - start + 1;

    let mut file = File::open(&path).await.map_err(|_| StatusCode::NOT_FOUND)?;
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    // Only `chunk_size` bytes from `start`
    let limited_reader = file.take(chunk_size);
    let body = Body::from_stream(ReaderStream::new(limited_reader));

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, chunk_size)
        .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{file_size}"))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// A simple Range header parser that expects: "bytes=start-end".
/// Example: "bytes=0-1023" => (0, 1023).
/// If "bytes=100-" => (100, file_size-1).
fn parse_range_header(range_str: &str, file_size: u64) -> Result<(u64, u64), StatusCode> {
    let Some(spec) = range_str.strip_prefix("bytes=") else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let Some((start, end)) = spec.trim().split_once('-') else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let start: u64 = start.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    if end.is_empty() {
        Ok((start, file_size.saturating_sub(1)))
    } else {
        let end: u64 = end.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
        if end < start {
            return Err(StatusCode::BAD_REQUEST);
        }
        Ok((start, end))
    }
}

/// Plain file names only: nothing that could walk out of the download directory.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "opus" | "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}
