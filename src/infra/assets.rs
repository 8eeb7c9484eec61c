//! Static asset serving: the embedded `static/` bundle and the on-disk `/assets` directory.

use std::path::{Component, Path as FsPath, PathBuf};

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::Mime;
use thiserror::Error;
use tokio::fs;

use crate::application::error::ErrorReport;

const SOURCE: &str = "infra::assets::serve_static";

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Serve a file from the embedded `static/` directory.
pub async fn serve_static(Path(path): Path<String>) -> Response {
    match resolve_asset(&STATIC_ASSETS, &path) {
        Some(contents) => build_response(
            Bytes::from_static(contents),
            mime_guess::from_path(&path).first_or_octet_stream(),
        ),
        None => not_found_response(),
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid asset path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Files served from a directory on disk, such as the resume PDF.
#[derive(Debug, Clone)]
pub struct DiskAssets {
    root: PathBuf,
}

impl DiskAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn read(&self, path: &str) -> Result<Bytes, AssetError> {
        let absolute = self.resolve(path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AssetError> {
        let relative = FsPath::new(path);
        if path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(AssetError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

/// Build the response for a file read from [`DiskAssets`].
pub fn disk_asset_response(path: &str, result: Result<Bytes, AssetError>) -> Response {
    const SOURCE: &str = "infra::assets::serve_disk_asset";

    match result {
        Ok(bytes) => build_response(bytes, mime_guess::from_path(path).first_or_octet_stream()),
        Err(AssetError::InvalidPath) => {
            let mut response = StatusCode::NOT_FOUND.into_response();
            ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Asset not found")
                .attach(&mut response);
            response
        }
        Err(AssetError::Io(err)) => {
            let status = match err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory => {
                    StatusCode::NOT_FOUND
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let mut response = status.into_response();
            ErrorReport::from_error(SOURCE, status, &err).attach(&mut response);
            response
        }
    }
}

fn not_found_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn resolve_asset(bundle: &'static Dir<'static>, path: &str) -> Option<&'static [u8]> {
    let candidate = path.trim_start_matches('/');

    // No directory listings or traversal.
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        return None;
    }

    bundle.get_file(candidate).map(|file| file.contents())
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );

    response
}
