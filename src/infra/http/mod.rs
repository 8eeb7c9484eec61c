mod middleware;
mod public;

pub use public::{HttpState, build_router};

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::presentation::views::RenderMode;

const DATASTAR_REQUEST_HEADER: &str = "datastar-request";

/// Fragment rendering when the datastar client marked the request, full page otherwise.
fn render_mode(headers: &HeaderMap) -> RenderMode {
    if headers.contains_key(DATASTAR_REQUEST_HEADER) {
        RenderMode::Fragment
    } else {
        RenderMode::FullPage
    }
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
