//! Helpers for building server-driven datastar SSE responses.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, Sse},
};
use datastar::prelude::{ElementPatchMode, ExecuteScript, PatchElements};

/// Builder for composing datastar-compatible SSE responses.
#[derive(Default)]
pub struct StreamBuilder {
    events: Vec<Event>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element patch targeting the supplied selector.
    pub fn push_patch(
        &mut self,
        html: String,
        selector: &str,
        mode: ElementPatchMode,
    ) -> &mut Self {
        let event = PatchElements::new(html)
            .selector(selector)
            .mode(mode)
            .write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    /// Queue an inline script for execution on the client.
    pub fn push_script(&mut self, script: String) -> &mut Self {
        let event = ExecuteScript::new(script).write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    /// Queue a script that sets `document.title`.
    pub fn push_title(&mut self, title: &str) -> &mut Self {
        let literal = serde_json::to_string(title).unwrap_or_else(|_| "\"\"".to_string());
        self.push_script(format!("document.title = {literal};"))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Finalise the builder into an Axum response.
    pub fn into_response(self) -> Response {
        let stream = stream! {
            for event in self.events {
                yield Ok::<Event, Infallible>(event);
            }
        };
        Sse::new(stream).into_response()
    }
}
