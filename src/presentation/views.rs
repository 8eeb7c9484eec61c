use crate::application::error::{ErrorReport, HttpError};
use crate::application::stream::StreamBuilder;
use crate::config::SiteSettings;
use crate::domain::entities::BlogPost;
use crate::domain::sections::Section;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use datastar::prelude::ElementPatchMode;
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

/// Element that fragment responses patch into.
pub const CONTENT_SELECTOR: &str = "#content";

const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Whether a page is answered with the whole document or a `#content` patch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    FullPage,
    Fragment,
}

/// A rendered content fragment plus what the surrounding layout needs.
pub struct PageFragment<T> {
    pub title: Option<String>,
    pub active: Option<Section>,
    pub content: T,
}

impl<T: Template> PageFragment<T> {
    pub fn new(title: Option<String>, active: Option<Section>, content: T) -> Self {
        Self {
            title,
            active,
            content,
        }
    }

    /// Render as a full page or as a datastar patch stream, depending on `mode`.
    pub fn respond(self, mode: RenderMode, site: &SiteSettings, status: StatusCode) -> Response {
        let fragment_html = match render_template(self.content) {
            Ok(Html(html)) => html,
            Err(err) => return err.into_response(),
        };
        let document_title = document_title(self.title.as_deref(), &site.title);

        let mut response = match mode {
            RenderMode::Fragment => {
                let mut stream = StreamBuilder::new();
                stream
                    .push_patch(fragment_html, CONTENT_SELECTOR, ElementPatchMode::Inner)
                    .push_title(&document_title);
                stream.into_response()
            }
            RenderMode::FullPage => render_template_response(
                LayoutTemplate {
                    chrome: SiteChrome::new(site, self.active),
                    document_title,
                    content_html: fragment_html,
                },
                StatusCode::OK,
            ),
        };

        if response.status() == StatusCode::OK {
            *response.status_mut() = status;
        }
        response
    }
}

pub fn render_not_found_response(
    mode: RenderMode,
    site: &SiteSettings,
    source: &'static str,
    detail: &str,
) -> Response {
    let page = PageFragment::new(
        Some("Not found".to_string()),
        None,
        NotFoundTemplate {
            message: "The page you were looking for does not exist.".to_string(),
        },
    );
    let mut response = page.respond(mode, site, StatusCode::NOT_FOUND);
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, detail).attach(&mut response);
    response
}

pub fn document_title(page_title: Option<&str>, site_title: &str) -> String {
    match page_title {
        Some(title) if !title.trim().is_empty() => format!("{title} | {site_title}"),
        _ => site_title.to_string(),
    }
}

#[derive(Clone)]
pub struct NavLinkView {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

#[derive(Clone)]
pub struct SiteChrome {
    pub site_title: String,
    pub description: String,
    pub contact_email: String,
    pub navigation: Vec<NavLinkView>,
}

impl SiteChrome {
    pub fn new(site: &SiteSettings, active: Option<Section>) -> Self {
        let navigation = Section::ALL
            .iter()
            .map(|section| NavLinkView {
                label: section.label(),
                href: section.path(),
                active: active == Some(*section),
            })
            .collect();

        Self {
            site_title: site.title.clone(),
            description: site.description.clone(),
            contact_email: site.contact_email.clone(),
            navigation,
        }
    }
}

#[derive(Template)]
#[template(path = "layout.html")]
pub struct LayoutTemplate {
    pub chrome: SiteChrome,
    pub document_title: String,
    pub content_html: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub title: String,
    pub href: String,
    pub published: String,
    pub tags: Vec<String>,
    pub excerpt: String,
}

impl From<&BlogPost> for PostCard {
    fn from(post: &BlogPost) -> Self {
        Self {
            title: post.display_title(),
            href: post_href(post),
            published: format_post_date(post.created_at),
            tags: post.tags.clone(),
            excerpt: excerpt(&post.text),
        }
    }
}

pub fn post_cards(posts: &[BlogPost]) -> Vec<PostCard> {
    posts.iter().map(PostCard::from).collect()
}

pub struct PostDetailView {
    pub title: String,
    pub published: String,
    pub tags: Vec<String>,
    pub body_html: String,
}

impl From<&BlogPost> for PostDetailView {
    fn from(post: &BlogPost) -> Self {
        Self {
            title: post.display_title(),
            published: format_post_date(post.created_at),
            tags: post.tags.clone(),
            body_html: markdown_to_html(&post.text),
        }
    }
}

#[derive(Template)]
#[template(path = "sections/me.html")]
pub struct MeSectionTemplate {
    pub site_title: String,
    pub contact_email: String,
}

#[derive(Template)]
#[template(path = "sections/cv.html")]
pub struct CvSectionTemplate;

#[derive(Template)]
#[template(path = "sections/scribblings.html")]
pub struct ScribblingsSectionTemplate {
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "sections/mystery.html")]
pub struct MysterySectionTemplate;

#[derive(Template)]
#[template(path = "blog/list.html")]
pub struct BlogListTemplate {
    pub heading: String,
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "blog/detail.html")]
pub struct BlogDetailTemplate {
    pub post: PostDetailView,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub message: String,
}

/// Path of the canonical detail page for `post`.
pub fn post_href(post: &BlogPost) -> String {
    format!("/scribblings/{}", post.slug())
}

pub fn format_post_date(at: OffsetDateTime) -> String {
    let format = format_description!("[month repr:long] [day padding:none], [year]");
    at.format(&format)
        .unwrap_or_else(|_| at.date().to_string())
}

/// Render a post body: legacy `<br>` tags become newlines, then markdown, then sanitisation.
pub fn markdown_to_html(text: &str) -> String {
    let normalized = replace_legacy_breaks(text);

    let mut options = comrak::Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.render.hardbreaks = true;
    options.render.unsafe_ = true;

    let html = comrak::markdown_to_html(&normalized, &options);
    ammonia::clean(&html)
}

fn replace_legacy_breaks(text: &str) -> String {
    text.replace("<br><br>", "\n\n")
        .replace("<br/><br/>", "\n\n")
        .replace("<br />", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
}

/// Plain-text teaser for list cards.
fn excerpt(text: &str) -> String {
    let flattened = replace_legacy_breaks(text);
    let collapsed = flattened.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}
