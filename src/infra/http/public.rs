use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    application::{
        blog::{BlogService, PostFilter},
        contact::{ContactError, ContactService},
        error::ErrorReport,
        repos::BlogRepo,
        sections::{SectionContent, SectionService},
    },
    cache::CacheManager,
    config::SiteSettings,
    domain::{contact::ContactForm, sections::Section},
    infra::assets::{DiskAssets, disk_asset_response, serve_static},
    presentation::views::{
        BlogDetailTemplate, BlogListTemplate, CvSectionTemplate, MeSectionTemplate,
        MysterySectionTemplate, PageFragment, PostDetailView, RenderMode,
        ScribblingsSectionTemplate, post_cards, render_not_found_response,
    },
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    render_mode,
};

const CONTACT_SUCCESS: &str = "Thank you for your message! We'll get back to you within 24 hours.";
const CONTACT_FAILURE: &str = "Failed to send your message. Please try again later.";

#[derive(Clone)]
pub struct HttpState {
    pub blog: Arc<BlogService>,
    pub sections: Arc<SectionService>,
    pub contact: Arc<ContactService>,
    pub cache: Arc<CacheManager>,
    pub posts: Arc<dyn BlogRepo>,
    pub site: Arc<SiteSettings>,
    pub assets: Arc<DiskAssets>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/section/{section_id}", get(section))
        .route("/blog", get(blog_list))
        .route("/blog/{post_id}", get(blog_post_by_id))
        .route("/scribblings/{slug}", get(blog_post_by_slug))
        .route("/contact", post(submit_contact))
        .route("/static/{*path}", get(serve_static))
        .route("/assets/{*path}", get(serve_asset))
        .route("/_health/db", get(db_health))
        .route("/_health/cache", get(cache_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlogQuery {
    tag: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContactResponse {
    success: bool,
    message: String,
}

async fn index(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    section_response(&state, render_mode(&headers), Section::Me.as_str()).await
}

async fn section(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Path(section_id): Path<String>,
) -> Response {
    section_response(&state, render_mode(&headers), &section_id).await
}

async fn section_response(state: &HttpState, mode: RenderMode, section_id: &str) -> Response {
    const SOURCE: &str = "infra::http::public::section";

    let content = match state.sections.load(section_id).await {
        Ok(Some(content)) => content,
        Ok(None) => {
            return render_not_found_response(
                mode,
                &state.site,
                SOURCE,
                &format!("unknown section `{section_id}`"),
            );
        }
        Err(err) => return err.into_response(),
    };

    let section = content.section();
    let title = match section {
        Section::Me => None,
        other => Some(other.label().to_string()),
    };
    let site = &state.site;

    match content {
        SectionContent::Me => PageFragment::new(
            title,
            Some(section),
            MeSectionTemplate {
                site_title: site.title.clone(),
                contact_email: site.contact_email.clone(),
            },
        )
        .respond(mode, site, StatusCode::OK),
        SectionContent::Cv => PageFragment::new(title, Some(section), CvSectionTemplate)
            .respond(mode, site, StatusCode::OK),
        SectionContent::Scribblings { posts } => PageFragment::new(
            title,
            Some(section),
            ScribblingsSectionTemplate {
                posts: post_cards(&posts),
            },
        )
        .respond(mode, site, StatusCode::OK),
        SectionContent::Mystery => PageFragment::new(title, Some(section), MysterySectionTemplate)
            .respond(mode, site, StatusCode::OK),
    }
}

async fn blog_list(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<BlogQuery>,
) -> Response {
    let filter = PostFilter::new(query.tag, query.search);
    let posts = match state.blog.list(&filter).await {
        Ok(posts) => posts,
        Err(err) => return err.into_response(),
    };

    let heading = list_heading(&filter);
    PageFragment::new(
        Some(heading.clone()),
        Some(Section::Scribblings),
        BlogListTemplate {
            heading,
            posts: post_cards(&posts),
        },
    )
    .respond(render_mode(&headers), &state.site, StatusCode::OK)
}

fn list_heading(filter: &PostFilter) -> String {
    match (filter.tag.as_deref(), filter.search.as_deref()) {
        (Some(tag), _) => format!("Scribblings tagged {tag}"),
        (None, Some(term)) => format!("Scribblings matching {term}"),
        (None, None) => Section::Scribblings.label().to_string(),
    }
}

async fn blog_post_by_slug(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::blog_post_by_slug";
    let mode = render_mode(&headers);

    match state.blog.post_by_slug(&slug).await {
        Ok(Some(post)) => post_response(&state, mode, PostDetailView::from(&post)),
        Ok(None) => render_not_found_response(
            mode,
            &state.site,
            SOURCE,
            &format!("no post with slug `{slug}`"),
        ),
        Err(err) => err.into_response(),
    }
}

async fn blog_post_by_id(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::blog_post_by_id";
    let mode = render_mode(&headers);

    let Ok(id) = post_id.parse::<i64>() else {
        return render_not_found_response(
            mode,
            &state.site,
            SOURCE,
            &format!("`{post_id}` is not a post id"),
        );
    };

    match state.blog.post_by_id(id).await {
        Ok(Some(post)) => post_response(&state, mode, PostDetailView::from(&post)),
        Ok(None) => render_not_found_response(
            mode,
            &state.site,
            SOURCE,
            &format!("no post with id {id}"),
        ),
        Err(err) => err.into_response(),
    }
}

fn post_response(state: &HttpState, mode: RenderMode, post: PostDetailView) -> Response {
    PageFragment::new(
        Some(post.title.clone()),
        Some(Section::Scribblings),
        BlogDetailTemplate { post },
    )
    .respond(mode, &state.site, StatusCode::OK)
}

async fn submit_contact(
    State(state): State<HttpState>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::public::submit_contact";

    let form = match payload {
        Ok(Json(form)) => form,
        Err(rejection) => {
            let mut response = contact_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                false,
                "Please provide a valid email address and a message.",
            );
            ErrorReport::from_error(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, &rejection)
                .attach(&mut response);
            return response;
        }
    };

    match state.contact.submit(form).await {
        Ok(_) => contact_response(StatusCode::OK, true, CONTACT_SUCCESS),
        Err(err) => {
            let (status, message) = match &err {
                ContactError::Invalid(invalid) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, invalid.to_string())
                }
                ContactError::Notification(_) => (StatusCode::BAD_GATEWAY, CONTACT_FAILURE.into()),
                ContactError::Render(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, CONTACT_FAILURE.into())
                }
            };
            let mut response = contact_response(status, false, message);
            ErrorReport::from_error(SOURCE, status, &err).attach(&mut response);
            response
        }
    }
}

fn contact_response(status: StatusCode, success: bool, message: impl Into<String>) -> Response {
    let body = ContactResponse {
        success,
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

async fn serve_asset(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    let result = state.assets.read(&path).await;
    disk_asset_response(&path, result)
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.posts.health_check().await)
}

async fn cache_health(State(state): State<HttpState>) -> Response {
    Json(state.cache.info()).into_response()
}

async fn fallback(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    render_not_found_response(
        render_mode(&headers),
        &state.site,
        "infra::http::public::fallback",
        "no route matched",
    )
}
