use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::macros::datetime;
use tower::ServiceExt;

use whelmed::application::{
    blog::BlogService,
    contact::ContactService,
    repos::{BlogRepo, RepoError},
    sections::SectionService,
};
use whelmed::cache::{CacheConfig, CacheManager};
use whelmed::config::SiteSettings;
use whelmed::domain::entities::BlogPost;
use whelmed::infra::assets::DiskAssets;
use whelmed::infra::http::{HttpState, build_router};
use whelmed::infra::mail::{MailError, Mailer, OutgoingEmail};

const OWNER: &str = "owner@example.com";

struct InMemoryPosts {
    posts: Vec<BlogPost>,
}

impl InMemoryPosts {
    /// Posts newest first, the order the database hands them out.
    fn seeded() -> Self {
        let posts = vec![
            BlogPost {
                id: 3,
                created_at: datetime!(2024-05-01 09:00 UTC),
                title: Some("Hello World".into()),
                text: "The newer hello.".into(),
                tags: vec!["life".into()],
            },
            BlogPost {
                id: 2,
                created_at: datetime!(2024-04-01 09:00 UTC),
                title: Some("Hello, World!".into()),
                text: "The older hello.".into(),
                tags: vec!["rust".into()],
            },
            BlogPost {
                id: 1,
                created_at: datetime!(2024-03-01 09:00 UTC),
                title: None,
                text: "Async **Rust** notes<br><br>second paragraph".into(),
                tags: vec!["rust".into(), "async".into()],
            },
        ];
        Self { posts }
    }
}

#[async_trait]
impl BlogRepo for InMemoryPosts {
    async fn list_posts(&self) -> Result<Vec<BlogPost>, RepoError> {
        Ok(self.posts.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<BlogPost>, RepoError> {
        Ok(self.posts.iter().find(|post| post.id == id).cloned())
    }

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<BlogPost>, RepoError> {
        Ok(self
            .posts
            .iter()
            .filter(|post| post.has_tag(tag))
            .cloned()
            .collect())
    }

    async fn search_posts(&self, term: &str) -> Result<Vec<BlogPost>, RepoError> {
        Ok(self
            .posts
            .iter()
            .filter(|post| post.matches_search(term))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail_all: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.fail_all {
            return Err(MailError::Configuration("smtp unreachable".into()));
        }
        self.sent.lock().expect("mailer lock").push(email);
        Ok(())
    }
}

fn router_with(mailer: Arc<RecordingMailer>) -> Router {
    router_with_assets(mailer, Path::new(env!("CARGO_MANIFEST_DIR")).join("assets"))
}

fn router_with_assets(mailer: Arc<RecordingMailer>, assets_root: PathBuf) -> Router {
    let posts: Arc<dyn BlogRepo> = Arc::new(InMemoryPosts::seeded());
    let cache = Arc::new(CacheManager::local(CacheConfig::default()));
    let blog = Arc::new(BlogService::new(posts.clone(), cache.clone()));
    let sections = Arc::new(SectionService::new(blog.clone()));
    let contact = Arc::new(ContactService::new(
        mailer,
        OWNER.parse().expect("owner address"),
        "atharva",
    ));

    build_router(HttpState {
        blog,
        sections,
        contact,
        cache,
        posts,
        site: Arc::new(SiteSettings {
            title: "atharva".into(),
            description: "Engineer".into(),
            contact_email: "hello@example.com".into(),
        }),
        assets: Arc::new(DiskAssets::new(assets_root)),
    })
}

fn router() -> Router {
    router_with(Arc::new(RecordingMailer::default()))
}

async fn get(router: Router, uri: &str) -> Response {
    router
        .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response")
}

async fn get_fragment(router: Router, uri: &str) -> Response {
    router
        .oneshot(
            Request::get(uri)
                .header("datastar-request", "true")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn post_contact(router: Router, body: Value) -> Response {
    router
        .oneshot(
            Request::post("/contact")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
}

async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn home_renders_full_layout() {
    let response = get(router(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/html"));

    let body = body_text(response).await;
    assert!(body.contains("<title>atharva</title>"));
    assert!(body.contains("id=\"content\""));
    assert!(body.contains("contact-form"));
}

#[tokio::test]
async fn datastar_requests_receive_content_patch() {
    let response = get_fragment(router(), "/section/scribblings").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/event-stream"));

    let body = body_text(response).await;
    assert!(body.contains("datastar-patch-elements"));
    assert!(body.contains("#content"));
    assert!(body.contains("Scribblings | atharva"));
    assert!(!body.contains("<!DOCTYPE html>"));
}

#[tokio::test]
async fn scribblings_section_lists_posts_by_slug() {
    let response = get(router(), "/section/scribblings").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("/scribblings/hello-world"));
    assert!(body.contains("/scribblings/post-1"));
    assert!(body.contains("Scribbling #1"));
}

#[tokio::test]
async fn unknown_section_is_not_found() {
    let response = get(router(), "/section/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Not found"));
}

#[tokio::test]
async fn slug_collision_serves_newest_post() {
    let response = get(router(), "/scribblings/hello-world").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("The newer hello."));
    assert!(!body.contains("The older hello."));
}

#[tokio::test]
async fn untitled_post_resolves_by_fallback_slug() {
    let response = get(router(), "/scribblings/post-1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("<strong>Rust</strong>"));
    assert!(body.contains("second paragraph"));
}

#[tokio::test]
async fn unknown_slug_is_not_found() {
    let response = get(router(), "/scribblings/never-written").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn legacy_id_route_serves_post() {
    let response = get(router(), "/blog/2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("The older hello."));

    let response = get(router(), "/blog/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(router(), "/blog/not-a-number").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blog_list_prefers_tag_over_search() {
    let response = get(router(), "/blog?tag=rust&search=newer").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("Scribblings tagged rust"));
    assert!(body.contains("Scribbling #1"));
    assert!(body.contains("Hello, World!"));
    assert!(!body.contains("The newer hello."));
}

#[tokio::test]
async fn blog_list_searches_when_untagged() {
    let body = body_text(get(router(), "/blog?search=NEWER").await).await;
    assert!(body.contains("The newer hello."));
    assert!(!body.contains("Scribbling #1"));
}

#[tokio::test]
async fn contact_submission_notifies_owner_and_replies() {
    let mailer = Arc::new(RecordingMailer::default());
    let response = post_contact(
        router_with(mailer.clone()),
        json!({"email": "reader@example.com", "phone": "", "message": "Hi there"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["success"], Value::Bool(true));

    let sent = mailer.sent.lock().expect("mailer lock");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to.to_string(), OWNER);
    assert!(sent[0].html.contains("Not provided"));
    assert_eq!(sent[1].to.to_string(), "reader@example.com");
}

#[tokio::test]
async fn invalid_contact_submission_is_unprocessable() {
    let mailer = Arc::new(RecordingMailer::default());
    let response = post_contact(
        router_with(mailer.clone()),
        json!({"email": "not-an-address", "message": "Hi"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["success"], Value::Bool(false));
    assert!(mailer.sent.lock().expect("mailer lock").is_empty());
}

#[tokio::test]
async fn malformed_contact_payload_is_unprocessable() {
    let response = router()
        .oneshot(
            Request::post("/contact")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn failed_notification_is_bad_gateway() {
    let mailer = Arc::new(RecordingMailer {
        fail_all: true,
        ..Default::default()
    });
    let response = post_contact(
        router_with(mailer),
        json!({"email": "reader@example.com", "message": "Hi"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["success"], Value::Bool(false));
}

#[tokio::test]
async fn cache_health_reports_local_tier() {
    let response = get(router(), "/_health/cache").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["cache_type"], "In-Memory");
    assert_eq!(body["redis_enabled"], Value::Bool(false));
    assert_eq!(body["cache_enabled"], Value::Bool(true));
}

#[tokio::test]
async fn db_health_is_no_content() {
    let response = get(router(), "/_health/db").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn static_assets_are_served() {
    let response = get(router(), "/static/css/site.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/css"));

    let response = get(router(), "/static/css/missing.css").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resume_is_served_from_assets_directory() {
    let root = tempfile::tempdir().expect("tempdir");
    std::fs::write(root.path().join("resume.pdf"), b"%PDF-1.4").expect("write resume");
    let router = router_with_assets(Arc::new(RecordingMailer::default()), root.path().into());

    let cv = body_text(get(router.clone(), "/section/cv").await).await;
    assert!(cv.contains("/assets/resume.pdf"));

    let response = get(router.clone(), "/assets/resume.pdf").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("application/pdf"));
    assert_eq!(body_text(response).await, "%PDF-1.4");

    let response = get(router, "/assets/other.pdf").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let response = get(router(), "/").await;
    assert!(response.headers().contains_key("x-request-id"));
}
