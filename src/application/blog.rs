use std::sync::Arc;

use axum::http::StatusCode;
use tracing::warn;

use crate::application::error::HttpError;
use crate::application::repos::{BlogRepo, RepoError};
use crate::cache::CacheManager;
use crate::domain::entities::BlogPost;
use crate::domain::slug;

const SOURCE: &str = "application::blog::BlogService";

/// Query-string filter for the post list. `tag` takes priority over `search`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl PostFilter {
    pub fn new(tag: Option<String>, search: Option<String>) -> Self {
        Self {
            tag: non_blank(tag),
            search: non_blank(search),
        }
    }
}

/// Cached read access to scribblings posts.
#[derive(Clone)]
pub struct BlogService {
    posts: Arc<dyn BlogRepo>,
    cache: Arc<CacheManager>,
}

impl BlogService {
    pub fn new(posts: Arc<dyn BlogRepo>, cache: Arc<CacheManager>) -> Self {
        Self { posts, cache }
    }

    pub async fn all_posts(&self) -> Result<Vec<BlogPost>, HttpError> {
        let key = self.cache.key("list_posts").build();
        self.cache
            .cached_default(key, || self.posts.list_posts())
            .await
            .map_err(|err| repo_failure("list_posts", err))
    }

    pub async fn list(&self, filter: &PostFilter) -> Result<Vec<BlogPost>, HttpError> {
        if let Some(tag) = filter.tag.as_deref() {
            let key = self.cache.key("list_by_tag").arg(tag).build();
            return self
                .cache
                .cached_default(key, || self.posts.list_by_tag(tag))
                .await
                .map_err(|err| repo_failure("list_by_tag", err));
        }

        if let Some(term) = filter.search.as_deref() {
            let key = self.cache.key("search_posts").arg(term).build();
            return self
                .cache
                .cached_default(key, || self.posts.search_posts(term))
                .await
                .map_err(|err| repo_failure("search_posts", err));
        }

        self.all_posts().await
    }

    pub async fn post_by_id(&self, id: i64) -> Result<Option<BlogPost>, HttpError> {
        let key = self.cache.key("get_post_by_id").arg(id).build();
        self.cache
            .cached_default(key, || self.posts.find_by_id(id))
            .await
            .map_err(|err| repo_failure("find_by_id", err))
    }

    /// Resolve a post by its derived slug, scanning every post newest first.
    pub async fn post_by_slug(&self, requested: &str) -> Result<Option<BlogPost>, HttpError> {
        let posts = self.all_posts().await?;
        let Some(found) = slug::find_by_slug(&posts, requested, |post| {
            (post.title.as_deref(), post.id)
        }) else {
            return Ok(None);
        };

        if !found.shadowed.is_empty() {
            warn!(
                target = SOURCE,
                slug = requested,
                served_id = found.winner.id,
                shadowed_ids = ?found.shadowed,
                "Several posts share a slug; serving the newest"
            );
        }

        Ok(Some(found.winner.clone()))
    }
}

fn repo_failure(operation: &'static str, err: RepoError) -> HttpError {
    HttpError::new(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to load scribblings",
        format!("{operation} failed: {err}"),
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
