//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::BlogPost;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to scribblings posts.
///
/// Every list is ordered newest-created first, ties broken by id descending.
#[async_trait]
pub trait BlogRepo: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<BlogPost>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<BlogPost>, RepoError>;

    /// Posts whose tag list contains `tag` exactly.
    async fn list_by_tag(&self, tag: &str) -> Result<Vec<BlogPost>, RepoError>;

    /// Posts whose title or text contains `term`, ignoring case.
    async fn search_posts(&self, term: &str) -> Result<Vec<BlogPost>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}
