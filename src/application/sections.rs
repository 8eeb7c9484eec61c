use std::sync::Arc;

use crate::application::blog::BlogService;
use crate::application::error::HttpError;
use crate::domain::entities::BlogPost;
use crate::domain::sections::Section;

/// Data needed to render one portfolio section.
#[derive(Debug, Clone)]
pub enum SectionContent {
    Me,
    Cv,
    Scribblings { posts: Vec<BlogPost> },
    Mystery,
}

impl SectionContent {
    pub fn section(&self) -> Section {
        match self {
            SectionContent::Me => Section::Me,
            SectionContent::Cv => Section::Cv,
            SectionContent::Scribblings { .. } => Section::Scribblings,
            SectionContent::Mystery => Section::Mystery,
        }
    }
}

#[derive(Clone)]
pub struct SectionService {
    blog: Arc<BlogService>,
}

impl SectionService {
    pub fn new(blog: Arc<BlogService>) -> Self {
        Self { blog }
    }

    /// Load the section named by `section_id`; unknown ids yield `None`.
    pub async fn load(&self, section_id: &str) -> Result<Option<SectionContent>, HttpError> {
        let Ok(section) = section_id.parse::<Section>() else {
            return Ok(None);
        };

        let content = match section {
            Section::Me => SectionContent::Me,
            Section::Cv => SectionContent::Cv,
            Section::Mystery => SectionContent::Mystery,
            Section::Scribblings => SectionContent::Scribblings {
                posts: self.blog.all_posts().await?,
            },
        };

        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::repos::{BlogRepo, RepoError};
    use crate::cache::{CacheConfig, CacheManager};

    struct OnePost;

    #[async_trait]
    impl BlogRepo for OnePost {
        async fn list_posts(&self) -> Result<Vec<BlogPost>, RepoError> {
            Ok(vec![BlogPost {
                id: 1,
                created_at: OffsetDateTime::UNIX_EPOCH,
                title: Some("First".into()),
                text: "hello".into(),
                tags: Vec::new(),
            }])
        }

        async fn find_by_id(&self, _id: i64) -> Result<Option<BlogPost>, RepoError> {
            Ok(None)
        }

        async fn list_by_tag(&self, _tag: &str) -> Result<Vec<BlogPost>, RepoError> {
            Ok(Vec::new())
        }

        async fn search_posts(&self, _term: &str) -> Result<Vec<BlogPost>, RepoError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<(), RepoError> {
            Ok(())
        }
    }

    fn service() -> SectionService {
        let cache = Arc::new(CacheManager::local(CacheConfig::default()));
        SectionService::new(Arc::new(BlogService::new(Arc::new(OnePost), cache)))
    }

    #[tokio::test]
    async fn scribblings_section_carries_posts() {
        let content = service()
            .load("scribblings")
            .await
            .expect("load")
            .expect("known section");
        match content {
            SectionContent::Scribblings { posts } => assert_eq!(posts.len(), 1),
            other => panic!("unexpected section {:?}", other.section()),
        }
    }

    #[tokio::test]
    async fn static_sections_load_without_posts() {
        let content = service().load("cv").await.expect("load");
        assert!(matches!(content, Some(SectionContent::Cv)));
    }

    #[tokio::test]
    async fn unknown_sections_are_none() {
        assert!(service().load("admin").await.expect("load").is_none());
        assert!(service().load("Me").await.expect("load").is_none());
    }
}
