use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder, types::Json};
use time::OffsetDateTime;

use crate::{
    application::repos::{BlogRepo, RepoError},
    domain::entities::BlogPost,
};

use super::{PostgresRepositories, map_sqlx_error};

/// Both schema revisions flattened into one row shape. Structured columns win over `data`.
const POSTS_CTE: &str = "WITH posts AS ( \
    SELECT \
        b.id::BIGINT AS id, \
        COALESCE(b.created_at, 'epoch'::timestamptz) AS created_at, \
        COALESCE(b.title, b.data->>'title') AS title, \
        COALESCE(NULLIF(b.text, ''), b.data->>'text', '') AS text, \
        COALESCE(b.tags, b.data->'tags', '[]'::jsonb) AS tags \
    FROM blog b \
) SELECT id, created_at, title, text, tags FROM posts";

const POSTS_ORDER: &str = " ORDER BY created_at DESC, id DESC";

#[derive(sqlx::FromRow)]
struct BlogRow {
    id: i64,
    created_at: OffsetDateTime,
    title: Option<String>,
    text: String,
    tags: Json<Value>,
}

impl From<BlogRow> for BlogPost {
    fn from(row: BlogRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            text: row.text,
            tags: string_tags(row.tags.0),
        }
    }
}

/// String entries of a JSON tag array; anything else is dropped.
fn string_tags(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

impl PostgresRepositories {
    async fn fetch_posts(
        &self,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<BlogPost>, RepoError> {
        qb.push(POSTS_ORDER);
        let rows = qb
            .build_query_as::<BlogRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BlogPost::from).collect())
    }
}

#[async_trait]
impl BlogRepo for PostgresRepositories {
    async fn list_posts(&self) -> Result<Vec<BlogPost>, RepoError> {
        self.fetch_posts(QueryBuilder::new(POSTS_CTE)).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<BlogPost>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POSTS_CTE);
        qb.push(" WHERE id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<BlogRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BlogPost::from))
    }

    async fn list_by_tag(&self, tag: &str) -> Result<Vec<BlogPost>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POSTS_CTE);
        qb.push(" WHERE jsonb_typeof(tags) = 'array' AND tags @> jsonb_build_array(");
        qb.push_bind(tag.to_string());
        qb.push("::text)");
        self.fetch_posts(qb).await
    }

    async fn search_posts(&self, term: &str) -> Result<Vec<BlogPost>, RepoError> {
        let pattern = escape_like(term);
        let mut qb = QueryBuilder::<Postgres>::new(POSTS_CTE);
        qb.push(" WHERE (title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR text ILIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
        self.fetch_posts(qb).await
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        PostgresRepositories::health_check(self)
            .await
            .map_err(map_sqlx_error)
    }
}
