use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::slug::derive_post_slug;

/// A scribblings post as stored. The slug is never persisted; see [`BlogPost::slug`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub title: Option<String>,
    pub text: String,
    pub tags: Vec<String>,
}

impl BlogPost {
    pub fn slug(&self) -> String {
        derive_post_slug(self.title.as_deref(), Some(self.id))
    }

    /// Title for display, falling back to a numbered placeholder.
    pub fn display_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Scribbling #{}", self.id),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Case-insensitive substring match over title and body.
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.title
            .as_deref()
            .is_some_and(|title| title.to_lowercase().contains(&needle))
            || self.text.to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, title: Option<&str>, text: &str) -> BlogPost {
        BlogPost {
            id,
            created_at: OffsetDateTime::UNIX_EPOCH,
            title: title.map(str::to_string),
            text: text.to_string(),
            tags: vec!["rust".to_string()],
        }
    }

    #[test]
    fn slug_is_derived_from_title_and_id() {
        assert_eq!(post(7, Some("Hello, World!"), "").slug(), "hello-world");
        assert_eq!(post(7, None, "").slug(), "post-7");
    }

    #[test]
    fn display_title_falls_back_for_blank_titles() {
        assert_eq!(post(3, Some("  "), "").display_title(), "Scribbling #3");
        assert_eq!(post(3, Some("Notes"), "").display_title(), "Notes");
    }

    #[test]
    fn search_ignores_case_across_title_and_text() {
        let entry = post(1, Some("Borrow Checker"), "Lifetimes all the way down");
        assert!(entry.matches_search("borrow"));
        assert!(entry.matches_search("LIFETIMES"));
        assert!(!entry.matches_search("garbage collector"));
    }

    #[test]
    fn tag_match_is_exact() {
        let entry = post(1, None, "");
        assert!(entry.has_tag("rust"));
        assert!(!entry.has_tag("Rust"));
    }
}
