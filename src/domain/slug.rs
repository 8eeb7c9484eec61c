//! Read-time slug derivation for scribblings posts.
//!
//! Slugs are never stored. Every lookup recomputes them from the title (or
//! id) of each candidate post, so two posts can reduce to the same slug.
//! [`find_by_slug`] resolves such collisions in favour of the first post in
//! the caller's ordering and reports the ids it shadowed.

/// Slug used when a post has neither a usable title nor an id.
pub const UNTITLED_SLUG: &str = "untitled-post";

/// Derive the URL slug for a post.
///
/// The title is lowercased, stripped of everything except alphanumerics,
/// whitespace and hyphens, and runs of whitespace or hyphens collapse into a
/// single hyphen. An empty result falls back to `post-{id}`, then to
/// [`UNTITLED_SLUG`].
pub fn derive_post_slug(title: Option<&str>, id: Option<i64>) -> String {
    let from_title = title.map(slugify_title).unwrap_or_default();
    if !from_title.is_empty() {
        return from_title;
    }

    match id {
        Some(id) => format!("post-{id}"),
        None => UNTITLED_SLUG.to_string(),
    }
}

fn slugify_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_separator = true;
        }
    }

    slug
}

/// Outcome of scanning a post list for a slug.
#[derive(Debug, PartialEq, Eq)]
pub struct SlugMatch<'a, T> {
    pub winner: &'a T,
    /// Ids of later posts that derive the same slug.
    pub shadowed: Vec<i64>,
}

/// Scan `posts` in order and return the first one whose derived slug equals `slug`.
pub fn find_by_slug<'a, T, F>(posts: &'a [T], slug: &str, key: F) -> Option<SlugMatch<'a, T>>
where
    F: Fn(&T) -> (Option<&str>, i64),
{
    let mut matches = posts.iter().filter(|post| {
        let (title, id) = key(post);
        derive_post_slug(title, Some(id)) == slug
    });

    let winner = matches.next()?;
    let shadowed = matches.map(|post| key(post).1).collect();
    Some(SlugMatch { winner, shadowed })
}
