use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Number of characters shown when a post is displayed in a title or tab.
pub const POST_EXCERPT_LEN: usize = 15;

/// Post entity - a text entry with an optional image and group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub text: String,
    /// Storage key of the attached image, e.g. `posts/cat.gif`.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post.
    pub fn new(author_id: Uuid, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            group_id: None,
            text,
            image: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_group(mut self, group_id: Option<Uuid>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }

    /// Replace the editable fields. Only the author may edit; the creation
    /// timestamp and authorship never change.
    pub fn edit(
        &mut self,
        editor_id: Uuid,
        text: String,
        group_id: Option<Uuid>,
        image: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.is_authored_by(editor_id) {
            return Err(DomainError::NotAuthor("post"));
        }
        self.text = text;
        self.group_id = group_id;
        self.image = image;
        Ok(())
    }

    pub fn excerpt(&self) -> String {
        self.text.chars().take(POST_EXCERPT_LEN).collect()
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.excerpt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let post = Post::new(Uuid::new_v4(), "Длинный тестовый пост".to_string());
        assert_eq!(post.excerpt(), "Длинный тестовы");
        assert_eq!(post.to_string().chars().count(), POST_EXCERPT_LEN);
    }

    #[test]
    fn edit_by_other_user_is_rejected_and_leaves_post_untouched() {
        let author = Uuid::new_v4();
        let mut post = Post::new(author, "original".to_string());
        let before = post.clone();

        let result = post.edit(Uuid::new_v4(), "changed".to_string(), None, None);

        assert!(matches!(result, Err(DomainError::NotAuthor("post"))));
        assert_eq!(post, before);
    }

    #[test]
    fn edit_by_author_keeps_timestamp() {
        let author = Uuid::new_v4();
        let group = Uuid::new_v4();
        let mut post = Post::new(author, "original".to_string());
        let created_at = post.created_at;

        post.edit(author, "changed".to_string(), Some(group), None)
            .unwrap();

        assert_eq!(post.text, "changed");
        assert_eq!(post.group_id, Some(group));
        assert_eq!(post.created_at, created_at);
    }
}
