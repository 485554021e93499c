//! Placeholder timelines until posts are persisted.

use serde::Serialize;

use crate::db::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub author: String,
    pub body: String,
}

impl Post {
    fn new(author: &str, body: &str) -> Self {
        Self {
            author: author.to_string(),
            body: body.to_string(),
        }
    }
}

#[must_use]
pub fn home_timeline() -> Vec<Post> {
    vec![
        Post::new("John", "Beautiful day in Portland!"),
        Post::new("Susan", "The Avengers movie was so cool!"),
    ]
}

#[must_use]
pub fn user_timeline(user: &User) -> Vec<Post> {
    vec![
        Post::new(&user.nickname, "Test post #1"),
        Post::new(&user.nickname, "Test post #2"),
    ]
}
