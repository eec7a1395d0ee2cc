//! Input rules for registration, posts and comments.
//!
//! Every function returns the cleaned value or a message suitable for a
//! 400 response.

use std::sync::LazyLock;

use regex::Regex;

use crate::db::models::Category;

pub const MIN_CATEGORIES: usize = 1;
pub const MAX_CATEGORIES: usize = 3;
pub const MIN_COMMENT_CHARS: usize = 3;
pub const MAX_COMMENT_CHARS: usize = 500;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

pub type Validated<T> = Result<T, String>;

fn required<'a>(value: &'a str, field: &str) -> Validated<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(trimmed)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Email and username are trimmed; the password is taken as typed.
pub fn registration(email: &str, username: &str, password: &str) -> Validated<Registration> {
    let email = required(email, "email")?;
    let username = required(username, "username")?;
    if password.is_empty() {
        return Err("password is required".to_string());
    }
    if !is_valid_email(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(Registration {
        email: email.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Title and content, trimmed.
pub fn post_text(title: &str, content: &str) -> Validated<(String, String)> {
    let title = required(title, "title")?;
    let content = required(content, "content")?;
    Ok((title.to_string(), content.to_string()))
}

/// Lowercases names, drops unknown ones and duplicates, then enforces the 1-3 bound.
pub fn categories<S: AsRef<str>>(names: &[S]) -> Validated<Vec<Category>> {
    let mut picked: Vec<Category> = Vec::new();
    for name in names {
        if let Ok(category) = name.as_ref().trim().parse::<Category>() {
            if !picked.contains(&category) {
                picked.push(category);
            }
        }
    }

    if picked.len() < MIN_CATEGORIES {
        return Err("At least one valid category is required".to_string());
    }
    if picked.len() > MAX_CATEGORIES {
        return Err(format!("At most {} categories are allowed", MAX_CATEGORIES));
    }
    Ok(picked)
}

/// Counted in characters, not bytes.
pub fn comment(content: &str) -> Validated<String> {
    let trimmed = content.trim();
    let len = trimmed.chars().count();
    if len < MIN_COMMENT_CHARS {
        return Err(format!(
            "Comment must be at least {} characters",
            MIN_COMMENT_CHARS
        ));
    }
    if len > MAX_COMMENT_CHARS {
        return Err(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_CHARS
        ));
    }
    Ok(trimmed.to_string())
}

/// Blank means "keep the current value".
pub fn optional_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("ada @example.com"));
    }

    #[test]
    fn registration_requires_every_field() {
        assert!(registration("", "ada", "pw").is_err());
        assert!(registration("ada@example.com", "   ", "pw").is_err());
        assert!(registration("ada@example.com", "ada", "").is_err());
        assert_eq!(
            registration("bad", "ada", "pw").unwrap_err(),
            "Invalid email format"
        );
    }

    #[test]
    fn registration_trims_identity_fields() {
        let reg = registration(" ada@example.com ", " ada ", " pw ").unwrap();
        assert_eq!(reg.email, "ada@example.com");
        assert_eq!(reg.username, "ada");
        assert_eq!(reg.password, " pw ");
    }

    #[test]
    fn post_text_is_trimmed_and_required() {
        assert_eq!(
            post_text(" Hi ", " body ").unwrap(),
            ("Hi".to_string(), "body".to_string())
        );
        assert!(post_text("Hi", "  ").is_err());
    }

    #[test]
    fn categories_are_normalized() {
        let picked = categories(&["News", "bogus", "news", " SCIENCE "]).unwrap();
        assert_eq!(picked, vec![Category::News, Category::Science]);
    }

    #[test]
    fn categories_bound_applies_after_dropping_unknown() {
        assert!(categories::<&str>(&[]).is_err());
        assert!(categories(&["bogus", "nope"]).is_err());
        assert!(categories(&["news", "life", "auto"]).is_ok());
        assert!(categories(&["news", "life", "auto", "games"]).is_err());
    }

    #[test]
    fn comment_length_bounds() {
        assert!(comment("  ab  ").is_err());
        assert_eq!(comment("  abc ").unwrap(), "abc");
        assert!(comment(&"x".repeat(500)).is_ok());
        assert!(comment(&"x".repeat(501)).is_err());
        assert!(comment("héé").is_ok());
    }

    #[test]
    fn blank_optional_field_keeps_current() {
        assert_eq!(optional_field(Some("  ")), None);
        assert_eq!(optional_field(None), None);
        assert_eq!(optional_field(Some(" Ada ")), Some("Ada".to_string()));
    }
}
