use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::models::{Category, Post, PostFilter};
use crate::db::{StoreError, StoreResult};

/// Input for creating or editing a post. Categories are already validated.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub categories: Vec<Category>,
}

// ?1 is always the viewer id (NULL when anonymous).
const POST_SELECT: &str = "
    SELECT p.id, p.user_id, u.username, p.title, p.content, p.image_url, p.created_at,
           (SELECT COUNT(*) FROM post_votes v WHERE v.post_id = p.id AND v.vote = 1) AS likes,
           (SELECT COUNT(*) FROM post_votes v WHERE v.post_id = p.id AND v.vote = -1) AS dislikes,
           (SELECT v.vote FROM post_votes v WHERE v.post_id = p.id AND v.user_id = ?1) AS user_vote
    FROM posts p
    JOIN users u ON u.id = p.user_id";

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        image_url: row.get(5)?,
        created_at: row.get(6)?,
        categories: Vec::new(),
        likes: row.get(7)?,
        dislikes: row.get(8)?,
        user_vote: row.get(9)?,
    })
}

fn link_categories(conn: &Connection, post_id: i64, categories: &[Category]) -> StoreResult<()> {
    for category in categories {
        let linked = conn.execute(
            "INSERT OR IGNORE INTO post_categories (post_id, category_id)
             SELECT ?1, id FROM categories WHERE name = ?2",
            params![post_id, category],
        )?;
        if linked == 0 && !has_category(conn, post_id, *category)? {
            return Err(StoreError::NotFound(format!("category {}", category)));
        }
    }
    Ok(())
}

fn has_category(conn: &Connection, post_id: i64, category: Category) -> StoreResult<bool> {
    let found = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM post_categories pc
                       JOIN categories c ON c.id = pc.category_id
                       WHERE pc.post_id = ?1 AND c.name = ?2)",
        params![post_id, category],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Insert a post and its category links in one transaction.
pub fn create(conn: &mut Connection, user_id: i64, draft: &PostDraft) -> StoreResult<i64> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO posts (user_id, title, content, image_url) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, draft.title, draft.content, draft.image_url],
    )?;
    let post_id = tx.last_insert_rowid();
    link_categories(&tx, post_id, &draft.categories)?;
    tx.commit()?;
    Ok(post_id)
}

/// Overwrite title, content and image, and replace the category set.
pub fn update(conn: &mut Connection, post_id: i64, draft: &PostDraft) -> StoreResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let updated = tx.execute(
        "UPDATE posts SET title = ?1, content = ?2, image_url = ?3 WHERE id = ?4",
        params![draft.title, draft.content, draft.image_url, post_id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("post {}", post_id)));
    }
    remove_categories(&tx, post_id)?;
    link_categories(&tx, post_id, &draft.categories)?;
    tx.commit()?;
    Ok(())
}

pub fn owner(conn: &Connection, post_id: i64) -> StoreResult<Option<i64>> {
    let owner = conn
        .query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            params![post_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}

pub fn exists(conn: &Connection, post_id: i64) -> StoreResult<bool> {
    Ok(owner(conn, post_id)?.is_some())
}

pub fn categories(conn: &Connection, post_id: i64) -> StoreResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT c.name FROM categories c
         JOIN post_categories pc ON pc.category_id = c.id
         WHERE pc.post_id = ?1
         ORDER BY c.id",
    )?;
    let categories = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<Category>, _>>()?;
    Ok(categories)
}

fn with_categories(conn: &Connection, mut posts: Vec<Post>) -> StoreResult<Vec<Post>> {
    for post in posts.iter_mut() {
        post.categories = categories(conn, post.id)?;
    }
    Ok(posts)
}

pub fn find(conn: &Connection, post_id: i64, viewer: Option<i64>) -> StoreResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("{} WHERE p.id = ?2", POST_SELECT),
            params![viewer, post_id],
            map_post,
        )
        .optional()?;

    match post {
        Some(mut post) => {
            post.categories = categories(conn, post.id)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

/// The index feed. Personal filters with no viewer match nothing; callers
/// are expected to require authentication for them first.
pub fn list(
    conn: &Connection,
    viewer: Option<i64>,
    filter: PostFilter,
    category: Option<Category>,
) -> StoreResult<Vec<Post>> {
    let selection = match filter {
        PostFilter::New | PostFilter::Best => "",
        PostFilter::My => " AND p.user_id = ?1",
        PostFilter::Liked => {
            " AND EXISTS (SELECT 1 FROM post_votes v
                          WHERE v.post_id = p.id AND v.user_id = ?1 AND v.vote = 1)"
        }
        PostFilter::Commented => {
            " AND EXISTS (SELECT 1 FROM comments c
                          WHERE c.post_id = p.id AND c.user_id = ?1)"
        }
    };
    let order = match filter {
        PostFilter::Best => "(likes - dislikes) DESC, p.created_at DESC, p.id DESC",
        _ => "p.created_at DESC, p.id DESC",
    };

    let sql = format!(
        "{}
         WHERE (?2 IS NULL OR EXISTS (SELECT 1 FROM post_categories pc
                                      JOIN categories c ON c.id = pc.category_id
                                      WHERE pc.post_id = p.id AND c.name = ?2)){}
         ORDER BY {}",
        POST_SELECT, selection, order
    );

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![viewer, category], map_post)?
        .collect::<Result<Vec<_>, _>>()?;

    with_categories(conn, posts)
}

/// Posts written by `author_id`, newest first.
pub fn by_author(conn: &Connection, author_id: i64, viewer: Option<i64>) -> StoreResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE p.user_id = ?2 ORDER BY p.created_at DESC, p.id DESC",
        POST_SELECT
    ))?;
    let posts = stmt
        .query_map(params![viewer, author_id], map_post)?
        .collect::<Result<Vec<_>, _>>()?;

    with_categories(conn, posts)
}

pub fn remove_categories(conn: &Connection, post_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM post_categories WHERE post_id = ?1",
        params![post_id],
    )?)
}

pub fn remove_votes(conn: &Connection, post_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM post_votes WHERE post_id = ?1",
        params![post_id],
    )?)
}

pub fn remove(conn: &Connection, post_id: i64) -> StoreResult<usize> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::testing;

    fn draft(title: &str, categories: &[Category]) -> PostDraft {
        PostDraft {
            title: title.to_string(),
            content: "content".to_string(),
            image_url: None,
            categories: categories.to_vec(),
        }
    }

    fn vote(conn: &Connection, user_id: i64, post_id: i64, value: i64) {
        conn.execute(
            "INSERT INTO post_votes (user_id, post_id, vote) VALUES (?1, ?2, ?3)",
            params![user_id, post_id, value],
        )
        .unwrap();
    }

    #[test]
    fn create_links_categories() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let mut conn = pool.get().unwrap();

        let id = create(
            &mut conn,
            alice,
            &draft("first", &[Category::News, Category::Games]),
        )
        .unwrap();

        let post = find(&conn, id, None).unwrap().unwrap();
        assert_eq!(post.title, "first");
        assert_eq!(post.username, "alice");
        assert_eq!(post.categories, vec![Category::News, Category::Games]);
        assert_eq!(owner(&conn, id).unwrap(), Some(alice));
    }

    #[test]
    fn update_replaces_category_set() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let mut conn = pool.get().unwrap();
        let id = create(&mut conn, alice, &draft("first", &[Category::News])).unwrap();

        let mut edited = draft("renamed", &[Category::Science, Category::Other]);
        edited.image_url = Some("https://img.example/cat.png".into());
        update(&mut conn, id, &edited).unwrap();

        let post = find(&conn, id, None).unwrap().unwrap();
        assert_eq!(post.title, "renamed");
        assert_eq!(post.image_url.as_deref(), Some("https://img.example/cat.png"));
        assert_eq!(post.categories, vec![Category::Science, Category::Other]);
    }

    #[test]
    fn update_missing_post_is_not_found() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let err = update(&mut conn, 42, &draft("x", &[Category::News])).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn find_reports_viewer_vote() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let bob = testing::insert_user(&pool, "bob", Role::User);
        let post = testing::insert_post(&pool, alice, "p");
        let conn = pool.get().unwrap();
        vote(&conn, bob, post, -1);

        let seen_by_bob = find(&conn, post, Some(bob)).unwrap().unwrap();
        assert_eq!((seen_by_bob.likes, seen_by_bob.dislikes), (0, 1));
        assert_eq!(seen_by_bob.user_vote, Some(-1));

        let anonymous = find(&conn, post, None).unwrap().unwrap();
        assert_eq!(anonymous.user_vote, None);
    }

    #[test]
    fn best_orders_by_score() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let bob = testing::insert_user(&pool, "bob", Role::User);
        let low = testing::insert_post(&pool, alice, "low");
        let high = testing::insert_post(&pool, alice, "high");
        let newest = testing::insert_post(&pool, alice, "newest");
        let conn = pool.get().unwrap();
        vote(&conn, alice, high, 1);
        vote(&conn, bob, high, 1);
        vote(&conn, bob, low, -1);

        let ids: Vec<i64> = list(&conn, None, PostFilter::Best, None)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![high, newest, low]);
    }

    #[test]
    fn personal_filters_select_viewer_activity() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let bob = testing::insert_user(&pool, "bob", Role::User);
        let mine = testing::insert_post(&pool, bob, "mine");
        let liked = testing::insert_post(&pool, alice, "liked");
        let commented = testing::insert_post(&pool, alice, "commented");
        testing::insert_comment(&pool, commented, bob);
        let conn = pool.get().unwrap();
        vote(&conn, bob, liked, 1);

        let ids = |filter| -> Vec<i64> {
            list(&conn, Some(bob), filter, None)
                .unwrap()
                .iter()
                .map(|p| p.id)
                .collect()
        };
        assert_eq!(ids(PostFilter::My), vec![mine]);
        assert_eq!(ids(PostFilter::Liked), vec![liked]);
        assert_eq!(ids(PostFilter::Commented), vec![commented]);
        assert_eq!(ids(PostFilter::New).len(), 3);
    }

    #[test]
    fn category_filter_keeps_full_category_list() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let mut conn = pool.get().unwrap();
        let both = create(
            &mut conn,
            alice,
            &draft("both", &[Category::Auto, Category::Life]),
        )
        .unwrap();
        create(&mut conn, alice, &draft("other", &[Category::Games])).unwrap();

        let posts = list(&conn, None, PostFilter::New, Some(Category::Life)).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, both);
        assert_eq!(posts[0].categories, vec![Category::Life, Category::Auto]);
    }

    #[test]
    fn by_author_lists_only_their_posts() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let bob = testing::insert_user(&pool, "bob", Role::User);
        testing::insert_post(&pool, alice, "a1");
        testing::insert_post(&pool, alice, "a2");
        testing::insert_post(&pool, bob, "b1");
        let conn = pool.get().unwrap();

        let titles: Vec<String> = by_author(&conn, alice, None)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["a2".to_string(), "a1".to_string()]);
    }
}
