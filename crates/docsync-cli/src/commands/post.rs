//! Post command handlers

use anyhow::{Context, Result};
use tracing::debug;

use docsync_core::{Comparator, SyncContext};

use super::{record_write, resolve_id, user};
use crate::models::{Post, User};
use crate::output::Output;

/// Create a post and add it to the author's posts
pub async fn create(
    ctx: &SyncContext,
    author: String,
    title: String,
    body: Option<String>,
    output: &Output,
) -> Result<Post> {
    let mut author = user::find(ctx, &author).await?;
    let post = Post::new(&author.id, title, body);

    ctx.repository::<Post>()
        .write_and_relate(&post, &User::POST_IDS, &mut author)
        .await
        .context("Failed to create post")?;
    ctx.repository::<User>()
        .increment(&mut author, &User::POST_COUNT, 1)
        .await
        .context("Failed to update post count")?;
    record_write(ctx).await?;

    output.success(&format!("Created post: {}", post.id));
    output.print_post(&post)?;
    Ok(post)
}

/// List posts, optionally only those of one author
pub async fn list(ctx: &SyncContext, author: Option<String>, output: &Output) -> Result<()> {
    let posts = ctx.repository::<Post>();
    let mut found = match author {
        Some(ref id) => {
            let author = user::find(ctx, id).await?;
            posts
                .fetch_children(&User::POST_IDS, &author, ctx.config().use_cache)
                .await?
        }
        None => posts.fetch_all().await?,
    };
    found.sort_by_key(|p| p.created_at);

    output.print_posts(&found)
}

/// Show a single post
pub async fn show(ctx: &SyncContext, id: String, output: &Output) -> Result<()> {
    let post = find(ctx, &id).await?;
    output.print_post(&post)
}

/// Add one like to a post
pub async fn like(ctx: &SyncContext, id: String, output: &Output) -> Result<()> {
    let mut post = find(ctx, &id).await?;

    ctx.repository::<Post>()
        .increment(&mut post, &Post::LIKES, 1)
        .await
        .context("Failed to like post")?;
    record_write(ctx).await?;

    output.success(&format!("Liked post: {} ({} like(s))", post.id, post.likes));
    Ok(())
}

/// Find posts with exactly this title
pub async fn search(ctx: &SyncContext, title: String, output: &Output) -> Result<()> {
    let mut found = ctx
        .repository::<Post>()
        .query()
        .filter(&Post::TITLE, Comparator::Equal, &title)
        .fetch()
        .await?;
    found.sort_by_key(|p| p.created_at);

    output.print_posts(&found)
}

/// Delete a post and remove it from its author's posts
pub async fn delete(ctx: &SyncContext, id: String, output: &Output) -> Result<()> {
    let post = find(ctx, &id).await?;
    let posts = ctx.repository::<Post>();
    let users = ctx.repository::<User>();

    match users.fetch(&post.author_id, false).await? {
        Some(mut author) => {
            posts
                .destroy_and_unlink(&post, &User::POST_IDS, &mut author)
                .await
                .context("Failed to delete post")?;
            users
                .increment(&mut author, &User::POST_COUNT, -1)
                .await
                .context("Failed to update post count")?;
        }
        None => {
            debug!("Author {} of post {} is gone", post.author_id, post.id);
            posts
                .destroy_document(&post)
                .await
                .context("Failed to delete post")?;
        }
    }
    record_write(ctx).await?;

    output.success(&format!("Deleted post: {}", post.id));
    Ok(())
}

/// Look up a post by full id or id prefix
async fn find(ctx: &SyncContext, id: &str) -> Result<Post> {
    let posts = ctx.repository::<Post>();
    let all = posts.fetch_all().await?;
    let id = resolve_id(&all, id, "post")?;

    posts
        .fetch(&id, ctx.config().use_cache)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found: {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{context, quiet};
    use docsync_core::Document;

    #[tokio::test]
    async fn test_create_like_and_delete() {
        let (ctx, store) = context();
        let output = quiet();
        let author = user::create(&ctx, "Ada".to_string(), &output).await.unwrap();

        let post = create(&ctx, author.id.clone(), "Hello".to_string(), None, &output)
            .await
            .unwrap();
        like(&ctx, post.id.clone(), &output).await.unwrap();
        like(&ctx, post.id[..6].to_string(), &output).await.unwrap();

        let stored = ctx
            .repository::<Post>()
            .fetch(post.id(), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.likes, 2);

        let author = user::find(&ctx, &author.id).await.unwrap();
        assert_eq!(author.post_ids, vec![post.id.clone()]);
        assert_eq!(author.post_count, 1);

        delete(&ctx, post.id.clone(), &output).await.unwrap();
        assert_eq!(store.document_count("Post"), 0);
        let author = ctx
            .repository::<User>()
            .fetch(&author.id, false)
            .await
            .unwrap()
            .unwrap();
        assert!(author.post_ids.is_empty());
        assert_eq!(author.post_count, 0);
    }

    #[tokio::test]
    async fn test_delete_post_of_deleted_author() {
        let (ctx, store) = context();
        let output = quiet();
        let author = user::create(&ctx, "Ada".to_string(), &output).await.unwrap();
        let post = create(&ctx, author.id.clone(), "Orphan".to_string(), None, &output)
            .await
            .unwrap();

        ctx.repository::<User>().destroy(&author.id).await.unwrap();
        assert_eq!(store.document_count("Post"), 1);

        delete(&ctx, post.id.clone(), &output).await.unwrap();
        assert_eq!(store.document_count("Post"), 0);
    }

    #[tokio::test]
    async fn test_create_for_unknown_author_fails() {
        let (ctx, store) = context();
        let result = create(&ctx, "nobody".to_string(), "Lost".to_string(), None, &quiet()).await;

        assert!(result.is_err());
        assert_eq!(store.document_count("Post"), 0);
    }

    #[tokio::test]
    async fn test_search_and_list() {
        let (ctx, _store) = context();
        let output = quiet();
        let ada = user::create(&ctx, "Ada".to_string(), &output).await.unwrap();
        let bob = user::create(&ctx, "Bob".to_string(), &output).await.unwrap();
        create(&ctx, ada.id.clone(), "Engines".to_string(), None, &output)
            .await
            .unwrap();
        create(&ctx, bob.id.clone(), "Engines".to_string(), None, &output)
            .await
            .unwrap();

        search(&ctx, "Engines".to_string(), &output).await.unwrap();
        list(&ctx, Some(ada.id.clone()), &output).await.unwrap();
        list(&ctx, None, &output).await.unwrap();

        let found = ctx
            .repository::<Post>()
            .query()
            .filter(&Post::TITLE, Comparator::Equal, "Engines")
            .fetch()
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
