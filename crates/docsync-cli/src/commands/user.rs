//! User command handlers

use anyhow::{bail, Context, Result};

use docsync_core::SyncContext;

use super::{record_write, resolve_id};
use crate::models::{Post, User};
use crate::output::Output;

/// Create a new user
pub async fn create(ctx: &SyncContext, name: String, output: &Output) -> Result<User> {
    let user = User::new(name);

    let created = ctx
        .repository::<User>()
        .safe_create(&user, None)
        .await
        .context("Failed to create user")?;
    if !created {
        bail!("A user with id {} already exists", user.id);
    }
    record_write(ctx).await?;

    output.success(&format!("Created user: {}", user.id));
    output.print_user(&user, &[])?;
    Ok(user)
}

/// Show a user and their posts
pub async fn show(ctx: &SyncContext, id: String, output: &Output) -> Result<()> {
    let user = find(ctx, &id).await?;
    let mut posts = ctx
        .repository::<Post>()
        .fetch_children(&User::POST_IDS, &user, ctx.config().use_cache)
        .await?;
    posts.sort_by_key(|p| p.created_at);

    output.print_user(&user, &posts)
}

/// List all users
pub async fn list(ctx: &SyncContext, output: &Output) -> Result<()> {
    let mut users = ctx.repository::<User>().fetch_all().await?;
    users.sort_by_key(|u| u.created_at);
    output.print_users(&users)
}

/// Look up a user by full id or id prefix
pub async fn find(ctx: &SyncContext, id: &str) -> Result<User> {
    let users = ctx.repository::<User>();
    let all = users.fetch_all().await?;
    let id = resolve_id(&all, id, "user")?;

    users
        .fetch(&id, ctx.config().use_cache)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))
}
