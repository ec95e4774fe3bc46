//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::Result;
use serde::Serialize;

use crate::models::{Post, User};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a user with their posts
    pub fn print_user(&self, user: &User, posts: &[Post]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", user.id);
                println!("Name:     {}", user.name);
                println!("Posts:    {}", user.post_count);
                println!("Joined:   {}", user.created_at.format("%Y-%m-%d %H:%M"));

                if !posts.is_empty() {
                    println!();
                    println!("── Posts ({}) ──", posts.len());
                    for post in posts {
                        println!(
                            "[{}] {} ({} like(s))",
                            post.created_at.format("%Y-%m-%d"),
                            truncate(&post.title, 50),
                            post.likes
                        );
                    }
                }
            }
            OutputFormat::Json => {
                let value = serde_json::json!({ "user": user, "posts": posts });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Quiet => {
                println!("{}", user.id);
            }
        }
        Ok(())
    }

    /// Print a list of users
    pub fn print_users(&self, users: &[User]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if users.is_empty() {
                    println!("No users found.");
                    return Ok(());
                }
                for user in users {
                    println!(
                        "{} | {} | {} post(s)",
                        short_id(&user.id),
                        truncate(&user.name, 30),
                        user.post_count
                    );
                }
                println!("\n{} user(s)", users.len());
            }
            OutputFormat::Json => self.print_json(users)?,
            OutputFormat::Quiet => {
                for user in users {
                    println!("{}", user.id);
                }
            }
        }
        Ok(())
    }

    /// Print a single post
    pub fn print_post(&self, post: &Post) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", post.id);
                println!("Title:    {}", post.title);
                println!("Author:   {}", post.author_id);
                println!("Likes:    {}", post.likes);
                println!("Created:  {}", post.created_at.format("%Y-%m-%d %H:%M"));
                if let Some(ref body) = post.body {
                    println!();
                    println!("{}", body);
                }
            }
            OutputFormat::Json => self.print_json(post)?,
            OutputFormat::Quiet => {
                println!("{}", post.id);
            }
        }
        Ok(())
    }

    /// Print a list of posts
    pub fn print_posts(&self, posts: &[Post]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if posts.is_empty() {
                    println!("No posts found.");
                    return Ok(());
                }
                for post in posts {
                    println!(
                        "{} | {} | {} like(s) | {}",
                        short_id(&post.id),
                        truncate(&post.title, 35),
                        post.likes,
                        truncate_line(post.body.as_deref().unwrap_or(""), 30)
                    );
                }
                println!("\n{} post(s)", posts.len());
            }
            OutputFormat::Json => self.print_json(posts)?,
            OutputFormat::Quiet => {
                for post in posts {
                    println!("{}", post.id);
                }
            }
        }
        Ok(())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// First eight characters of an id
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
