//! Context cache CLI commands: list, show, delete, refresh.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use kfbridge_types::context::ConversationContext;

use kfbridge_api::state::ConcreteContextStore;

#[derive(Subcommand)]
pub enum ContextsCommand {
    /// List live contexts, most recently used first.
    #[command(alias = "ls")]
    List,

    /// Show the context of one user.
    Show { user: String },

    /// Forget a user's context; their next message starts a new conversation.
    #[command(alias = "rm")]
    Delete { user: String },

    /// Reset the expiry of a user's context.
    Refresh { user: String },
}

pub async fn run(store: &ConcreteContextStore, action: ContextsCommand, json: bool) -> Result<()> {
    match action {
        ContextsCommand::List => list(store, json).await,
        ContextsCommand::Show { user } => show(store, &user, json).await,
        ContextsCommand::Delete { user } => delete(store, &user, json).await,
        ContextsCommand::Refresh { user } => refresh(store, &user, json).await,
    }
}

async fn list(store: &ConcreteContextStore, json: bool) -> Result<()> {
    let contexts = store.list_active().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&contexts)?);
        return Ok(());
    }

    if contexts.is_empty() {
        println!();
        println!("  {} No active contexts.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("User").fg(Color::White),
        Cell::new("Context").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Last Used").fg(Color::White),
    ]);

    for ctx in &contexts {
        table.add_row(vec![
            Cell::new(&ctx.external_user_id).fg(Color::Cyan),
            Cell::new(&ctx.context_id),
            Cell::new(ctx.message_count),
            Cell::new(ctx.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("  Active contexts ({})", contexts.len());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn show(store: &ConcreteContextStore, user: &str, json: bool) -> Result<()> {
    let Some(ctx) = store.get_context_info(user).await? else {
        bail!("no context for user '{user}'");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
    } else {
        print_context(&ctx);
    }
    Ok(())
}

fn print_context(ctx: &ConversationContext) {
    println!();
    println!("  {}", style(&ctx.external_user_id).cyan().bold());
    println!("  Context:   {}", ctx.context_id);
    println!("  Messages:  {}", ctx.message_count);
    println!("  Created:   {}", ctx.created_at.to_rfc3339());
    println!("  Last used: {}", ctx.updated_at.to_rfc3339());
    println!();
}

async fn delete(store: &ConcreteContextStore, user: &str, json: bool) -> Result<()> {
    let deleted = store.delete_context(user).await?;

    if json {
        println!("{}", serde_json::json!({ "user": user, "deleted": deleted }));
    } else if deleted {
        println!("  {} Context for '{}' deleted", style("✓").green().bold(), style(user).bold());
    } else {
        println!("  {} No context for '{}'", style("i").blue().bold(), style(user).bold());
    }
    Ok(())
}

async fn refresh(store: &ConcreteContextStore, user: &str, json: bool) -> Result<()> {
    if !store.refresh_ttl(user).await? {
        bail!("no context for user '{user}'");
    }
    let ttl_secs = store.ttl().as_secs();

    if json {
        println!("{}", serde_json::json!({ "user": user, "ttl_secs": ttl_secs }));
    } else {
        println!(
            "  {} Context for '{}' refreshed ({}s)",
            style("✓").green().bold(),
            style(user).bold(),
            ttl_secs
        );
    }
    Ok(())
}
