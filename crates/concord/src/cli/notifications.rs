//! `concord notifications`: the acting user's inbox.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color};
use concord_db::Notification;
use concord_engine::notification_response;
use concord_ids::NotificationId;
use concord_protocol::{CountResponse, MessageResponse, NotificationResponse};

use super::context::{engine_error, with_context, AppContext, GlobalArgs};
use super::output::{format_time, print_json, print_table};

#[derive(Subcommand, Debug, Clone)]
pub enum NotificationAction {
    /// Newest notifications first
    List {
        /// Defaults to the configured notification limit
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Number of unread notifications
    Count,
    /// Mark one notification as read
    Read { id: NotificationId },
    /// Mark every unread notification as read
    ReadAll,
}

pub fn run(global: &GlobalArgs, action: NotificationAction) -> Result<()> {
    with_context(global, |ctx| async move { dispatch(&ctx, action).await })
}

async fn dispatch(ctx: &AppContext, action: NotificationAction) -> Result<()> {
    let actor = ctx.actor().await?;
    let engine = &ctx.engine;

    match action {
        NotificationAction::List { limit } => {
            let notifications = engine
                .notifications(actor.id, limit)
                .await
                .map_err(engine_error)?;
            list_notifications(ctx, &notifications)
        }
        NotificationAction::Count => {
            let count = engine.unread_count(actor.id).await.map_err(engine_error)?;
            if ctx.json {
                print_json(&CountResponse { count })
            } else {
                println!("{} unread", count);
                Ok(())
            }
        }
        NotificationAction::Read { id } => {
            engine.mark_read(actor.id, id).await.map_err(engine_error)?;
            print_message(ctx, MessageResponse::notification_read())
        }
        NotificationAction::ReadAll => {
            let changed = engine.mark_all_read(actor.id).await.map_err(engine_error)?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "message": MessageResponse::all_notifications_read().message,
                    "updated": changed,
                }))
            } else {
                println!("Marked {} notification(s) as read", changed);
                Ok(())
            }
        }
    }
}

fn print_message(ctx: &AppContext, message: MessageResponse) -> Result<()> {
    if ctx.json {
        print_json(&message)
    } else {
        println!("{}", message.message);
        Ok(())
    }
}

fn list_notifications(ctx: &AppContext, notifications: &[Notification]) -> Result<()> {
    if ctx.json {
        let body: Vec<NotificationResponse> =
            notifications.iter().map(notification_response).collect();
        return print_json(&body);
    }
    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    let rows = notifications
        .iter()
        .map(|n| {
            let marker = if n.is_read {
                Cell::new("")
            } else {
                Cell::new("*").fg(Color::Yellow)
            };
            vec![
                marker,
                Cell::new(n.id),
                Cell::new(n.contract_id),
                Cell::new(n.kind.as_str()),
                Cell::new(&n.message),
                Cell::new(format_time(n.created_at)),
            ]
        })
        .collect();
    print_table(&["", "ID", "CONTRACT", "TYPE", "MESSAGE", "WHEN"], rows);
    Ok(())
}
