//! `concord user`: the user directory.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;
use concord_db::{NewUser, User, UserUpdate};
use concord_engine::credentials::hash_password;
use concord_engine::user_response;
use concord_protocol::defaults::DEFAULT_USER_LIST_LIMIT;
use concord_protocol::UserResponse;

use super::context::{engine_error, with_context, AppContext, GlobalArgs};
use super::output::{format_time, print_json, print_table};

#[derive(Subcommand, Debug, Clone)]
pub enum UserAction {
    /// Register a new user
    Add {
        username: String,
        email: String,
        #[arg(long)]
        full_name: Option<String>,
        /// Stored salted and hashed
        #[arg(long, env = "CONCORD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// List users by id
    List {
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = DEFAULT_USER_LIST_LIMIT)]
        limit: i64,
    },
    /// Find users whose username or email contains QUERY
    Search { query: String },
    /// Show one user (the acting user by default)
    Show { username: Option<String> },
    /// Update the acting user's profile
    Update {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "CONCORD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

pub fn run(global: &GlobalArgs, action: UserAction) -> Result<()> {
    with_context(global, |ctx| async move {
        match action {
            UserAction::Add {
                username,
                email,
                full_name,
                password,
            } => {
                let user = ctx
                    .engine
                    .register_user(NewUser {
                        username,
                        email,
                        full_name,
                        credential: password.as_deref().map(hash_password).unwrap_or_default(),
                    })
                    .await
                    .map_err(engine_error)?;
                show_user(&ctx, &user, "Registered")
            }
            UserAction::List { skip, limit } => {
                let users = ctx
                    .engine
                    .list_users(skip, limit)
                    .await
                    .map_err(engine_error)?;
                list_users(&ctx, &users)
            }
            UserAction::Search { query } => {
                let users = ctx.engine.search_users(&query).await.map_err(engine_error)?;
                list_users(&ctx, &users)
            }
            UserAction::Show { username } => {
                let user = match username {
                    Some(name) => ctx.user_named(&name).await?,
                    None => ctx.actor().await?,
                };
                show_user(&ctx, &user, "User")
            }
            UserAction::Update {
                full_name,
                email,
                password,
            } => {
                let actor = ctx.actor().await?;
                let user = ctx
                    .engine
                    .update_profile(
                        actor.id,
                        UserUpdate {
                            full_name,
                            email,
                            credential: password
                                .as_deref()
                                .filter(|p| !p.is_empty())
                                .map(hash_password),
                        },
                    )
                    .await
                    .map_err(engine_error)?;
                show_user(&ctx, &user, "Updated")
            }
        }
    })
}

fn show_user(ctx: &AppContext, user: &User, heading: &str) -> Result<()> {
    if ctx.json {
        return print_json(&user_response(user));
    }
    println!("{}: {} (#{})", heading, user.username, user.id);
    println!("  Email:     {}", user.email);
    if let Some(name) = &user.full_name {
        println!("  Name:      {}", name);
    }
    println!("  Joined:    {}", format_time(user.created_at));
    Ok(())
}

fn list_users(ctx: &AppContext, users: &[User]) -> Result<()> {
    if ctx.json {
        let body: Vec<UserResponse> = users.iter().map(user_response).collect();
        return print_json(&body);
    }
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }
    let rows = users
        .iter()
        .map(|u| {
            vec![
                Cell::new(u.id),
                Cell::new(&u.username),
                Cell::new(&u.email),
                Cell::new(u.full_name.as_deref().unwrap_or("-")),
            ]
        })
        .collect();
    print_table(&["ID", "USERNAME", "EMAIL", "NAME"], rows);
    Ok(())
}
