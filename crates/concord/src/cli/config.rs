//! `concord config`: show where data lives and which engine settings apply.

use anyhow::Result;

use super::context::GlobalArgs;
use super::output::print_json;

fn state(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}

pub fn run(global: &GlobalArgs) -> Result<()> {
    let paths = global.paths();
    let engine = global.engine_config(&paths)?;

    if global.json {
        let config = serde_json::json!({
            "home": paths.home.to_string_lossy(),
            "database": {
                "path": paths.database.to_string_lossy(),
                "exists": paths.database.exists(),
            },
            "uploads": {
                "path": paths.uploads.to_string_lossy(),
                "exists": paths.uploads.exists(),
            },
            "config_file": {
                "path": paths.config_file.to_string_lossy(),
                "exists": paths.config_file.exists(),
            },
            "logs": paths.logs.to_string_lossy(),
            "engine": engine,
        });
        return print_json(&config);
    }

    println!("CONCORD CONFIGURATION");
    println!("=====================");
    println!();
    println!("Home:      {}", paths.home.display());
    println!(
        "Database:  {} ({})",
        paths.database.display(),
        state(paths.database.exists())
    );
    println!(
        "Uploads:   {} ({})",
        paths.uploads.display(),
        state(paths.uploads.exists())
    );
    println!(
        "Config:    {} ({})",
        paths.config_file.display(),
        state(paths.config_file.exists())
    );
    println!("Logs:      {}", paths.logs.display());
    println!();
    println!("Policy:              {}", engine.policy);
    match engine.lock_ttl_secs {
        Some(secs) => println!("Lock expiry:         {}s", secs),
        None => println!("Lock expiry:         never"),
    }
    println!("Notification limit:  {}", engine.notification_limit);

    Ok(())
}
