//! Register command - resolve a social-login payload to a user

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use quill_core::services::LogEvent;
use quill_core::AuthPayload;

use super::{find_user, get_context, get_logger, log_event};
use crate::output;

fn read_payload(path: &Path) -> Result<AuthPayload> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload: {}", path.display()))?
    };
    serde_json::from_str(&content).context("Invalid login payload")
}

pub fn run(
    payload_path: &Path,
    variant: Option<&str>,
    current_user: Option<&str>,
    json: bool,
) -> Result<()> {
    let logger = get_logger();
    let payload = read_payload(payload_path)?;
    let ctx = get_context()?;

    let current = current_user.map(|key| find_user(&ctx, key)).transpose()?;

    let resolution = match ctx
        .identity_resolver
        .resolve(&payload, current.as_ref(), variant)
    {
        Ok(resolution) => resolution,
        Err(e) => {
            let mut event = LogEvent::new("register_failed")
                .with_provider(payload.provider.as_str())
                .with_command("register")
                .with_error(e.to_string());
            if let Some(errors) = e.validation_errors() {
                let fields: Vec<&str> = errors.errors().iter().map(|f| f.field.as_str()).collect();
                event = event.with_error_details(fields.join(","));
            }
            log_event(&logger, event);
            return Err(e.into());
        }
    };

    log_event(
        &logger,
        LogEvent::new(resolution.outcome.as_str())
            .with_provider(payload.provider.as_str())
            .with_command("register"),
    );

    if json {
        return output::json(&resolution);
    }

    let user = &resolution.user;
    if resolution.is_new_user() {
        output::success(&format!("Registered {} via {}", user.username.bold(), payload.provider));
    } else {
        output::success(&format!(
            "Signed in as {} ({})",
            user.username.bold(),
            resolution.outcome.as_str().replace('_', " ")
        ));
    }
    println!("  {}", format!("User ID: {}", user.id).dimmed());
    if let Some(variant) = &user.signup_cta_variant {
        println!("  {}", format!("Signup variant: {}", variant).dimmed());
    }

    Ok(())
}
