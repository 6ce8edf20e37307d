pub mod config;
pub mod list;
pub mod watch;

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use rental_notify::{
    HttpGateway, NoAuth, NotificationItem, NotificationState, StaticToken, SyncController, TokenSource,
};

use crate::config::ClientConfig;

/// Build a controller talking to the configured server.
pub fn connect(config: &ClientConfig) -> Result<SyncController> {
    if config.server.is_empty() {
        anyhow::bail!("No server URL set. Run `bell config set --server <url>`.");
    }
    let token_source: Arc<dyn TokenSource> = if config.token.is_empty() {
        Arc::new(NoAuth)
    } else {
        Arc::new(StaticToken::new(config.token.clone()))
    };
    let gateway = HttpGateway::new(&config.server, token_source, config.sync.request_timeout())?;
    Ok(SyncController::new(Arc::new(gateway), config.sync.clone()))
}

/// Fail the command if the last operation left a notice.
pub fn check_notice(controller: &SyncController) -> Result<()> {
    match &controller.snapshot().notice {
        Some(notice) => anyhow::bail!("{}", notice),
        None => Ok(()),
    }
}

/// One dropdown row.
pub fn render_item(item: &NotificationItem) -> String {
    let marker = if item.is_read { ' ' } else { '*' };
    let created = item
        .created_at
        .map(|at| at.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{} {:<10} {:<24} {:<19}  {}",
        marker,
        item.id,
        item.kind.as_wire(),
        created,
        item.message
    );
    if let Some(target) = &item.redirect_target {
        let _ = write!(line, "  -> {}", target);
    }
    line
}

/// The whole dropdown: badge, rows, paging hint, notice.
pub fn render_state(state: &NotificationState) -> String {
    let mut out = format!("Notifications ({} unread)\n", state.unread_count);
    if state.items.is_empty() {
        out.push_str(if state.is_synchronizing {
            "  loading...\n"
        } else {
            "  no notifications\n"
        });
    }
    for item in &state.items {
        out.push_str(&render_item(item));
        out.push('\n');
    }
    if state.has_more && !state.items.is_empty() {
        out.push_str("  (more available)\n");
    }
    if let Some(notice) = &state.notice {
        let _ = writeln!(out, "! {}", notice);
    }
    out
}

/// Full view of one notification.
pub fn render_detail(item: &NotificationItem) -> String {
    let mut out = format!("{}  {}\n", item.kind, item.id);
    if let Some(at) = item.created_at {
        let _ = writeln!(out, "{}", at);
    }
    let _ = writeln!(out, "\n{}", item.message);
    out
}
