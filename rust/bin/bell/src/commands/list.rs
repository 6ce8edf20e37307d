//! One-shot commands: count, list, read, open, read-all.

use anyhow::Result;
use rental_notify::{Activation, SyncController};

use super::{check_notice, render_detail, render_state};

/// Print the unread count.
pub async fn count(controller: &SyncController) -> Result<()> {
    controller.refresh_unread_count().await;
    check_notice(controller)?;
    println!("{}", controller.snapshot().unread_count);
    Ok(())
}

/// Open the dropdown and load up to `pages` pages.
pub async fn list(controller: &SyncController, pages: u32) -> Result<()> {
    controller.open().await;
    check_notice(controller)?;
    for _ in 1..pages {
        if !controller.snapshot().has_more {
            break;
        }
        controller.load_more().await;
        check_notice(controller)?;
    }
    print!("{}", render_state(&controller.snapshot()));
    Ok(())
}

/// Mark one notification read.
pub async fn read(controller: &SyncController, id: &str) -> Result<()> {
    controller.mark_read(id).await;
    check_notice(controller)?;
    println!("Marked {} read.", id);
    Ok(())
}

/// Click a notification from the first page.
pub async fn open(controller: &SyncController, id: &str) -> Result<()> {
    controller.open().await;
    check_notice(controller)?;
    match controller.activate(id).await {
        Activation::Redirect(target) => println!("{}", target),
        Activation::ShowDetail(item) => print!("{}", render_detail(&item)),
        Activation::Missing => anyhow::bail!("Notification \"{}\" is not in the first page.", id),
    }
    check_notice(controller)
}

pub async fn read_all(controller: &SyncController) -> Result<()> {
    controller.mark_all_read().await;
    check_notice(controller)?;
    println!("All notifications marked read.");
    Ok(())
}
