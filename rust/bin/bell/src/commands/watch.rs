//! `bell watch` — live dropdown.
//!
//! Keeps the dropdown open, polls the badge, and re-renders whenever the
//! store changes. Each stdin line is either a command or a push envelope.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use rental_notify::{Activation, Poller, PushBridge, PushBus, SyncController};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{render_detail, render_state};

/// One line of watch input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    More,
    All,
    Focus,
    Read(String),
    Open(String),
    Close,
    /// Anything else is treated as a raw push envelope.
    Push(String),
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match (word, rest) {
        ("", _) => Input::Empty,
        ("more", "") => Input::More,
        ("all", "") => Input::All,
        ("focus", "") => Input::Focus,
        ("close", "") => Input::Close,
        ("read", id) if !id.is_empty() => Input::Read(id.to_string()),
        ("open", id) if !id.is_empty() => Input::Open(id.to_string()),
        _ => Input::Push(line.to_string()),
    }
}

pub async fn run(controller: &SyncController) -> Result<()> {
    let bus = PushBus::new();
    let _bridge = PushBridge::mount(&bus, controller);
    let _poller = Poller::from_config(controller);

    let last_view = Arc::new(Mutex::new(String::new()));
    let subscription = controller.store().subscribe(move |state| {
        let view = render_state(state);
        let mut last = last_view.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != view {
            println!("{}", view);
            *last = view;
        }
    });

    info!("watching notifications (topic {})", controller.config().push_topic);
    controller.open().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle(controller, &bus, parse_input(&line)).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.store().unsubscribe(subscription);
    controller.teardown();
    Ok(())
}

async fn handle(controller: &SyncController, bus: &PushBus, input: Input) {
    match input {
        Input::Empty => {}
        Input::More => controller.load_more().await,
        Input::All => controller.mark_all_read().await,
        Input::Focus => controller.focus().await,
        Input::Close => controller.close(),
        Input::Read(id) => controller.mark_read(&id).await,
        Input::Open(id) => {
            // A closed dropdown has to be reopened before the next click.
            if !controller.snapshot().is_open {
                controller.open().await;
            }
            match controller.activate(&id).await {
                Activation::Redirect(target) => println!("-> {}", target),
                Activation::ShowDetail(item) => {
                    print!("{}", render_detail(&item));
                    controller.dismiss_detail();
                }
                Activation::Missing => warn!("no loaded notification {}", id),
            }
        }
        Input::Push(raw) => {
            if let Err(e) = bus.deliver(&raw).await {
                warn!("ignoring input line, not a command or push envelope: {}", e);
            }
        }
    }
}
