//! Plain-text output for the interactive shell.

use tgsession_core::auth::FlowEvent;
use tgsession_core::store::StoredSession;

use super::styles;
use crate::app::MenuAction;
use crate::utils::{format_optional, format_size, format_timestamp, truncate_string};

/// Width of horizontal rules
const RULE_WIDTH: usize = 60;

/// Notes longer than this are shortened in pick lists
const NOTE_PREVIEW_LEN: usize = 50;

fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH)
}

pub fn banner() {
    println!("{}", styles::title("tgsession - messaging session manager"));
    println!("{}", rule('='));
}

pub fn menu(api_id: Option<i32>) {
    println!("\n{}", styles::title("Menu:"));
    for action in MenuAction::ALL {
        println!("{}. {}", action.number(), action.label());
    }

    match api_id {
        Some(id) => println!("\n{}", styles::success(format!("API ID: {}", id))),
        None => println!("\n{}", styles::muted("API credentials are not set.")),
    }
}

pub fn info(message: &str) {
    println!("{}", message);
}

pub fn success(message: &str) {
    println!("{}", styles::success(message));
}

pub fn warning(message: &str) {
    println!("{}", styles::highlight(message));
}

pub fn failure(message: &str) {
    println!("{}", styles::error(message));
}

pub fn goodbye(message: &str) {
    println!("\n{}", styles::muted(message));
}

/// Full listing with every stored field except the token.
pub fn session_list(sessions: &[StoredSession]) {
    if sessions.is_empty() {
        info("No saved sessions.");
        return;
    }

    println!(
        "\n{}",
        styles::title(format!("Saved sessions ({}):", sessions.len()))
    );
    println!("{}", rule('='));

    for (i, session) in sessions.iter().enumerate() {
        let record = &session.record;
        println!("{:2}. {}", i + 1, styles::highlight(&record.name));
        println!("     Phone:     {}", format_optional(&record.phone, "Unknown"));
        println!(
            "     File:      {} ({})",
            session.filename,
            format_size(session.file_size)
        );
        println!(
            "     Created:   {}",
            format_timestamp(record.created_at, "Unknown")
        );
        println!(
            "     Last used: {}",
            format_timestamp(record.last_used_at, "Never")
        );
        if let Some(notes) = record.notes.as_deref().filter(|n| !n.is_empty()) {
            println!("     Notes:     {}", notes);
        }
        println!("{}", styles::muted(rule('-')));
    }
}

/// Short numbered list used before picking a session.
pub fn session_choices(sessions: &[StoredSession], show_notes: bool) {
    for (i, session) in sessions.iter().enumerate() {
        let record = &session.record;
        println!(
            "{:2}. {} ({})",
            i + 1,
            record.name,
            format_optional(&record.phone, "Unknown")
        );
        if show_notes {
            if let Some(notes) = record.notes.as_deref().filter(|n| !n.is_empty()) {
                println!(
                    "     {}",
                    styles::muted(truncate_string(notes, NOTE_PREVIEW_LEN))
                );
            }
        }
    }
}

pub fn token_block(token: &str, footer: &str) {
    println!("\n{}", rule('='));
    println!("{}", styles::title("Session string:"));
    println!("{}", rule('-'));
    println!("{}", token);
    println!("{}", rule('-'));
    println!("{}", styles::success(footer));
}

pub fn flow_event(event: &FlowEvent) {
    match event {
        FlowEvent::Connecting => info("Connecting..."),
        FlowEvent::CodeSent { phone } => info(&format!("Login code sent to {}.", phone)),
        FlowEvent::PasswordRequired { hint } => {
            warning("Two-step verification is enabled for this account.");
            if let Some(hint) = hint.as_deref().filter(|h| !h.is_empty()) {
                println!("{}", styles::muted(format!("Password hint: {}", hint)));
            }
        }
        FlowEvent::SignedIn(me) => success(&format!("Signed in as '{}'.", me.display_name())),
        FlowEvent::Verified(me) => {
            success(&format!("Session is valid ({}).", me.display_name()))
        }
        FlowEvent::Unauthorized => failure("Session has expired or is no longer valid."),
    }
}
