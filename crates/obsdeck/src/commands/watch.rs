//! `watch`: stay connected and stream session updates to stdout.
//!
//! Drops are retried by the session itself; this only prints what the
//! bus delivers until Ctrl-C.

use serde_json::json;

use obsdeck_core::{ConnectTarget, Session, Topic, Update};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    session: &Session,
    target: ConnectTarget,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let printer = Printer {
        color: output::should_color(&global.color),
        json: !matches!(global.output, OutputFormat::Text),
    };

    let mut topics = vec![
        Topic::ConnectionState,
        Topic::Log,
        Topic::CurrentScene,
        Topic::PreviewScene,
        Topic::StudioMode,
    ];
    if args.status {
        topics.push(Topic::Status);
    }
    let subscriptions: Vec<_> = topics
        .into_iter()
        .map(|topic| (topic, session.subscribe(topic, move |update| printer.print(update))))
        .collect();

    let result = run_until_interrupted(session, target).await;

    session.disconnect().await;
    for (topic, id) in subscriptions {
        session.unsubscribe(topic, id);
    }
    result
}

async fn run_until_interrupted(session: &Session, target: ConnectTarget) -> Result<(), CliError> {
    session.connect(target).await?;
    tokio::signal::ctrl_c().await?;
    tracing::debug!("interrupted, disconnecting");
    Ok(())
}

// ── Printing ─────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Printer {
    color: bool,
    json: bool,
}

impl Printer {
    /// One line per update: text, or `{"topic": ..., "data": ...}`.
    fn print(self, update: &Update) {
        let (text, data) = match update {
            Update::ConnectionState(state) => (output::state_text(*state, self.color), json!(state)),
            Update::Log(entry) => (
                output::log_entry_text(entry, self.color),
                json!(entry.as_ref()),
            ),
            Update::CurrentScene(name) => (
                format!("program: {}", name.as_deref().unwrap_or("-")),
                json!(name),
            ),
            Update::PreviewScene(name) => (
                format!("preview: {}", name.as_deref().unwrap_or("-")),
                json!(name),
            ),
            Update::StudioMode(enabled) => (
                format!("studio mode: {}", if *enabled { "on" } else { "off" }),
                json!(enabled),
            ),
            Update::Status(status) => (
                output::status_text(status, self.color).replace('\n', "  "),
                json!(status.as_ref()),
            ),
            _ => return,
        };

        if self.json {
            println!("{}", json!({ "topic": update.topic(), "data": data }));
        } else {
            println!("{text}");
        }
    }
}
