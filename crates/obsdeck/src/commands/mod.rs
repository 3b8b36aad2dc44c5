//! Command dispatch: bridges CLI args -> session operations -> output.
//!
//! Every command except `watch` is one-shot: connect, run, disconnect.
//! `watch` lives in its own module and is routed from `main`.
//! Facade failures never come back as errors; they land in the session's
//! log feed, which is echoed to stderr while the command runs.

pub mod audio;
pub mod control;
pub mod overlay;
pub mod presets;
pub mod ptz;
pub mod scenes;
pub mod watch;

use obsdeck_core::{ConnectTarget, Session, Severity, Topic, Update};

use crate::cli::{ControlCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Run a one-shot command with the log feed echoed to stderr.
pub async fn dispatch(
    cmd: ControlCommand,
    session: &Session,
    target: ConnectTarget,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let (quiet, verbose) = (global.quiet, global.verbose > 0);
    let echo = session.subscribe(Topic::Log, move |update| {
        if let Update::Log(entry) = update {
            if !quiet && (verbose || entry.severity >= Severity::Warning) {
                eprintln!("{}", output::log_entry_text(entry, color));
            }
        }
    });

    let result = match session.connect(target).await {
        Ok(()) => run(cmd, session, global).await,
        Err(e) => Err(e.into()),
    };

    session.disconnect().await;
    session.unsubscribe(Topic::Log, echo);
    result
}

async fn run(cmd: ControlCommand, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        ControlCommand::Status => control::status(session, global),
        ControlCommand::Scenes => scenes::list(session, global),
        ControlCommand::Scene { name } => scenes::select(session, &name, global).await,
        ControlCommand::Transition(args) => scenes::transition(session, args, global).await,
        ControlCommand::Cut => scenes::cut(session, global).await,
        ControlCommand::Audio => audio::list(session, global),
        ControlCommand::Mute { channel, unmute } => {
            audio::mute(session, &channel, !unmute, global).await
        }
        ControlCommand::Volume { channel, volume } => {
            audio::volume(session, &channel, volume, global).await
        }
        ControlCommand::Preset { name } => audio::preset(session, &name, global).await,

        // Nothing to validate up front for the rest.
        ControlCommand::Studio { state } => {
            scenes::studio(session, state.is_on(), global).await;
            Ok(())
        }
        ControlCommand::Stream => {
            control::toggle_stream(session, global).await;
            Ok(())
        }
        ControlCommand::Record => {
            control::toggle_record(session, global).await;
            Ok(())
        }
        // Macros report each step through the log feed.
        ControlCommand::Start => {
            session.start_service().await;
            Ok(())
        }
        ControlCommand::End => {
            session.end_service().await;
            Ok(())
        }
        ControlCommand::Panic => {
            session.panic().await;
            Ok(())
        }
        ControlCommand::Ptz(args) => {
            ptz::handle(session, args, global).await;
            Ok(())
        }
        ControlCommand::Text { input, text } => {
            overlay::text(session, &input, &text, global).await;
            Ok(())
        }
        ControlCommand::Show { source } => {
            overlay::visibility(session, &source, true, global).await;
            Ok(())
        }
        ControlCommand::Hide { source } => {
            overlay::visibility(session, &source, false, global).await;
            Ok(())
        }
    }
}

/// Confirmation line on stderr, unless `--quiet`.
pub(crate) fn done(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}
