//! Output toggles and engine status.

use obsdeck_core::Session;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::done;

pub fn status(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let status = session.status();
    let color = output::should_color(&global.color);
    let rendered = output::render(&global.output, status.as_ref(), |s| {
        output::status_text(s, color)
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn toggle_stream(session: &Session, global: &GlobalOpts) {
    let was_streaming = session.status().streaming;
    session.toggle_stream().await;
    done(
        global,
        if was_streaming { "Stopping stream" } else { "Starting stream" },
    );
}

pub async fn toggle_record(session: &Session, global: &GlobalOpts) {
    let was_recording = session.status().recording;
    session.toggle_record().await;
    done(
        global,
        if was_recording { "Stopping recording" } else { "Starting recording" },
    );
}
