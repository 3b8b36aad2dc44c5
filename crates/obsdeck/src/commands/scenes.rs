//! Scene, studio-mode and transition command handlers.

use serde::Serialize;

use obsdeck_core::{MAX_TRANSITION_MS, Scene, Session};

use crate::cli::{GlobalOpts, TransitionArgs};
use crate::error::CliError;
use crate::output;

use super::done;

#[derive(Serialize)]
struct SceneListing<'a> {
    program: Option<String>,
    preview: Option<String>,
    studio_mode: bool,
    scenes: &'a [Scene],
}

pub fn list(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let scenes = session.scenes();
    let listing = SceneListing {
        program: session.program_scene(),
        preview: session.preview_scene(),
        studio_mode: session.studio_mode(),
        scenes: &scenes,
    };
    let color = output::should_color(&global.color);
    let rendered = output::render(&global.output, &listing, |l| {
        output::scenes_text(l.scenes, l.program.as_deref(), l.preview.as_deref(), color)
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn select(session: &Session, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    if !session.scenes().iter().any(|s| s.name == name) {
        return Err(CliError::NotFound {
            resource_type: "scene".into(),
            identifier: name.to_owned(),
            list_command: "scenes".into(),
        });
    }
    session.set_scene(name).await;
    if session.studio_mode() {
        done(global, &format!("Preview: {name} (run `obsdeck cut` to take it live)"));
    } else {
        done(global, &format!("Program: {name}"));
    }
    Ok(())
}

pub async fn studio(session: &Session, enabled: bool, global: &GlobalOpts) {
    session.set_studio_mode(enabled).await;
    done(
        global,
        if enabled { "Studio mode on" } else { "Studio mode off" },
    );
}

pub async fn transition(
    session: &Session,
    args: TransitionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.style.is_none() && args.duration.is_none() {
        let config = session.transition();
        let rendered = output::render(&global.output, config.as_ref(), |t| {
            let available: Vec<&str> = t.available.iter().map(String::as_str).collect();
            format!(
                "{} ({} ms)\navailable: {}",
                t.active,
                t.duration_ms,
                available.join(", ")
            )
        })?;
        output::print_output(&rendered, global.quiet);
        return Ok(());
    }

    if let Some(style) = args.style {
        let current = session.transition();
        if !current.available.is_empty() && !current.available.contains(&style) {
            return Err(CliError::NotFound {
                resource_type: "transition".into(),
                identifier: style,
                list_command: "transition".into(),
            });
        }
        session.set_transition_style(&style).await;
        done(global, &format!("Transition: {style}"));
    }

    if let Some(duration) = args.duration {
        session.set_transition_duration(duration).await;
        if duration > MAX_TRANSITION_MS {
            done(global, &format!("Transition duration: {MAX_TRANSITION_MS} ms (capped)"));
        } else {
            done(global, &format!("Transition duration: {duration} ms"));
        }
    }
    Ok(())
}

pub async fn cut(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    if !session.studio_mode() {
        return Err(CliError::Validation {
            field: "studio mode".into(),
            reason: "cut commits the preview scene; enable it with `obsdeck studio on`".into(),
        });
    }
    session.trigger_transition().await;
    done(global, "Transition triggered");
    Ok(())
}
