//! PTZ camera command handlers.

use obsdeck_core::Session;

use crate::cli::{FocusMode, GlobalOpts, PtzArgs, PtzCommand};

use super::done;

pub async fn handle(session: &Session, args: PtzArgs, global: &GlobalOpts) {
    match args.command {
        PtzCommand::Move { x, y } => {
            session.ptz_move(x, y).await;
            done(global, &format!("PTZ move ({x}, {y})"));
        }
        PtzCommand::Zoom { z } => {
            session.ptz_zoom(z).await;
            done(global, &format!("PTZ zoom {z}"));
        }
        PtzCommand::Focus { mode } => {
            let auto = matches!(mode, FocusMode::Auto);
            session.ptz_focus(auto).await;
            done(global, if auto { "PTZ autofocus" } else { "PTZ manual focus" });
        }
        PtzCommand::Save { name } => session.ptz_save_preset(&name).await,
        PtzCommand::Recall { name } => {
            session.ptz_recall_preset(&name).await;
            done(global, &format!("PTZ preset recalled: {name}"));
        }
    }
}
