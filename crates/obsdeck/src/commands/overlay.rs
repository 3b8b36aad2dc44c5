//! Text and source-visibility command handlers.

use obsdeck_core::Session;

use crate::cli::GlobalOpts;

use super::done;

pub async fn text(session: &Session, input: &str, text: &str, global: &GlobalOpts) {
    session.set_text(input, text).await;
    done(global, &format!("{input}: text updated"));
}

pub async fn visibility(session: &Session, source: &str, visible: bool, global: &GlobalOpts) {
    session.set_source_visibility(source, visible).await;
    done(
        global,
        &format!("{source}: {}", if visible { "shown" } else { "hidden" }),
    );
}
