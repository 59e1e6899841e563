//! Operator console for the MAITRI mission assistant: the session state
//! store, the live link to the backend, the HTTP fallback and vitals poll,
//! and the chat flow that drives the dialogue engine.

use tokio::sync::watch;

pub mod backend;
pub mod config;
pub mod conversation;
pub mod link;
pub mod logging;
pub mod store;

/// Resolves once `flag` reads true or its sender is gone.
pub async fn shutdown_requested(flag: &mut watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            return;
        }
    }
}
