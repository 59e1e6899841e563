mod app;
mod terminal;
mod ui;

use app::{handle_input, App};
use clap::Parser;
use crossterm::event::EventStream;
use futures_util::StreamExt;
use maitri_console::backend::{spawn_vitals_poll, Backend, HttpBackend};
use maitri_console::config::{load_config, Args};
use maitri_console::conversation::{Conversation, Relay};
use maitri_console::link::{LinkHandle, WsTransport};
use maitri_console::logging::init_logging;
use maitri_console::store::Store;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::error::Error;
use std::io;
use std::sync::Arc;
use terminal::TerminalGuard;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config);
    info!(
        "console_start: ws_url={} api_url={} relay={}",
        config.ws_url, config.api_url, config.relay
    );

    let store = Store::new();
    let link = LinkHandle::spawn(WsTransport::new(config.ws_url.clone()), &store, config.link);
    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(config.api_url.clone(), config.request_timeout)?);
    let (poll_shutdown, poll_shutdown_rx) = watch::channel(false);
    let poll = spawn_vitals_poll(
        Arc::clone(&backend),
        store.downgrade(),
        config.poll_interval,
        poll_shutdown_rx,
    );

    let mut conversation = Conversation::new(store.clone());
    if config.relay {
        conversation = conversation.with_relay(Relay::new(link.sender(), backend));
    }
    let mut app = App::new(conversation);

    let outcome = run_dashboard(&mut app, &store).await;

    poll_shutdown.send_replace(true);
    link.join().await;
    if let Err(err) = poll.await {
        warn!("vitals_poll_join_error: {err}");
    }
    info!("console_stop");
    outcome?;
    Ok(())
}

async fn run_dashboard(app: &mut App, store: &Store) -> io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let mut events = EventStream::new();
    let mut revision = store.subscribe_revision();

    loop {
        terminal.draw(|frame| ui::render_ui(frame, app))?;
        tokio::select! {
            changed = revision.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => {
                    if handle_input(event, app) {
                        return Ok(());
                    }
                }
                Some(Err(err)) => warn!("terminal_event_error: {err}"),
                None => return Ok(()),
            },
        }
    }
}
