//! Background tasks that print session activity as it happens.

use crate::cli::commands::OutputFormat;
use crate::output::console::ConsoleFormatter;
use crate::output::formatter::EventFormatter;
use crate::output::json::JsonFormatter;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use voxlink_application::{ChannelSession, LoginSession};

/// Prints session activity with the chosen formatter
#[derive(Clone)]
pub struct ActivityPrinter {
    formatter: Arc<dyn EventFormatter>,
}

impl ActivityPrinter {
    pub fn new(format: OutputFormat) -> Self {
        let formatter: Arc<dyn EventFormatter> = match format {
            OutputFormat::Text => Arc::new(ConsoleFormatter),
            OutputFormat::Json => Arc::new(JsonFormatter),
        };
        Self { formatter }
    }

    pub fn formatter(&self) -> &dyn EventFormatter {
        self.formatter.as_ref()
    }

    pub fn print(&self, line: &str) {
        println!("{}", line);
    }

    /// Print every login state change until `cancel` fires.
    pub fn follow_login(&self, session: &LoginSession, cancel: CancellationToken) -> JoinHandle<()> {
        let formatter = Arc::clone(&self.formatter);
        let account = session.account().clone();
        let mut states = session.watch_login_state();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        println!("{}", formatter.login_state(&account, state));
                    }
                }
            }
        })
    }

    /// Print stream state changes and channel updates until `cancel` fires.
    pub fn follow_channel(
        &self,
        channel: &Arc<ChannelSession>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let formatter = Arc::clone(&self.formatter);
        let id = channel.channel().clone();
        let mut audio = channel.watch_audio_state();
        let mut text = channel.watch_text_state();
        let mut updates = channel.subscribe_updates();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    Ok(()) = audio.changed() => {
                        let state = *audio.borrow_and_update();
                        println!("{}", formatter.channel_state(&id, "audio", state));
                    }
                    Ok(()) = text.changed() => {
                        let state = *text.borrow_and_update();
                        println!("{}", formatter.channel_state(&id, "text", state));
                    }
                    update = updates.recv() => match update {
                        Ok(update) => println!("{}", formatter.update(&id, &update)),
                        Err(RecvError::Lagged(skipped)) => {
                            let note = format!("{} updates dropped", skipped);
                            println!("{}", formatter.error("printer lagged", &note));
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}
