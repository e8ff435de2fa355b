//! Default dispatch table served by the `wxhook-web` binary.
//!
//! Subscriptions (plain and QR) get the welcome text when one is configured,
//! text messages are optionally echoed, and everything else gets an empty
//! reply.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::dispatch::{DispatchTable, EmptyReply, EventType, MessageKind, Payload};
use crate::message::Reply;

/// Auto-reply behavior, usually taken from [`Config`].
#[derive(Debug, Clone, Default)]
pub struct AutoReply {
    pub welcome_text: Option<String>,
    pub echo_text: bool,
}

impl AutoReply {
    pub fn from_config(config: &Config) -> Self {
        Self {
            welcome_text: config.welcome_text.clone(),
            echo_text: config.echo_text,
        }
    }

    pub fn table(&self) -> DispatchTable {
        let mut builder = DispatchTable::builder();

        if let Some(welcome) = &self.welcome_text {
            for event in [EventType::Subscribe, EventType::QrSubscribe] {
                let welcome = welcome.clone();
                builder = builder.on_event(event, move |ctx| {
                    info!(
                        from_user = %ctx.envelope.from_user_name,
                        qr = event == EventType::QrSubscribe,
                        "autoreply_welcome"
                    );
                    Reply::text(welcome.clone())
                });
            }
        }

        if self.echo_text {
            builder = builder.on_message(MessageKind::Text, |ctx| match &ctx.payload {
                Some(Payload::Text { content, .. }) if !content.is_empty() => {
                    Reply::text(content.to_string())
                }
                _ => Reply::Empty,
            });
        }

        builder.unknown_handler(Arc::new(EmptyReply)).build()
    }
}
