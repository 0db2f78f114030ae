use std::pin::pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ReplyConfig;
use crate::max::types::{Destination, NewMessageBody, Update};
use crate::max::{ApiError, MaxClient};

/// Anything that can deliver a reply.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, to: &Destination, body: &NewMessageBody) -> Result<(), ApiError>;
}

#[async_trait]
impl MessageSender for MaxClient {
    async fn send_message(&self, to: &Destination, body: &NewMessageBody) -> Result<(), ApiError> {
        let sent = MaxClient::send_message(self, to, body).await?;
        if let Some(body) = sent.body {
            debug!("Reply delivered as {}", body.mid);
        }
        Ok(())
    }
}

/// What happened to a single update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Replied,
    SendFailed,
    Ignored,
}

/// Reply with the greeting to a new message; log and skip anything else.
pub async fn handle_update<S>(sender: &S, reply: &ReplyConfig, update: Update) -> Dispatch
where
    S: MessageSender + ?Sized,
{
    debug!("Received {} update", update.kind());
    match update {
        Update::MessageCreated(created) => {
            let message = created.message;
            let Some(to) = Destination::of(&message.recipient) else {
                warn!("Message without chat or user id, skipping");
                return Dispatch::Ignored;
            };

            info!("New message! Chat: {}", to);
            debug!(
                "From {:?} at {} ({:?} chat): {:?}",
                message.sender.as_ref().map(|u| (&u.name, u.user_id)),
                created.timestamp,
                message.recipient.chat_type,
                message.body.as_ref().and_then(|b| b.text.as_deref())
            );

            let body = NewMessageBody {
                notify: reply.notify,
                format: reply.format,
                ..NewMessageBody::text(reply.greeting.clone())
            };
            match sender.send_message(&to, &body).await {
                Ok(()) => Dispatch::Replied,
                Err(e) => {
                    error!("Failed to send reply: {}", e);
                    Dispatch::SendFailed
                }
            }
        }
        Update::Other {
            update_type,
            timestamp,
        } => {
            info!("Other update: {}", update_type);
            debug!("Ignored {} at {}", update_type, timestamp);
            Dispatch::Ignored
        }
    }
}

/// Consume `updates` one at a time until the stream ends or `cancel` fires.
/// Cancellation is only observed between updates; a reply in flight is
/// always finished. Returns the number of updates handled.
pub async fn run<S, U>(
    sender: &S,
    reply: &ReplyConfig,
    updates: U,
    cancel: CancellationToken,
) -> usize
where
    S: MessageSender + ?Sized,
    U: Stream<Item = Update>,
{
    let mut updates = pin!(updates);
    let mut handled = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = updates.next() => next,
        };
        let Some(update) = next else {
            break;
        };
        handle_update(sender, reply, update).await;
        handled += 1;
    }

    info!("Update loop stopped after {} update(s)", handled);
    handled
}
