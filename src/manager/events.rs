use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TokenError;

/// Lifecycle notifications broadcast by the token manager, in the order
/// their triggering fetches resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Start,
    Token(String),
    Error(TokenError),
    Stop,
}

impl TokenEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TokenEvent::Start => "start",
            TokenEvent::Token(_) => "token",
            TokenEvent::Error(_) => "error",
            TokenEvent::Stop => "stop",
        }
    }
}

/// One-shot listener for the next issued token.
///
/// Resolves with the token from the next successful fetch, stays pending
/// across failed attempts, and fails with `TokenError::Stopped` if the
/// manager is stopped first.
#[derive(Debug)]
pub struct PendingToken {
    receiver: oneshot::Receiver<String>,
    coalesced: bool,
}

impl PendingToken {
    pub(crate) fn new(receiver: oneshot::Receiver<String>, coalesced: bool) -> Self {
        Self { receiver, coalesced }
    }

    /// True when this request joined a forced refresh that was already in flight.
    pub fn is_coalesced(&self) -> bool {
        self.coalesced
    }
}

impl Future for PendingToken {
    type Output = Result<String, TokenError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.map_err(|_| TokenError::Stopped))
    }
}
