//! Async test helpers
//!
//! Waiting on the broadcast observation channels with a timeout.

use crate::core_chat::ChatEvent;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    Timeout,
    Closed,
}

impl std::fmt::Display for RecvTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvTimeoutError::Timeout => write!(f, "receive operation timed out"),
            RecvTimeoutError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for RecvTimeoutError {}

/// Next event on `rx`, skipping over lag notifications
pub async fn recv_event(
    rx: &mut broadcast::Receiver<ChatEvent>,
    duration: Duration,
) -> Result<ChatEvent, RecvTimeoutError> {
    timeout(duration, async {
        loop {
            match rx.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(RecvTimeoutError::Closed),
            }
        }
    })
    .await
    .map_err(|_| RecvTimeoutError::Timeout)?
}

/// Every event already queued on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// Last event on `rx` published on `channel`
pub fn last_on_channel(rx: &mut broadcast::Receiver<ChatEvent>, channel: &str) -> Option<ChatEvent> {
    drain_events(rx)
        .into_iter()
        .filter(|event| event.channel() == channel)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_chat::ChatEventBroadcaster;

    #[tokio::test]
    async fn test_recv_event_timeout() {
        let events = ChatEventBroadcaster::new(4);
        let mut rx = events.subscribe();
        let result = recv_event(&mut rx, Duration::from_millis(10)).await;
        assert_eq!(result, Err(RecvTimeoutError::Timeout));
    }

    #[tokio::test]
    async fn test_last_on_channel() {
        let events = ChatEventBroadcaster::new(8);
        let mut rx = events.subscribe();
        events.emit(ChatEvent::Contacts(vec![]));
        events.emit(ChatEvent::Channels(vec![]));
        events.emit(ChatEvent::Contacts(vec![]));

        let last = last_on_channel(&mut rx, ChatEvent::Contacts(vec![]).channel());
        assert_eq!(last, Some(ChatEvent::Contacts(vec![])));
    }
}
