//! Message queue between stack backends, the console reader and the runner
//!
//! Backends and the console reader own [`EventSender`]s and may live on other
//! threads. The runner owns the single [`EventQueue`] and handles one
//! message at a time, so event handling never races command handling.

use super::events::StackEvent;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A complete console line
    Console(String),
    Stack(StackEvent),
    /// Console input ended
    Shutdown,
}

/// Outcome of waiting on the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(Message),
    TimedOut,
    /// Every sender is gone
    Closed,
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Message>,
}

impl EventSender {
    /// Queue a stack event, returning false once the runner has gone away
    pub fn event(&self, event: StackEvent) -> bool {
        self.tx.send(Message::Stack(event)).is_ok()
    }

    pub fn line(&self, line: impl Into<String>) -> bool {
        self.tx.send(Message::Console(line.into())).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.tx.send(Message::Shutdown).is_ok()
    }
}

#[derive(Debug)]
pub struct EventQueue {
    rx: Receiver<Message>,
}

impl EventQueue {
    pub fn new() -> (EventQueue, EventSender) {
        let (tx, rx) = mpsc::channel();
        (EventQueue { rx }, EventSender { tx })
    }

    /// Wait for the next message, at most `timeout` when one is given
    pub fn next(&self, timeout: Option<Duration>) -> Received {
        match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(message) => Received::Message(message),
                Err(RecvTimeoutError::Timeout) => Received::TimedOut,
                Err(RecvTimeoutError::Disconnected) => Received::Closed,
            },
            None => match self.rx.recv() {
                Ok(message) => Received::Message(message),
                Err(_) => Received::Closed,
            },
        }
    }

    /// Take a message if one is already waiting
    pub fn try_next(&self) -> Option<Message> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
