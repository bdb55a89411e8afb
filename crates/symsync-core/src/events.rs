//! Debugger event types and helpers.
//!
//! The host debugger reports target state changes as [`DebuggerEvent`]s over a
//! channel. The synchronization controller subscribes through an
//! [`EventSource`] when it is attached and only reacts to stops; the target is
//! guaranteed to be halted, and therefore safe to inspect, while a stop is
//! being handled.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::Address;

/// Why the target stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason
{
    /// Stopped by a signal (e.g. `SIGINT` from the user, `SIGTRAP`)
    Signal(i32),
    /// Hit a breakpoint at the provided address
    Breakpoint(Address),
    /// Finished a single step
    Step,
    /// Halted on request of the debugger
    Interrupt,
    /// Unknown/other reason
    Unknown,
}

/// Event emitted by a debugger host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebuggerEvent
{
    /// Target stopped execution and can be inspected.
    TargetStopped
    {
        /// Reason reported by the host.
        reason: StopReason,
    },
    /// Target resumed execution.
    TargetResumed,
    /// Target exited or the connection to it was lost.
    TargetExited
    {
        /// Exit code, if the host knows it.
        code: Option<i32>,
    },
}

impl DebuggerEvent
{
    /// Shorthand for a [`DebuggerEvent::TargetStopped`] event.
    pub fn stopped(reason: StopReason) -> Self
    {
        Self::TargetStopped { reason }
    }

    /// Whether the target is halted after this event.
    pub fn is_stop(&self) -> bool
    {
        matches!(self, Self::TargetStopped { .. })
    }

    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::TargetStopped { reason } => format_stop_reason(*reason),
            Self::TargetResumed => "Target resumed execution".to_string(),
            Self::TargetExited { code: Some(code) } => format!("Target exited with code: {code}"),
            Self::TargetExited { code: None } => "Target exited".to_string(),
        }
    }
}

/// Format a [`StopReason`] into a user-facing message.
#[must_use]
pub fn format_stop_reason(reason: StopReason) -> String
{
    match reason {
        StopReason::Signal(sig) => format!("Stopped by signal: {sig}"),
        StopReason::Breakpoint(addr) => format!("Hit breakpoint at {addr}"),
        StopReason::Step => "Single step finished".to_string(),
        StopReason::Interrupt => "Interrupted".to_string(),
        StopReason::Unknown => "Stopped for unknown reason".to_string(),
    }
}

/// Sender side of the debugger event channel.
pub type DebuggerEventSender = mpsc::Sender<DebuggerEvent>;
/// Receiver side of the debugger event channel.
pub type DebuggerEventReceiver = mpsc::Receiver<DebuggerEvent>;

/// Create a new debugger event channel.
#[must_use]
pub fn event_channel() -> (DebuggerEventSender, DebuggerEventReceiver)
{
    mpsc::channel()
}

/// Something that delivers debugger events to a single subscriber.
pub trait EventSource
{
    /// Start delivering events; replaces any previous subscription.
    fn subscribe(&mut self) -> DebuggerEventReceiver;

    /// Stop delivering events. The receiver handed out by
    /// [`EventSource::subscribe`] disconnects once it is drained.
    fn unsubscribe(&mut self);
}

/// Clonable event publisher.
///
/// The host keeps one clone to [`publish`](EventBus::publish) events, the
/// controller owns another as its [`EventSource`]. Clones share the same
/// subscription and may live on different threads.
#[derive(Debug, Clone, Default)]
pub struct EventBus
{
    subscriber: Arc<Mutex<Option<DebuggerEventSender>>>,
}

impl EventBus
{
    /// Create a bus with no subscriber.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Deliver an event to the subscriber.
    ///
    /// Returns `false` if nobody is subscribed or the receiver is gone.
    pub fn publish(&self, event: DebuggerEvent) -> bool
    {
        let subscriber = self.subscriber.lock().unwrap_or_else(PoisonError::into_inner);
        subscriber.as_ref().is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Whether a subscriber is currently registered.
    pub fn is_subscribed(&self) -> bool
    {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Drop the subscription from any clone of the bus.
    pub fn close(&self)
    {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl EventSource for EventBus
{
    fn subscribe(&mut self) -> DebuggerEventReceiver
    {
        let (tx, rx) = event_channel();
        *self.subscriber.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    fn unsubscribe(&mut self)
    {
        self.close();
    }
}
