//! Input events and scoped listener registration

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    /// Double click / double tap
    DoubleActivate,
}

/// Pointer event in surface pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
    /// Milliseconds on a monotonic clock
    pub timestamp_ms: u64,
}

impl PointerEvent {
    #[must_use]
    pub fn new(kind: PointerKind, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self {
            kind,
            x,
            y,
            timestamp_ms,
        }
    }

    #[must_use]
    pub fn down(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::Down, x, y, timestamp_ms)
    }

    #[must_use]
    pub fn moved(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::Move, x, y, timestamp_ms)
    }

    #[must_use]
    pub fn up(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::Up, x, y, timestamp_ms)
    }

    #[must_use]
    pub fn double(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::DoubleActivate, x, y, timestamp_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Key(Key),
    /// Container width measurement
    Resize { width: f32 },
}

/// Trait for abstracting event sources to enable testing
pub trait EventSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<InputEvent>;
}

/// Pre-recorded event source for tests and scripted input
pub struct SimulatedEventSource {
    pub(crate) events: Vec<InputEvent>,
    current_index: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<InputEvent>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<InputEvent> {
        let event = self
            .events
            .get(self.current_index)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("event source exhausted"))?;
        self.current_index += 1;
        Ok(event)
    }
}

/// Liveness flag shared by everything registered while a view is mounted
#[derive(Clone, Debug, Default)]
pub struct ListenerScope {
    active: Arc<AtomicBool>,
}

impl ListenerScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Activate the scope; listeners stay live until the guard drops
    #[must_use = "dropping the subscription unmounts immediately"]
    pub fn subscribe(&self) -> Subscription {
        self.active.store(true, Ordering::SeqCst);
        Subscription {
            active: self.active.clone(),
        }
    }
}

/// Guard returned by mount; dropping it releases every listener of the scope
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_drop_deactivates_scope() {
        let scope = ListenerScope::new();
        assert!(!scope.is_active());
        let sub = scope.subscribe();
        assert!(scope.clone().is_active());
        drop(sub);
        assert!(!scope.is_active());
    }

    #[test]
    fn simulated_source_replays_in_order() {
        let mut source = SimulatedEventSource::new(vec![
            InputEvent::Key(Key::Escape),
            InputEvent::Resize { width: 640.0 },
        ]);
        assert!(source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), InputEvent::Key(Key::Escape));
        assert_eq!(source.read().unwrap(), InputEvent::Resize { width: 640.0 });
        assert!(!source.poll(Duration::ZERO).unwrap());
        assert!(source.read().is_err());
    }
}
