//! Event bus: trait for emitting domain events from the flow and lottery
//! components.
//!
//! Components accept an `Arc<dyn EventSink>`; the host decides where events go
//! (analytics pipeline, push channel to the admin UI, or nowhere).

use crate::types::{DomainEvent, EventType, PrizeId, TemplateId};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// No-op sink for tests and hosts that don't consume events.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Convenience builder for creating a `DomainEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    user_id: Option<String>,
    template_id: Option<TemplateId>,
    prize_id: Option<PrizeId>,
) -> DomainEvent {
    DomainEvent {
        event_id: Uuid::new_v4(),
        event_type,
        user_id,
        template_id,
        prize_id,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
