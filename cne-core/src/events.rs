//! Process-local named-topic event bus. Subscribers run synchronously, in
//! registration order, on the emitting thread; a subscriber panic/error is
//! isolated so it cannot interrupt delivery to the remaining subscribers.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use tracing::error;

use crate::models::ApprovalEvent;

type Subscriber = Box<dyn Fn(&ApprovalEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn subscribe(&self, topic: &str, callback: impl Fn(&ApprovalEvent) + Send + Sync + 'static) {
        let mut topics = self.topics.lock().unwrap();
        topics.entry(topic.to_string()).or_default().push(Box::new(callback));
    }

    pub fn emit(&self, topic: &str, payload: &ApprovalEvent) {
        let topics = self.topics.lock().unwrap();
        if let Some(subscribers) = topics.get(topic) {
            for subscriber in subscribers {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| subscriber(payload))) {
                    error!(topic, ?panic, "event subscriber panicked");
                }
            }
        }
    }
}
