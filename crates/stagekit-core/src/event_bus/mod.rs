//! In-process publish/subscribe event distribution.
//!
//! Services publish state transitions and progress here; observers
//! (GUI adapters, loggers, tests) subscribe. Delivery is synchronous on
//! the publisher's thread; consumers that touch shared mutable state
//! must marshal to their own execution context inside the callback.

mod bus;
mod events;

pub use bus::{EventBus, EventFilter, SubscriptionId};
pub use events::{
    ConnectionEvent, ErrorEvent, EventCategory, InitializationEvent, MotionEvent, PositionEvent,
    StageEvent, StateEvent,
};
