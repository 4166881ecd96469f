//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for consuming engine
//! [`Event`](crate::Event)s; [`SubscriberSet`] fans events out to each
//! subscriber through its own bounded queue; [`LogWriter`] renders events as
//! `tracing` records and is always installed by
//! [`EngineBuilder`](crate::EngineBuilder).
//!
//! ```text
//! Engine ─ publish(Event) ─► Bus ─► subscriber_listener ─► SubscriberSet
//!                                                             ├──► LogWriter
//!                                                             └──► custom ...
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
