//! NATS event datasource and connection options.

mod connect_options;
mod nats_events;

pub use connect_options::connect_options;
pub use nats_events::NatsEvents;
