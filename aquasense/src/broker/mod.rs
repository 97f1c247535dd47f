pub mod consumer;
pub mod machine;
pub mod registry;
pub mod session;
pub mod subscription;

pub use consumer::{Consumer, ConsumerBuilder};
pub use machine::BrokerState;
pub use subscription::{Subscription, Unsubscribe};
