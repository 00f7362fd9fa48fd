mod delivery;
mod publish_ack;

pub use delivery::Delivery;
pub use publish_ack::PublishAck;
