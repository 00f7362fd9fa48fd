mod ack;
mod publish;
mod subscribe;

pub use ack::AckRequest;
pub use publish::PublishRequest;
pub use subscribe::SubscribeRequest;
