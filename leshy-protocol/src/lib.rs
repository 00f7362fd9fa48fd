pub mod errors;
pub mod frame;
pub mod payload;
mod op_code;
mod request;
mod response;

// Public re-exports for easy access
pub use frame::{Frame, FrameType, MAX_DATA_BYTES};
pub use payload::{RequestPayload, ResponsePayload};
pub use errors::ProtocolError;

// Re-export common requests/responses
pub use request::{AckRequest, PublishRequest, SubscribeRequest};
pub use response::{Delivery, PublishAck};

pub use op_code::OpCode;
