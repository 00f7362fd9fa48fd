use std::sync::Arc;

use crate::core::broadcaster::MessageBroadcaster;

pub type SharedBroadcaster = Arc<MessageBroadcaster>;
