pub mod client;

pub use client::{LeshyClient, Subscription};
