pub mod client;

pub use client::{GatewayClient, GatewayError, GatewayReply};
