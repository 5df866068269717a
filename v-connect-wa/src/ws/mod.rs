//! 实时通道（WebSocket）/ Realtime channel (WebSocket)

pub mod connection;
pub mod fanout;
pub mod handler;
pub mod sender;
pub mod server;
