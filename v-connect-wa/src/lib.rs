//! v-connect-wa：多实例消息会话管理器
//! v-connect-wa: multi-instance messaging session manager
//!
//! 每个实例对应一个协议会话；HTTP 控制面管理实例，WebSocket 实时通道推送事件。
//! Each instance owns one protocol session; the HTTP control API manages instances
//! and the WebSocket realtime channel pushes their events.

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod router;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
pub mod tasks;
pub mod ws;
