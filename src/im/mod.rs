//! IM 客户端核心逻辑
//!
//! 会话存储、花名册、会话消息、通道管理器与历史同步器

pub mod auth;
pub mod client;
pub mod conversation;
pub mod file;
pub mod friend;
pub mod gateway;
pub mod group;
pub mod listener;
pub mod roster;
pub mod session;
pub mod storage;
pub mod types;
pub mod user;

pub use auth::AuthApi;
pub use client::{ChannelConfig, ChannelManager, ChannelState};
pub use conversation::{ConversationStore, HistoryApi, HistorySyncer};
pub use gateway::{GatewayConfig, RequestGateway};
pub use roster::{RosterStore, RosterSyncer};
pub use session::SessionStore;
pub use types::{ChatMessage, MsgBody};
