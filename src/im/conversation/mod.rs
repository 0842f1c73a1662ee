//! 会话模块
//!
//! 按会话 key 维护有序消息序列，并在切换会话时同步归一化历史记录

pub mod api;
pub mod history;
pub mod store;

pub use api::{HistoryApi, HistoryRow};
pub use history::HistorySyncer;
pub use store::ConversationStore;
