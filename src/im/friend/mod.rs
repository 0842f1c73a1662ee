//! 好友模块
//!
//! 好友列表 / 搜索 / 申请 / 待处理列表 / 审批

pub mod api;
pub mod models;

pub use api::FriendApi;
pub use models::{Contact, PendingRequest};
