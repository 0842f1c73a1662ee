//! 监听器回调接口
//!
//! UI 协作方通过注册监听器感知通道事件和花名册变更，
//! 核心逻辑不持有任何界面引用

use async_trait::async_trait;

/// 通道监听器回调接口
///
/// 所有参数为 JSON 字符串或基础类型，便于跨层传递
#[async_trait]
pub trait ChannelListener: Send + Sync {
    /// 连接状态变化（connected=true 表示已进入可用状态）
    async fn on_connection_status_changed(&self, connected: bool, message: String);

    /// 新消息进入会话存储（实时推送，已完成对称寻址归桶）
    async fn on_new_message(&self, conversation_key: i64, message_json: String);

    /// 好友上下线
    async fn on_presence_changed(&self, user_id: i64, online: bool);

    /// 收到好友申请信号（瞬时通知，具体列表由显式拉取获得）
    async fn on_friend_request(&self);
}

/// 空的通道监听器实现（默认实现）
pub struct EmptyChannelListener;

#[async_trait]
impl ChannelListener for EmptyChannelListener {
    async fn on_connection_status_changed(&self, _connected: bool, _message: String) {}
    async fn on_new_message(&self, _conversation_key: i64, _message_json: String) {}
    async fn on_presence_changed(&self, _user_id: i64, _online: bool) {}
    async fn on_friend_request(&self) {}
}

/// 花名册监听器回调接口
#[async_trait]
pub trait RosterListener: Send + Sync {
    /// 好友列表整体刷新，参数为 JSON 数组字符串
    async fn on_friend_list_changed(&self, friends_json: String);

    /// 群组列表整体刷新，参数为 JSON 数组字符串
    async fn on_group_list_changed(&self, groups_json: String);

    /// 待处理好友申请列表刷新，参数为 JSON 数组字符串
    async fn on_pending_requests_changed(&self, requests_json: String);
}

/// 空的花名册监听器实现（默认实现）
pub struct EmptyRosterListener;

#[async_trait]
impl RosterListener for EmptyRosterListener {
    async fn on_friend_list_changed(&self, _friends_json: String) {}
    async fn on_group_list_changed(&self, _groups_json: String) {}
    async fn on_pending_requests_changed(&self, _requests_json: String) {}
}
