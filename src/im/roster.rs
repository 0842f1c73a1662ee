//! 花名册存储与同步
//!
//! 好友列表 + 群组列表 + 在线状态视图。
//! 列表采用整体替换（任何增删操作后全量重拉，最终一致），
//! 在线状态是唯一的原位修补字段（每次上下线都重拉代价太高）

use crate::im::friend::api::FriendApi;
use crate::im::friend::models::{Contact, PendingRequest};
use crate::im::group::{Group, GroupApi};
use crate::im::listener::{EmptyRosterListener, RosterListener};
use anyhow::Result;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Default)]
struct RosterState {
    friends: Vec<Contact>,
    groups: Vec<Group>,
    pending_request: bool,
}

/// 花名册存储
///
/// 进程启动时构造一次，引用注入给 UI 处理函数和通道分发两类调用方；
/// 单线程事件模型下互不交错，Mutex 仅保证跨 await 点的内存安全
pub struct RosterStore {
    state: Mutex<RosterState>,
}

impl Default for RosterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RosterState::default()),
        }
    }

    /// 整体替换好友列表
    pub fn set_friends(&self, friends: Vec<Contact>) {
        self.state.lock().unwrap().friends = friends;
    }

    /// 整体替换群组列表
    pub fn set_groups(&self, groups: Vec<Group>) {
        self.state.lock().unwrap().groups = groups;
    }

    /// 原位修补某个好友的在线标记（仅实时推送调用）
    ///
    /// 返回是否命中了对应好友
    pub fn set_online(&self, user_id: i64, online: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.friends.iter_mut().find(|f| f.user_id == user_id) {
            Some(friend) => {
                friend.online = online;
                true
            }
            None => false,
        }
    }

    /// 设置待处理好友申请标记
    pub fn set_pending_request(&self, pending: bool) {
        self.state.lock().unwrap().pending_request = pending;
    }

    pub fn friends(&self) -> Vec<Contact> {
        self.state.lock().unwrap().friends.clone()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state.lock().unwrap().groups.clone()
    }

    pub fn has_pending_request(&self) -> bool {
        self.state.lock().unwrap().pending_request
    }

    /// 登出时清空
    pub fn clear(&self) {
        *self.state.lock().unwrap() = RosterState::default();
    }
}

/// 花名册同步器
///
/// 封装"API 拉取 → 整体写入存储 → 监听器通知"的刷新流程
pub struct RosterSyncer {
    friend_api: FriendApi,
    group_api: GroupApi,
    store: Arc<RosterStore>,
    listener: Arc<dyn RosterListener>,
}

impl RosterSyncer {
    pub fn new(friend_api: FriendApi, group_api: GroupApi, store: Arc<RosterStore>) -> Self {
        Self::with_listener(friend_api, group_api, store, Arc::new(EmptyRosterListener))
    }

    pub fn with_listener(
        friend_api: FriendApi,
        group_api: GroupApi,
        store: Arc<RosterStore>,
        listener: Arc<dyn RosterListener>,
    ) -> Self {
        Self {
            friend_api,
            group_api,
            store,
            listener,
        }
    }

    /// 全量刷新好友列表并通知监听器
    pub async fn refresh_friends(&self) -> Result<()> {
        let friends = self.friend_api.get_friend_list().await?;
        info!("[Roster] 🔄 好友列表已刷新, 共 {} 条", friends.len());

        let json = serde_json::to_string(&friends).unwrap_or_default();
        self.store.set_friends(friends);
        self.listener.on_friend_list_changed(json).await;
        Ok(())
    }

    /// 全量刷新群组列表并通知监听器
    pub async fn refresh_groups(&self) -> Result<()> {
        let groups = self.group_api.get_group_list().await?;
        info!("[Roster] 🔄 群组列表已刷新, 共 {} 条", groups.len());

        let json = serde_json::to_string(&groups).unwrap_or_default();
        self.store.set_groups(groups);
        self.listener.on_group_list_changed(json).await;
        Ok(())
    }

    /// 拉取待处理好友申请，并据此维护红点标记
    pub async fn refresh_pending_requests(&self) -> Result<Vec<PendingRequest>> {
        let requests = self.friend_api.get_pending_requests().await?;
        self.store.set_pending_request(!requests.is_empty());

        let json = serde_json::to_string(&requests).unwrap_or_default();
        self.listener.on_pending_requests_changed(json).await;
        Ok(requests)
    }

    /// 按用户名精确搜索
    pub async fn search_user(&self, username: &str) -> Result<Option<Contact>> {
        self.friend_api.search_user(username).await
    }

    /// 发送好友申请
    pub async fn apply_friend(&self, user_id: i64, remark: &str) -> Result<()> {
        self.friend_api.apply_friend(user_id, remark).await
    }

    /// 审批好友申请：API 调用成功后全量重拉好友与待处理列表
    ///
    /// 不做原位修补，靠重拉收敛，天然抵御漏掉的增量
    pub async fn approve_request(&self, request_id: i64, agree: bool) -> Result<()> {
        self.friend_api.approve_request(request_id, agree).await?;
        debug!("[Roster] 审批完成, 开始重拉好友与待处理列表");

        if agree {
            if let Err(e) = self.refresh_friends().await {
                warn!("[Roster] ⚠️ 审批后刷新好友列表失败: {}", e);
            }
        }
        if let Err(e) = self.refresh_pending_requests().await {
            warn!("[Roster] ⚠️ 审批后刷新待处理列表失败: {}", e);
        }
        Ok(())
    }

    /// 创建群组并刷新群组列表
    pub async fn create_group(&self, group_name: &str, notice: &str) -> Result<Group> {
        let group = self.group_api.create_group(group_name, notice).await?;
        if let Err(e) = self.refresh_groups().await {
            warn!("[Roster] ⚠️ 建群后刷新群组列表失败: {}", e);
        }
        Ok(group)
    }

    /// 加入群组并刷新群组列表
    pub async fn join_group(&self, group_id: i64) -> Result<()> {
        self.group_api.join_group(group_id).await?;
        if let Err(e) = self.refresh_groups().await {
            warn!("[Roster] ⚠️ 入群后刷新群组列表失败: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(user_id: i64, online: bool) -> Contact {
        Contact {
            user_id,
            nickname: format!("用户{}", user_id),
            online,
            ..Default::default()
        }
    }

    #[test]
    fn test_set_online_flips_exactly_one_entry() {
        let store = RosterStore::new();
        store.set_friends(vec![contact(1, false), contact(2, false), contact(3, true)]);

        assert!(store.set_online(2, true));

        let friends = store.friends();
        assert!(!friends[0].online);
        assert!(friends[1].online);
        assert!(friends[2].online);
    }

    #[test]
    fn test_set_online_missing_user_is_noop() {
        let store = RosterStore::new();
        store.set_friends(vec![contact(1, false)]);

        assert!(!store.set_online(99, true));
        assert!(!store.friends()[0].online);
    }

    #[test]
    fn test_set_friends_wholesale_replace() {
        let store = RosterStore::new();
        store.set_friends(vec![contact(1, true), contact(2, false)]);
        store.set_friends(vec![contact(3, false)]);

        let friends = store.friends();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].user_id, 3);
    }

    #[test]
    fn test_pending_flag_and_clear() {
        let store = RosterStore::new();
        store.set_friends(vec![contact(1, true)]);
        store.set_pending_request(true);
        assert!(store.has_pending_request());

        store.clear();
        assert!(!store.has_pending_request());
        assert!(store.friends().is_empty());
        assert!(store.groups().is_empty());
    }
}
