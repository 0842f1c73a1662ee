//! 好友 HTTP API 客户端
//!
//! 负责所有好友相关的 HTTP 请求

use crate::im::friend::models::{Contact, PendingRequest};
use crate::im::gateway::RequestGateway;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// 好友相关的 HTTP API 客户端
pub struct FriendApi {
    gateway: Arc<RequestGateway>,
}

impl FriendApi {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// 获取好友列表（全量）
    pub async fn get_friend_list(&self) -> Result<Vec<Contact>> {
        info!("[FriendAPI] 📡 请求好友列表");
        let friends: Vec<Contact> = self
            .gateway
            .get_data("/api/friend/list", &[], "获取好友列表")
            .await?
            .unwrap_or_default();
        debug!("[FriendAPI] 好友列表共 {} 条", friends.len());
        Ok(friends)
    }

    /// 按用户名精确搜索用户
    pub async fn search_user(&self, username: &str) -> Result<Option<Contact>> {
        if username.is_empty() {
            return Err(anyhow::anyhow!("搜索用户名不能为空"));
        }

        info!("[FriendAPI] 🔍 搜索用户: {}", username);
        self.gateway
            .get_data(
                "/api/friend/search",
                &[("username", username.to_string())],
                "搜索用户",
            )
            .await
    }

    /// 发送好友申请
    pub async fn apply_friend(&self, user_id: i64, remark: &str) -> Result<()> {
        info!("[FriendAPI] 📡 发送好友申请, 目标用户: {}", user_id);
        self.gateway
            .post_data::<serde_json::Value, _>(
                "/api/friend/apply",
                &serde_json::json!({ "userId": user_id, "remark": remark }),
                "好友申请",
            )
            .await?;
        info!("[FriendAPI] ✅ 好友申请已发送");
        Ok(())
    }

    /// 获取待处理好友申请列表
    pub async fn get_pending_requests(&self) -> Result<Vec<PendingRequest>> {
        info!("[FriendAPI] 📡 请求待处理好友申请");
        let requests: Vec<PendingRequest> = self
            .gateway
            .get_data("/api/friend/pending", &[], "获取待处理申请")
            .await?
            .unwrap_or_default();
        debug!("[FriendAPI] 待处理申请共 {} 条", requests.len());
        Ok(requests)
    }

    /// 审批好友申请（agree=true 通过，false 拒绝）
    pub async fn approve_request(&self, request_id: i64, agree: bool) -> Result<()> {
        info!(
            "[FriendAPI] 📡 审批好友申请, requestId: {}, agree: {}",
            request_id, agree
        );
        self.gateway
            .post_data::<serde_json::Value, _>(
                "/api/friend/approve",
                &serde_json::json!({ "requestId": request_id, "agree": agree }),
                "审批好友申请",
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::gateway::GatewayConfig;
    use crate::im::session::SessionStore;
    use crate::im::storage::temp_store;

    #[tokio::test]
    async fn test_search_rejects_empty_username() {
        let session = Arc::new(SessionStore::new(temp_store()));
        let gateway =
            Arc::new(RequestGateway::new(GatewayConfig::default(), session).unwrap());
        let api = FriendApi::new(gateway);
        assert!(api.search_user("").await.is_err());
    }

    #[test]
    fn test_contact_wire_shape() {
        let raw = r#"{"userId":7,"nickname":"n","avatar":"","online":true,"remark":"老同学"}"#;
        let contact: Contact = serde_json::from_str(raw).unwrap();
        assert_eq!(contact.user_id, 7);
        assert!(contact.online);
        assert_eq!(contact.remark.as_deref(), Some("老同学"));
    }

    #[test]
    fn test_contact_defaults_on_missing_fields() {
        let raw = r#"{"userId":7}"#;
        let contact: Contact = serde_json::from_str(raw).unwrap();
        assert!(!contact.online);
        assert!(contact.remark.is_none());
    }
}
