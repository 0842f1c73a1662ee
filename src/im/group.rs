//! 群组模块
//!
//! 群组模型与创建 / 列表 / 加入 HTTP API

use crate::im::gateway::RequestGateway;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// 群组
///
/// `role` 只决定 UI 能力展示，客户端不做权限校验（服务端权威）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    #[serde(rename = "groupName", default)]
    pub group_name: String,
    #[serde(default)]
    pub notice: String,
    #[serde(default)]
    pub role: i32,
}

/// 群组相关的 HTTP API 客户端
pub struct GroupApi {
    gateway: Arc<RequestGateway>,
}

impl GroupApi {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// 创建群组
    pub async fn create_group(&self, group_name: &str, notice: &str) -> Result<Group> {
        if group_name.is_empty() {
            return Err(anyhow::anyhow!("群名称不能为空"));
        }

        info!("[GroupAPI] 📡 创建群组: {}", group_name);
        let group: Option<Group> = self
            .gateway
            .post_data(
                "/api/group/create",
                &serde_json::json!({ "groupName": group_name, "notice": notice }),
                "创建群组",
            )
            .await?;
        group.ok_or_else(|| anyhow::anyhow!("创建群组响应中缺少 data 字段"))
    }

    /// 获取我的群组列表（全量）
    pub async fn get_group_list(&self) -> Result<Vec<Group>> {
        info!("[GroupAPI] 📡 请求群组列表");
        let groups: Vec<Group> = self
            .gateway
            .get_data("/api/group/list", &[], "获取群组列表")
            .await?
            .unwrap_or_default();
        debug!("[GroupAPI] 群组列表共 {} 条", groups.len());
        Ok(groups)
    }

    /// 加入群组
    pub async fn join_group(&self, group_id: i64) -> Result<()> {
        info!("[GroupAPI] 📡 加入群组: {}", group_id);
        self.gateway
            .post_data::<serde_json::Value, _>(
                "/api/group/join",
                &serde_json::json!({ "groupId": group_id }),
                "加入群组",
            )
            .await?;
        info!("[GroupAPI] ✅ 已加入群组: {}", group_id);
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
    async fn test_create_rejects_empty_name() {
        let session = Arc::new(SessionStore::new(temp_store()));
        let gateway =
            Arc::new(RequestGateway::new(GatewayConfig::default(), session).unwrap());
        let api = GroupApi::new(gateway);
        assert!(api.create_group("", "公告").await.is_err());
    }

    #[test]
    fn test_group_wire_shape() {
        let raw = r#"{"id":2001,"groupName":"同学群","notice":"","role":1}"#;
        let group: Group = serde_json::from_str(raw).unwrap();
        assert_eq!(group.id, 2001);
        assert_eq!(group.group_name, "同学群");
        assert_eq!(group.role, 1);
    }
}
