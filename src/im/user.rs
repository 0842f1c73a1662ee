//! 用户资料 HTTP API
//!
//! 获取当前用户信息、修改资料、修改密码

use crate::im::gateway::RequestGateway;
use crate::im::session::{SessionStore, UserInfo};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// 资料修改请求体
#[derive(Debug, Default, Serialize)]
pub struct UpdateProfileRequest {
    pub nickname: String,
    pub avatar: String,
    pub signature: String,
    pub gender: i32,
}

/// 用户 API 客户端
pub struct UserApi {
    gateway: Arc<RequestGateway>,
    session: Arc<SessionStore>,
}

impl UserApi {
    pub fn new(gateway: Arc<RequestGateway>, session: Arc<SessionStore>) -> Self {
        Self { gateway, session }
    }

    /// 获取当前用户信息，并整体替换会话存储中的身份
    pub async fn fetch_user_info(&self) -> Result<UserInfo> {
        let info: UserInfo = self
            .gateway
            .get_data("/api/user/info", &[], "获取用户信息")
            .await?
            .context("用户信息响应中缺少 data 字段")?;

        self.session.replace_user_info(info.clone());
        Ok(info)
    }

    /// 修改个人资料，成功后重新拉取并整体替换本地身份
    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<UserInfo> {
        if req.nickname.is_empty() {
            return Err(anyhow::anyhow!("昵称不能为空"));
        }

        info!("[User] 📡 正在修改个人资料");
        self.gateway
            .post_data::<serde_json::Value, _>("/api/user/update", req, "修改资料")
            .await?;
        self.fetch_user_info().await
    }

    /// 修改密码
    pub async fn update_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(anyhow::anyhow!("旧密码和新密码不能为空"));
        }

        info!("[User] 📡 正在修改密码");
        self.gateway
            .post_data::<serde_json::Value, _>(
                "/api/user/password",
                &serde_json::json!({
                    "oldPassword": old_password,
                    "newPassword": new_password,
                }),
                "修改密码",
            )
            .await?;
        info!("[User] ✅ 密码修改成功");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::gateway::GatewayConfig;
    use crate::im::storage::temp_store;

    fn api() -> UserApi {
        let session = Arc::new(SessionStore::new(temp_store()));
        let gateway =
            Arc::new(RequestGateway::new(GatewayConfig::default(), session.clone()).unwrap());
        UserApi::new(gateway, session)
    }

    #[tokio::test]
    async fn test_update_profile_rejects_empty_nickname() {
        let api = api();
        let req = UpdateProfileRequest::default();
        assert!(api.update_profile(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_update_password_rejects_empty_fields() {
        let api = api();
        assert!(api.update_password("", "new").await.is_err());
        assert!(api.update_password("old", "").await.is_err());
    }
}
