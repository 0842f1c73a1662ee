//! 认证 HTTP API
//!
//! 注册 / 登录；登录成功后由调用方写入会话存储

use crate::im::conversation::store::ConversationStore;
use crate::im::gateway::RequestGateway;
use crate::im::roster::RosterStore;
use crate::im::session::{LoginPayload, SessionStore};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// 注册请求体
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub nickname: String,
}

/// 认证 API 客户端
///
/// 登出入口同时负责三个存储的原子清理（会话 / 花名册 / 会话消息）
pub struct AuthApi {
    gateway: Arc<RequestGateway>,
    session: Arc<SessionStore>,
    roster: Arc<RosterStore>,
    conversations: Arc<ConversationStore>,
}

impl AuthApi {
    pub fn new(
        gateway: Arc<RequestGateway>,
        session: Arc<SessionStore>,
        roster: Arc<RosterStore>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            gateway,
            session,
            roster,
            conversations,
        }
    }

    /// 用户注册
    ///
    /// 空字段在发请求前本地拦截
    pub async fn register(&self, req: &RegisterRequest) -> Result<()> {
        if req.username.is_empty() || req.password.is_empty() || req.nickname.is_empty() {
            return Err(anyhow::anyhow!("用户名、密码和昵称不能为空"));
        }

        info!("[Auth] 📡 正在注册, 用户名: {}", req.username);
        self.gateway
            .post_data::<serde_json::Value, _>("/api/auth/register", req, "注册")
            .await?;
        info!("[Auth] ✅ 注册成功, 用户名: {}", req.username);
        Ok(())
    }

    /// 用户登录：成功后拼接完整 token 并写入会话存储
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginPayload> {
        if username.is_empty() || password.is_empty() {
            return Err(anyhow::anyhow!("用户名或密码不能为空"));
        }

        info!("[Auth] 🔐 正在登录, 用户名: {}", username);
        let payload: LoginPayload = self
            .gateway
            .post_data(
                "/api/auth/login",
                &serde_json::json!({ "username": username, "password": password }),
                "登录",
            )
            .await?
            .context("登录响应中缺少 data 字段")?;

        self.session.login_success(&payload)?;
        Ok(payload)
    }

    /// 登出：三个存储一并清空（单线程事件模型下同一处理函数内完成，不会交错）
    pub fn logout(&self) {
        info!("[Auth] 👋 登出");
        self.session.clear();
        self.roster.clear();
        self.conversations.clear();
    }
}
