//! 会话存储（Session Store）
//!
//! 持有已登录身份和 token，生命周期与登录/登出绑定。
//! token 和用户信息同时落盘，进程重启后通过 [`SessionStore::restore`] 恢复

use crate::im::storage::{KvStore, KEY_TOKEN, KEY_USER_INFO};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

/// 当前登录用户信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub gender: i32,
}

/// 登录接口返回的数据（token + tokenHead + 用户字段平铺）
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub token: String,
    #[serde(rename = "tokenHead", default)]
    pub token_head: String,
    #[serde(flatten)]
    pub user: UserInfo,
}

#[derive(Default)]
struct SessionState {
    token: String,
    user_info: UserInfo,
}

/// 会话存储
///
/// 进程启动时构造一次，通过引用注入给所有消费方（不使用全局单例）
pub struct SessionStore {
    state: Mutex<SessionState>,
    kv: KvStore,
}

impl SessionStore {
    pub fn new(kv: KvStore) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            kv,
        }
    }

    /// 从本地持久化恢复会话（无持久化记录时保持未登录状态）
    pub fn restore(&self) {
        let token = self.kv.get(KEY_TOKEN).unwrap_or_default();
        let user_info = self
            .kv
            .get(KEY_USER_INFO)
            .and_then(|raw| serde_json::from_str::<UserInfo>(&raw).ok())
            .unwrap_or_default();
        if !token.is_empty() {
            info!("[Session] 🔓 已从本地恢复会话, 用户ID: {}", user_info.id);
        }
        let mut state = self.state.lock().unwrap();
        state.token = token;
        state.user_info = user_info;
    }

    /// 登录成功：拼接完整 token（tokenHead + token），落盘并替换内存状态
    pub fn login_success(&self, payload: &LoginPayload) -> Result<()> {
        let full_token = format!("{}{}", payload.token_head, payload.token);
        let user_json = serde_json::to_string(&payload.user)?;

        self.kv.set(KEY_TOKEN, &full_token)?;
        self.kv.set(KEY_USER_INFO, &user_json)?;

        let mut state = self.state.lock().unwrap();
        state.token = full_token;
        state.user_info = payload.user.clone();
        info!("[Session] ✅ 登录成功, 用户ID: {}", payload.user.id);
        Ok(())
    }

    /// 资料更新后整体替换用户信息并重新落盘
    pub fn replace_user_info(&self, info: UserInfo) {
        match serde_json::to_string(&info) {
            Ok(json) => {
                if let Err(e) = self.kv.set(KEY_USER_INFO, &json) {
                    warn!("[Session] ⚠️ 用户信息落盘失败: {}", e);
                }
            }
            Err(e) => warn!("[Session] ⚠️ 用户信息序列化失败: {}", e),
        }
        self.state.lock().unwrap().user_info = info;
    }

    /// 登出 / 401 失效：清除内存状态和两个持久化 key
    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(KEY_TOKEN) {
            warn!("[Session] ⚠️ 清除 token 失败: {}", e);
        }
        if let Err(e) = self.kv.remove(KEY_USER_INFO) {
            warn!("[Session] ⚠️ 清除用户信息失败: {}", e);
        }
        let mut state = self.state.lock().unwrap();
        state.token.clear();
        state.user_info = UserInfo::default();
        info!("[Session] 🔒 会话已清除");
    }

    pub fn token(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        if state.token.is_empty() {
            None
        } else {
            Some(state.token.clone())
        }
    }

    pub fn user_info(&self) -> UserInfo {
        self.state.lock().unwrap().user_info.clone()
    }

    pub fn user_id(&self) -> i64 {
        self.state.lock().unwrap().user_info.id
    }

    pub fn is_authenticated(&self) -> bool {
        !self.state.lock().unwrap().token.is_empty()
    }

    /// 读取持久化的 token（测试和启动恢复用）
    pub fn persisted_token(&self) -> Option<String> {
        self.kv.get(KEY_TOKEN)
    }
}
