//! 好友本地模型定义

use serde::{Deserialize, Serialize};

/// 好友联系人
///
/// `online` 是唯一由实时推送修改的字段，其余字段只通过全量重拉刷新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// 待处理好友申请
///
/// 由推送事件或显式拉取创建，审批动作后移除；通过后靠好友列表重拉收敛
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// 申请记录 ID，审批接口以此定位
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub remark: String,
}
