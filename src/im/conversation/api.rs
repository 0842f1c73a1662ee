//! 历史消息 HTTP API 客户端

use crate::im::gateway::RequestGateway;
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// 历史消息行（服务端存储视角的原始形态）
///
/// `content` 是原始字符串：富文本行是序列化对象，媒体行是位置引用（URL），
/// 其余为纯文本。`kind` 是服务端为每行补充的显式判别符；
/// 旧数据没有该字段，归一化时走形态嗅探兼容路径
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRow {
    #[serde(rename = "senderId")]
    pub sender_id: i64,
    #[serde(rename = "receiverId")]
    pub receiver_id: i64,
    #[serde(rename = "sessionType", default)]
    pub session_type: i32,
    /// "rich" / "media" / "plain"，旧行可能缺失
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "sendTime", default)]
    pub send_time: String,
}

/// 历史消息 API 客户端
pub struct HistoryApi {
    gateway: Arc<RequestGateway>,
}

impl HistoryApi {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// 按会话拉取历史消息行
    pub async fn get_history(&self, target_id: i64, sess_type: i32) -> Result<Vec<HistoryRow>> {
        info!(
            "[HistoryAPI] 📡 请求历史消息, targetId: {}, sessionType: {}",
            target_id, sess_type
        );
        let rows: Vec<HistoryRow> = self
            .gateway
            .get_data(
                "/api/chat/history",
                &[
                    ("targetId", target_id.to_string()),
                    ("sessionType", sess_type.to_string()),
                ],
                "获取历史消息",
            )
            .await?
            .unwrap_or_default();
        debug!("[HistoryAPI] 历史消息共 {} 行", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_defaults_on_legacy_shape() {
        // 旧行没有 kind 字段
        let raw = r#"{"senderId":1,"receiverId":2,"content":"hello","sendTime":"2026-08-24T10:00:00Z"}"#;
        let row: HistoryRow = serde_json::from_str(raw).unwrap();
        assert!(row.kind.is_empty());
        assert_eq!(row.content, "hello");
        assert_eq!(row.session_type, 0);
    }
}
