//! 历史同步器（History Synchronizer）
//!
//! 会话切换时拉取历史消息，把多种遗留线上形态归一化为统一消息结构，
//! 再整体覆盖会话存储中对应的桶。
//! 失败时记日志、不动桶（宁可陈旧也保持一致），不自动重试

use crate::im::conversation::api::{HistoryApi, HistoryRow};
use crate::im::conversation::store::ConversationStore;
use crate::im::types::{msg_type, ChatMessage, Font, MsgBody};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 媒体历史行的 content 占位符（历史行不携带文件名和大小）
const MEDIA_PLACEHOLDER: &str = "[image]";

/// 行判别符：富文本（content 是序列化的消息体对象）
const KIND_RICH: &str = "rich";
/// 行判别符：媒体（content 是位置引用 URL）
const KIND_MEDIA: &str = "media";

/// 历史同步器
pub struct HistorySyncer {
    api: HistoryApi,
    store: Arc<ConversationStore>,
    /// 会话选择代次：每次 load_history 递增一次；
    /// 完成时代次已过期的响应直接丢弃，避免慢响应覆盖新选中的会话
    generation: AtomicU64,
}

impl HistorySyncer {
    pub fn new(api: HistoryApi, store: Arc<ConversationStore>) -> Self {
        Self {
            api,
            store,
            generation: AtomicU64::new(0),
        }
    }

    /// 切换会话时调用：拉取、归一化并整体覆盖该会话的桶
    pub async fn load_history(&self, target_id: i64, sess_type: i32) -> Result<()> {
        let my_generation = self.begin_selection();

        let rows = match self.api.get_history(target_id, sess_type).await {
            Ok(rows) => rows,
            Err(e) => {
                // 桶保持原样，陈旧但一致
                warn!("[HistorySync] ⚠️ 历史拉取失败, 会话 {} 保持不变: {}", target_id, e);
                return Err(e);
            }
        };

        self.apply_rows(my_generation, target_id, rows);
        Ok(())
    }

    /// 记录一次会话选择动作，返回本次代次
    fn begin_selection(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 归一化并写入；代次已过期的响应直接丢弃
    fn apply_rows(&self, my_generation: u64, target_id: i64, rows: Vec<HistoryRow>) {
        if self.generation.load(Ordering::SeqCst) != my_generation {
            debug!(
                "[HistorySync] 会话 {} 的历史响应已过期（期间又切换了会话）, 丢弃",
                target_id
            );
            return;
        }

        let messages: Vec<ChatMessage> = rows.into_iter().map(normalize_row).collect();
        info!(
            "[HistorySync] ✅ 会话 {} 历史已加载, 共 {} 条",
            target_id,
            messages.len()
        );
        self.store.replace_all(target_id, messages);
    }
}

/// 把一行历史记录归一化为统一消息结构
///
/// 优先级：
/// 1. 显式 rich 判别符，或原始内容本身是序列化对象（旧数据兼容）→ 解析为消息体
/// 2. 显式 media 判别符 → content 视为位置引用，文件名/大小用占位
/// 3. 其余为纯文本 → 包装为默认字体文本
///
/// 收发端点取自行内存储的字段，与查看者视角无关
pub fn normalize_row(row: HistoryRow) -> ChatMessage {
    let (body, kind_is_media) = if row.kind == KIND_RICH {
        (parse_rich_body(&row.content), false)
    } else if row.kind == KIND_MEDIA {
        (media_body(&row.content), true)
    } else if let Some(body) = sniff_serialized_body(&row.content) {
        // 兼容路径：没有判别符的旧行，靠形态嗅探识别序列化对象
        (body, false)
    } else {
        (plain_body(&row.content), false)
    };

    ChatMessage {
        msg_type: if kind_is_media {
            msg_type::CHAT_FILE
        } else {
            msg_type::CHAT_TEXT
        },
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        session_type: row.session_type,
        data: body,
        send_time: row.send_time,
        client_msg_id: String::new(),
    }
}

/// rich 行：content 是序列化的消息体对象
fn parse_rich_body(raw: &str) -> MsgBody {
    match serde_json::from_str::<MsgBody>(raw) {
        Ok(body) => body,
        Err(e) => {
            // 判别符声称 rich 但内容解析失败：降级为纯文本，不丢行
            warn!("[HistorySync] ⚠️ rich 行解析失败, 降级为纯文本: {}", e);
            plain_body(raw)
        }
    }
}

/// media 行：content 是 URL，历史行不携带文件名和大小
fn media_body(raw: &str) -> MsgBody {
    MsgBody {
        content: MEDIA_PLACEHOLDER.to_string(),
        font: None,
        url: Some(raw.to_string()),
        file_name: None,
        file_size: None,
    }
}

fn plain_body(raw: &str) -> MsgBody {
    MsgBody {
        content: raw.to_string(),
        font: Some(Font::default()),
        ..Default::default()
    }
}

/// 遗留形态嗅探（兼容垫层）
///
/// 仅服务于没有 kind 判别符的旧行；服务端补全判别符后可整体移除
fn sniff_serialized_body(raw: &str) -> Option<MsgBody> {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    // 解析出来却没有 content 的对象不是消息体（例如碰巧长得像 JSON 的闲聊），
    // 按纯文本处理，保证 content 恒有值
    serde_json::from_str::<MsgBody>(raw)
        .ok()
        .filter(|body| !body.content.is_empty())
}
