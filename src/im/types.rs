//! 公共类型定义
//!
//! 包含 WebSocket 帧结构、消息体、HTTP 统一响应包装等

use serde::{Deserialize, Serialize};

/// WebSocket 帧类型标识符（与服务端 Netty 约定一致）
pub mod msg_type {
    /// 鉴权帧（客户端 → 服务端，data.content 为用户 ID）
    pub const AUTH: i32 = 1;
    /// 文本消息
    pub const CHAT_TEXT: i32 = 2;
    /// 文件消息
    pub const CHAT_FILE: i32 = 3;
    /// 好友上下线通知（服务端 → 客户端，data.content "1"=上线 "0"=下线）
    pub const USER_STATUS: i32 = 4;
    /// 好友申请通知（服务端 → 客户端，仅作信号）
    pub const FRIEND_REQUEST: i32 = 5;
}

/// 会话类型标识符
pub mod session_type {
    /// 单聊
    pub const DIRECT: i32 = 1;
    /// 群聊
    pub const GROUP: i32 = 2;
}

/// 消息字体样式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub size: i32,
    pub color: String,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            size: 14,
            color: "#000000".to_string(),
        }
    }
}

/// 消息体
///
/// `content` 恒有值（文件消息填文件名或占位符），渲染方无需判空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MsgBody {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "fileSize", default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

/// 聊天消息 / WebSocket 帧
///
/// 三种来源（实时推送、历史记录、乐观本地写入）统一归一化为此结构后
/// 才允许进入会话存储
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// 帧类型，见 [`msg_type`]
    #[serde(rename = "type")]
    pub msg_type: i32,
    #[serde(rename = "senderId", default)]
    pub sender_id: i64,
    #[serde(rename = "receiverId", default)]
    pub receiver_id: i64,
    /// 会话类型，见 [`session_type`]
    #[serde(rename = "sessionType", default)]
    pub session_type: i32,
    pub data: MsgBody,
    /// 发送时间（RFC3339 字符串，乐观写入时为本地时间）
    #[serde(rename = "sendTime", default)]
    pub send_time: String,
    /// 客户端生成的关联 ID，用于服务端回显去重
    #[serde(rename = "clientMsgId", default, skip_serializing_if = "String::is_empty")]
    pub client_msg_id: String,
}

impl ChatMessage {
    /// 构造鉴权帧（content 传用户 ID，后续可替换为更强凭证）
    pub fn auth(user_id: i64) -> Self {
        Self {
            msg_type: msg_type::AUTH,
            sender_id: 0,
            receiver_id: 0,
            session_type: 0,
            data: MsgBody {
                content: user_id.to_string(),
                ..Default::default()
            },
            send_time: String::new(),
            client_msg_id: String::new(),
        }
    }

    /// 构造文本消息帧（默认字体）
    pub fn text(sender_id: i64, receiver_id: i64, sess_type: i32, content: String) -> Self {
        Self {
            msg_type: msg_type::CHAT_TEXT,
            sender_id,
            receiver_id,
            session_type: sess_type,
            data: MsgBody {
                content,
                font: Some(Font::default()),
                ..Default::default()
            },
            send_time: String::new(),
            client_msg_id: String::new(),
        }
    }

    /// 构造文件消息帧（content 填文件名，保证恒有值）
    pub fn file(
        sender_id: i64,
        receiver_id: i64,
        sess_type: i32,
        url: String,
        file_name: String,
        file_size: i64,
    ) -> Self {
        Self {
            msg_type: msg_type::CHAT_FILE,
            sender_id,
            receiver_id,
            session_type: sess_type,
            data: MsgBody {
                content: file_name.clone(),
                font: None,
                url: Some(url),
                file_name: Some(file_name),
                file_size: Some(file_size),
            },
            send_time: String::new(),
            client_msg_id: String::new(),
        }
    }
}

/// 统一的 HTTP 响应包装结构体（code / msg / data）
///
/// `code == 200` 为成功；data 字段可能为 null 或缺失，因此使用 `Option<T>`
#[derive(Debug, Deserialize)]
pub struct ApiResult<T> {
    pub code: i32,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// 计算会话 key（对称寻址）
///
/// 群聊用群 ID；单聊恒为对端用户 ID：自己发的取接收者，别人发的取发送者，
/// 保证乐观写入与服务端推送落入同一个桶
pub fn conversation_key(self_id: i64, msg: &ChatMessage) -> i64 {
    if msg.session_type == session_type::GROUP {
        msg.receiver_id
    } else if msg.sender_id == self_id {
        msg.receiver_id
    } else {
        msg.sender_id
    }
}

/// 生成客户端消息 ID（用户 ID + 纳秒时间戳）
pub fn generate_msg_id(user_id: i64) -> String {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}{}", user_id, nanos)
}
