//! 会话存储（Conversation Store）
//!
//! 按会话 key 维护有序消息序列的唯一事实来源。
//! 顺序保证是"到达存储的顺序"，不按发送时间重排，也不去重；
//! `replace_all` 是唯一允许收缩或重排序列的操作

use crate::im::types::ChatMessage;
use std::collections::HashMap;
use std::sync::Mutex;

/// 会话存储
pub struct ConversationStore {
    buckets: Mutex<HashMap<i64, Vec<ChatMessage>>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// 尾部追加（乐观发送与实时接收共用）
    pub fn append(&self, key: i64, message: ChatMessage) {
        self.buckets
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push(message);
    }

    /// 整体覆盖某个会话桶（历史同步专用）
    pub fn replace_all(&self, key: i64, messages: Vec<ChatMessage>) {
        self.buckets.lock().unwrap().insert(key, messages);
    }

    /// 读取会话消息序列，key 不存在时返回空序列
    pub fn get(&self, key: i64) -> Vec<ChatMessage> {
        self.buckets
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// 某个会话当前的消息条数
    pub fn len(&self, key: i64) -> usize {
        self.buckets
            .lock()
            .unwrap()
            .get(&key)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, key: i64) -> bool {
        self.len(key) == 0
    }

    /// 登出时清空全部会话
    pub fn clear(&self) {
        self.buckets.lock().unwrap().clear();
    }
}
