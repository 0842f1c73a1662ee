//! 本地键值持久化
//!
//! 身份 token 和用户信息以不透明字符串形式落盘在固定 key 下，
//! 进程重启后可恢复，登出或 401 时清除

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

/// token 持久化 key
pub const KEY_TOKEN: &str = "token";
/// 用户信息持久化 key
pub const KEY_USER_INFO: &str = "userInfo";

/// 文件型键值存储（每个 key 一个文件）
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    /// 创建存储，目录不存在时自动建立
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("创建存储目录失败: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// 读取 key 对应的值，不存在时返回 None
    pub fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_of(key)).ok()
    }

    /// 写入 key / value
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::write(self.path_of(key), value)
            .with_context(|| format!("写入持久化 key 失败: {}", key))?;
        debug!("[Storage] 💾 已写入 key: {}", key);
        Ok(())
    }

    /// 删除 key，不存在时静默成功
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_of(key);
        if path.exists() {
            std::fs::remove_file(&path).with_context(|| format!("删除持久化 key 失败: {}", key))?;
            debug!("[Storage] 🗑️ 已删除 key: {}", key);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn temp_store() -> KvStore {
    let dir = std::env::temp_dir().join(format!("im-kv-{}", uuid::Uuid::new_v4()));
    KvStore::new(dir).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove_roundtrip() {
        let store = temp_store();
        assert!(store.get(KEY_TOKEN).is_none());

        store.set(KEY_TOKEN, "Bearer abc").unwrap();
        assert_eq!(store.get(KEY_TOKEN).as_deref(), Some("Bearer abc"));

        store.remove(KEY_TOKEN).unwrap();
        assert!(store.get(KEY_TOKEN).is_none());
        // 重复删除不报错
        store.remove(KEY_TOKEN).unwrap();
    }
}
