//! 文件上传 HTTP API
//!
//! multipart 上传，返回不透明的位置描述符（url / 文件名 / 大小）

use crate::im::gateway::RequestGateway;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// 上传大小上限（10 MiB），超限在发请求前本地拦截
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// 上传结果（位置描述符）
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub url: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileSize")]
    pub file_size: i64,
}

/// 文件 API 客户端
pub struct FileApi {
    gateway: Arc<RequestGateway>,
}

impl FileApi {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// 上传文件，key 为 "file"
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResult> {
        if file_name.is_empty() {
            return Err(anyhow::anyhow!("文件名不能为空"));
        }
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(anyhow::anyhow!(
                "文件过大: {} 字节, 上限 {} 字节",
                bytes.len(),
                MAX_UPLOAD_SIZE
            ));
        }

        info!("[FileAPI] 📤 上传文件: {} ({} 字节)", file_name, bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let result: UploadResult = self
            .gateway
            .post_multipart("/api/file/upload", form, "上传文件")
            .await?
            .context("上传响应中缺少 data 字段")?;

        info!("[FileAPI] ✅ 上传成功: {}", result.url);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::gateway::GatewayConfig;
    use crate::im::session::SessionStore;
    use crate::im::storage::temp_store;

    fn api() -> FileApi {
        let session = Arc::new(SessionStore::new(temp_store()));
        let gateway =
            Arc::new(RequestGateway::new(GatewayConfig::default(), session).unwrap());
        FileApi::new(gateway)
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let api = api();
        let oversized = vec![0u8; MAX_UPLOAD_SIZE + 1];
        let err = api.upload("big.bin", oversized).await.unwrap_err();
        assert!(err.to_string().contains("文件过大"));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_name() {
        let api = api();
        assert!(api.upload("", vec![1, 2, 3]).await.is_err());
    }
}
