//! 请求网关（Request Gateway）
//!
//! 唯一的 HTTP 出口：统一注入 token、统一超时、统一错误归一化。
//! 业务错误（code != 200）在此处转为 Err 抛给调用方，绝不静默吞掉；
//! 传输层 401 触发全局会话清除

use crate::im::session::SessionStore;
use crate::im::types::ApiResult;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// 请求网关配置
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// HTTP API 基础地址
    pub base_url: String,
    /// 固定请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 15,
        }
    }
}

/// 请求网关
pub struct RequestGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    session: Arc<SessionStore>,
}

impl RequestGateway {
    pub fn new(config: GatewayConfig, session: Arc<SessionStore>) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self {
            client,
            config,
            session,
        })
    }

    fn url_of(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 每个请求发出前注入 token（登录后 token 才存在，逐请求读取会话存储）
    fn with_auth(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let rb = rb.header("operationID", Uuid::new_v4().to_string());
        match self.session.token() {
            Some(token) => rb.header(reqwest::header::AUTHORIZATION, token),
            None => rb,
        }
    }

    /// GET 请求，返回业务 data（可能为 None）
    pub async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        operation_name: &str,
    ) -> Result<Option<T>> {
        let rb = self.with_auth(self.client.get(self.url_of(path)).query(query));
        self.execute(rb, operation_name).await
    }

    /// POST JSON 请求，返回业务 data（可能为 None）
    pub async fn post_data<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        operation_name: &str,
    ) -> Result<Option<T>> {
        let rb = self.with_auth(self.client.post(self.url_of(path)).json(body));
        self.execute(rb, operation_name).await
    }

    /// POST multipart 请求（文件上传）
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        operation_name: &str,
    ) -> Result<Option<T>> {
        let rb = self.with_auth(self.client.post(self.url_of(path)).multipart(form));
        self.execute(rb, operation_name).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        rb: reqwest::RequestBuilder,
        operation_name: &str,
    ) -> Result<Option<T>> {
        let response = rb
            .send()
            .await
            .with_context(|| format!("{}请求失败", operation_name))?;

        let status = response.status();
        let body_bytes = response
            .bytes()
            .await
            .with_context(|| format!("读取{}响应 body 失败", operation_name))?;

        self.check_transport_status(status, operation_name)?;
        debug!("[Gateway] {}请求成功, HTTP状态: {}", operation_name, status);

        Self::parse_result(&body_bytes, operation_name)
    }

    /// 传输层状态码归一化
    ///
    /// 401 清除本地会话（token 落盘记录一并删除）；403/404/5xx 仅记录日志
    pub fn check_transport_status(&self, status: StatusCode, operation_name: &str) -> Result<()> {
        if status == StatusCode::UNAUTHORIZED {
            warn!(
                "[Gateway] 🔒 {}返回 401, 身份已失效, 清除本地会话",
                operation_name
            );
            self.session.clear();
            return Err(anyhow::anyhow!("身份认证失败 (401)"));
        }
        if status == StatusCode::FORBIDDEN {
            error!("[Gateway] ⛔ {}返回 403, 权限不足", operation_name);
        } else if status == StatusCode::NOT_FOUND {
            error!("[Gateway] ❓ {}返回 404, 资源不存在", operation_name);
        } else if status.is_server_error() {
            error!("[Gateway] 💥 {}返回 {}, 服务器内部错误", operation_name, status);
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP 错误 {}", status));
        }
        Ok(())
    }

    /// 解析统一响应包装，code != 200 视为业务错误抛出 msg
    pub fn parse_result<T: DeserializeOwned>(
        body: &[u8],
        operation_name: &str,
    ) -> Result<Option<T>> {
        let body_str = String::from_utf8_lossy(body);
        let api_resp: ApiResult<T> = serde_json::from_slice(body).map_err(|e| {
            error!(
                "[Gateway] {}反序列化失败: {:?}\n原始响应: {}",
                operation_name, e, body_str
            );
            anyhow::anyhow!("反序列化响应失败: {:?}", e)
        })?;

        if api_resp.code != 200 {
            error!(
                "[Gateway] {}业务错误, 错误码: {}, 错误信息: {}",
                operation_name, api_resp.code, api_resp.msg
            );
            let msg = if api_resp.msg.is_empty() {
                format!("错误码: {}", api_resp.code)
            } else {
                api_resp.msg
            };
            return Err(anyhow::anyhow!(msg));
        }

        Ok(api_resp.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::session::{LoginPayload, SessionStore, UserInfo};
    use crate::im::storage::temp_store;

    fn logged_in_gateway() -> RequestGateway {
        let session = Arc::new(SessionStore::new(temp_store()));
        session
            .login_success(&LoginPayload {
                token: "T".to_string(),
                token_head: "Bearer ".to_string(),
                user: UserInfo {
                    id: 1,
                    ..Default::default()
                },
            })
            .unwrap();
        RequestGateway::new(GatewayConfig::default(), session).unwrap()
    }

    #[test]
    fn test_unauthorized_clears_persisted_token() {
        let gateway = logged_in_gateway();
        assert!(gateway.session.persisted_token().is_some());

        let result = gateway.check_transport_status(StatusCode::UNAUTHORIZED, "测试");
        assert!(result.is_err());
        // 401 之后持久化 token 读出为空
        assert!(gateway.session.persisted_token().is_none());
        assert!(gateway.session.token().is_none());
    }

    #[test]
    fn test_other_errors_keep_session() {
        let gateway = logged_in_gateway();
        assert!(gateway
            .check_transport_status(StatusCode::INTERNAL_SERVER_ERROR, "测试")
            .is_err());
        assert!(gateway
            .check_transport_status(StatusCode::FORBIDDEN, "测试")
            .is_err());
        // 非 401 不应动会话
        assert!(gateway.session.persisted_token().is_some());
    }

    #[test]
    fn test_parse_result_business_error() {
        let body = r#"{"code":500,"msg":"用户名已存在"}"#.as_bytes();
        let result = RequestGateway::parse_result::<serde_json::Value>(body, "测试");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("用户名已存在"));
    }

    #[test]
    fn test_parse_result_success_with_data() {
        let body = br#"{"code":200,"msg":"ok","data":{"id":7}}"#;
        let data: Option<serde_json::Value> =
            RequestGateway::parse_result(body, "测试").unwrap();
        assert_eq!(data.unwrap()["id"], 7);
    }

    #[test]
    fn test_parse_result_success_without_data() {
        let body = br#"{"code":200,"msg":"ok"}"#;
        let data: Option<serde_json::Value> =
            RequestGateway::parse_result(body, "测试").unwrap();
        assert!(data.is_none());
    }

    #[test]
    fn test_parse_result_malformed_body() {
        let body = b"<html>not json</html>";
        assert!(RequestGateway::parse_result::<serde_json::Value>(body, "测试").is_err());
    }
}
