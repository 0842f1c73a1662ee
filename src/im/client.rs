//! 通道管理器（Channel Manager）
//!
//! 独占唯一的实时连接：建连、鉴权、入站帧分发、出站发送原语、清理。
//! 生命周期状态机：Idle → Connecting → Authenticating → Live → Closed。
//! Closed 对单个实例是终态，重连需要新实例（当前不做自动重连）

use crate::im::conversation::store::ConversationStore;
use crate::im::listener::{ChannelListener, EmptyChannelListener};
use crate::im::roster::RosterStore;
use crate::im::session::SessionStore;
use crate::im::types::{
    conversation_key, generate_msg_id, msg_type, ChatMessage,
};
use anyhow::{Context, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// WebSocket 写入端类型别名
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// 通道配置
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// WebSocket 服务器 URL
    pub ws_url: String,
    /// 心跳间隔（秒）
    pub heartbeat_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8888/im".to_string(),
            heartbeat_secs: 30,
        }
    }
}

/// 通道生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// 初始态，没有身份时永不离开
    Idle,
    /// 正在建立传输连接
    Connecting,
    /// 传输已建立，鉴权帧已发出，等待服务端首个业务帧
    Authenticating,
    /// 可收发
    Live,
    /// 终态（显式登出、传输错误或组件销毁）
    Closed,
}

impl ChannelState {
    /// 传输层建立：进入鉴权阶段
    fn transport_opened(self) -> Self {
        match self {
            Self::Connecting => Self::Authenticating,
            other => other,
        }
    }

    /// 收到首个非鉴权帧：视为鉴权通过
    ///
    /// 协议假设：服务端不回鉴权 ACK。未来协议加入显式 ACK 时只需改这一个转移
    fn frame_received(self) -> Self {
        match self {
            Self::Authenticating => Self::Live,
            other => other,
        }
    }

    /// 是否允许出站发送
    fn can_send(self) -> bool {
        matches!(self, Self::Authenticating | Self::Live)
    }
}

/// 通道管理器
///
/// 连接句柄由本组件独占；存储通过引用注入，可同时被 UI 处理函数修改
#[derive(Clone)]
pub struct ChannelManager {
    config: ChannelConfig,
    session: Arc<SessionStore>,
    roster: Arc<RosterStore>,
    conversations: Arc<ConversationStore>,
    listener: Arc<dyn ChannelListener>,
    state: Arc<std::sync::Mutex<ChannelState>>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    /// 本端发出过的关联 ID，用于服务端回显去重
    sent_msg_ids: Arc<std::sync::Mutex<HashSet<String>>>,
}

impl ChannelManager {
    pub fn new(
        config: ChannelConfig,
        session: Arc<SessionStore>,
        roster: Arc<RosterStore>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            config,
            session,
            roster,
            conversations,
            listener: Arc::new(EmptyChannelListener),
            state: Arc::new(std::sync::Mutex::new(ChannelState::Idle)),
            writer: Arc::new(Mutex::new(None)),
            sent_msg_ids: Arc::new(std::sync::Mutex::new(HashSet::new())),
        }
    }

    /// 注册通道监听器
    pub fn set_listener(&mut self, listener: Arc<dyn ChannelListener>) {
        self.listener = listener;
    }

    /// 当前状态
    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: ChannelState) {
        *self.state.lock().unwrap() = next;
    }

    /// 连接并鉴权
    ///
    /// 没有身份（用户 ID 为空）时不发起连接，保持 Idle；
    /// 已在 Connecting/Authenticating/Live 时为幂等空操作；
    /// Closed 实例不可复用
    pub async fn connect(&self) -> Result<()> {
        let user_id = self.session.user_id();
        if user_id == 0 {
            info!("[Channel] 身份不可用, 不发起连接");
            return Ok(());
        }

        {
            let mut state = self.state.lock().unwrap();
            match *state {
                ChannelState::Idle => *state = ChannelState::Connecting,
                ChannelState::Connecting | ChannelState::Authenticating | ChannelState::Live => {
                    debug!("[Channel] 已在连接/在线状态, 忽略重复 connect");
                    return Ok(());
                }
                ChannelState::Closed => {
                    return Err(anyhow::anyhow!("通道已关闭, 重连需要新实例"));
                }
            }
        }

        info!("[Channel] 🔗 连接到 IM 服务器 (user={})", user_id);
        let (ws_stream, response) = match connect_async(&self.config.ws_url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.set_state(ChannelState::Closed);
                return Err(anyhow::Error::from(e).context("WebSocket 连接失败"));
            }
        };
        info!("[Channel] ✅ WebSocket 连接成功, 状态: {}", response.status());

        let (mut write, mut read) = ws_stream.split();
        self.set_state(self.state().transport_opened());

        // 传输建立后立刻发出唯一一个鉴权帧，先于任何其他出站帧
        let auth_json =
            serde_json::to_string(&ChatMessage::auth(user_id)).context("鉴权帧序列化失败")?;
        if let Err(e) = write.send(WsMessage::Text(auth_json)).await {
            self.set_state(ChannelState::Closed);
            return Err(anyhow::Error::from(e).context("鉴权帧发送失败"));
        }
        debug!("[Channel] 🔐 鉴权帧已发送");

        *self.writer.lock().await = Some(write);
        self.listener
            .on_connection_status_changed(true, "连接成功".to_string())
            .await;

        // 心跳
        let writer_for_heartbeat = self.writer.clone();
        let heartbeat = Duration::from_secs(self.config.heartbeat_secs);
        tokio::spawn(async move {
            let mut ticker = interval(heartbeat);
            loop {
                ticker.tick().await;
                let mut guard = writer_for_heartbeat.lock().await;
                match guard.as_mut() {
                    Some(w) => {
                        if w.send(WsMessage::Ping(vec![])).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        });

        // 入站帧处理
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => manager.dispatch_frame(&text).await,
                    Ok(WsMessage::Close(_)) => {
                        info!("[Channel] 服务端关闭连接");
                        break;
                    }
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
                    Ok(other) => {
                        debug!("[Channel] 忽略非文本帧: {:?}", other);
                    }
                    Err(e) => {
                        error!("[Channel] ❌ 传输错误: {}", e);
                        break;
                    }
                }
            }
            manager.set_state(ChannelState::Closed);
            *manager.writer.lock().await = None;
            manager
                .listener
                .on_connection_status_changed(false, "连接已断开".to_string())
                .await;
        });

        Ok(())
    }

    /// 入站帧分发
    ///
    /// 解析失败只记日志并丢弃，绝不让畸形输入影响进程
    pub(crate) async fn dispatch_frame(&self, raw: &str) {
        let msg: ChatMessage = match serde_json::from_str(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("[Channel] ⚠️ 帧解析失败, 丢弃: {}", e);
                return;
            }
        };

        if msg.msg_type == msg_type::AUTH {
            debug!("[Channel] 忽略回传的鉴权帧");
            return;
        }

        // 首个非鉴权帧即视为在线
        let before = self.state();
        let after = before.frame_received();
        if before != after {
            self.set_state(after);
            info!("[Channel] ✅ 通道进入 Live 状态");
        }

        // 本端发出过的关联 ID 再次出现说明是服务端回显，丢弃避免重复计数；
        // 服务端每条消息最多回显一次，首次命中即可把 ID 移出集合，防止长连接下集合无限增长
        if !msg.client_msg_id.is_empty()
            && self
                .sent_msg_ids
                .lock()
                .unwrap()
                .remove(&msg.client_msg_id)
        {
            debug!("[Channel] 丢弃本端消息回显: {}", msg.client_msg_id);
            return;
        }

        match msg.msg_type {
            msg_type::CHAT_TEXT | msg_type::CHAT_FILE => {
                let key = conversation_key(self.session.user_id(), &msg);
                let json = serde_json::to_string(&msg).unwrap_or_default();
                debug!("[Channel] 📨 收到消息, 会话 key: {}", key);
                self.conversations.append(key, msg);
                self.listener.on_new_message(key, json).await;
            }
            msg_type::USER_STATUS => {
                let online = msg.data.content == "1";
                if !self.roster.set_online(msg.sender_id, online) {
                    debug!("[Channel] 状态通知的用户 {} 不在好友列表", msg.sender_id);
                }
                info!(
                    "[Channel] 👤 用户 {} {}",
                    msg.sender_id,
                    if online { "上线" } else { "下线" }
                );
                self.listener.on_presence_changed(msg.sender_id, online).await;
            }
            msg_type::FRIEND_REQUEST => {
                info!("[Channel] 📝 收到好友申请通知");
                self.roster.set_pending_request(true);
                self.listener.on_friend_request().await;
            }
            other => {
                debug!("[Channel] 未知帧类型 {}, 丢弃", other);
            }
        }
    }

    /// 出站发送原语
    ///
    /// 通道不在可发送状态时只记日志、不抛错，调用方不得假设必达
    pub async fn send(&self, frame: &ChatMessage) {
        let state = self.state();
        if !state.can_send() {
            warn!("[Channel] ⚠️ 通道未就绪({:?}), 丢弃出站帧", state);
            return;
        }

        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                warn!("[Channel] ⚠️ 出站帧序列化失败: {}", e);
                return;
            }
        };

        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => {
                if let Err(e) = writer.send(WsMessage::Text(json)).await {
                    warn!("[Channel] ⚠️ 出站帧发送失败: {}", e);
                }
            }
            None => warn!("[Channel] ⚠️ 连接引用已清除, 丢弃出站帧"),
        }
    }

    /// 发送文本消息并同步乐观上屏
    ///
    /// 本地副本立即写入会话存储（key 为 targetId），不等服务端确认；
    /// 带关联 ID，服务端若回显本端消息会在分发处被去重
    pub async fn send_text(&self, target_id: i64, text: &str, sess_type: i32) -> Result<()> {
        if text.is_empty() {
            return Err(anyhow::anyhow!("消息内容不能为空"));
        }

        let self_id = self.session.user_id();
        let mut frame = ChatMessage::text(self_id, target_id, sess_type, text.to_string());
        self.stamp_and_send(target_id, &mut frame).await;
        Ok(())
    }

    /// 发送文件消息并同步乐观上屏
    pub async fn send_file(
        &self,
        target_id: i64,
        url: String,
        file_name: String,
        file_size: i64,
        sess_type: i32,
    ) -> Result<()> {
        if url.is_empty() {
            return Err(anyhow::anyhow!("文件地址不能为空"));
        }

        let self_id = self.session.user_id();
        let mut frame = ChatMessage::file(self_id, target_id, sess_type, url, file_name, file_size);
        self.stamp_and_send(target_id, &mut frame).await;
        Ok(())
    }

    async fn stamp_and_send(&self, target_id: i64, frame: &mut ChatMessage) {
        frame.client_msg_id = generate_msg_id(frame.sender_id);
        frame.send_time = chrono::Utc::now().to_rfc3339();
        self.sent_msg_ids
            .lock()
            .unwrap()
            .insert(frame.client_msg_id.clone());

        self.send(frame).await;
        // 乐观上屏：不等服务端回推
        self.conversations.append(target_id, frame.clone());
    }

    /// 显式清理：进入终态并清空连接引用，防止陈旧句柄被复用
    pub async fn close(&self) {
        self.set_state(ChannelState::Closed);
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.send(WsMessage::Close(None)).await;
        }
        info!("[Channel] 👋 通道已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::friend::models::Contact;
    use crate::im::session::{LoginPayload, UserInfo};
    use crate::im::storage::temp_store;
    use crate::im::types::session_type;

    fn logged_in_session(user_id: i64) -> Arc<SessionStore> {
        let session = Arc::new(SessionStore::new(temp_store()));
        session
            .login_success(&LoginPayload {
                token: "T".to_string(),
                token_head: "Bearer ".to_string(),
                user: UserInfo {
                    id: user_id,
                    ..Default::default()
                },
            })
            .unwrap();
        session
    }

    fn manager(session: Arc<SessionStore>) -> ChannelManager {
        ChannelManager::new(
            ChannelConfig::default(),
            session,
            Arc::new(RosterStore::new()),
            Arc::new(ConversationStore::new()),
        )
    }

    #[test]
    fn test_state_machine_transitions() {
        // 传输建立只在 Connecting 时推进
        assert_eq!(
            ChannelState::Connecting.transport_opened(),
            ChannelState::Authenticating
        );
        assert_eq!(ChannelState::Idle.transport_opened(), ChannelState::Idle);
        assert_eq!(ChannelState::Closed.transport_opened(), ChannelState::Closed);

        // 首帧只在 Authenticating 时推进到 Live
        assert_eq!(
            ChannelState::Authenticating.frame_received(),
            ChannelState::Live
        );
        assert_eq!(ChannelState::Live.frame_received(), ChannelState::Live);
        assert_eq!(ChannelState::Idle.frame_received(), ChannelState::Idle);

        assert!(ChannelState::Authenticating.can_send());
        assert!(ChannelState::Live.can_send());
        assert!(!ChannelState::Idle.can_send());
        assert!(!ChannelState::Closed.can_send());
    }

    #[tokio::test]
    async fn test_no_identity_stays_idle() {
        let session = Arc::new(SessionStore::new(temp_store()));
        let manager = manager(session);

        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ChannelState::Idle);
    }

    #[tokio::test]
    async fn test_closed_instance_cannot_reconnect() {
        let manager = manager(logged_in_session(1001));
        manager.close().await;
        assert!(manager.connect().await.is_err());
        assert_eq!(manager.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_dispatch_text_uses_symmetric_key() {
        // 本地用户是接收者 B=1002，key 应为发送者 A=1001
        let manager = manager(logged_in_session(1002));
        manager.set_state(ChannelState::Authenticating);

        let frame = serde_json::to_string(&ChatMessage::text(
            1001,
            1002,
            session_type::DIRECT,
            "hi".to_string(),
        ))
        .unwrap();
        manager.dispatch_frame(&frame).await;

        assert_eq!(manager.conversations.get(1001).len(), 1);
        assert!(manager.conversations.get(1002).is_empty());
        // 首个业务帧把通道推进到 Live
        assert_eq!(manager.state(), ChannelState::Live);
    }

    #[tokio::test]
    async fn test_dispatch_own_echo_goes_to_receiver_bucket() {
        // 多端同步场景：本地用户是发送者 A=1001，key 应为接收者 B=1002
        let manager = manager(logged_in_session(1001));
        manager.set_state(ChannelState::Live);

        let frame = serde_json::to_string(&ChatMessage::text(
            1001,
            1002,
            session_type::DIRECT,
            "hi".to_string(),
        ))
        .unwrap();
        manager.dispatch_frame(&frame).await;

        assert_eq!(manager.conversations.get(1002).len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_malformed_frame_is_dropped() {
        let manager = manager(logged_in_session(1002));
        manager.set_state(ChannelState::Live);

        manager.dispatch_frame("not json at all").await;
        manager.dispatch_frame(r#"{"type":"oops"}"#).await;

        assert!(manager.conversations.get(1001).is_empty());
        assert_eq!(manager.state(), ChannelState::Live);
    }

    #[tokio::test]
    async fn test_dispatch_user_status_flips_online() {
        let manager = manager(logged_in_session(1002));
        manager.set_state(ChannelState::Live);
        manager.roster.set_friends(vec![Contact {
            user_id: 7,
            ..Default::default()
        }]);

        let mut frame = ChatMessage {
            msg_type: msg_type::USER_STATUS,
            sender_id: 7,
            receiver_id: 0,
            session_type: 0,
            data: crate::im::types::MsgBody {
                content: "1".to_string(),
                ..Default::default()
            },
            send_time: String::new(),
            client_msg_id: String::new(),
        };
        manager
            .dispatch_frame(&serde_json::to_string(&frame).unwrap())
            .await;
        assert!(manager.roster.friends()[0].online);

        frame.data.content = "0".to_string();
        manager
            .dispatch_frame(&serde_json::to_string(&frame).unwrap())
            .await;
        assert!(!manager.roster.friends()[0].online);
    }

    #[tokio::test]
    async fn test_dispatch_friend_request_sets_pending_flag() {
        let manager = manager(logged_in_session(1002));
        manager.set_state(ChannelState::Live);

        let frame = serde_json::json!({
            "type": msg_type::FRIEND_REQUEST,
            "senderId": 9,
            "data": {"content": ""}
        });
        manager.dispatch_frame(&frame.to_string()).await;
        assert!(manager.roster.has_pending_request());
    }

    #[tokio::test]
    async fn test_optimistic_append_and_echo_dedup() {
        let manager = manager(logged_in_session(1001));
        // 通道未就绪：发送静默失败，但乐观上屏照常发生
        manager.send_text(1002, "hello", session_type::DIRECT).await.unwrap();

        let bucket = manager.conversations.get(1002);
        assert_eq!(bucket.len(), 1);
        let sent = &bucket[0];
        assert!(!sent.client_msg_id.is_empty());
        assert!(!sent.send_time.is_empty());

        // 服务端回显同一关联 ID：必须被去重
        manager.set_state(ChannelState::Live);
        manager
            .dispatch_frame(&serde_json::to_string(sent).unwrap())
            .await;
        assert_eq!(manager.conversations.get(1002).len(), 1);
        // 回显命中后 ID 被移出集合，长连接下集合不会只增不减
        assert!(manager.sent_msg_ids.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_text_rejects_empty_content() {
        let manager = manager(logged_in_session(1001));
        assert!(manager.send_text(1002, "", session_type::DIRECT).await.is_err());
        assert!(manager.conversations.get(1002).is_empty());
    }

    #[tokio::test]
    async fn test_send_file_optimistic_copy_has_content() {
        let manager = manager(logged_in_session(1001));
        manager
            .send_file(
                1002,
                "http://x/y.pdf".to_string(),
                "y.pdf".to_string(),
                2048,
                session_type::DIRECT,
            )
            .await
            .unwrap();

        let bucket = manager.conversations.get(1002);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].msg_type, msg_type::CHAT_FILE);
        assert_eq!(bucket[0].data.content, "y.pdf");
        assert_eq!(bucket[0].data.file_size, Some(2048));
    }

    #[tokio::test]
    async fn test_send_while_closed_drops_silently() {
        let manager = manager(logged_in_session(1001));
        manager.close().await;
        // 不抛错
        let frame = ChatMessage::text(1001, 1002, session_type::DIRECT, "x".to_string());
        manager.send(&frame).await;
    }
}
