//! IM CLI 客户端（测试版）
//!
//! 非交互式 CLI，用于测试和展示 IM 功能：
//! 启动时通过命令行参数指定账号，自动登录连接，展示接收到的所有事件

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use im_client_core::im::auth::AuthApi;
use im_client_core::im::client::{ChannelConfig, ChannelManager};
use im_client_core::im::conversation::{ConversationStore, HistoryApi, HistorySyncer};
use im_client_core::im::file::FileApi;
use im_client_core::im::friend::FriendApi;
use im_client_core::im::gateway::{GatewayConfig, RequestGateway};
use im_client_core::im::group::GroupApi;
use im_client_core::im::listener::ChannelListener;
use im_client_core::im::roster::{RosterStore, RosterSyncer};
use im_client_core::im::session::SessionStore;
use im_client_core::im::storage::KvStore;
use im_client_core::im::types::session_type;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// IM CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "im-cli")]
#[command(about = "IM CLI 客户端 - 用于测试和展示 IM 功能", long_about = None)]
struct Args {
    /// 用户名
    #[arg(short, long)]
    username: String,

    /// 密码
    #[arg(short, long)]
    password: String,

    /// HTTP API 基础地址
    #[arg(long, default_value = "http://localhost:8080")]
    api_url: String,

    /// WebSocket 地址
    #[arg(long, default_value = "ws://localhost:8888/im")]
    ws_url: String,

    /// 登录后给该用户发一条测试消息（可选）
    #[arg(long)]
    send_to: Option<i64>,

    /// 运行时长（秒），0 表示持续运行
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// 本地持久化目录
    #[arg(long, default_value = ".im-cli")]
    storage_dir: String,

    /// 日志级别（默认: info,im_client_core=debug）
    #[arg(long, default_value = "info,im_client_core=debug")]
    log_level: String,
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("无法创建日志文件 debug.log");

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: debug.log");
}

/// CLI 通道监听器：打印接收到的所有事件
struct CliChannelListener;

#[async_trait]
impl ChannelListener for CliChannelListener {
    async fn on_connection_status_changed(&self, connected: bool, message: String) {
        if connected {
            info!("[CLI/Channel] 🔗 已连接: {}", message);
        } else {
            warn!("[CLI/Channel] 🔗 断开连接: {}", message);
        }
    }

    async fn on_new_message(&self, conversation_key: i64, message_json: String) {
        info!("[CLI/Channel] 📨 会话 {} 新消息: {}", conversation_key, message_json);
    }

    async fn on_presence_changed(&self, user_id: i64, online: bool) {
        info!(
            "[CLI/Channel] 👤 用户 {} {}",
            user_id,
            if online { "上线" } else { "下线" }
        );
    }

    async fn on_friend_request(&self) {
        info!("[CLI/Channel] 📝 收到好友申请通知");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    info!("[CLI] 🚀 IM CLI 客户端（测试模式）");
    info!("[CLI] 👤 用户名: {}", args.username);
    info!("[CLI] ⏱️  运行时长: {} 秒（0=持续运行）", args.duration);

    // 构造存储与网关（进程内构造一次，引用注入）
    let session = Arc::new(SessionStore::new(
        KvStore::new(&args.storage_dir).context("初始化本地存储失败")?,
    ));
    session.restore();
    let roster = Arc::new(RosterStore::new());
    let conversations = Arc::new(ConversationStore::new());

    let gateway = Arc::new(RequestGateway::new(
        GatewayConfig {
            base_url: args.api_url.clone(),
            ..Default::default()
        },
        session.clone(),
    )?);

    let auth = AuthApi::new(
        gateway.clone(),
        session.clone(),
        roster.clone(),
        conversations.clone(),
    );
    let roster_syncer = RosterSyncer::new(
        FriendApi::new(gateway.clone()),
        GroupApi::new(gateway.clone()),
        roster.clone(),
    );
    let history_syncer = HistorySyncer::new(HistoryApi::new(gateway.clone()), conversations.clone());
    let _file_api = FileApi::new(gateway.clone());

    // 登录
    info!("[CLI] 🔐 正在登录...");
    let payload = auth
        .login(&args.username, &args.password)
        .await
        .map_err(|e| anyhow::anyhow!("登录失败: {}", e))?;
    info!("[CLI] ✅ 登录成功！用户ID: {}", payload.user.id);

    // 拉取花名册
    if let Err(e) = roster_syncer.refresh_friends().await {
        error!("[CLI] ❌ 好友列表拉取失败: {}", e);
    }
    if let Err(e) = roster_syncer.refresh_groups().await {
        error!("[CLI] ❌ 群组列表拉取失败: {}", e);
    }
    info!(
        "[CLI] 👥 好友 {} 个, 群组 {} 个",
        roster.friends().len(),
        roster.groups().len()
    );

    // 建立实时通道
    let mut channel = ChannelManager::new(
        ChannelConfig {
            ws_url: args.ws_url.clone(),
            ..Default::default()
        },
        session.clone(),
        roster.clone(),
        conversations.clone(),
    );
    channel.set_listener(Arc::new(CliChannelListener));

    info!("[CLI] 🔗 正在连接实时通道...");
    channel
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("连接失败: {}", e))?;

    // 可选：发送一条测试消息（先加载历史再乐观上屏）
    if let Some(target_id) = args.send_to {
        if let Err(e) = history_syncer
            .load_history(target_id, session_type::DIRECT)
            .await
        {
            warn!("[CLI] ⚠️ 历史加载失败: {}", e);
        }
        sleep(Duration::from_secs(1)).await;
        info!("[CLI] 📤 发送测试消息给用户 {}", target_id);
        if let Err(e) = channel
            .send_text(target_id, "Hello from im-cli!", session_type::DIRECT)
            .await
        {
            error!("[CLI] ❌ 消息发送失败: {}", e);
        }
        info!(
            "[CLI] 💬 会话 {} 当前 {} 条消息",
            target_id,
            conversations.get(target_id).len()
        );
    }

    info!("[CLI] 📥 开始监听消息...");
    if args.duration > 0 {
        info!("[CLI] ⏰ {} 秒后自动退出", args.duration);
        sleep(Duration::from_secs(args.duration)).await;
        channel.close().await;
        auth.logout();
        info!("[CLI] 👋 程序退出");
    } else {
        info!("[CLI] ⏰ 持续运行中，按 Ctrl+C 退出");
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    Ok(())
}
