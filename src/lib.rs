pub mod im;

// 重新导出常用类型和函数，方便外部使用
pub use im::{
    auth::AuthApi,
    client::{ChannelConfig, ChannelManager, ChannelState},
    conversation::{ConversationStore, HistorySyncer},
    gateway::{GatewayConfig, RequestGateway},
    roster::{RosterStore, RosterSyncer},
    session::SessionStore,
    types::ChatMessage,
};
