//! 学习客户端核心库
//!
//! 提供跨端应用的客户端会话与请求层，包括：
//! - 登录会话管理（code 换会话、单例在途去重、强制重登）
//! - 统一 HTTP 请求封装（信封归一化、业务错误码副作用）
//! - 按字段持久化的本地会话存储

pub mod api;
pub mod auth;
pub mod env;
pub mod error;
pub mod http;
pub mod platform;
pub mod storage;
pub mod types;

pub use api::ApiClient;
pub use auth::{AuthGateway, AuthService, HttpAuthGateway};
pub use env::{FeatureSupport, HostEnv};
pub use error::{Error, Result};
pub use http::{HttpConfig, HttpService, ProgressCallback, RequestConfig};
pub use platform::{NoopFeedback, Platform, UiFeedback};
pub use storage::{FileStorage, KvStorage, MemoryStorage, SessionStore};
pub use types::*;
