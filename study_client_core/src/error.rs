//! 错误类型定义

use thiserror::Error;

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 当前宿主环境不支持该操作
    #[error("Environment unsupported: {0}")]
    EnvironmentUnsupported(String),

    /// 登录失败（本地会话状态已回滚）
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// 获取用户资料失败（授权被拒绝或平台调用失败）
    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    /// 业务错误（服务端返回的非成功业务码）
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// 网络错误
    #[error("Network error: {0}")]
    Network(String),

    /// 本地存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 配置错误
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 平台调用错误
    #[error("Platform error: {0}")]
    Platform(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
