//! 宿主平台能力抽象

use crate::env::HostEnv;
use crate::error::Result;
use crate::types::Profile;
use async_trait::async_trait;

/// 宿主平台接口：原生登录、会话校验和用户授权都由宿主提供
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    /// 当前宿主环境
    fn env(&self) -> HostEnv;

    /// 获取一次性登录凭证 code
    async fn login_code(&self) -> Result<String>;

    /// 校验平台级会话是否有效；无效时返回 Err
    async fn check_session(&self) -> Result<()>;

    /// 请求用户授权并返回用户资料；授权被拒绝时返回 Err
    async fn request_user_profile(&self, desc: &str) -> Result<Profile>;
}

/// 界面反馈接口：加载提示、轻提示和模态弹窗
#[cfg_attr(test, mockall::automock)]
pub trait UiFeedback: Send + Sync {
    fn show_loading(&self, text: &str);
    fn hide_loading(&self);
    fn show_toast(&self, text: &str);
    fn show_modal(&self, title: &str, content: &str);
}

/// 静默实现（无界面场景）
pub struct NoopFeedback;

impl UiFeedback for NoopFeedback {
    fn show_loading(&self, _text: &str) {}
    fn hide_loading(&self) {}
    fn show_toast(&self, _text: &str) {}
    fn show_modal(&self, _title: &str, _content: &str) {}
}
