//! 宿主环境检测

use serde::{Deserialize, Serialize};

/// 宿主环境类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEnv {
    /// 微信小程序
    Weapp,
    /// H5 浏览器
    H5,
    /// React Native
    Rn,
    /// 支付宝小程序
    Alipay,
    /// 字节跳动小程序
    Tt,
    /// QQ 小程序
    Qq,
    /// 京东小程序
    Jd,
    /// 百度小程序
    Swan,
    /// 未知环境
    Unknown,
}

impl HostEnv {
    /// 环境名称（与服务端 appType 参数一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            HostEnv::Weapp => "weapp",
            HostEnv::H5 => "h5",
            HostEnv::Rn => "rn",
            HostEnv::Alipay => "alipay",
            HostEnv::Tt => "tt",
            HostEnv::Qq => "qq",
            HostEnv::Jd => "jd",
            HostEnv::Swan => "swan",
            HostEnv::Unknown => "unknown",
        }
    }

    /// 是否支持原生登录（仅微信小程序提供 code 换取会话的能力）
    pub fn supports_native_login(&self) -> bool {
        matches!(self, HostEnv::Weapp)
    }

    /// 是否为小程序环境（任一小程序平台）
    pub fn is_mini_program(&self) -> bool {
        matches!(
            self,
            HostEnv::Weapp | HostEnv::Alipay | HostEnv::Tt | HostEnv::Qq | HostEnv::Jd | HostEnv::Swan
        )
    }

    /// 是否要求完整的请求 URL（小程序宿主无法解析相对地址）
    pub fn requires_absolute_base_url(&self) -> bool {
        self.is_mini_program()
    }
}

impl std::fmt::Display for HostEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 环境能力支持情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSupport {
    pub login: bool,
    pub payment: bool,
    pub share: bool,
    pub storage: bool,
    pub network: bool,
}

impl FeatureSupport {
    /// 按环境给出能力报告
    pub fn for_env(env: HostEnv) -> Self {
        Self {
            login: env.supports_native_login(),
            payment: matches!(env, HostEnv::Weapp | HostEnv::Alipay | HostEnv::H5),
            share: env.is_mini_program(),
            // 存储和网络在所有环境可用
            storage: true,
            network: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_weapp_supports_native_login() {
        assert!(HostEnv::Weapp.supports_native_login());
        for env in [
            HostEnv::H5,
            HostEnv::Rn,
            HostEnv::Alipay,
            HostEnv::Tt,
            HostEnv::Qq,
            HostEnv::Jd,
            HostEnv::Swan,
            HostEnv::Unknown,
        ] {
            assert!(!env.supports_native_login(), "{env} should not support login");
        }
    }

    #[test]
    fn test_mini_program_requires_absolute_base_url() {
        assert!(HostEnv::Weapp.requires_absolute_base_url());
        assert!(HostEnv::Alipay.requires_absolute_base_url());
        assert!(!HostEnv::H5.requires_absolute_base_url());
        assert!(!HostEnv::Unknown.requires_absolute_base_url());
    }

    #[test]
    fn test_feature_support() {
        let weapp = FeatureSupport::for_env(HostEnv::Weapp);
        assert!(weapp.login);
        assert!(weapp.share);
        let h5 = FeatureSupport::for_env(HostEnv::H5);
        assert!(!h5.login);
        assert!(h5.payment);
        assert!(h5.storage);
    }
}
