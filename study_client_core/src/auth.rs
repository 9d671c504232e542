//! 会话服务：登录、登出、会话校验与用户资料
//!
//! 登录使用共享的在途 future 去重，保证同一进程内
//! 任意时刻至多一次网络登录交换。

use crate::error::{Error, Result};
use crate::http::{HttpService, RequestConfig};
use crate::platform::{Platform, UiFeedback};
use crate::storage::SessionStore;
use crate::types::{LoginData, Profile, Session};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type SharedLogin = Shared<BoxFuture<'static, std::result::Result<Session, Arc<Error>>>>;

/// 登录网关：code 换会话与登出通知
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// 将一次性登录 code 交换为会话数据
    async fn exchange_code(&self, code: &str, app_type: &str) -> Result<LoginData>;

    /// 通知服务端登出（尽力而为）
    async fn notify_logout(&self) -> Result<()>;
}

/// 走 HTTP 请求服务的登录网关实现
pub struct HttpAuthGateway {
    http: Arc<HttpService>,
}

impl HttpAuthGateway {
    pub fn new(http: Arc<HttpService>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn exchange_code(&self, code: &str, app_type: &str) -> Result<LoginData> {
        let config = RequestConfig {
            loading_text: "登录中...".to_string(),
            ..RequestConfig::default()
        };
        let response = self
            .http
            .post::<LoginData>(
                "/auth/login",
                Some(serde_json::json!({ "code": code, "appType": app_type })),
                config,
            )
            .await?;

        response
            .data
            .ok_or_else(|| Error::Network("Login response has no data".to_string()))
    }

    async fn notify_logout(&self) -> Result<()> {
        self.http
            .post::<serde_json::Value>("/auth/logout", None, RequestConfig::silent())
            .await?;
        Ok(())
    }
}

struct AuthInner {
    platform: Arc<dyn Platform>,
    session: SessionStore,
    gateway: Arc<dyn AuthGateway>,
    feedback: Arc<dyn UiFeedback>,
    /// 在途登录槽位：并发调用共享同一个结果
    inflight: Mutex<Option<SharedLogin>>,
    /// Tab 切换守卫：同一时刻只允许一次校验/登录流程
    tab_guard: tokio::sync::Mutex<()>,
}

/// 会话服务。显式构造、按需注入，生命周期等于应用进程。
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<AuthInner>,
}

impl AuthService {
    pub fn new(
        platform: Arc<dyn Platform>,
        session: SessionStore,
        gateway: Arc<dyn AuthGateway>,
        feedback: Arc<dyn UiFeedback>,
    ) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                platform,
                session,
                gateway,
                feedback,
                inflight: Mutex::new(None),
                tab_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// 本地是否存在有效登录信息（纯存储读取，不走网络）
    pub fn is_logged_in(&self) -> bool {
        self.inner.session.is_logged_in()
    }

    /// 从存储重建会话
    pub fn stored_session(&self) -> Option<Session> {
        self.inner.session.load()
    }

    /// 登录。正在登录时并发调用收敛到同一个结果；
    /// 已登录时直接返回存储的会话。
    pub async fn login(&self) -> Result<Session> {
        let env = self.inner.platform.env();
        if !env.supports_native_login() {
            warn!(%env, "Native login is not available in this environment");
            return Err(Error::EnvironmentUnsupported(format!(
                "login is not available in {env}"
            )));
        }

        let fut = {
            let mut slot = self
                .inner
                .inflight
                .lock()
                .map_err(|_| Error::Platform("login state lock poisoned".to_string()))?;

            if let Some(existing) = slot.as_ref() {
                debug!("Joining in-flight login");
                existing.clone()
            } else {
                if self.inner.session.is_logged_in() {
                    if let Some(session) = self.inner.session.load() {
                        debug!("Already logged in, skipping network exchange");
                        return Ok(session);
                    }
                }

                let inner = Arc::clone(&self.inner);
                let fut: SharedLogin = async move {
                    let result = AuthInner::perform_login(&inner).await.map_err(Arc::new);
                    // 成败都要清除在途标记
                    if let Ok(mut slot) = inner.inflight.lock() {
                        slot.take();
                    }
                    result
                }
                .boxed()
                .shared();
                *slot = Some(fut.clone());
                fut
            }
        };

        fut.await
            .map_err(|cause| Error::LoginFailed(cause.to_string()))
    }

    /// 登出：尽力通知服务端，随后无条件清除本地会话。
    /// 不向调用方抛错。
    pub async fn logout(&self) {
        if let Err(e) = self.inner.gateway.notify_logout().await {
            warn!("Remote logout failed, clearing local session anyway: {e}");
        }
        self.inner.session.clear();
        self.inner.feedback.show_toast("已退出登录");
        info!("Logged out");
    }

    /// 强制重新登录：清除本地会话与在途标记后重新走登录流程
    pub async fn force_login(&self) -> Result<Session> {
        info!("Forcing a fresh login");
        self.inner.session.clear();
        if let Ok(mut slot) = self.inner.inflight.lock() {
            slot.take();
        }
        self.login().await
    }

    /// 校验平台级会话。非登录平台直接返回 false；
    /// 会话失效时清除本地状态并返回 false。
    pub async fn check_session(&self) -> bool {
        if !self.inner.platform.env().supports_native_login() {
            debug!("Session check skipped off-platform");
            return false;
        }

        match self.inner.platform.check_session().await {
            Ok(()) => true,
            Err(e) => {
                // 平台会话失效是比一般网络错误更强的证据，这里清除本地状态
                info!("Platform session expired: {e}");
                self.inner.session.clear();
                false
            }
        }
    }

    /// 请求用户授权获取资料，并挂到当前会话上持久化
    pub async fn get_user_profile(&self) -> Result<Profile> {
        let env = self.inner.platform.env();
        if !env.supports_native_login() {
            warn!(%env, "Profile fetch is not available in this environment");
            return Err(Error::EnvironmentUnsupported(format!(
                "profile fetch is not available in {env}"
            )));
        }

        let profile = self
            .inner
            .platform
            .request_user_profile("用于完善用户资料")
            .await
            .map_err(|e| Error::ProfileFetchFailed(e.to_string()))?;

        self.inner.session.store_profile(&profile)?;
        info!("User profile stored");
        Ok(profile)
    }

    /// Tab/页面切换时的登录检查。已有校验或登录在途时直接拒绝，
    /// 避免快速切换触发并发的会话操作。
    pub async fn check_login_on_tab_switch(&self) -> bool {
        let Ok(_guard) = self.inner.tab_guard.try_lock() else {
            debug!("Tab switch rejected: a login check is already running");
            return false;
        };
        if self
            .inner
            .inflight
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(true)
        {
            debug!("Tab switch rejected: login already in flight");
            return false;
        }

        if self.is_logged_in() && self.check_session().await {
            return true;
        }

        debug!("Not logged in on tab switch, attempting login");
        match self.login().await {
            Ok(_) => {
                self.inner.feedback.show_toast("登录成功");
                true
            }
            Err(e) => {
                warn!("Tab switch login failed: {e}");
                false
            }
        }
    }
}

impl AuthInner {
    async fn perform_login(inner: &Arc<AuthInner>) -> Result<Session> {
        info!("Starting platform login");

        match Self::exchange_and_store(inner).await {
            Ok(session) => {
                info!(identity = %mask(&session.identity_id), "Login succeeded");
                Ok(session)
            }
            Err(e) => {
                // 回滚可能写入一半的本地会话
                inner.session.clear();
                inner.feedback.show_toast("登录失败，请重试");
                Err(e)
            }
        }
    }

    async fn exchange_and_store(inner: &Arc<AuthInner>) -> Result<Session> {
        let code = inner.platform.login_code().await?;
        if code.is_empty() {
            return Err(Error::Platform("empty login code".to_string()));
        }
        debug!("Obtained one-time login code");

        let app_type = inner.platform.env().as_str();
        let data = inner.gateway.exchange_code(&code, app_type).await?;
        if data.identity_id.is_empty() || data.session_secret.is_empty() {
            return Err(Error::Network(
                "Login response is missing identity fields".to_string(),
            ));
        }

        inner.session.store(&data)?;

        Ok(Session {
            identity_id: data.identity_id,
            session_secret: data.session_secret,
            union_id: data.union_id,
            token: data.token,
            profile: data.profile,
        })
    }
}

fn mask(identity_id: &str) -> String {
    let head: String = identity_id.chars().take(8).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::HostEnv;
    use crate::platform::{MockPlatform, NoopFeedback};
    use crate::storage::{MemoryStorage, SessionStore};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn login_data(identity_id: &str) -> LoginData {
        LoginData {
            identity_id: identity_id.to_string(),
            session_secret: "sk_1".to_string(),
            union_id: None,
            token: Some("t_1".to_string()),
            profile: None,
        }
    }

    /// 可编程的测试网关：计数、延迟、失败注入
    struct CountingGateway {
        calls: AtomicU32,
        delay_ms: u64,
        fail_exchange: bool,
        fail_logout: bool,
        identity_id: String,
    }

    impl CountingGateway {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                delay_ms: 0,
                fail_exchange: false,
                fail_logout: false,
                identity_id: "oid_1".to_string(),
            }
        }
    }

    #[async_trait]
    impl AuthGateway for CountingGateway {
        async fn exchange_code(&self, _code: &str, _app_type: &str) -> Result<LoginData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_exchange {
                Err(Error::Network("exchange refused".to_string()))
            } else {
                Ok(login_data(&self.identity_id))
            }
        }

        async fn notify_logout(&self) -> Result<()> {
            if self.fail_logout {
                Err(Error::Network("logout refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn weapp_platform() -> MockPlatform {
        let mut platform = MockPlatform::new();
        platform.expect_env().return_const(HostEnv::Weapp);
        platform
            .expect_login_code()
            .returning(|| Ok("code_1".to_string()));
        platform
    }

    fn build(
        platform: MockPlatform,
        gateway: Arc<dyn AuthGateway>,
    ) -> (AuthService, SessionStore) {
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        let service = AuthService::new(
            Arc::new(platform),
            session.clone(),
            gateway,
            Arc::new(NoopFeedback),
        );
        (service, session)
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let gateway = Arc::new(CountingGateway::new());
        let (service, session) = build(weapp_platform(), gateway.clone());

        let result = service.login().await.unwrap();
        assert_eq!(result.identity_id, "oid_1");
        assert!(session.is_logged_in());
        assert_eq!(session.token().as_deref(), Some("t_1"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_logins_share_one_exchange() {
        let gateway = Arc::new(CountingGateway {
            delay_ms: 50,
            ..CountingGateway::new()
        });
        let (service, _session) = build(weapp_platform(), gateway.clone());

        let (a, b) = tokio::join!(service.login(), service.login());
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a, b);
        // 并发调用只触发一次网络交换
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_logins_share_one_failure() {
        let gateway = Arc::new(CountingGateway {
            delay_ms: 50,
            fail_exchange: true,
            ..CountingGateway::new()
        });
        let (service, session) = build(weapp_platform(), gateway.clone());

        let (a, b) = tokio::join!(service.login(), service.login());
        assert!(matches!(a, Err(Error::LoginFailed(_))));
        assert!(matches!(b, Err(Error::LoginFailed(_))));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_rejected_off_platform() {
        let mut platform = MockPlatform::new();
        platform.expect_env().return_const(HostEnv::H5);
        let gateway = Arc::new(CountingGateway::new());
        let (service, _session) = build(platform, gateway.clone());

        let result = service.login().await;
        assert!(matches!(result, Err(Error::EnvironmentUnsupported(_))));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_short_circuits_when_logged_in() {
        let gateway = Arc::new(CountingGateway::new());
        let (service, session) = build(weapp_platform(), gateway.clone());
        session.store(&login_data("oid_1")).unwrap();

        let result = service.login().await.unwrap();
        assert_eq!(result.identity_id, "oid_1");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_login_rolls_back_local_state() {
        let gateway = Arc::new(CountingGateway {
            fail_exchange: true,
            ..CountingGateway::new()
        });
        let (service, session) = build(weapp_platform(), gateway.clone());

        let result = service.login().await;
        assert!(matches!(result, Err(Error::LoginFailed(_))));
        assert!(!session.is_logged_in());
        assert!(session.load().is_none());

        // 失败后在途标记已清除，可以重试
        let result = service.login().await;
        assert!(result.is_err());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logout_clears_even_if_remote_fails() {
        let gateway = Arc::new(CountingGateway {
            fail_logout: true,
            ..CountingGateway::new()
        });
        let (service, session) = build(weapp_platform(), gateway);
        session.store(&login_data("oid_1")).unwrap();

        service.logout().await;
        assert!(!session.is_logged_in());
        assert!(service.stored_session().is_none());
    }

    #[tokio::test]
    async fn test_force_login_reissues_exchange() {
        let gateway = Arc::new(CountingGateway {
            identity_id: "oid_2".to_string(),
            ..CountingGateway::new()
        });
        let (service, session) = build(weapp_platform(), gateway.clone());
        session.store(&login_data("oid_1")).unwrap();
        assert!(session.is_logged_in());

        let result = service.force_login().await.unwrap();
        // 已登录也要重新交换，并替换存储的会话字段
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.identity_id, "oid_2");
        assert_eq!(session.load().unwrap().identity_id, "oid_2");
    }

    #[tokio::test]
    async fn test_check_session_invalid_clears_local_state() {
        let mut platform = weapp_platform();
        platform
            .expect_check_session()
            .returning(|| Err(Error::Platform("session expired".to_string())));
        let (service, session) = build(platform, Arc::new(CountingGateway::new()));
        session.store(&login_data("oid_1")).unwrap();

        assert!(!service.check_session().await);
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_check_session_off_platform_is_false() {
        let mut platform = MockPlatform::new();
        platform.expect_env().return_const(HostEnv::H5);
        let (service, session) = build(platform, Arc::new(CountingGateway::new()));
        session.store(&login_data("oid_1")).unwrap();

        assert!(!service.check_session().await);
        // 非登录平台不触碰本地状态
        assert!(session.is_logged_in());
    }

    #[tokio::test]
    async fn test_get_user_profile_persists() {
        let profile = Profile {
            display_name: "小明".to_string(),
            avatar_url: "https://cdn.example.com/a.png".to_string(),
            gender: 1,
            locale: "zh_CN".to_string(),
            region: "Shanghai".to_string(),
        };
        let mut platform = weapp_platform();
        let returned = profile.clone();
        platform
            .expect_request_user_profile()
            .returning(move |_| Ok(returned.clone()));
        let (service, session) = build(platform, Arc::new(CountingGateway::new()));
        session.store(&login_data("oid_1")).unwrap();

        let result = service.get_user_profile().await.unwrap();
        assert_eq!(result, profile);
        assert_eq!(session.load().unwrap().profile, Some(profile));
    }

    #[tokio::test]
    async fn test_get_user_profile_consent_denied() {
        let mut platform = weapp_platform();
        platform
            .expect_request_user_profile()
            .returning(|_| Err(Error::Platform("consent denied".to_string())));
        let (service, _session) = build(platform, Arc::new(CountingGateway::new()));

        let result = service.get_user_profile().await;
        assert!(matches!(result, Err(Error::ProfileFetchFailed(_))));
    }

    /// 校验耗时较长的手写平台桩，用于并发守卫测试
    struct SlowPlatform;

    #[async_trait]
    impl Platform for SlowPlatform {
        fn env(&self) -> HostEnv {
            HostEnv::Weapp
        }

        async fn login_code(&self) -> Result<String> {
            Ok("code_1".to_string())
        }

        async fn check_session(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }

        async fn request_user_profile(&self, _desc: &str) -> Result<Profile> {
            Err(Error::Platform("no consent ui".to_string()))
        }
    }

    #[tokio::test]
    async fn test_tab_switch_rejects_overlapping_check() {
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        session.store(&login_data("oid_1")).unwrap();
        let service = AuthService::new(
            Arc::new(SlowPlatform),
            session,
            Arc::new(CountingGateway::new()),
            Arc::new(NoopFeedback),
        );

        // 第一次调用还在校验中时，第二次直接返回 false
        let second = async {
            tokio::task::yield_now().await;
            service.check_login_on_tab_switch().await
        };
        let (first, second) = tokio::join!(service.check_login_on_tab_switch(), second);
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_tab_switch_rejected_while_login_in_flight() {
        let gateway = Arc::new(CountingGateway {
            delay_ms: 50,
            ..CountingGateway::new()
        });
        let (service, _session) = build(weapp_platform(), gateway.clone());

        let switch = async {
            tokio::task::yield_now().await;
            service.check_login_on_tab_switch().await
        };
        let (login, switch) = tokio::join!(service.login(), switch);
        assert!(login.is_ok());
        assert!(!switch);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tab_switch_logs_in_when_logged_out() {
        let mut platform = weapp_platform();
        platform.expect_check_session().returning(|| Ok(()));
        let gateway = Arc::new(CountingGateway::new());
        let (service, session) = build(platform, gateway.clone());

        assert!(service.check_login_on_tab_switch().await);
        assert!(session.is_logged_in());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }
}
