//! 集成测试 - 不依赖后台服务的端到端路径

use async_trait::async_trait;
use std::sync::Arc;
use study_client_core::{
    AuthService, Error, FileStorage, HostEnv, HttpAuthGateway, HttpConfig, HttpService,
    LoginData, NoopFeedback, Platform, Profile, Result, SessionStore,
};

/// 固定返回 code 的测试平台
struct StaticPlatform {
    env: HostEnv,
}

#[async_trait]
impl Platform for StaticPlatform {
    fn env(&self) -> HostEnv {
        self.env
    }

    async fn login_code(&self) -> Result<String> {
        Ok("test_code".to_string())
    }

    async fn check_session(&self) -> Result<()> {
        Ok(())
    }

    async fn request_user_profile(&self, _desc: &str) -> Result<Profile> {
        Err(Error::Platform("no consent ui in tests".to_string()))
    }
}

fn unreachable_service(dir: &std::path::Path) -> (Arc<HttpService>, SessionStore) {
    let storage = Arc::new(FileStorage::new(dir).expect("Failed to create storage"));
    let session = SessionStore::new(storage);
    let config = HttpConfig {
        // 未监听的端口，连接立即失败
        base_url: "http://127.0.0.1:1/api".to_string(),
        env: HostEnv::Weapp,
        timeout_ms: 2_000,
        verify_tls: false,
    };
    let http = Arc::new(
        HttpService::new(config, session.clone(), Arc::new(NoopFeedback))
            .expect("Failed to create HTTP service"),
    );
    (http, session)
}

fn auth_service(env: HostEnv, dir: &std::path::Path) -> (AuthService, SessionStore) {
    let (http, session) = unreachable_service(dir);
    let gateway = Arc::new(HttpAuthGateway::new(http));
    let service = AuthService::new(
        Arc::new(StaticPlatform { env }),
        session.clone(),
        gateway,
        Arc::new(NoopFeedback),
    );
    (service, session)
}

#[tokio::test]
async fn test_login_rejected_off_platform() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _session) = auth_service(HostEnv::H5, dir.path());

    let result = service.login().await;
    assert!(matches!(result, Err(Error::EnvironmentUnsupported(_))));
}

#[tokio::test]
async fn test_mini_program_config_requires_absolute_url() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let config = HttpConfig {
        base_url: "/api".to_string(),
        env: HostEnv::Weapp,
        ..HttpConfig::default()
    };
    let result = HttpService::new(config, SessionStore::new(storage), Arc::new(NoopFeedback));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_login_against_unreachable_server_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let (service, session) = auth_service(HostEnv::Weapp, dir.path());

    let result = service.login().await;
    assert!(matches!(result, Err(Error::LoginFailed(_))));
    assert!(!session.is_logged_in());
    assert!(session.load().is_none());
}

#[tokio::test]
async fn test_logout_clears_local_state_when_remote_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let (service, session) = auth_service(HostEnv::Weapp, dir.path());
    session
        .store(&LoginData {
            identity_id: "oid_1".to_string(),
            session_secret: "sk_1".to_string(),
            union_id: None,
            token: Some("t_1".to_string()),
            profile: None,
        })
        .unwrap();
    assert!(service.is_logged_in());

    // 远端登出失败也要清除本地会话
    service.logout().await;
    assert!(!service.is_logged_in());
    assert!(service.stored_session().is_none());
}

#[tokio::test]
async fn test_file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        let session = SessionStore::new(storage);
        session
            .store(&LoginData {
                identity_id: "oid_1".to_string(),
                session_secret: "sk_1".to_string(),
                union_id: Some("uid_1".to_string()),
                token: None,
                profile: None,
            })
            .unwrap();
    }

    // 重新打开同一状态目录，会话仍可重建
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let session = SessionStore::new(storage);
    let restored = session.load().expect("session should survive reopen");
    assert_eq!(restored.identity_id, "oid_1");
    assert_eq!(restored.union_id.as_deref(), Some("uid_1"));
    assert!(restored.token.is_none());
}
