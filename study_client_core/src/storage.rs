//! 本地键值存储与会话持久化

use crate::error::{Error, Result};
use crate::types::{LoginData, Profile, Session};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// 会话相关的存储键（按字段分散存储，不做整体序列化）
pub mod keys {
    pub const IDENTITY_ID: &str = "identity_id";
    pub const SESSION_SECRET: &str = "session_secret";
    pub const UNION_ID: &str = "union_id";
    pub const TOKEN: &str = "token";
    pub const USER_PROFILE: &str = "user_profile";
}

/// 同步键值存储抽象
pub trait KvStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str);
}

/// 内存存储（测试和嵌入场景的默认实现）
#[derive(Default)]
pub struct MemoryStorage {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.map.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .map
            .write()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.map.write() {
            map.remove(key);
        }
    }
}

/// 文件存储：每个键对应状态目录下的一个文件
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KvStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::write(self.path_for(key), value)
            .map_err(|e| Error::Storage(format!("Failed to write {key}: {e}")))
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

/// 会话存储：在键值存储之上提供按字段的读写和统一清理
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KvStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        Self { storage }
    }

    /// identity_id 和 session_secret 同时存在即视为已登录
    pub fn is_logged_in(&self) -> bool {
        self.identity_id().is_some() && self.session_secret().is_some()
    }

    pub fn identity_id(&self) -> Option<String> {
        non_empty(self.storage.get(keys::IDENTITY_ID))
    }

    pub fn session_secret(&self) -> Option<String> {
        non_empty(self.storage.get(keys::SESSION_SECRET))
    }

    pub fn token(&self) -> Option<String> {
        non_empty(self.storage.get(keys::TOKEN))
    }

    /// 从存储重建会话；缺少必要字段时返回 None
    pub fn load(&self) -> Option<Session> {
        let identity_id = self.identity_id()?;
        let session_secret = self.session_secret()?;
        let profile = self
            .storage
            .get(keys::USER_PROFILE)
            .and_then(|raw| serde_json::from_str(&raw).ok());

        Some(Session {
            identity_id,
            session_secret,
            union_id: non_empty(self.storage.get(keys::UNION_ID)),
            token: self.token(),
            profile,
        })
    }

    /// 持久化登录结果的各个字段
    pub fn store(&self, data: &LoginData) -> Result<()> {
        self.storage.set(keys::IDENTITY_ID, &data.identity_id)?;
        self.storage.set(keys::SESSION_SECRET, &data.session_secret)?;

        if let Some(union_id) = &data.union_id {
            self.storage.set(keys::UNION_ID, union_id)?;
        }
        if let Some(token) = &data.token {
            self.storage.set(keys::TOKEN, token)?;
        }
        if let Some(profile) = &data.profile {
            self.store_profile(profile)?;
        }
        Ok(())
    }

    pub fn store_profile(&self, profile: &Profile) -> Result<()> {
        let raw = serde_json::to_string(profile)
            .map_err(|e| Error::Storage(format!("Failed to serialize profile: {e}")))?;
        self.storage.set(keys::USER_PROFILE, &raw)
    }

    /// 清除全部会话字段。固定先清 identity_id，保证清理中断时
    /// 剩余状态仍被读作未登录。
    pub fn clear(&self) {
        self.storage.remove(keys::IDENTITY_ID);
        self.storage.remove(keys::SESSION_SECRET);
        self.storage.remove(keys::UNION_ID);
        self.storage.remove(keys::TOKEN);
        self.storage.remove(keys::USER_PROFILE);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => Some(v),
        Some(_) => {
            warn!("Ignoring empty storage value");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_data() -> LoginData {
        LoginData {
            identity_id: "oid_1".to_string(),
            session_secret: "sk_1".to_string(),
            union_id: Some("uid_1".to_string()),
            token: Some("t_1".to_string()),
            profile: None,
        }
    }

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").as_deref(), Some("v"));
        storage.remove("k");
        assert!(storage.get("k").is_none());
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.set(keys::TOKEN, "t_1").unwrap();
        assert_eq!(storage.get(keys::TOKEN).as_deref(), Some("t_1"));
        storage.remove(keys::TOKEN);
        assert!(storage.get(keys::TOKEN).is_none());
    }

    #[test]
    fn test_logged_in_requires_both_fields() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        store.store(&login_data()).unwrap();
        assert!(store.is_logged_in());

        // 移除任一必要字段都应翻转登录状态
        let store2 = SessionStore::new(Arc::new(MemoryStorage::new()));
        store2.store(&login_data()).unwrap();
        store2.storage.remove(keys::IDENTITY_ID);
        assert!(!store2.is_logged_in());
        assert!(store2.load().is_none());

        store.storage.remove(keys::SESSION_SECRET);
        assert!(!store.is_logged_in());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_load_reconstructs_session() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        store.store(&login_data()).unwrap();

        let session = store.load().unwrap();
        assert_eq!(session.identity_id, "oid_1");
        assert_eq!(session.session_secret, "sk_1");
        assert_eq!(session.union_id.as_deref(), Some("uid_1"));
        assert_eq!(session.token.as_deref(), Some("t_1"));
        assert!(session.profile.is_none());
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        store.store(&login_data()).unwrap();
        store
            .store_profile(&Profile {
                display_name: "小明".to_string(),
                avatar_url: String::new(),
                gender: 1,
                locale: "zh_CN".to_string(),
                region: "Shanghai".to_string(),
            })
            .unwrap();

        store.clear();
        assert!(!store.is_logged_in());
        assert!(store.load().is_none());
        assert!(store.token().is_none());
    }
}
