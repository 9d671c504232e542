//! 数据类型定义

use serde::{Deserialize, Serialize};

/// 用户资料（经用户授权后获取）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
    pub gender: i32,
    pub locale: String,
    pub region: String,
}

/// 会话信息（由登录换取，按字段分散持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity_id: String,
    pub session_secret: String,
    pub union_id: Option<String>,
    pub token: Option<String>,
    pub profile: Option<Profile>,
}

/// 登录接口响应数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    #[serde(rename = "identityId")]
    pub identity_id: String,
    #[serde(rename = "sessionSecret")]
    pub session_secret: String,
    #[serde(rename = "unionId")]
    pub union_id: Option<String>,
    pub token: Option<String>,
    pub profile: Option<Profile>,
}

/// 统一 API 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 业务成功码为 0 或 200
    pub fn is_success(&self) -> bool {
        self.code == 0 || self.code == 200
    }
}

/// 分类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "iconUrl")]
    pub icon_url: String,
}

/// 商品
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goods {
    pub id: String,
    pub name: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub brief: String,
    #[serde(rename = "picUrl")]
    pub pic_url: String,
    #[serde(rename = "isNew")]
    pub is_new: bool,
    #[serde(rename = "isHot")]
    pub is_hot: bool,
    #[serde(rename = "retailPrice")]
    pub retail_price: f64,
}

/// 学习内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub progress: f64,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

/// 知识点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub id: String,
    pub title: String,
    pub category: String,
    pub difficulty: String,
    pub description: String,
    /// 预计学习时间（分钟）
    #[serde(rename = "estimatedTime")]
    pub estimated_time: u32,
}

/// 练习
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub difficulty: String,
    pub score: Option<f64>,
    pub completed: bool,
}

/// 用户学习统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(rename = "studyDays")]
    pub study_days: u32,
    #[serde(rename = "completedPractices")]
    pub completed_practices: u32,
    #[serde(rename = "totalMinutes")]
    pub total_minutes: u64,
}
