//! 业务 REST 接口的轻量封装
//!
//! 每个分组只做路径、方法和参数的拼装，信封处理和错误分发
//! 都在请求服务里完成。

use crate::error::Result;
use crate::http::{HttpService, RequestConfig};
use crate::types::{
    ApiResponse, Category, Goods, KnowledgePoint, PracticeItem, Profile, StudyItem, UserStats,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn params(pairs: Vec<(&str, Option<String>)>) -> Vec<(String, Option<String>)> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn query(pairs: Vec<(&str, Option<String>)>) -> RequestConfig {
    RequestConfig {
        params: params(pairs),
        ..RequestConfig::default()
    }
}

/// 分类接口
#[derive(Clone)]
pub struct CategoryApi {
    http: Arc<HttpService>,
}

impl CategoryApi {
    /// 获取分类列表
    pub async fn get_categories(&self, limit: u32) -> Result<ApiResponse<Vec<Category>>> {
        let config = query(vec![
            ("limit", Some(limit.to_string())),
            ("level", Some("L1".to_string())),
        ]);
        self.http.get("/categories", config).await
    }
}

/// 商品接口
#[derive(Clone)]
pub struct GoodsApi {
    http: Arc<HttpService>,
}

impl GoodsApi {
    pub async fn get_new_goods(&self, limit: u32, offset: u32) -> Result<ApiResponse<Vec<Goods>>> {
        let config = query(vec![
            ("limit", Some(limit.to_string())),
            ("offset", Some(offset.to_string())),
        ]);
        self.http.get("/goods/new", config).await
    }

    pub async fn get_hot_goods(&self, limit: u32) -> Result<ApiResponse<Vec<Goods>>> {
        let config = query(vec![("limit", Some(limit.to_string()))]);
        self.http.get("/goods/hot", config).await
    }

    pub async fn get_goods_by_category(
        &self,
        category_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<ApiResponse<Vec<Goods>>> {
        let config = query(vec![
            ("limit", Some(limit.to_string())),
            ("offset", Some(offset.to_string())),
        ]);
        self.http
            .get(&format!("/goods/category/{category_id}"), config)
            .await
    }

    pub async fn get_goods_detail(&self, id: &str) -> Result<ApiResponse<Goods>> {
        self.http
            .get(&format!("/goods/{id}"), RequestConfig::default())
            .await
    }
}

/// 学习内容接口
#[derive(Clone)]
pub struct StudyApi {
    http: Arc<HttpService>,
}

impl StudyApi {
    /// 获取推荐学习内容
    pub async fn get_recommended_study(&self, limit: u32) -> Result<ApiResponse<Vec<StudyItem>>> {
        let config = query(vec![("limit", Some(limit.to_string()))]);
        self.http.get("/study/recommended", config).await
    }

    /// 获取学习进度
    pub async fn get_study_progress(&self, user_id: &str) -> Result<ApiResponse<Value>> {
        self.http
            .get(&format!("/study/progress/{user_id}"), RequestConfig::default())
            .await
    }

    /// 更新学习进度
    pub async fn update_study_progress(
        &self,
        study_id: &str,
        progress: f64,
    ) -> Result<ApiResponse<Value>> {
        self.http
            .post(
                "/study/progress",
                Some(json!({ "studyId": study_id, "progress": progress })),
                RequestConfig::default(),
            )
            .await
    }

    /// 获取轮播图数据
    pub async fn get_banners(&self) -> Result<ApiResponse<Value>> {
        self.http.get("/banners", RequestConfig::default()).await
    }
}

/// 知识点接口
#[derive(Clone)]
pub struct KnowledgeApi {
    http: Arc<HttpService>,
}

impl KnowledgeApi {
    /// 获取知识点列表，分类和难度可选
    pub async fn get_knowledge_points(
        &self,
        category: Option<String>,
        difficulty: Option<String>,
    ) -> Result<ApiResponse<Vec<KnowledgePoint>>> {
        let config = query(vec![("category", category), ("difficulty", difficulty)]);
        self.http.get("/knowledge", config).await
    }

    pub async fn get_knowledge_detail(&self, id: &str) -> Result<ApiResponse<KnowledgePoint>> {
        self.http
            .get(&format!("/knowledge/{id}"), RequestConfig::default())
            .await
    }

    pub async fn search_knowledge(&self, keyword: &str) -> Result<ApiResponse<Vec<KnowledgePoint>>> {
        let config = query(vec![("keyword", Some(keyword.to_string()))]);
        self.http.get("/knowledge/search", config).await
    }
}

/// 练习接口
#[derive(Clone)]
pub struct PracticeApi {
    http: Arc<HttpService>,
}

impl PracticeApi {
    pub async fn get_practice_list(
        &self,
        item_type: Option<String>,
        difficulty: Option<String>,
    ) -> Result<ApiResponse<Vec<PracticeItem>>> {
        let config = query(vec![("type", item_type), ("difficulty", difficulty)]);
        self.http.get("/practice", config).await
    }

    /// 提交练习答案
    pub async fn submit_practice(
        &self,
        practice_id: &str,
        answers: Vec<Value>,
    ) -> Result<ApiResponse<Value>> {
        self.http
            .post(
                "/practice/submit",
                Some(json!({ "practiceId": practice_id, "answers": answers })),
                RequestConfig::default(),
            )
            .await
    }

    pub async fn get_practice_result(&self, practice_id: &str) -> Result<ApiResponse<Value>> {
        self.http
            .get(&format!("/practice/result/{practice_id}"), RequestConfig::default())
            .await
    }
}

/// 用户接口
#[derive(Clone)]
pub struct UserApi {
    http: Arc<HttpService>,
}

impl UserApi {
    pub async fn get_user_info(&self) -> Result<ApiResponse<Value>> {
        self.http.get("/user/info", RequestConfig::default()).await
    }

    pub async fn update_user_info(&self, info: Value) -> Result<ApiResponse<Value>> {
        self.http
            .put("/user/info", Some(info), RequestConfig::default())
            .await
    }

    /// 上报授权获取的用户资料
    pub async fn update_user_profile(&self, profile: &Profile) -> Result<ApiResponse<Value>> {
        self.http
            .post(
                "/user/profile",
                Some(serde_json::to_value(profile).unwrap_or(Value::Null)),
                RequestConfig::default(),
            )
            .await
    }

    pub async fn get_user_stats(&self) -> Result<ApiResponse<UserStats>> {
        self.http.get("/user/stats", RequestConfig::default()).await
    }
}

/// 聚合的 API 客户端
#[derive(Clone)]
pub struct ApiClient {
    pub category: CategoryApi,
    pub goods: GoodsApi,
    pub study: StudyApi,
    pub knowledge: KnowledgeApi,
    pub practice: PracticeApi,
    pub user: UserApi,
}

impl ApiClient {
    pub fn new(http: Arc<HttpService>) -> Self {
        Self {
            category: CategoryApi { http: http.clone() },
            goods: GoodsApi { http: http.clone() },
            study: StudyApi { http: http.clone() },
            knowledge: KnowledgeApi { http: http.clone() },
            practice: PracticeApi { http: http.clone() },
            user: UserApi { http },
        }
    }
}
