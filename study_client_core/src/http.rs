//! 基于 reqwest 的 HTTP 请求服务
//!
//! 统一处理 URL 拼接、查询参数、认证头合并、业务响应包装
//! 以及按业务错误码分发的副作用（401 清除会话等）。

use crate::env::HostEnv;
use crate::error::{Error, Result};
use crate::platform::UiFeedback;
use crate::storage::SessionStore;
use crate::types::ApiResponse;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// HTTP 服务配置
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// 请求基地址
    pub base_url: String,
    /// 宿主环境（决定是否要求完整 URL）
    pub env: HostEnv,
    /// 默认超时（毫秒）
    pub timeout_ms: u64,
    /// 是否验证 TLS 证书
    pub verify_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            env: HostEnv::Weapp,
            timeout_ms: 10_000,
            verify_tls: true,
        }
    }
}

impl HttpConfig {
    /// 按环境给出默认基地址。小程序宿主必须使用完整 URL；
    /// H5 开发环境可走相对路径由代理转发。
    pub fn default_base_url(env: HostEnv, dev: bool) -> &'static str {
        if dev {
            match env {
                HostEnv::H5 => "/api",
                _ => "http://localhost:3000/api",
            }
        } else {
            "https://api.study-client.example.com/api"
        }
    }
}

/// 单次请求配置
#[derive(Clone)]
pub struct RequestConfig {
    pub show_loading: bool,
    pub loading_text: String,
    pub show_error: bool,
    /// 覆盖默认超时（毫秒）
    pub timeout_ms: Option<u64>,
    /// 调用方附加请求头（优先级最高）
    pub headers: Vec<(String, String)>,
    /// 查询参数，仅 GET 序列化；值为 None 的参数被丢弃
    pub params: Vec<(String, Option<String>)>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            show_loading: true,
            loading_text: "加载中...".to_string(),
            show_error: true,
            timeout_ms: None,
            headers: Vec::new(),
            params: Vec::new(),
        }
    }
}

impl RequestConfig {
    /// 静默配置：不展示加载提示，也不弹出错误提示
    pub fn silent() -> Self {
        Self {
            show_loading: false,
            show_error: false,
            ..Self::default()
        }
    }
}

/// 上传/下载进度回调：（已传输字节数，总字节数）
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// 下载结果
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub temp_file_path: PathBuf,
}

/// 业务错误码对应的副作用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessSideEffect {
    /// 401：清除本地会话并提示重新登录
    ExpireSession,
    /// 403：无权限提示
    PermissionToast,
    /// 404：资源不存在提示
    NotFoundToast,
    /// 其他：透出服务端 message
    MessageToast,
}

/// 业务错误码分发表
pub fn classify_business_code(code: i32) -> BusinessSideEffect {
    match code {
        401 => BusinessSideEffect::ExpireSession,
        403 => BusinessSideEffect::PermissionToast,
        404 => BusinessSideEffect::NotFoundToast,
        _ => BusinessSideEffect::MessageToast,
    }
}

/// 序列化查询参数：丢弃 None 值，保持插入顺序
pub fn build_query_string(params: &[(String, Option<String>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| format!("{}={}", urlencoding::encode(key), urlencoding::encode(v)))
        })
        .collect();

    if query.is_empty() {
        String::new()
    } else {
        format!("?{}", query.join("&"))
    }
}

/// 将缺少标准业务码的响应体包装为成功信封
fn normalize_envelope(body: Value) -> ApiResponse<Value> {
    if let Value::Object(map) = &body {
        if let Some(code) = map.get("code").and_then(Value::as_i64) {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let data = map.get("data").cloned().filter(|v| !v.is_null());
            return ApiResponse { code: code as i32, message, data };
        }
    }

    ApiResponse {
        code: 200,
        message: "success".to_string(),
        data: Some(body),
    }
}

fn into_typed<T: DeserializeOwned>(envelope: ApiResponse<Value>) -> Result<ApiResponse<T>> {
    let data = match envelope.data {
        Some(value) => Some(
            serde_json::from_value(value)
                .map_err(|e| Error::Network(format!("Failed to parse response data: {e}")))?,
        ),
        None => None,
    };
    Ok(ApiResponse {
        code: envelope.code,
        message: envelope.message,
        data,
    })
}

/// 加载提示守卫：离开作用域时保证收起提示
struct LoadingGuard<'a> {
    feedback: &'a dyn UiFeedback,
    active: bool,
}

impl<'a> LoadingGuard<'a> {
    fn begin(feedback: &'a dyn UiFeedback, show: bool, text: &str) -> Self {
        if show {
            feedback.show_loading(text);
        }
        Self { feedback, active: show }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            self.feedback.hide_loading();
        }
    }
}

/// HTTP 请求服务
pub struct HttpService {
    config: HttpConfig,
    client: Client,
    session: SessionStore,
    feedback: Arc<dyn UiFeedback>,
}

impl HttpService {
    /// 创建请求服务。小程序环境下基地址必须为完整 URL，否则直接失败。
    pub fn new(
        config: HttpConfig,
        session: SessionStore,
        feedback: Arc<dyn UiFeedback>,
    ) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config("base_url is not configured".to_string()));
        }
        if config.env.requires_absolute_base_url() && !is_absolute_url(&config.base_url) {
            return Err(Error::Config(format!(
                "{} environment requires an absolute base URL, got {}",
                config.env, config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        info!(env = %config.env, base_url = %config.base_url, "HTTP service initialized");

        Ok(Self {
            config,
            client,
            session,
            feedback,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// 核心请求方法
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        let envelope = self.request_value(method, path, body, &config).await?;
        into_typed(envelope)
    }

    /// GET 请求
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::GET, path, None, config).await
    }

    /// POST 请求
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::POST, path, body, config).await
    }

    /// PUT 请求
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::PUT, path, body, config).await
    }

    /// DELETE 请求
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::DELETE, path, None, config).await
    }

    /// PATCH 请求
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::PATCH, path, body, config).await
    }

    async fn request_value(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        config: &RequestConfig,
    ) -> Result<ApiResponse<Value>> {
        let _loading =
            LoadingGuard::begin(self.feedback.as_ref(), config.show_loading, &config.loading_text);

        let mut url = self.build_url(path);
        if method == Method::GET && !config.params.is_empty() {
            url.push_str(&build_query_string(&config.params));
        }

        let headers = self.merged_headers(&config.headers);
        debug!(%method, %url, "Sending request");

        let mut builder = self.client.request(method, &url).headers(headers);
        if let Some(timeout) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let toast = if e.is_timeout() {
                    "请求超时，请检查网络连接"
                } else {
                    "网络连接失败"
                };
                let message = format!("Failed to reach {url}: {e}");
                self.notify_network_error(&message, toast, config.show_error);
                return Err(Error::Network(message));
            }
        };

        self.settle_response(response, &url, config.show_error).await
    }

    /// 统一处理响应：状态码检查、信封归一化和业务错误分发
    async fn settle_response(
        &self,
        response: reqwest::Response,
        url: &str,
        show_error: bool,
    ) -> Result<ApiResponse<Value>> {
        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {status} from {url}");
            self.notify_network_error(&message, "网络错误", show_error);
            return Err(Error::Network(message));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                let message = format!("Malformed response body from {url}: {e}");
                self.notify_network_error(&message, "网络错误", show_error);
                return Err(Error::Network(message));
            }
        };

        let envelope = normalize_envelope(body);
        if envelope.is_success() {
            debug!(code = envelope.code, %url, "Request succeeded");
            Ok(envelope)
        } else {
            self.apply_business_side_effect(&envelope, show_error);
            Err(Error::Api {
                code: envelope.code,
                message: envelope.message,
            })
        }
    }

    /// 文件上传：独立于通用请求的 multipart 形态，带进度回调
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file_path: impl Into<PathBuf>,
        field_name: &str,
        form_data: Vec<(String, String)>,
        config: RequestConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<ApiResponse<T>> {
        let _loading =
            LoadingGuard::begin(self.feedback.as_ref(), config.show_loading, &config.loading_text);

        let file_path = file_path.into();
        let url = self.build_url(path);

        // 上传不设置默认 content-type，由 multipart 编码决定
        let mut headers = HeaderMap::new();
        self.auth_headers(&mut headers);
        apply_extra_headers(&mut headers, &config.headers);

        let file = tokio::fs::File::open(&file_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to open {}: {e}", file_path.display())))?;
        let total = file.metadata().await.ok().map(|m| m.len());

        let stream = futures::stream::try_unfold((file, 0u64), move |(mut file, sent)| {
            let progress = progress.clone();
            async move {
                let mut buf = vec![0u8; 64 * 1024];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    return Ok::<_, std::io::Error>(None);
                }
                buf.truncate(n);
                let sent = sent + n as u64;
                if let Some(cb) = &progress {
                    cb(sent, total);
                }
                Ok(Some((buf, (file, sent))))
            }
        });

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in form_data {
            form = form.text(key, value);
        }
        let part =
            reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(stream)).file_name(file_name);
        form = form.part(field_name.to_string(), part);

        debug!(%url, "Uploading file");

        let mut builder = self.client.post(&url).headers(headers).multipart(form);
        if let Some(timeout) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout));
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = format!("Upload to {url} failed: {e}");
                self.notify_network_error(&message, "上传失败", config.show_error);
                return Err(Error::Network(message));
            }
        };

        let envelope = self.settle_response(response, &url, config.show_error).await?;
        into_typed(envelope)
    }

    /// 文件下载：流式写入临时文件，带进度回调
    pub async fn download(
        &self,
        path: &str,
        config: RequestConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResult> {
        let _loading =
            LoadingGuard::begin(self.feedback.as_ref(), config.show_loading, &config.loading_text);

        let url = self.build_url(path);
        let mut headers = HeaderMap::new();
        self.auth_headers(&mut headers);
        apply_extra_headers(&mut headers, &config.headers);

        debug!(%url, "Downloading file");

        let response = match self.client.get(&url).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = format!("Download from {url} failed: {e}");
                self.notify_network_error(&message, "下载失败", config.show_error);
                return Err(Error::Network(message));
            }
        };

        if response.status() != StatusCode::OK {
            let message = format!("HTTP {} from {url}", response.status());
            self.notify_network_error(&message, "下载失败", config.show_error);
            return Err(Error::Network(message));
        }

        let total = response.content_length();
        let temp_file_path = temp_download_path();
        let mut file = tokio::fs::File::create(&temp_file_path).await?;

        let mut received = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let message = format!("Download from {url} interrupted: {e}");
                    self.notify_network_error(&message, "下载失败", config.show_error);
                    return Err(Error::Network(message));
                }
            };
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(received, total);
            }
        }
        file.flush().await?;

        info!(%url, bytes = received, "Download completed");
        Ok(DownloadResult { temp_file_path })
    }

    fn build_url(&self, path: &str) -> String {
        if is_absolute_url(path) {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}/{}", self.config.base_url, path)
        }
    }

    /// 认证头：优先 Bearer token，仅有 identity 时退回自定义头
    fn auth_headers(&self, headers: &mut HeaderMap) {
        if let Some(token) = self.session.token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored token is not a valid header value"),
            }
        } else if let Some(identity_id) = self.session.identity_id() {
            match HeaderValue::from_str(&identity_id) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static("x-identity-id"), value);
                }
                Err(_) => warn!("Stored identity id is not a valid header value"),
            }
        }
    }

    fn merged_headers(&self, extra: &[(String, String)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.auth_headers(&mut headers);
        apply_extra_headers(&mut headers, extra);
        headers
    }

    fn apply_business_side_effect(&self, envelope: &ApiResponse<Value>, show_error: bool) {
        error!(code = envelope.code, message = %envelope.message, "Business error");

        match classify_business_code(envelope.code) {
            BusinessSideEffect::ExpireSession => {
                // 401 无条件清除会话；仅弹窗可被抑制
                self.session.clear();
                if show_error {
                    self.feedback.show_modal("登录已过期", "请重新登录后继续使用");
                }
            }
            BusinessSideEffect::PermissionToast => {
                if show_error {
                    self.feedback.show_toast("没有权限");
                }
            }
            BusinessSideEffect::NotFoundToast => {
                if show_error {
                    self.feedback.show_toast("资源不存在");
                }
            }
            BusinessSideEffect::MessageToast => {
                if show_error {
                    let text = if envelope.message.is_empty() {
                        "请求失败"
                    } else {
                        envelope.message.as_str()
                    };
                    self.feedback.show_toast(text);
                }
            }
        }
    }

    fn notify_network_error(&self, message: &str, toast: &str, show_error: bool) {
        error!("Network error: {message}");
        if show_error {
            self.feedback.show_toast(toast);
        }
    }
}

fn apply_extra_headers(headers: &mut HeaderMap, extra: &[(String, String)]) {
    for (key, value) in extra {
        match (HeaderName::try_from(key.as_str()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Skipping invalid header: {key}"),
        }
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn temp_download_path() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("study_client_{}_{nanos}.tmp", std::process::id()))
}
