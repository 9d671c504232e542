//! 学习客户端 CLI 工具

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_client_core::{
    ApiClient, AuthService, Error, FileStorage, HostEnv, HttpAuthGateway, HttpConfig,
    HttpService, Platform, Profile, Result, SessionStore, UiFeedback,
};

#[derive(Parser)]
#[command(name = "study-client")]
#[command(about = "学习客户端命令行工具", long_about = None)]
struct Cli {
    /// 服务器地址
    #[arg(short, long, default_value = "http://127.0.0.1:3000/api")]
    server: String,

    /// 状态目录（会话按字段保存为独立文件）
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 登录（code 由开发者工具获取后传入）
    Login {
        /// 一次性登录凭证
        #[arg(short, long)]
        code: String,
    },
    /// 登出
    Logout,
    /// 查看登录状态
    Status,
    /// 校验会话
    CheckSession,
    /// 获取分类列表
    Categories {
        /// 返回数量
        #[arg(short, long, default_value_t = 8)]
        limit: u32,
    },
    /// 获取知识点列表
    Knowledge {
        /// 分类
        #[arg(short, long)]
        category: Option<String>,
        /// 难度
        #[arg(short, long)]
        difficulty: Option<String>,
        /// 搜索关键词（传入时走搜索接口）
        #[arg(short, long)]
        keyword: Option<String>,
    },
    /// 获取练习列表
    Practice {
        /// 练习类型
        #[arg(short = 't', long)]
        practice_type: Option<String>,
        /// 难度
        #[arg(short, long)]
        difficulty: Option<String>,
    },
    /// 获取用户信息
    UserInfo,
    /// 获取学习统计
    Stats,
}

/// CLI 宿主适配：登录 code 由命令行参数带入
struct CliPlatform {
    code: Option<String>,
}

#[async_trait::async_trait]
impl Platform for CliPlatform {
    fn env(&self) -> HostEnv {
        HostEnv::Weapp
    }

    async fn login_code(&self) -> Result<String> {
        self.code
            .clone()
            .ok_or_else(|| Error::Platform("no login code supplied".to_string()))
    }

    async fn check_session(&self) -> Result<()> {
        // CLI 没有宿主级会话，视为有效，交由服务端校验
        Ok(())
    }

    async fn request_user_profile(&self, _desc: &str) -> Result<Profile> {
        Err(Error::Platform("CLI 环境不支持用户授权".to_string()))
    }
}

/// 终端反馈：提示直接打印
struct TermFeedback;

impl UiFeedback for TermFeedback {
    fn show_loading(&self, text: &str) {
        println!("{text}");
    }

    fn hide_loading(&self) {}

    fn show_toast(&self, text: &str) {
        println!("{text}");
    }

    fn show_modal(&self, title: &str, content: &str) {
        println!("{title}: {content}");
    }
}

struct App {
    auth: AuthService,
    api: ApiClient,
}

fn build_app(server: &str, state_dir: &Path, code: Option<String>) -> anyhow::Result<App> {
    let storage = Arc::new(FileStorage::new(state_dir)?);
    let session = SessionStore::new(storage);

    let config = HttpConfig {
        base_url: server.to_string(),
        env: HostEnv::Weapp,
        ..HttpConfig::default()
    };
    let http = Arc::new(HttpService::new(
        config,
        session.clone(),
        Arc::new(TermFeedback),
    )?);

    let gateway = Arc::new(HttpAuthGateway::new(http.clone()));
    let auth = AuthService::new(
        Arc::new(CliPlatform { code }),
        session,
        gateway,
        Arc::new(TermFeedback),
    );

    Ok(App {
        auth,
        api: ApiClient::new(http),
    })
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".study-client"))
        .unwrap_or_else(|| PathBuf::from(".study-client"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let state_dir = cli.state_dir.clone().unwrap_or_else(default_state_dir);

    let code = match &cli.command {
        Commands::Login { code } => Some(code.clone()),
        _ => None,
    };
    let app = build_app(&cli.server, &state_dir, code)?;

    match cli.command {
        Commands::Login { .. } => {
            do_login(&app).await?;
        }
        Commands::Logout => {
            do_logout(&app).await;
        }
        Commands::Status => {
            do_status(&app);
        }
        Commands::CheckSession => {
            do_check_session(&app).await;
        }
        Commands::Categories { limit } => {
            do_categories(&app, limit).await?;
        }
        Commands::Knowledge {
            category,
            difficulty,
            keyword,
        } => {
            do_knowledge(&app, category, difficulty, keyword).await?;
        }
        Commands::Practice {
            practice_type,
            difficulty,
        } => {
            do_practice(&app, practice_type, difficulty).await?;
        }
        Commands::UserInfo => {
            do_user_info(&app).await?;
        }
        Commands::Stats => {
            do_stats(&app).await?;
        }
    }

    Ok(())
}

async fn do_login(app: &App) -> anyhow::Result<()> {
    println!("正在登录...");

    let session = app.auth.login().await?;

    println!("登录成功!");
    println!("用户标识: {}", session.identity_id);
    if let Some(token) = &session.token {
        println!("Token: {token}");
    }
    println!("会话已保存到状态目录");

    Ok(())
}

async fn do_logout(app: &App) {
    println!("正在登出...");
    app.auth.logout().await;
}

fn do_status(app: &App) {
    match app.auth.stored_session() {
        Some(session) => {
            println!("已登录");
            println!("用户标识: {}", session.identity_id);
            if let Some(union_id) = &session.union_id {
                println!("UnionId: {union_id}");
            }
            if let Some(profile) = &session.profile {
                println!("昵称: {}", profile.display_name);
            }
        }
        None => {
            println!("未登录");
        }
    }
}

async fn do_check_session(app: &App) {
    if app.auth.check_session().await {
        println!("会话有效");
    } else {
        println!("会话已失效，请重新登录");
    }
}

async fn do_categories(app: &App, limit: u32) -> anyhow::Result<()> {
    let response = app.api.category.get_categories(limit).await?;

    let categories = response.data.unwrap_or_default();
    println!("共 {} 个分类:", categories.len());
    for category in categories {
        println!("  {} ({})", category.name, category.id);
    }

    Ok(())
}

async fn do_knowledge(
    app: &App,
    category: Option<String>,
    difficulty: Option<String>,
    keyword: Option<String>,
) -> anyhow::Result<()> {
    let response = match keyword {
        Some(keyword) => app.api.knowledge.search_knowledge(&keyword).await?,
        None => {
            app.api
                .knowledge
                .get_knowledge_points(category, difficulty)
                .await?
        }
    };

    let points = response.data.unwrap_or_default();
    println!("共 {} 个知识点:", points.len());
    for point in points {
        println!("  [{}] {} - 约 {} 分钟", point.difficulty, point.title, point.estimated_time);
    }

    Ok(())
}

async fn do_practice(
    app: &App,
    practice_type: Option<String>,
    difficulty: Option<String>,
) -> anyhow::Result<()> {
    let response = app
        .api
        .practice
        .get_practice_list(practice_type, difficulty)
        .await?;

    let items = response.data.unwrap_or_default();
    println!("共 {} 个练习:", items.len());
    for item in items {
        let state = if item.completed { "已完成" } else { "未完成" };
        println!("  [{}] {} ({state})", item.difficulty, item.title);
    }

    Ok(())
}

async fn do_user_info(app: &App) -> anyhow::Result<()> {
    let response = app.api.user.get_user_info().await?;

    match response.data {
        Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
        None => println!("暂无用户信息"),
    }

    Ok(())
}

async fn do_stats(app: &App) -> anyhow::Result<()> {
    let response = app.api.user.get_user_stats().await?;

    match response.data {
        Some(stats) => {
            println!("学习天数: {}", stats.study_days);
            println!("完成练习: {}", stats.completed_practices);
            println!("累计时长: {} 分钟", stats.total_minutes);
        }
        None => println!("暂无统计数据"),
    }

    Ok(())
}
