use std::path::PathBuf;

use anyhow::{Context, Result};
use citadel_idp::utils::logging;
use citadel_idp::{App, Config};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// 未设置 `APP_ENV` 时使用的环境
const DEFAULT_APP_ENV: &str = "local";

#[tokio::main]
async fn main() -> Result<()> {
    let (app_env, env_defaulted) = match std::env::var("APP_ENV") {
        Ok(env) if !env.trim().is_empty() => (env, false),
        _ => (DEFAULT_APP_ENV.to_string(), true),
    };
    let base_dir = match std::env::var("APP_BASE_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir().context("无法获取当前目录")?,
    };

    // 加载配置
    let config = Config::load(&base_dir, &app_env)
        .await
        .with_context(|| format!("加载 {} 环境配置失败", app_env))?;

    // 初始化日志
    logging::init(config.logging.verbose);
    if env_defaulted {
        warn!("未设置 APP_ENV，使用默认环境 '{}'", DEFAULT_APP_ENV);
    }
    info!(
        "配置文件: {}",
        Config::file_path(&base_dir, &app_env).display()
    );

    // Ctrl-C 只阻止开始新文档，进行中的文档会走到终态
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("收到 Ctrl-C，当前文档处理完成后退出");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("无法监听 Ctrl-C: {}", e),
        }
    });

    // 初始化并运行应用
    let app = App::initialize(config, shutdown_rx.clone()).await?;
    app.run(shutdown_rx).await?;

    Ok(())
}
