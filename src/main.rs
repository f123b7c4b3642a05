//! # Cache Gateway 主程序

use cache_gateway::{
    Result,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    server,
};
use clap::Parser;
use std::path::PathBuf;

/// 带响应缓存的 HTTP 反向代理网关
#[derive(Debug, Parser)]
#[command(name = "cache-gateway", version, about)]
struct Cli {
    /// 配置文件路径（默认读取 GATEWAY_CONFIG_PATH）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，RUST_LOG 存在时以 RUST_LOG 为准
    #[arg(long)]
    log_level: Option<String>,

    /// 覆盖监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 打印日志配置说明后退出
    #[arg(long)]
    logging_help: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.logging_help {
        logging::print_logging_help();
        return Ok(());
    }

    logging::init_logging(cli.log_level.as_deref());

    let config_manager = ConfigManager::load(cli.config.as_deref())?;
    let mut config = config_manager.config().as_ref().clone();
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        version = cache_gateway::GATEWAY_VERSION,
        port = config.server.port
    );

    if let Err(e) = server::run(config).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}
