//! 翻译网关主程序入口

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use translate_gateway::{serve, GatewayConfig, Profile};

#[derive(Debug, Parser)]
#[command(name = "translate-gateway", version, about = "Rate-limited translation gateway")]
struct Cli {
    /// 配置文件路径，未指定时在当前目录中查找
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 部署预设，配置文件中出现的键覆盖预设的值
    #[arg(long, value_enum, default_value_t = Profile::PerClient)]
    profile: Profile,

    /// 覆盖监听地址
    #[arg(short, long)]
    bind: Option<String>,

    /// 覆盖监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，`RUST_LOG` 优先
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 写出所选预设的示例配置后退出
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(path) = &cli.generate_config {
        GatewayConfig::generate_example_config(path, cli.profile)?;
        println!("Example configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_file_with_profile(path, cli.profile)?,
        None => GatewayConfig::load_from_default_locations(cli.profile),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    serve(config).await?;
    Ok(())
}
