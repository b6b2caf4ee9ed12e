use clap::Parser;
use pulse_config::ConfigLoader;
use pulse_server::{logging::init_logging, App};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pulse telemetry collector")]
struct Args {
    /// 配置文件路径，文件不存在时使用默认值
    #[arg(short, long, default_value = "pulse.toml")]
    config: PathBuf,

    /// 打印合并后的配置并退出
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ConfigLoader::new(&args.config).load()?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    info!(config = %args.config.display(), "Starting pulse collector");

    App::build(config)?.run().await
}
