use std::path::PathBuf;

use clap::Parser;
use hybrid_config::{AppConfig, ConfigError};
use hybrid_frontend::CliOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "hybrid-app", about = "多段线顶点元数据与编号气泡同步工具")]
struct Args {
    /// 配置文件路径，缺省时按 `HYBRID_CONFIG` 与 `./config/default.toml` 查找。
    #[arg(long)]
    config: Option<PathBuf>,

    /// 要打开的 JSON 图纸；缺省时使用配置中的图纸或内置示例。
    #[arg(long)]
    drawing: Option<PathBuf>,

    /// 执行的命令，如 `add_numbering`、`update_numbering`、`edit_vertex`。
    #[arg(long)]
    command: Option<String>,

    /// 命令参数，可重复。
    #[arg(long = "arg", allow_hyphen_values = true, requires = "command")]
    args: Vec<String>,

    /// 执行后保存图纸的路径。
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let config = load_configuration(args.config);
    init_logging(&config);
    info!("启动 Hybrid 顶点元数据工具");

    let options = CliOptions {
        drawing: args.drawing,
        command: args.command,
        args: args.args,
        save: args.save,
    };
    if let Err(err) = hybrid_frontend::run_cli(&options, &config) {
        error!(error = %err, "执行 CLI 命令失败");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. }
                    | ConfigError::Parse { path, .. }
                    | ConfigError::Invalid { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
