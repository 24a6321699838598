pub mod cli;
pub mod editor;
pub mod errors;
pub mod loader;
pub mod settings;

use errors::FrontendError;
use hybrid_config::AppConfig;
use tracing::info;

pub use cli::CliOptions;

/// 以命令行模式运行一次：加载图纸、执行命令、按需保存。
pub fn run_cli(options: &CliOptions, config: &AppConfig) -> Result<(), FrontendError> {
    info!(command = options.command.as_deref().unwrap_or("-"), "启动 CLI 前端");
    cli::run(options, config)?;
    Ok(())
}
