use std::env;
use std::io;

use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// ログレベルを上書きする環境変数。
pub const LOG_ENV: &str = "ETU_LOG";

/// `-v`の数からログレベルを決める。
///
/// 環境変数`ETU_LOG`に有効なレベルが設定されていればそちらを優先する。
pub fn level(verbosity: u64, env_level: Option<&str>) -> LevelFilter {
    if let Some(level) = env_level.and_then(|value| value.trim().parse::<LevelFilter>().ok()) {
        return level;
    }

    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// 標準エラー出力にログを出すように設定する。
pub fn init(verbosity: u64) -> Result<()> {
    let env_level = env::var(LOG_ENV).ok();
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level(verbosity, env_level.as_deref()))
        .chain(io::stderr())
        .apply()
        .context("Failed to initialize logger")
}
