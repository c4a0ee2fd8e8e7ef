use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::{self, DEFAULTS};
use crate::storage::Storage;

/// `config`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[clap(help = "Config key to set/get. Prints the current value if no value is supplied. Valid keys: currency")]
    key: Option<String>,

    #[clap(help = "The value to set `key` to.")]
    value: Option<String>,
}

pub struct ConfigCommand<'a, T: Storage> {
    storage: &'a T,
}

impl<'a, T: Storage> ConfigCommand<'a, T> {
    /// 新しい`ConfigCommand`を返す。
    pub fn new(storage: &'a T) -> Self {
        Self { storage }
    }

    /// 設定値を表示または変更する。
    ///
    /// キーも値も指定されない場合は全ての設定を表示する。
    pub async fn run<W: Write>(&self, args: ConfigArgs, writer: &mut W) -> Result<()> {
        match (args.key, args.value) {
            (Some(key), Some(value)) => {
                let key = config::validate_key(&key)?;
                self.storage
                    .set_config_value(key, &value)
                    .await
                    .with_context(|| format!("Failed to write config value: {}", key))?;
                writeln!(
                    writer,
                    "{}",
                    format!("Successfully set {} to {}", key, value).green()
                )?;
            }
            (Some(key), None) => {
                let key = config::validate_key(&key)?;
                self.show(key, writer).await?;
            }
            (None, _) => {
                for (key, _) in DEFAULTS {
                    self.show(key, writer).await?;
                }
            }
        }

        Ok(())
    }

    async fn show<W: Write>(&self, key: &str, writer: &mut W) -> Result<()> {
        let value = self
            .storage
            .get_config_value(key)
            .await
            .with_context(|| format!("Failed to read config value: {}", key))?
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "<nothing>".to_string());
        writeln!(writer, "{}: {}", key, value.cyan())?;
        Ok(())
    }
}
