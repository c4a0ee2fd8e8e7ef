use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::error::EtuError;
use crate::storage::Storage;

/// データディレクトリを上書きする環境変数。
pub const DATA_DIR_ENV: &str = "ETU_DATA_DIR";

/// データを保存するファイル名。
pub const STORE_FILE_NAME: &str = "etu.json";

/// デフォルトプロジェクトを保存するキー。
pub const DEFAULT_PROJECT_KEY: &str = "default-project";

pub const CURRENCY_KEY: &str = "currency";

/// ユーザーが設定できるキーと既定値。
pub const DEFAULTS: [(&str, &str); 1] = [(CURRENCY_KEY, "$")];

/// データファイルのパスを返す。
///
/// 環境変数`ETU_DATA_DIR`が設定されていればそのディレクトリ、なければOSのデータディレクトリ配下の`etu`を使う。
pub fn store_path() -> Result<PathBuf> {
    let dir = match env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .context("Couldn't find your data directory")?
            .join("etu"),
    };
    debug!("Data directory: {}", dir.display());

    Ok(dir.join(STORE_FILE_NAME))
}

/// 設定可能なキーかどうか確認する。
pub fn validate_key(key: &str) -> Result<&'static str, EtuError> {
    DEFAULTS
        .iter()
        .map(|(k, _)| *k)
        .find(|k| *k == key)
        .ok_or_else(|| EtuError::InvalidConfigKey(key.to_string()))
}

/// 既定値を返す。
pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// 未設定のキーに既定値を書き込む。
pub async fn setup_defaults<T: Storage>(storage: &T) -> Result<()> {
    for (key, value) in DEFAULTS {
        let current = storage
            .get_config_value(key)
            .await
            .with_context(|| format!("Failed to read config value: {}", key))?;
        if current.is_none() {
            info!("Setting default config value {} = {}", key, value);
            storage
                .set_config_value(key, value)
                .await
                .with_context(|| format!("Failed to write config value: {}", key))?;
        }
    }

    Ok(())
}

/// 通貨記号を取得する。未設定の場合は既定値を返す。
pub async fn currency<T: Storage>(storage: &T) -> Result<String> {
    let currency = storage
        .get_config_value(CURRENCY_KEY)
        .await
        .context("Failed to read currency")?;

    Ok(currency.unwrap_or_else(|| default_value(CURRENCY_KEY).unwrap_or("$").to_string()))
}
