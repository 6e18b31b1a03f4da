use crate::utils::error::{Result, SyncError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// 連線設定：來源 (Evento) 與目標 (Moodle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub target: TargetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub endpoint: String,
    #[serde(default = "default_page_id")]
    pub page_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub endpoint: String,
    pub token: String,
    #[serde(default = "default_category")]
    pub course_category: i64,
    #[serde(default = "default_auth_method")]
    pub auth_method: String,
    #[serde(default = "default_enrol_method")]
    pub enrol_method: String,
    #[serde(default = "default_enabled_plugins")]
    pub enabled_plugins: Vec<String>,
    #[serde(default)]
    pub tagging_enabled: bool,
    pub timeout_seconds: Option<u64>,
    /// role shortname -> role id
    #[serde(default = "default_roles")]
    pub roles: HashMap<String, i64>,
}

fn default_page_id() -> String {
    "moodle".to_string()
}

fn default_namespace() -> String {
    "tx_htwmoodledata_pi1".to_string()
}

fn default_category() -> i64 {
    1
}

fn default_auth_method() -> String {
    "shibboleth".to_string()
}

fn default_enrol_method() -> String {
    "manual".to_string()
}

fn default_enabled_plugins() -> Vec<String> {
    vec!["manual".to_string()]
}

/// Role ids of a stock Moodle installation.
pub fn default_roles() -> HashMap<String, i64> {
    [
        ("manager", 1),
        ("coursecreator", 2),
        ("editingteacher", 3),
        ("teacher", 4),
        ("student", 5),
        ("guest", 6),
        ("user", 7),
        ("frontpage", 8),
    ]
    .into_iter()
    .map(|(name, id)| (name.to_string(), id))
    .collect()
}

impl SyncConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MOODLE_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SyncError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("source.endpoint", &self.source.endpoint)?;
        validation::validate_non_empty_string("source.page_id", &self.source.page_id)?;
        validation::validate_url("target.endpoint", &self.target.endpoint)?;
        validation::validate_non_empty_string("target.token", &self.target.token)?;
        validation::validate_positive_number(
            "target.course_category",
            self.target.course_category,
            1,
        )?;
        validation::validate_non_empty_string("target.enrol_method", &self.target.enrol_method)?;

        // 未替換的環境變數代表設定不完整
        if self.target.token.starts_with("${") {
            return Err(SyncError::MissingConfigError {
                field: self.target.token.clone(),
            });
        }

        Ok(())
    }
}
