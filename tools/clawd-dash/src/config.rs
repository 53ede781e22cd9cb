use crate::errors::DashError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_EMAIL_CHECK_COMMAND: &str =
    "/root/clawd/nightly-builds/unified-email-checker/check-emails";

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub agent_bin: Option<String>,
    pub refresh_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub refresh: RefreshConfig,
    pub actions: ActionsConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    pub binary: String,
    pub status_timeout_seconds: u64,
    pub cron_timeout_seconds: u64,
}

impl AgentConfig {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_seconds)
    }

    pub fn cron_timeout(&self) -> Duration {
        Duration::from_secs(self.cron_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshConfig {
    pub interval_seconds: u64,
    pub tick_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionsConfig {
    pub email_check_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryConfig {
    pub dir: PathBuf,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub max_file_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig {
                binary: "moltbot".to_string(),
                status_timeout_seconds: 8,
                cron_timeout_seconds: 8,
            },
            refresh: RefreshConfig {
                interval_seconds: 30,
                tick_millis: 250,
            },
            actions: ActionsConfig {
                email_check_command: DEFAULT_EMAIL_CHECK_COMMAND.to_string(),
            },
            memory: MemoryConfig {
                dir: PathBuf::from("/root/clawd/memory"),
                max_entries: 5,
            },
            logging: LoggingConfig {
                path: PathBuf::from(".cache/clawd-dash/dashboard.jsonl"),
                max_payload_bytes: 4096,
                max_file_bytes: 5 * 1024 * 1024,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    agent: Option<PartialAgentConfig>,
    refresh: Option<PartialRefreshConfig>,
    actions: Option<PartialActionsConfig>,
    memory: Option<PartialMemoryConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAgentConfig {
    binary: Option<String>,
    status_timeout_seconds: Option<u64>,
    cron_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialRefreshConfig {
    interval_seconds: Option<u64>,
    tick_millis: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialActionsConfig {
    email_check_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialMemoryConfig {
    dir: Option<PathBuf>,
    max_entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    max_file_bytes: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, DashError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let path = absolutize_path(process_cwd, path);
        if !fs.exists(&path) {
            return Err(DashError::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let file_contents = fs.read_to_string(&path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| DashError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    cfg.logging.path = absolutize_path(process_cwd, &cfg.logging.path);
    cfg.memory.dir = absolutize_path(process_cwd, &cfg.memory.dir);

    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(agent) = partial.agent {
        if let Some(binary) = agent.binary {
            cfg.agent.binary = binary;
        }
        if let Some(value) = agent.status_timeout_seconds {
            cfg.agent.status_timeout_seconds = value;
        }
        if let Some(value) = agent.cron_timeout_seconds {
            cfg.agent.cron_timeout_seconds = value;
        }
    }

    if let Some(refresh) = partial.refresh {
        if let Some(value) = refresh.interval_seconds {
            cfg.refresh.interval_seconds = value;
        }
        if let Some(value) = refresh.tick_millis {
            cfg.refresh.tick_millis = value;
        }
    }

    if let Some(actions) = partial.actions {
        if let Some(command) = actions.email_check_command {
            cfg.actions.email_check_command = command;
        }
    }

    if let Some(memory) = partial.memory {
        if let Some(dir) = memory.dir {
            cfg.memory.dir = dir;
        }
        if let Some(value) = memory.max_entries {
            cfg.memory.max_entries = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = path;
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
        if let Some(value) = logging.max_file_bytes {
            cfg.logging.max_file_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(binary) = &overrides.agent_bin {
        cfg.agent.binary = binary.clone();
    }
    if let Some(seconds) = overrides.refresh_seconds {
        cfg.refresh.interval_seconds = seconds;
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), DashError> {
    if cfg.agent.binary.trim().is_empty() {
        return Err(DashError::InvalidConfig(
            "agent.binary must not be empty".to_string(),
        ));
    }

    if cfg.agent.status_timeout_seconds == 0 || cfg.agent.cron_timeout_seconds == 0 {
        return Err(DashError::InvalidConfig(
            "agent timeouts must be greater than zero".to_string(),
        ));
    }

    if cfg.refresh.interval_seconds == 0 {
        return Err(DashError::InvalidConfig(
            "refresh.interval_seconds must be greater than zero".to_string(),
        ));
    }

    if cfg.refresh.tick_millis == 0 {
        return Err(DashError::InvalidConfig(
            "refresh.tick_millis must be greater than zero".to_string(),
        ));
    }

    if cfg.memory.max_entries == 0 {
        return Err(DashError::InvalidConfig(
            "memory.max_entries must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
