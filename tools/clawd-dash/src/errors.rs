use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("program not found: {0}")]
    ProgramNotFound(String),
    #[error("process timed out: {0}")]
    Timeout(String),
    #[error("unreadable output: {0}")]
    Unreadable(String),
    #[error("terminal error: {0}")]
    Terminal(String),
}
