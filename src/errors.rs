use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    #[error("could not resolve user home/config directory")]
    #[diagnostic(
        code(locbridge::config::paths),
        help("Set HOME, then retry `locbridge status`.")
    )]
    HomeDirUnavailable,

    #[error("failed to load config")]
    #[diagnostic(
        code(locbridge::config::load),
        help("Fix the config file syntax or run `locbridge init` to rewrite a template.")
    )]
    ConfigLoad,

    #[error("failed to prepare config directory: {0}")]
    #[diagnostic(code(locbridge::config::mkdir))]
    CreateConfigDir(String),

    #[error("failed to write config file: {0}")]
    #[diagnostic(code(locbridge::config::write))]
    WriteConfig(String),

    #[error("failed to serialize config")]
    #[diagnostic(code(locbridge::config::serialize))]
    ConfigSerialize,

    #[error("host runtime socket unavailable")]
    #[diagnostic(
        code(locbridge::host::socket_unavailable),
        help("Start the host runtime, or point `socket_path` at its socket.")
    )]
    HostUnavailable,

    #[error("host connection closed")]
    #[diagnostic(code(locbridge::host::closed))]
    HostClosed,

    #[error("host sent an unexpected frame: {0}")]
    #[diagnostic(code(locbridge::host::frame))]
    HostFrame(String),

    #[error("configuration response is not valid percent-encoded UTF-8")]
    #[diagnostic(code(locbridge::configuration::decode))]
    ConfigResponseDecode,

    #[error("failed to parse configuration response JSON")]
    #[diagnostic(code(locbridge::configuration::parse))]
    ConfigResponseParse(#[source] serde_json::Error),

    #[error("configuration response is not a JSON object")]
    #[diagnostic(code(locbridge::configuration::shape))]
    ConfigResponseShape,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Transport breakdowns end the bridge run; everything else is logged and
    /// the event loop keeps serving later events.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::HostUnavailable
                | AppError::HostClosed
                | AppError::HostFrame(_)
                | AppError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
