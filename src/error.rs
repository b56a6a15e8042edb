use std::fmt;

#[derive(Debug)]
pub enum CanvasError {
    Configuration(String),
    AssetLoad { url: String, message: String },
    Emission { key: Option<String>, message: String },
    Io(std::io::Error),
}

impl CanvasError {
    pub(crate) fn emission(key: Option<&str>, message: impl Into<String>) -> Self {
        CanvasError::Emission {
            key: key.map(str::to_string),
            message: message.into(),
        }
    }

    pub(crate) fn asset(url: &str, message: impl Into<String>) -> Self {
        CanvasError::AssetLoad {
            url: url.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CanvasError::Configuration(_) => "configuration",
            CanvasError::AssetLoad { .. } => "asset_load",
            CanvasError::Emission { .. } => "emission",
            CanvasError::Io(_) => "io",
        }
    }
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasError::Configuration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            CanvasError::AssetLoad { url, message } => {
                write!(f, "asset load failed for {}: {}", url, message)
            }
            CanvasError::Emission {
                key: Some(key),
                message,
            } => write!(f, "emission failed for {}: {}", key, message),
            CanvasError::Emission { key: None, message } => {
                write!(f, "emission failed: {}", message)
            }
            CanvasError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for CanvasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CanvasError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CanvasError {
    fn from(value: std::io::Error) -> Self {
        CanvasError::Io(value)
    }
}
