//! Error types for container providers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to connect to container runtime: {0}")]
    ConnectionError(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Container runtime error: {0}")]
    RuntimeError(String),

    #[error("Attach failed: {0}")]
    AttachError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<bollard::errors::Error> for ProviderError {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match e {
            Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => Self::ContainerNotFound(message),
            Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => Self::Conflict(message),
            Error::DockerResponseServerError {
                status_code,
                message,
            } => Self::RuntimeError(format!("{} (status {})", message, status_code)),
            Error::IOError { err } => Self::IoError(err),
            other => Self::RuntimeError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_not_found_maps_to_container_not_found() {
        let err: ProviderError = server_error(404, "No such container: api").into();
        assert!(matches!(err, ProviderError::ContainerNotFound(ref m) if m.contains("api")));
    }

    #[test]
    fn test_conflict_maps_to_conflict() {
        let err: ProviderError = server_error(409, "name \"/api\" is already in use").into();
        assert!(matches!(err, ProviderError::Conflict(_)));
    }

    #[test]
    fn test_other_status_keeps_code() {
        let err: ProviderError = server_error(500, "boom").into();
        assert_eq!(err.to_string(), "Container runtime error: boom (status 500)");
    }
}
