use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("a reload for plugin '{0}' is already in progress")]
    DuplicateReload(String),
    #[error("no reload operation with id '{0}'")]
    NotFound(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("reload failed at step '{step}': {message}")]
    StepFailed { step: &'static str, message: String },
    #[error(transparent)]
    Registry(#[from] gateway_registry::registry::RegistryError),
}
