use thiserror::Error;

use crate::responder::ResponderError;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("flush on shutdown failed: {0}")]
    Flush(#[source] ResponderError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
