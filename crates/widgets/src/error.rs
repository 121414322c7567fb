use coordination::SwapError;
use shared::error::RequestError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Swap(#[from] SwapError),
}
