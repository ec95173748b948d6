use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("no open position for {0}")]
    NoOpenPosition(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

pub type PortfolioResult<T> = Result<T, PortfolioError>;
