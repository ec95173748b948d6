pub mod error;
pub mod provider;
pub mod simulated;
pub mod types;

pub use error::{PortfolioError, PortfolioResult};
pub use provider::PortfolioClient;
pub use simulated::SimulatedPortfolioClient;
pub use types::{OrderResult, OrderSide, OrderStatus, PortfolioRisk, Position, PositionSide, Trade};
