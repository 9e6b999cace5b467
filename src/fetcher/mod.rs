pub mod eia;
pub mod traits;

pub use eia::EiaFetcher;
pub use traits::PriceFeed;
