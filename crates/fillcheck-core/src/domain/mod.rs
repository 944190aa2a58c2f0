pub mod asset;
pub mod bar;
pub mod lot;
pub mod timestamp;

pub use asset::{AssetClass, TradeSide};
pub use bar::{Bar, BarSeries};
pub use lot::Lot;
pub use timestamp::UtcDateTime;
