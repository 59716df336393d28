pub mod models;
pub mod store;

pub use models::{AuctionRow, SaleRow};
pub use store::Store;
