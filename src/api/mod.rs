pub mod catalogs;
pub mod routes;

pub use routes::{router, ApiState};
