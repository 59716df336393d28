pub mod builder;
pub mod stars;
pub mod tokens;

pub use builder::build_signature;
pub use tokens::{merge_signature, Signature};
