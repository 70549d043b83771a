pub mod canonical;
pub mod core;

pub use self::canonical::CanonicalMapping;
pub use self::core::{Collection, Record};
