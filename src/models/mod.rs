pub mod bin;
pub mod user;

pub use bin::*;
pub use user::*;
