mod auth;
mod case_insensitive_string_ext;
mod error;
mod memory;
mod password;
mod routes;
mod token;
mod types;

pub use auth::*;
pub use error::*;
pub use memory::*;
pub use password::*;
pub use routes::*;
pub use token::*;
pub use types::*;
