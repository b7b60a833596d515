//! Database models split into domain-specific modules.

pub mod note;
pub mod session;
pub mod stats;
pub mod tag;
pub mod timer;
pub mod user;

pub use note::*;
pub use session::*;
pub use stats::*;
pub use tag::*;
pub use timer::*;
pub use user::*;
