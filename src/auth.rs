//! Auth-domain models: the installed auth context, audience construction, and token secrets.

pub mod audience;
pub mod context;
pub mod token;

pub use audience::*;
pub use context::*;
pub use token::*;
