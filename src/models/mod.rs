mod directory;
mod profile;
mod user;

pub use directory::*;
pub use profile::*;
pub use user::*;
