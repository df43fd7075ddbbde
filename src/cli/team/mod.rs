//! Team vault commands.

mod create;
mod join;
mod leave;
mod list;

pub use create::execute as create;
pub use join::execute as join;
pub use leave::execute as leave;
pub use list::execute as list;
