mod command;
mod schedule;
mod status;
mod upload;

pub use command::*;
pub use schedule::*;
pub use status::*;
pub use upload::*;
