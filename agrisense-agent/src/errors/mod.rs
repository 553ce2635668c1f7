pub mod app;
pub mod artifact;
pub mod collect;
pub mod link;
pub mod parse;
pub mod remote;
pub mod schedule;
pub mod upload;

pub use app::AppError;
pub use artifact::ArtifactError;
pub use collect::{CollectError, ErrorKind};
pub use link::LinkError;
pub use parse::ParseError;
pub use remote::RemoteError;
pub use schedule::ScheduleError;
pub use upload::UploadError;
