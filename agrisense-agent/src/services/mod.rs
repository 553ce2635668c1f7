mod artifact_service;
mod collector_service;
mod link_service;
mod parser_service;
mod port_service;
mod remote_service;
mod schedule_service;
mod upload_service;

pub use artifact_service::*;
pub use collector_service::*;
pub use link_service::*;
pub use parser_service::*;
pub use port_service::*;
pub use remote_service::*;
pub use schedule_service::*;
pub use upload_service::*;
