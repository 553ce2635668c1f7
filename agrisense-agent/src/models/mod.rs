mod collection_result;
mod schedule_policy;
mod sensor_record;
mod sensor_role;

pub use collection_result::*;
pub use schedule_policy::*;
pub use sensor_record::*;
pub use sensor_role::*;
