pub mod scheduler;
pub mod session;
pub mod transitions;

pub use crate::domain::model::{
    AttendanceStatus, InstanceId, OpenSwap, RoutineEntry, ShiftInstance, ShiftStatus, SwapId,
    SwapRequest, SwapStatus, Volunteer, VolunteerId,
};
pub use crate::domain::ports::{RegistryStore, ScheduleStore, Storage, SwapStore};
pub use crate::utils::error::Result;
pub use scheduler::{CheckInOutcome, ClaimOutcome, Scheduler};
pub use session::{Session, SessionManager, SessionScheduler};
