pub mod attendance;
pub mod model;
pub mod participation;
pub mod registry;

pub use attendance::{AccessCodeValidator, AttendanceReceipt};
pub use model::{Event, EventStatus, NewEvent, Participation, ParticipationStatus};
pub use participation::ParticipationStateMachine;
pub use registry::{EventRegistry, EventSummary, UserParticipation};
