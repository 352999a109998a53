//! Door-side check-in: scanning sessions and the coordinator that admits guests.

pub mod coordinator;
pub mod driver;
pub mod registry;
pub mod session;

pub use coordinator::{CheckInCoordinator, ScanSettings, SessionSnapshot};
pub use registry::{FeedStatus, ScanSessionRegistry};
pub use session::{ScanPhase, ScanReport};
