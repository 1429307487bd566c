//! Live recognition worker and its PID-file supervision.
//!
//! The worker runs as a detached process. The PID file doubles as the stop
//! signal: removing it asks the worker to shut down on its next poll.

pub mod live;
pub mod pidfile;
pub mod source;
pub mod state;
pub mod supervisor;

pub use live::{LiveSettings, LiveWorker, StopReason};
pub use pidfile::{PidContents, PidFile, process_alive};
pub use source::{DirectorySource, Segment, SegmentSource};
pub use state::WorkerPaths;
pub use supervisor::{LiveStatus, WorkerSupervisor};
