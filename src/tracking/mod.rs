//! Visit and case progress inference.
//!
//! Everything here is derived from backend snapshots: the live poller for a
//! single visit, the five-stage stepper, the reopen trail and list tallies.

pub mod board;
pub mod display;
pub mod poller;
pub mod progress;
pub mod reopen;
pub mod route;
pub mod stages;

pub use board::{filter_cases, filter_visits, CaseBoard, VisitBoard, VisitFilter};
pub use poller::{ConfirmationStatus, PollOptions, PollPolicy, PollState, PollerHandle};
pub use progress::{load_case_progress, CaseProgress};
pub use reopen::{load_reopen_history, ReopenHistory};
pub use route::{format_duration, RouteEstimate, RouteEstimator, StraightLineEstimator};
pub use stages::{derive_stages, Stage, StageInputs, StageProgress, StageView};
