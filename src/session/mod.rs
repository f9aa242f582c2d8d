//! Recording session state machine
//!
//! Shared between the monitoring thread (writer of the recording flag and
//! chip timers) and the control loop (consumer of stop requests).
//!
//! ## Phases
//!
//! ```text
//! ┌──────┐  open   ┌───────────────────────┐  chip held ≥ 3s  ┌─────────────────────┐
//! │ IDLE │────────►│ RECORDING_UNCONFIRMED │─────────────────►│ RECORDING_CONFIRMED │
//! └──────┘         └───────────────────────┘   (notify once)  └─────────────────────┘
//!    ▲                   │        ▲                                     │
//!    │                   └────────┘                                     │ 2s after
//!    │               non-chip clears timer                              ▼ confirmation
//!    │                                                            ┌──────────┐
//!    └────────────────────── control loop consumes stop ──────────│ STOPPING │
//!                                                                 └──────────┘
//! ```
//!
//! There is no terminal phase; the process-wide termination flag in
//! [`SharedSession`] ends the loops.

pub mod machine;
pub mod shared;
pub mod state;

pub use machine::SessionMachine;
pub use shared::{SharedSession, WaitOutcome};
pub use state::{SessionEvent, SessionPhase, SessionState, SessionStatus};
