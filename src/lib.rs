//! Cell Replay - Playback and reaction analysis for particle simulation runs.
//!
//! This crate replays the output of a finished particle simulation: a
//! compressed, indexed frame archive plus a log of reaction events. Reaction
//! participants are not logged by the simulator, so they are reconstructed
//! from frame-to-frame differences and cached for later sessions.
//!
//! # Architecture
//!
//! - `schema`: Particle, reaction and configuration types
//! - `archive`: Frame index, random-access frame store and archive writer
//! - `reaction`: Reaction log parsing, reconstruction, cache and timeline
//! - `trajectory`: Level-of-detail particle trajectories
//! - `replay`: Playback session and renderer-ready display frames
//!
//! # Example
//!
//! ```rust,no_run
//! use cell_replay::{ReplayConfig, ReplaySession};
//!
//! let config = ReplayConfig::in_dir("run_output");
//! let mut session = ReplaySession::open(config)?;
//!
//! for _ in 0..session.frame_count() {
//!     for reaction in session.advance()? {
//!         println!("{}", reaction);
//!     }
//!     let display = session.display_frame(None)?;
//!     println!("frame {}: {} particles", display.frame, display.len());
//! }
//!
//! let path = session.trajectory(42, 0, 100, 0.5)?;
//! println!("{} vertices", path.vertices.len());
//! # Ok::<(), cell_replay::ReplayError>(())
//! ```

pub mod archive;
pub mod error;
pub mod reaction;
pub mod replay;
pub mod schema;
pub mod trajectory;

// Re-export commonly used types
pub use archive::{FrameIndex, FrameSource, FrameStore};
pub use error::{ReplayError, Result};
pub use reaction::{ReactionReconstructor, ReactionTimeline};
pub use replay::{DisplayFrame, ReplaySession};
pub use schema::{ParticleFrame, ParticleId, ReactionRecord, ReplayConfig, SpaceTransform};
pub use trajectory::{Trajectory, TrajectoryBuilder};
