//! Simulator run orchestration.
//!
//! [`RunOrchestrator`] writes the simulator config, spawns the simulator,
//! and hands the process to a background task that waits for exit or a
//! cancel signal. After a clean, uncancelled exit the same task runs
//! discovery, ingestion and export, reporting progress through a
//! [`RunObserver`](observer::RunObserver).

pub mod handle;
pub mod observer;
pub mod pipeline;
pub mod process;
pub mod runner;

pub use observer::ChannelObserver;
pub use pipeline::PipelineOptions;
pub use process::CommandLauncher;
pub use runner::RunOrchestrator;
