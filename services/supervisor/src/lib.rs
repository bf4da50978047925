//! tempest supervisor.
//!
//! The worker-node end of an assignment push. A [`Supervisor`] keeps the
//! latest snapshot it was handed, whether that came in-process (local mode)
//! or over HTTP through [`api::router`].

pub mod api;
pub mod config;
pub mod server;
pub mod supervisor;
pub mod telemetry;

pub use config::Config;
pub use server::RunningServer;
pub use supervisor::Supervisor;
