// src/exec/mod.rs

//! Execution environment plumbing.
//!
//! - [`transport`] defines the `ExecTransport` trait, the `Session` handle
//!   and the output `LineSink`.
//! - [`docker`] is the production transport built on `docker exec`.
//! - [`drain`] forwards session output while a step runs.
//! - [`kill`] signals every process in the environment except PID 1.
//! - [`ports`] computes host URIs for published container ports.

pub mod docker;
pub mod drain;
pub mod kill;
pub mod ports;
pub mod transport;

pub use docker::DockerTransport;
pub use drain::OutputDrain;
pub use kill::{kill_all, kill_command};
pub use ports::{exposed_port_maps, PortMap};
pub use transport::{BoxFuture, ExecTransport, LineSink, Session, StdoutSink};
