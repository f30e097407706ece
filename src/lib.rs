// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration-driven SOME/IP and SOME/IP-Service-Discovery runtime,
//! conforming to AUTOSAR R22-11 (PRS_SOMEIPProtocol, PRS_SOMEIPServiceDiscoveryProtocol).
//!
//! The crate is organized around four layers:
//!
//! - [`wire`]: the SOME/IP header, primitive (de)serialization helpers, and
//!   SOME/IP-TP segmentation/reassembly.
//! - [`sd`]: Service Discovery — entries, options, the cyclic offer
//!   scheduler, the discovery cache, and eventgroup subscription tracking.
//! - [`config`]: the JSON configuration model and loader that resolves
//!   interface/endpoint/service topology before the runtime starts.
//! - [`transport`] and [`reactor`]: socket construction and the
//!   single-threaded mio event loop behind the public [`Runtime`] facade.

pub mod config;
pub mod error;
pub mod logging;
pub mod reactor;
pub mod sd;
pub mod session;
pub mod transport;
pub mod wire;

pub use error::{Error, Result};
pub use logging::{ConsoleLogger, Level, Logger};
pub use reactor::{Handler, Runtime};
