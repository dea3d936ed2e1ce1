#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::unescaped_backticks)]

//! A client for driving a running simulation host.
//!
//! A [`Connection`] wraps a [`Link`](simlink_core::link::Link) and exchanges one command and one
//! ack at a time. On top of it sit the ad-hoc poll lifecycle, shared memory regions for bulk
//! sensor data, the sensor capability traits in [`sensor`] and the host APIs in [`api`].

mod adhoc;
/// Host APIs grouped by concern.
pub mod api;
mod connection;
/// Errors.
pub mod error;
/// Links.
pub mod link;
mod option;
/// Common imports.
pub mod prelude;
mod protocol;
/// Sensors and their capabilities.
pub mod sensor;
mod shm;

pub use simlink_core as core;

pub use adhoc::{RequestId, RequestState};
pub use connection::{Connection, CorrelationId};
pub use option::ConnectionOption;
pub use shm::SharedMemoryHandle;
