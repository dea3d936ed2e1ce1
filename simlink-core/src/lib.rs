#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::unescaped_backticks)]

//! Core traits and types for simlink.

/// Common constants.
pub mod defined;
/// A interface to the simulation host.
pub mod link;
/// Messages exchanged with the host.
pub mod message;
