//! Face detection over still images with a boosted Haar cascade.
//!
//! Bounded contexts follow a domain/infrastructure split: `decoding` turns
//! payload bytes into luminance, `detection` runs the cascade, and
//! `pipeline` ties the two together and schedules work on a worker pool.

pub mod decoding;
pub mod detection;
pub mod pipeline;
pub mod shared;
