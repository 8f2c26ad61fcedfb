#![doc(html_root_url = "https://docs.rs/avcore/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # avcore - reference-counted media buffers and frames
//!
//! `avcore` is the memory model underneath a media pipeline. Decoders,
//! scalers, resamplers and encoders pass the same pixel and sample memory
//! between stages without copying it, and that memory is freed (or recycled)
//! the moment its last holder lets go.
//!
//! ## Features
//!
//! - [`BufferRef`](buffer::BufferRef): shared views into one allocation, with
//!   a release callback that runs exactly once and copy-on-write mutation
//! - [`BufferPool`](buffer::BufferPool): recycled fixed-size allocations that
//!   stay valid after the pool's owner goes away
//! - [`Frame`](av::Frame): planes, timestamps, color properties, metadata and
//!   side data, with cheap reference cloning and deep copy on request
//! - [`ChannelLayout`](av::ChannelLayout): native, custom and ambisonic
//!   channel orders
//! - Typed side data through [`SideDataRegistry`](av::SideDataRegistry)
//!
//! ## Quick Start
//!
//! ```rust
//! use avcore::av::{ChannelLayout, Frame, FrameFormat, SampleFormat};
//! use avcore::buffer::BufferPool;
//!
//! # fn main() -> avcore::Result<()> {
//! let pool = BufferPool::new(8192);
//!
//! let mut frame = Frame::new();
//! frame.format = Some(FrameFormat::Audio(SampleFormat::F32p));
//! frame.nb_samples = 1024;
//! frame.ch_layout = ChannelLayout::default_for(2)?;
//! frame.get_buffer_with(0, pool.allocator())?;
//!
//! let copy = frame.try_clone()?;
//! frame.unref();
//! assert_eq!(copy.nb_planes(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `buffer`: raw buffers, views and pools
//! - `av`: frames, packets, formats, channel layouts, side data and the
//!   collaborator traits for decoders, encoders, scalers and resamplers
//! - `config`: process-wide allocation defaults
//! - `error`: the crate error type

/// Frames, packets and media properties
pub mod av;

/// Reference-counted buffers and pools
pub mod buffer;

/// Error types and utilities
pub mod error;

/// Configuration module
pub mod config;

pub use error::{AvError, Result};
