//! # Frames and media properties
//!
//! [`Frame`] is the unit of decoded media. Its planes live in
//! [`BufferRef`](crate::buffer::BufferRef)s, so cloning a frame with
//! [`Frame::try_clone`] shares the pixel or sample memory instead of copying it.
//!
//! ```rust
//! use avcore::av::{Frame, FrameFormat, PixelFormat};
//!
//! # fn main() -> avcore::Result<()> {
//! let mut frame = Frame::new();
//! frame.format = Some(FrameFormat::Video(PixelFormat::Yuv420p));
//! frame.width = 64;
//! frame.height = 48;
//! frame.get_buffer(0)?;
//!
//! let shared = frame.try_clone()?;
//! assert!(!frame.is_writable());
//! drop(shared);
//! frame.plane_mut(0)?.fill(16);
//! # Ok(())
//! # }
//! ```

mod channel;
mod codec;
mod dict;
mod format;
mod frame;
mod frame_pool;
mod packet;
mod pcm;
mod rational;
mod side_data;

pub use channel::*;
pub use codec::*;
pub use dict::*;
pub use format::*;
pub use frame::*;
pub use frame_pool::*;
pub use packet::*;
pub use pcm::*;
pub use rational::*;
pub use side_data::*;
