use async_trait::async_trait;

use super::format::{FrameFormat, PixelFormat};
use super::frame::Frame;
use super::packet::Packet;
use super::pcm::PcmBuffer;
use crate::error::{AvError, Result};

/// Turns packets into frames.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Decodes `packet`, handing any produced frame over through `frame`.
    ///
    /// `frame` must be empty on entry. Returns whether it was populated.
    async fn decode(&mut self, packet: &Packet, frame: &mut Frame) -> Result<bool>;
    /// Releases decoder state.
    fn close(&mut self);
}

/// Turns frames into packets.
#[async_trait]
pub trait FrameEncoder: Send + Sync {
    /// Encodes `frame`, returning any packets that are ready.
    async fn encode(&mut self, frame: &Frame) -> Result<Vec<Packet>>;
    /// Drains buffered output at end of stream.
    async fn flush(&mut self) -> Result<Vec<Packet>>;
    /// Releases encoder state.
    fn close(&mut self);
}

/// Converts pixel format and dimensions.
#[async_trait]
pub trait FrameScaler: Send + Sync {
    /// Writes `src` converted into `dst`. Implementations call
    /// [`prepare_scaler_destination`] before touching `dst`'s planes.
    async fn scale(&mut self, src: &Frame, dst: &mut Frame) -> Result<()>;
}

/// Converts sample format, rate and channel count.
#[async_trait]
pub trait AudioResampler: Send + Sync {
    /// Converts `nb_samples` samples from `input` planes into `output`,
    /// growing it with [`PcmBuffer::ensure_capacity`] as needed. Returns the
    /// number of samples written per channel.
    async fn resample(
        &mut self,
        input: &[&[u8]],
        nb_samples: usize,
        output: &mut PcmBuffer,
    ) -> Result<usize>;
    /// Releases resampler state.
    fn close(&mut self);
}

/// Readies `dst` to receive a scaled copy of `src`.
///
/// An empty `dst` gets the target format and dimensions and fresh buffers. A
/// populated one is reused if its shape already matches. Either way it takes
/// on `src`'s properties.
pub fn prepare_scaler_destination(
    src: &Frame,
    dst: &mut Frame,
    format: PixelFormat,
    width: usize,
    height: usize,
    align: usize,
) -> Result<()> {
    let target = Some(FrameFormat::Video(format));
    if dst.is_populated() {
        if dst.format != target || dst.width != width || dst.height != height {
            return Err(AvError::FormatMismatch(format!(
                "scaler destination is {:?} {}x{}, expected {} {}x{}",
                dst.format, dst.width, dst.height, format, width, height
            )));
        }
        dst.make_writable()?;
        dst.copy_props(src);
        return Ok(());
    }

    dst.format = target;
    dst.width = width;
    dst.height = height;
    dst.copy_props(src);
    dst.get_buffer(align)
}
