use super::format::SampleFormat;
use crate::buffer::{unref, BufferRef};
use crate::error::{AvError, Result};

/// A reusable block of PCM samples, the currency of resamplers.
///
/// Every plane lives in one backing buffer at `i * linesize`.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Number of channels.
    pub channels: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Sample format.
    pub format: SampleFormat,
    /// Capacity in samples per channel.
    pub max_nb_samples: usize,
    /// Valid samples per channel.
    pub nb_samples: usize,
    /// Timestamp of the first sample.
    pub pts: Option<i64>,
    /// Duration of the valid samples.
    pub duration: Option<i64>,
    /// Bytes per plane.
    pub linesize: usize,
    data: Option<BufferRef>,
}

impl PcmBuffer {
    /// An empty buffer with no storage.
    pub fn new(channels: usize, sample_rate: u32, format: SampleFormat) -> Self {
        PcmBuffer {
            channels,
            sample_rate,
            format,
            max_nb_samples: 0,
            nb_samples: 0,
            pts: None,
            duration: None,
            linesize: 0,
            data: None,
        }
    }

    /// One plane per channel for planar formats, otherwise one.
    pub fn nb_planes(&self) -> usize {
        if self.format.is_planar() {
            self.channels
        } else {
            1
        }
    }

    /// Makes room for `nb_samples` samples per channel.
    ///
    /// Keeps the current allocation when it is large enough for the current
    /// channel count and format; otherwise releases it and allocates anew.
    /// Returns whether a new buffer was allocated.
    pub fn ensure_capacity(&mut self, nb_samples: usize) -> Result<bool> {
        let current = self.format.plane_size(self.channels, self.max_nb_samples);
        let fits = match (&self.data, current) {
            (Some(buf), Some(linesize)) => {
                nb_samples <= self.max_nb_samples
                    && linesize == self.linesize
                    && buf.len() == linesize * self.nb_planes()
            }
            _ => false,
        };
        if fits {
            return Ok(false);
        }

        unref(&mut self.data);
        self.max_nb_samples = 0;
        self.linesize = 0;

        let planes = self.nb_planes();
        let (linesize, total) = self
            .format
            .plane_size(self.channels, nb_samples)
            .and_then(|ls| Some((ls, ls.checked_mul(planes)?)))
            .ok_or_else(|| AvError::oom(usize::MAX))?;
        self.data = Some(BufferRef::alloc(total)?);
        self.linesize = linesize;
        self.max_nb_samples = nb_samples;
        log::trace!(
            "pcm buffer resized to {} samples x {} planes",
            nb_samples,
            self.nb_planes()
        );
        Ok(true)
    }

    /// The backing buffer, if allocated.
    pub fn buffer(&self) -> Option<&BufferRef> {
        self.data.as_ref()
    }

    /// Hands the backing buffer to the caller, leaving no capacity behind.
    pub fn take_buffer(&mut self) -> Option<BufferRef> {
        self.max_nb_samples = 0;
        self.data.take()
    }

    /// Bytes of plane `index`, `linesize` long.
    pub fn plane(&self, index: usize) -> Result<&[u8]> {
        let (start, end) = self.plane_range(index)?;
        let buf = self
            .data
            .as_ref()
            .ok_or_else(|| AvError::InvalidState("pcm buffer has no storage".into()))?;
        Ok(&buf.data()[start..end])
    }

    /// Writable plane bytes, copying a shared buffer first.
    pub fn plane_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        let (start, end) = self.plane_range(index)?;
        let buf = self
            .data
            .as_mut()
            .ok_or_else(|| AvError::InvalidState("pcm buffer has no storage".into()))?;
        Ok(&mut buf.make_mut()?[start..end])
    }

    fn plane_range(&self, index: usize) -> Result<(usize, usize)> {
        let planes = self.nb_planes();
        if index >= planes {
            return Err(AvError::OutOfRange { index, len: planes });
        }
        let start = index * self.linesize;
        Ok((start, start + self.linesize))
    }

    /// Drops the storage and resets the capacity.
    pub fn release(&mut self) {
        unref(&mut self.data);
        self.max_nb_samples = 0;
        self.nb_samples = 0;
        self.linesize = 0;
    }
}
