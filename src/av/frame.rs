use smallvec::SmallVec;

use super::channel::ChannelLayout;
use super::dict::Dictionary;
use super::format::{
    ChromaLocation, ColorPrimaries, ColorRange, ColorSpace, ColorTransfer, DecodeErrorFlags,
    FrameFlags, FrameFormat, PictureType,
};
use super::pcm::PcmBuffer;
use super::rational::Rational;
use super::side_data::{SideData, SideDataPayload, SideDataType};
use crate::buffer::{BufferRef, Opaque};
use crate::error::{AvError, Result};

/// Buffer slots held inline by a frame. Audio layouts with more planes spill
/// into overflow slots past this index.
pub const NUM_DATA_POINTERS: usize = 8;

/// Inline slots followed by the overflow slots.
pub type FrameBuffers = SmallVec<[Option<BufferRef>; NUM_DATA_POINTERS]>;

/// Where one plane's bytes live.
///
/// `buf` indexes the frame's buffer slots, so a plane can never point at
/// memory the frame does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    /// Index of the buffer slot holding this plane.
    pub buf: usize,
    /// Start of the plane inside the buffer view.
    pub offset: usize,
    /// Bytes in the plane.
    pub len: usize,
    /// Bytes between rows (video) or the plane size (audio).
    pub linesize: usize,
}

/// A unit of decoded media.
///
/// A frame is either Empty or Populated. [`Frame::ref_from`],
/// [`Frame::get_buffer`] and friends populate it, [`Frame::unref`] empties it.
/// Populating a populated frame is an `InvalidState` error.
#[derive(Debug, Default)]
pub struct Frame {
    buffers: FrameBuffers,
    planes: SmallVec<[Plane; NUM_DATA_POINTERS]>,

    /// Pixel or sample format; `None` until set.
    pub format: Option<FrameFormat>,
    /// Picture width in pixels.
    pub width: usize,
    /// Picture height in pixels.
    pub height: usize,
    /// Samples per channel.
    pub nb_samples: usize,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel layout.
    pub ch_layout: ChannelLayout,

    /// Presentation timestamp in `time_base` units.
    pub pts: Option<i64>,
    /// Decode timestamp of the packet that produced this frame.
    pub pkt_dts: Option<i64>,
    /// Best guess at the presentation time when `pts` is unreliable.
    pub best_effort_timestamp: Option<i64>,
    /// Unit of the timestamps and `duration`.
    pub time_base: Rational,
    /// Display duration in `time_base` units.
    pub duration: Option<i64>,

    /// Pixel aspect ratio; 0/1 when unknown.
    pub sample_aspect_ratio: Rational,
    /// Coding type of the picture.
    pub pict_type: PictureType,
    /// Limited or full value range.
    pub color_range: ColorRange,
    /// Chromaticity of the primaries.
    pub color_primaries: ColorPrimaries,
    /// Transfer characteristic.
    pub color_trc: ColorTransfer,
    /// YUV matrix.
    pub colorspace: ColorSpace,
    /// Chroma sample siting.
    pub chroma_location: ChromaLocation,
    /// Extra fields to display for, in units of half a frame.
    pub repeat_pict: i32,
    /// Encoder quality, lower is better.
    pub quality: i32,

    /// Keyframe, corruption and interlacing state.
    pub flags: FrameFlags,
    /// What the decoder concealed.
    pub decode_error_flags: DecodeErrorFlags,

    /// Rows to drop from the top on display.
    pub crop_top: usize,
    /// Rows to drop from the bottom on display.
    pub crop_bottom: usize,
    /// Columns to drop from the left on display.
    pub crop_left: usize,
    /// Columns to drop from the right on display.
    pub crop_right: usize,

    /// String metadata.
    pub metadata: Dictionary,
    side_data: Vec<SideData>,

    /// User context, passed along by reference.
    pub opaque: Option<Opaque>,
    /// Reference-counted user context, cloned and released with the frame.
    pub opaque_ref: Option<BufferRef>,
}

fn align_up(value: usize, align: usize) -> Option<usize> {
    if align <= 1 {
        Some(value)
    } else {
        value.div_ceil(align).checked_mul(align)
    }
}

fn checked_size(size: Option<usize>) -> Result<usize> {
    size.ok_or_else(|| AvError::oom(usize::MAX))
}

fn frame_oom(requested: usize) -> AvError {
    AvError::oom(requested * std::mem::size_of::<Option<BufferRef>>())
}

impl Frame {
    /// An empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the frame holds at least one buffer.
    pub fn is_populated(&self) -> bool {
        self.buffers.iter().any(Option::is_some)
    }

    /// Makes this frame a new reference to everything `src` owns.
    ///
    /// Buffers are shared, not copied. On failure `self` is left empty.
    pub fn ref_from(&mut self, src: &Frame) -> Result<()> {
        self.ref_from_with(src, |planes, additional| {
            planes
                .try_reserve(additional)
                .map_err(|_| frame_oom(additional))
        })
    }

    /// `ref_from` with the plane-array reservation supplied by the caller.
    /// Buffers are already cloned when it runs.
    fn ref_from_with<F>(&mut self, src: &Frame, reserve_planes: F) -> Result<()>
    where
        F: FnOnce(&mut SmallVec<[Plane; NUM_DATA_POINTERS]>, usize) -> Result<()>,
    {
        if self.is_populated() {
            log::warn!("ref into a populated frame rejected");
            return Err(AvError::InvalidState(
                "destination frame must be unreferenced first".into(),
            ));
        }
        if let Err(err) = self.ref_buffers(src, reserve_planes) {
            self.unref();
            return Err(err);
        }
        self.format = src.format;
        self.width = src.width;
        self.height = src.height;
        self.nb_samples = src.nb_samples;
        self.ch_layout = src.ch_layout.clone();
        self.copy_props(src);
        Ok(())
    }

    fn ref_buffers<F>(&mut self, src: &Frame, reserve_planes: F) -> Result<()>
    where
        F: FnOnce(&mut SmallVec<[Plane; NUM_DATA_POINTERS]>, usize) -> Result<()>,
    {
        self.buffers.clear();
        self.buffers
            .try_reserve(src.buffers.len())
            .map_err(|_| frame_oom(src.buffers.len()))?;
        self.buffers.extend(src.buffers.iter().cloned());

        self.planes.clear();
        reserve_planes(&mut self.planes, src.planes.len())?;
        self.planes.extend(src.planes.iter().copied());
        Ok(())
    }

    /// A new frame referencing the same buffers as this one.
    pub fn try_clone(&self) -> Result<Frame> {
        let mut frame = Frame::new();
        frame.ref_from(self)?;
        Ok(frame)
    }

    /// Releases every buffer and resets all fields. Safe on an empty frame.
    ///
    /// The slot arrays, side-data list and metadata keep their capacity, so a
    /// recycled frame does not reallocate them.
    pub fn unref(&mut self) {
        let mut buffers = std::mem::take(&mut self.buffers);
        let mut planes = std::mem::take(&mut self.planes);
        let mut side_data = std::mem::take(&mut self.side_data);
        let mut metadata = std::mem::take(&mut self.metadata);
        buffers.clear();
        planes.clear();
        side_data.clear();
        metadata.clear();
        *self = Frame {
            buffers,
            planes,
            side_data,
            metadata,
            ..Frame::default()
        };
    }

    /// Copies metadata but not buffers, replacing this frame's side data and
    /// metadata map. Side data and `opaque_ref` are shared, not copied.
    pub fn copy_props(&mut self, src: &Frame) {
        self.pts = src.pts;
        self.pkt_dts = src.pkt_dts;
        self.best_effort_timestamp = src.best_effort_timestamp;
        self.time_base = src.time_base;
        self.duration = src.duration;
        self.sample_rate = src.sample_rate;
        self.sample_aspect_ratio = src.sample_aspect_ratio;
        self.pict_type = src.pict_type;
        self.color_range = src.color_range;
        self.color_primaries = src.color_primaries;
        self.color_trc = src.color_trc;
        self.colorspace = src.colorspace;
        self.chroma_location = src.chroma_location;
        self.repeat_pict = src.repeat_pict;
        self.quality = src.quality;
        self.flags = src.flags;
        self.decode_error_flags = src.decode_error_flags;
        self.crop_top = src.crop_top;
        self.crop_bottom = src.crop_bottom;
        self.crop_left = src.crop_left;
        self.crop_right = src.crop_right;
        self.metadata = src.metadata.clone();
        self.side_data = src.side_data.clone();
        self.opaque = src.opaque.clone();
        self.opaque_ref = src.opaque_ref.clone();
    }

    /// All buffer slots, inline first.
    pub fn buffers(&self) -> &[Option<BufferRef>] {
        &self.buffers
    }

    /// Slots past the inline capacity.
    pub fn overflow(&self) -> &[Option<BufferRef>] {
        self.buffers.get(NUM_DATA_POINTERS..).unwrap_or(&[])
    }

    /// Puts `buf` in `slot`, growing the slot list with empty entries.
    pub fn set_buffer(&mut self, slot: usize, buf: Option<BufferRef>) {
        while self.buffers.len() <= slot {
            self.buffers.push(None);
        }
        self.buffers[slot] = buf;
    }

    /// Appends a plane descriptor. [`Frame::validate`] checks it.
    pub fn push_plane(&mut self, plane: Plane) {
        self.planes.push(plane);
    }

    /// Plane descriptors in order.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Number of planes.
    pub fn nb_planes(&self) -> usize {
        self.planes.len()
    }

    /// Stride of `plane`, if it exists.
    pub fn linesize(&self, plane: usize) -> Option<usize> {
        self.planes.get(plane).map(|p| p.linesize)
    }

    fn plane_desc(&self, index: usize) -> Result<Plane> {
        self.planes.get(index).copied().ok_or(AvError::OutOfRange {
            index,
            len: self.planes.len(),
        })
    }

    /// The buffer owning plane `index`'s memory.
    pub fn plane_buffer(&self, index: usize) -> Result<&BufferRef> {
        let plane = self.plane_desc(index)?;
        self.buffers
            .get(plane.buf)
            .and_then(Option::as_ref)
            .ok_or(AvError::OutOfRange {
                index: plane.buf,
                len: self.buffers.len(),
            })
    }

    /// Bytes of plane `index`.
    pub fn plane(&self, index: usize) -> Result<&[u8]> {
        let plane = self.plane_desc(index)?;
        let data = self.plane_buffer(index)?.data();
        data.get(plane.offset..plane.offset + plane.len)
            .ok_or(AvError::OutOfRange {
                index: plane.offset + plane.len,
                len: data.len(),
            })
    }

    /// Writable plane bytes. Fails if the backing buffer is shared; call
    /// [`Frame::make_writable`] first.
    pub fn plane_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        let plane = self.plane_desc(index)?;
        let len = self.buffers.len();
        let buf = self
            .buffers
            .get_mut(plane.buf)
            .and_then(Option::as_mut)
            .ok_or(AvError::OutOfRange { index: plane.buf, len })?;
        let view_len = buf.len();
        let data = buf.data_mut().ok_or_else(|| {
            AvError::InvalidState(format!("plane {} buffer is not writable", index))
        })?;
        data.get_mut(plane.offset..plane.offset + plane.len)
            .ok_or(AvError::OutOfRange {
                index: plane.offset + plane.len,
                len: view_len,
            })
    }

    /// Allocates buffers for the frame's format and dimensions.
    ///
    /// `align` is the row/plane alignment in bytes; 0 selects the configured
    /// default.
    pub fn get_buffer(&mut self, align: usize) -> Result<()> {
        self.get_buffer_with(align, BufferRef::alloc)
    }

    /// Like [`Frame::get_buffer`] with a custom allocator, e.g.
    /// [`BufferPool::allocator`](crate::buffer::BufferPool::allocator).
    pub fn get_buffer_with<F>(&mut self, align: usize, mut alloc: F) -> Result<()>
    where
        F: FnMut(usize) -> Result<BufferRef>,
    {
        if self.is_populated() {
            return Err(AvError::InvalidState("frame already has buffers".into()));
        }
        let align = if align == 0 {
            crate::config::align()
        } else {
            align
        };
        if !align.is_power_of_two() {
            return Err(AvError::Unsupported(format!(
                "alignment {} is not a power of two",
                align
            )));
        }
        let (linesizes, sizes) = self.plane_geometry(align)?;

        self.buffers.clear();
        self.planes.clear();
        for (index, (linesize, size)) in linesizes.into_iter().zip(sizes).enumerate() {
            let padded = checked_size(size.checked_add(align - 1));
            let buf = match padded.and_then(&mut alloc) {
                Ok(buf) => buf,
                Err(err) => {
                    self.buffers.clear();
                    self.planes.clear();
                    return Err(err);
                }
            };
            let offset = buf.as_ptr().align_offset(align).min(align - 1);
            self.buffers.push(Some(buf));
            self.planes.push(Plane {
                buf: index,
                offset,
                len: size,
                linesize,
            });
        }
        Ok(())
    }

    fn plane_geometry(&self, align: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        match self.format {
            Some(FrameFormat::Video(pix)) => {
                if self.width == 0 || self.height == 0 {
                    return Err(AvError::InvalidState(format!(
                        "video frame has no dimensions ({}x{})",
                        self.width, self.height
                    )));
                }
                let planes = pix.num_planes();
                let linesizes = (0..planes)
                    .map(|p| {
                        checked_size(
                            pix.plane_row_bytes(p, self.width)
                                .and_then(|row| align_up(row, align)),
                        )
                    })
                    .collect::<Result<Vec<usize>>>()?;
                let sizes = linesizes
                    .iter()
                    .enumerate()
                    .map(|(p, ls)| checked_size(ls.checked_mul(pix.plane_height(p, self.height))))
                    .collect::<Result<Vec<usize>>>()?;
                Ok((linesizes, sizes))
            }
            Some(FrameFormat::Audio(fmt)) => {
                let channels = self.ch_layout.nb_channels();
                if self.nb_samples == 0 || channels == 0 {
                    return Err(AvError::InvalidState(format!(
                        "audio frame has {} samples of {} channels",
                        self.nb_samples, channels
                    )));
                }
                let planes = if fmt.is_planar() { channels } else { 1 };
                let linesize = checked_size(
                    fmt.plane_size(channels, self.nb_samples)
                        .and_then(|size| align_up(size, align)),
                )?;
                Ok((vec![linesize; planes], vec![linesize; planes]))
            }
            None => Err(AvError::InvalidState("frame format is not set".into())),
        }
    }

    fn same_shape(&self, other: &Frame) -> bool {
        match (self.format, other.format) {
            (Some(FrameFormat::Video(a)), Some(FrameFormat::Video(b))) => {
                a == b && self.width == other.width && self.height == other.height
            }
            (Some(FrameFormat::Audio(a)), Some(FrameFormat::Audio(b))) => {
                a == b
                    && self.nb_samples == other.nb_samples
                    && self.ch_layout.nb_channels() == other.ch_layout.nb_channels()
            }
            _ => false,
        }
    }

    /// Deep-copies `src`'s samples or pixels into this frame.
    ///
    /// An unpopulated frame takes on `src`'s shape and gets fresh buffers. A
    /// populated one must already match it.
    pub fn copy_from(&mut self, src: &Frame) -> Result<()> {
        if src.format.is_none() || !src.is_populated() {
            return Err(AvError::InvalidState("source frame has no data".into()));
        }
        if self.is_populated() {
            if !self.same_shape(src) {
                return Err(AvError::FormatMismatch(format!(
                    "cannot copy {:?} {}x{}/{} into {:?} {}x{}/{}",
                    src.format,
                    src.width,
                    src.height,
                    src.nb_samples,
                    self.format,
                    self.width,
                    self.height,
                    self.nb_samples
                )));
            }
            self.make_writable()?;
        } else {
            if self.format.is_some() && !self.same_shape(src) {
                return Err(AvError::FormatMismatch(
                    "destination shape differs from source".into(),
                ));
            }
            self.format = src.format;
            self.width = src.width;
            self.height = src.height;
            self.nb_samples = src.nb_samples;
            self.ch_layout = src.ch_layout.clone();
            self.get_buffer(0)?;
        }
        self.copy_planes(src)
    }

    fn copy_planes(&mut self, src: &Frame) -> Result<()> {
        match src.format {
            Some(FrameFormat::Video(pix)) => {
                for p in 0..pix.num_planes() {
                    let row = checked_size(pix.plane_row_bytes(p, src.width))?;
                    let rows = pix.plane_height(p, src.height);
                    let (src_ls, dst_ls) = (src.plane_desc(p)?.linesize, self.plane_desc(p)?.linesize);
                    let from = src.plane(p)?;
                    let to = self.plane_mut(p)?;
                    for r in 0..rows {
                        to[r * dst_ls..r * dst_ls + row].copy_from_slice(&from[r * src_ls..r * src_ls + row]);
                    }
                }
            }
            Some(FrameFormat::Audio(fmt)) => {
                let channels = src.ch_layout.nb_channels();
                let bytes = checked_size(fmt.plane_size(channels, src.nb_samples))?;
                for p in 0..src.nb_planes() {
                    let from = src.plane(p)?;
                    self.plane_mut(p)?[..bytes].copy_from_slice(&from[..bytes]);
                }
            }
            None => return Err(AvError::InvalidState("frame format is not set".into())),
        }
        Ok(())
    }

    /// Ensures every buffer is exclusively owned, copying shared ones.
    pub fn make_writable(&mut self) -> Result<()> {
        for buf in self.buffers.iter_mut().flatten() {
            buf.make_exclusive()?;
        }
        Ok(())
    }

    /// Whether every held buffer can be written without copying.
    pub fn is_writable(&self) -> bool {
        self.buffers.iter().flatten().all(BufferRef::is_writable)
    }

    /// Checks that every plane lies inside a held buffer, that overflow slots
    /// are filled without gaps, and that an audio frame's layout is valid.
    pub fn validate(&self) -> Result<()> {
        let overflow = self.overflow();
        if let Some(gap) = overflow.iter().position(Option::is_none) {
            if overflow[gap..].iter().any(Option::is_some) {
                log::warn!("overflow buffer slot {} empty before a populated slot", gap);
                return Err(AvError::InvalidState(format!(
                    "overflow slot {} is empty but a later slot is populated",
                    gap
                )));
            }
        }

        for (index, plane) in self.planes.iter().enumerate() {
            let buf = self.plane_buffer(index)?;
            if plane.offset + plane.len > buf.len() {
                log::warn!("plane {} extends past its buffer", index);
                return Err(AvError::OutOfRange {
                    index: plane.offset + plane.len,
                    len: buf.len(),
                });
            }
        }

        if let Some(FrameFormat::Audio(_)) = self.format {
            self.ch_layout.validate()?;
        }
        Ok(())
    }

    /// Allocates a zeroed side-data entry of `size` bytes.
    pub fn new_side_data(&mut self, kind: SideDataType, size: usize) -> Result<&mut SideData> {
        let buf = BufferRef::alloc(size)?;
        Ok(self.new_side_data_from_buf(kind, buf))
    }

    /// Attaches `buf` as a new side-data entry.
    pub fn new_side_data_from_buf(&mut self, kind: SideDataType, buf: BufferRef) -> &mut SideData {
        let index = self.side_data.len();
        self.side_data.push(SideData::new(kind, buf));
        &mut self.side_data[index]
    }

    /// Encodes and attaches a typed payload.
    pub fn add_side_data<P: SideDataPayload>(&mut self, payload: &P) -> &mut SideData {
        let index = self.side_data.len();
        self.side_data.push(SideData::from_payload(payload));
        &mut self.side_data[index]
    }

    /// First entry of `kind`.
    pub fn side_data(&self, kind: SideDataType) -> Option<&SideData> {
        self.side_data.iter().find(|sd| sd.kind == kind)
    }

    /// Every entry of `kind`, in insertion order.
    pub fn side_data_all(&self, kind: SideDataType) -> impl Iterator<Item = &SideData> {
        self.side_data.iter().filter(move |sd| sd.kind == kind)
    }

    /// All side data in insertion order.
    pub fn side_data_list(&self) -> &[SideData] {
        &self.side_data
    }

    /// Removes and releases every entry of `kind`.
    pub fn remove_side_data(&mut self, kind: SideDataType) {
        self.side_data.retain(|sd| sd.kind != kind);
    }

    /// Wraps a PCM buffer as an audio frame.
    ///
    /// With `copy` the samples are duplicated and `pcm` keeps its storage.
    /// Otherwise the frame takes `pcm`'s buffer, leaving it without capacity.
    pub fn from_pcm(pcm: &mut PcmBuffer, copy: bool) -> Result<Frame> {
        let buf = if copy {
            let src = pcm
                .buffer()
                .ok_or_else(|| AvError::InvalidState("pcm buffer has no storage".into()))?;
            let mut dst = BufferRef::alloc(src.len())?;
            dst.make_mut()?.copy_from_slice(src.data());
            dst
        } else {
            pcm.take_buffer()
                .ok_or_else(|| AvError::InvalidState("pcm buffer has no storage".into()))?
        };

        let mut frame = Frame::new();
        frame.format = Some(FrameFormat::Audio(pcm.format));
        frame.nb_samples = pcm.nb_samples;
        frame.sample_rate = pcm.sample_rate;
        frame.ch_layout = ChannelLayout::default_for(pcm.channels).unwrap_or(ChannelLayout::Unspecified {
            nb_channels: pcm.channels,
        });
        frame.pts = pcm.pts;
        frame.duration = pcm.duration;

        frame.buffers.push(Some(buf));
        for p in 0..pcm.nb_planes() {
            frame.planes.push(Plane {
                buf: 0,
                offset: p * pcm.linesize,
                len: pcm.linesize,
                linesize: pcm.linesize,
            });
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{FramePool, PixelFormat, SampleFormat};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failed_ref_releases_cloned_buffers() {
        let mut src = Frame::new();
        src.format = Some(FrameFormat::Video(PixelFormat::Yuv420p));
        src.width = 16;
        src.height = 16;
        src.pts = Some(7);
        src.get_buffer(0).unwrap();

        let mut dst = Frame::new();
        let result = dst.ref_from_with(&src, |_, additional| Err(frame_oom(additional)));
        assert!(matches!(result, Err(AvError::OutOfMemory { .. })));

        assert!(!dst.is_populated());
        assert!(dst.buffers().is_empty());
        assert_eq!(dst.nb_planes(), 0);
        assert_eq!(dst.format, None);
        assert_eq!(dst.pts, None);
        for buf in src.buffers().iter().flatten() {
            assert_eq!(buf.ref_count(), 1);
        }

        dst.ref_from(&src).unwrap();
        assert_eq!(dst.nb_planes(), 3);
    }

    #[test]
    fn test_recycled_frame_keeps_spilled_slots() {
        let pool = FramePool::new(1);
        let mut frame = pool.acquire();
        frame.format = Some(FrameFormat::Audio(SampleFormat::F32p));
        frame.nb_samples = 64;
        frame.ch_layout = ChannelLayout::Unspecified { nb_channels: 12 };
        frame.get_buffer(0).unwrap();
        frame.metadata.set("title", Some("x"), Default::default());
        assert!(frame.buffers.spilled());
        let capacity = frame.buffers.capacity();
        let buf = frame.plane_buffer(11).unwrap().clone();

        pool.release(frame);
        assert_eq!(buf.ref_count(), 1);

        let recycled = pool.acquire();
        assert!(!recycled.is_populated());
        assert!(recycled.metadata.is_empty());
        assert!(recycled.buffers.spilled());
        assert!(recycled.planes.spilled());
        assert_eq!(recycled.buffers.capacity(), capacity);
    }
}
