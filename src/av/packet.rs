use bytes::Bytes;

use super::rational::Rational;
use super::side_data::{SideData, SideDataType};
use crate::buffer::BufferRef;
use crate::error::Result;

/// An encoded payload travelling to or from a codec.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Encoded bytes.
    pub data: BufferRef,
    /// Presentation timestamp in `time_base` units.
    pub pts: Option<i64>,
    /// Decode timestamp in `time_base` units.
    pub dts: Option<i64>,
    /// Stream this packet belongs to.
    pub stream_index: usize,
    /// Whether decoding can start at this packet.
    pub is_key: bool,
    /// Duration in `time_base` units.
    pub duration: Option<i64>,
    /// Unit of the timestamps.
    pub time_base: Rational,
    /// Attached side data.
    pub side_data: Vec<SideData>,
}

impl Packet {
    /// A packet wrapping `data` with no timing set.
    pub fn new(data: BufferRef) -> Self {
        Self {
            data,
            pts: None,
            dts: None,
            stream_index: 0,
            is_key: false,
            duration: None,
            time_base: Rational::zero(),
            side_data: Vec::new(),
        }
    }

    /// Copies `data` into a fresh buffer.
    pub fn copy_from_slice(data: &[u8]) -> Result<Self> {
        let mut buf = BufferRef::alloc(data.len())?;
        buf.make_mut()?.copy_from_slice(data);
        Ok(Self::new(buf))
    }

    /// Sets the presentation timestamp.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Sets the decode timestamp.
    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Sets the stream index.
    pub fn with_stream_index(mut self, index: usize) -> Self {
        self.stream_index = index;
        self
    }

    /// Marks the packet as a keyframe or not.
    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets the time base.
    pub fn with_time_base(mut self, time_base: Rational) -> Self {
        self.time_base = time_base;
        self
    }

    /// Attaches side data.
    pub fn with_side_data(mut self, side_data: SideData) -> Self {
        self.side_data.push(side_data);
        self
    }

    /// First side data of `kind`.
    pub fn side_data(&self, kind: SideDataType) -> Option<&SideData> {
        self.side_data.iter().find(|sd| sd.kind == kind)
    }

    /// Payload as `Bytes`, sharing the buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone().into_bytes()
    }
}
