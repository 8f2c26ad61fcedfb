use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Layout properties of a pixel format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PixelFormatFlags: u32 {
        /// Multi-byte components are stored big-endian.
        const BIG_ENDIAN = 1 << 0;
        /// Each component lives in its own plane (or the chroma pair shares one).
        const PLANAR = 1 << 1;
        /// Components are red, green and blue rather than luma and chroma.
        const RGB = 1 << 2;
    }
}

/// Static description of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Significant bits per component.
    pub depth: u8,
    /// Components per pixel, counting alpha.
    pub nb_components: u8,
    /// Horizontal chroma subsampling as a shift.
    pub log2_chroma_w: u8,
    /// Vertical chroma subsampling as a shift.
    pub log2_chroma_h: u8,
    /// Layout properties.
    pub flags: PixelFormatFlags,
}

/// Pixel formats understood by frame allocation and copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 8-bit 4:2:0 planar YUV.
    Yuv420p,
    /// 8-bit 4:2:0 planar YUV with full-range (JPEG) levels.
    Yuvj420p,
    /// 8-bit 4:2:2 planar YUV.
    Yuv422p,
    /// 8-bit 4:4:4 planar YUV.
    Yuv444p,
    /// 10-bit 4:2:0 planar YUV, little-endian 16-bit words.
    Yuv420p10le,
    /// 10-bit 4:2:2 planar YUV, little-endian 16-bit words.
    Yuv422p10le,
    /// 10-bit 4:4:4 planar YUV, little-endian 16-bit words.
    Yuv444p10le,
    /// Y plane followed by an interleaved UV plane.
    Nv12,
    /// Y plane followed by an interleaved VU plane.
    Nv21,
    /// Packed 8-bit RGB.
    Rgb24,
    /// Packed 8-bit BGR.
    Bgr24,
    /// Packed 8-bit RGBA.
    Rgba,
    /// Packed 8-bit BGRA.
    Bgra,
    /// 8-bit grayscale.
    Gray8,
    /// 16-bit little-endian grayscale.
    Gray16le,
}

impl PixelFormat {
    /// Depth, component count, subsampling and flags.
    pub fn descriptor(&self) -> PixelFormatDescriptor {
        use PixelFormatFlags as F;
        let (depth, nb_components, log2_chroma_w, log2_chroma_h, flags) = match self {
            Self::Yuv420p | Self::Yuvj420p => (8, 3, 1, 1, F::PLANAR),
            Self::Yuv422p => (8, 3, 1, 0, F::PLANAR),
            Self::Yuv444p => (8, 3, 0, 0, F::PLANAR),
            Self::Yuv420p10le => (10, 3, 1, 1, F::PLANAR),
            Self::Yuv422p10le => (10, 3, 1, 0, F::PLANAR),
            Self::Yuv444p10le => (10, 3, 0, 0, F::PLANAR),
            Self::Nv12 | Self::Nv21 => (8, 3, 1, 1, F::PLANAR),
            Self::Rgb24 | Self::Bgr24 => (8, 3, 0, 0, F::RGB),
            Self::Rgba | Self::Bgra => (8, 4, 0, 0, F::RGB),
            Self::Gray8 => (8, 1, 0, 0, F::empty()),
            Self::Gray16le => (16, 1, 0, 0, F::empty()),
        };
        PixelFormatDescriptor {
            depth,
            nb_components,
            log2_chroma_w,
            log2_chroma_h,
            flags,
        }
    }

    /// Planes a frame of this format allocates.
    pub fn num_planes(&self) -> usize {
        match self {
            Self::Nv12 | Self::Nv21 => 2,
            other if other.descriptor().flags.contains(PixelFormatFlags::PLANAR) => 3,
            _ => 1,
        }
    }

    fn bytes_per_component(&self) -> usize {
        if self.descriptor().depth > 8 {
            2
        } else {
            1
        }
    }

    /// Bytes of pixel data in one row of `plane` for a frame `width` wide, or
    /// `None` if that does not fit in a `usize`.
    pub fn plane_row_bytes(&self, plane: usize, width: usize) -> Option<usize> {
        let desc = self.descriptor();
        let chroma_w = ceil_shift(width, desc.log2_chroma_w);
        let bytes = self.bytes_per_component();
        match (self, plane) {
            (Self::Nv12 | Self::Nv21, 1) => chroma_w.checked_mul(2),
            (_, 0) if desc.flags.contains(PixelFormatFlags::PLANAR) => width.checked_mul(bytes),
            (_, 1 | 2) if desc.flags.contains(PixelFormatFlags::PLANAR) => {
                chroma_w.checked_mul(bytes)
            }
            (_, 0) => width
                .checked_mul(desc.nb_components as usize)?
                .checked_mul(bytes),
            _ => Some(0),
        }
    }

    /// Rows in `plane` for a frame `height` tall.
    pub fn plane_height(&self, plane: usize, height: usize) -> usize {
        if plane == 0 {
            height
        } else {
            ceil_shift(height, self.descriptor().log2_chroma_h)
        }
    }
}

fn ceil_shift(value: usize, shift: u8) -> usize {
    value.div_ceil(1 << shift)
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuvj420p => "yuvj420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Yuv420p10le => "yuv420p10le",
            Self::Yuv422p10le => "yuv422p10le",
            Self::Yuv444p10le => "yuv444p10le",
            Self::Nv12 => "nv12",
            Self::Nv21 => "nv21",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Gray8 => "gray",
            Self::Gray16le => "gray16le",
        };
        f.write_str(name)
    }
}

/// Audio sample formats; the `*p` variants store one plane per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, interleaved.
    U8,
    /// Signed 16-bit, interleaved.
    S16,
    /// Signed 32-bit, interleaved.
    S32,
    /// 32-bit float, interleaved.
    F32,
    /// 64-bit float, interleaved.
    F64,
    /// Signed 64-bit, interleaved.
    S64,
    /// Unsigned 8-bit, planar.
    U8p,
    /// Signed 16-bit, planar.
    S16p,
    /// Signed 32-bit, planar.
    S32p,
    /// 32-bit float, planar.
    F32p,
    /// 64-bit float, planar.
    F64p,
    /// Signed 64-bit, planar.
    S64p,
}

impl SampleFormat {
    /// Size of one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::S32p | Self::F32 | Self::F32p => 4,
            Self::F64 | Self::F64p | Self::S64 | Self::S64p => 8,
        }
    }

    /// Whether each channel has its own plane.
    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::F32p | Self::F64p | Self::S64p
        )
    }

    /// The interleaved variant of this format.
    pub fn packed(&self) -> Self {
        match self {
            Self::U8p => Self::U8,
            Self::S16p => Self::S16,
            Self::S32p => Self::S32,
            Self::F32p => Self::F32,
            Self::F64p => Self::F64,
            Self::S64p => Self::S64,
            other => *other,
        }
    }

    /// The planar variant of this format.
    pub fn planar(&self) -> Self {
        match self {
            Self::U8 => Self::U8p,
            Self::S16 => Self::S16p,
            Self::S32 => Self::S32p,
            Self::F32 => Self::F32p,
            Self::F64 => Self::F64p,
            Self::S64 => Self::S64p,
            other => *other,
        }
    }

    /// Bytes in one plane holding `nb_samples` samples of `channels` channels,
    /// or `None` on overflow.
    pub fn plane_size(&self, channels: usize, nb_samples: usize) -> Option<usize> {
        let per_plane = if self.is_planar() { 1 } else { channels };
        nb_samples
            .checked_mul(per_plane)?
            .checked_mul(self.bytes_per_sample())
    }
}

/// The media format carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    /// Pixels.
    Video(PixelFormat),
    /// Audio samples.
    Audio(SampleFormat),
}

/// Range of luma and chroma values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ColorRange {
    /// Not signalled.
    #[default]
    Unspecified = 0,
    /// Limited/TV range.
    Mpeg = 1,
    /// Full/PC range.
    Jpeg = 2,
}

/// Chromaticity of the source primaries (ISO/IEC 23091-2 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ColorPrimaries {
    /// ITU-R BT.709.
    Bt709 = 1,
    /// Not signalled.
    #[default]
    Unspecified = 2,
    /// ITU-R BT.470 System M.
    Bt470m = 4,
    /// ITU-R BT.470 System B/G.
    Bt470bg = 5,
    /// SMPTE 170M.
    Smpte170m = 6,
    /// SMPTE 240M.
    Smpte240m = 7,
    /// Generic film.
    Film = 8,
    /// ITU-R BT.2020.
    Bt2020 = 9,
    /// SMPTE ST 428-1 (CIE XYZ).
    Smpte428 = 10,
    /// SMPTE RP 431-2 (DCI-P3).
    Smpte431 = 11,
    /// SMPTE EG 432-1 (Display P3).
    Smpte432 = 12,
    /// EBU Tech. 3213-E.
    Ebu3213 = 22,
}

/// Opto-electronic transfer characteristic (ISO/IEC 23091-2 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ColorTransfer {
    /// ITU-R BT.709.
    Bt709 = 1,
    /// Not signalled.
    #[default]
    Unspecified = 2,
    /// Gamma 2.2.
    Gamma22 = 4,
    /// Gamma 2.8.
    Gamma28 = 5,
    /// SMPTE 170M.
    Smpte170m = 6,
    /// SMPTE 240M.
    Smpte240m = 7,
    /// Linear light.
    Linear = 8,
    /// sRGB.
    Iec61966_2_1 = 13,
    /// ITU-R BT.2020, 10-bit.
    Bt2020_10 = 14,
    /// ITU-R BT.2020, 12-bit.
    Bt2020_12 = 15,
    /// PQ.
    Smpte2084 = 16,
    /// HLG.
    AribStdB67 = 18,
}

/// YUV matrix coefficients (ISO/IEC 23091-2 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ColorSpace {
    /// Identity; the planes hold RGB.
    Rgb = 0,
    /// ITU-R BT.709.
    Bt709 = 1,
    /// Not signalled.
    #[default]
    Unspecified = 2,
    /// FCC Title 47.
    Fcc = 4,
    /// ITU-R BT.470 System B/G.
    Bt470bg = 5,
    /// SMPTE 170M.
    Smpte170m = 6,
    /// SMPTE 240M.
    Smpte240m = 7,
    /// YCgCo.
    Ycgco = 8,
    /// ITU-R BT.2020 non-constant luminance.
    Bt2020Ncl = 9,
    /// ITU-R BT.2020 constant luminance.
    Bt2020Cl = 10,
    /// ITU-R BT.2100 ICtCp.
    Ictcp = 14,
}

/// Position of chroma samples relative to luma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ChromaLocation {
    /// Not signalled.
    #[default]
    Unspecified = 0,
    /// Left of the luma sample (MPEG-2/4 4:2:0).
    Left = 1,
    /// Centered (MPEG-1 4:2:0, JPEG).
    Center = 2,
    /// Top-left (4:2:2 in DV).
    TopLeft = 3,
    /// Above the luma sample.
    Top = 4,
    /// Bottom-left.
    BottomLeft = 5,
    /// Below the luma sample.
    Bottom = 6,
}

/// Picture coding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// Not set.
    #[default]
    None,
    /// Intra.
    I,
    /// Predicted.
    P,
    /// Bi-directionally predicted.
    B,
    /// S(GMC)-VOP (MPEG-4).
    S,
    /// Switching intra.
    Si,
    /// Switching predicted.
    Sp,
    /// BI type.
    Bi,
}

bitflags! {
    /// Per-frame state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u32 {
        /// The decoder flagged the frame as damaged.
        const CORRUPT = 1 << 0;
        /// A keyframe.
        const KEY = 1 << 1;
        /// Decoded for reference only, not for output.
        const DISCARD = 1 << 2;
        /// The content is interlaced.
        const INTERLACED = 1 << 3;
        /// The top field is displayed first.
        const TOP_FIELD_FIRST = 1 << 4;
    }
}

bitflags! {
    /// Errors a decoder concealed while producing a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DecodeErrorFlags: u32 {
        /// The bitstream was malformed.
        const INVALID_BITSTREAM = 1 << 0;
        /// A reference frame was missing.
        const MISSING_REFERENCE = 1 << 1;
        /// Error concealment was applied.
        const CONCEALMENT_ACTIVE = 1 << 2;
        /// Slices were decoded with errors.
        const DECODE_SLICES = 1 << 3;
    }
}
