use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;

use super::dict::Dictionary;
use super::rational::Rational;
use crate::buffer::BufferRef;
use crate::error::{AvError, Result};

/// Kinds of auxiliary per-frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SideDataType {
    /// Pan/scan rectangles.
    PanScan,
    /// ATSC A53 closed captions.
    A53Cc,
    /// Stereoscopic 3D packing.
    Stereo3d,
    /// Audio matrix encoding (Dolby Surround and similar).
    MatrixEncoding,
    /// Downmix coefficients.
    DownmixInfo,
    /// ReplayGain values.
    ReplayGain,
    /// 3x3 transformation matrix, see [`DisplayMatrix`].
    DisplayMatrix,
    /// Active format description.
    Afd,
    /// Exported motion vectors.
    MotionVectors,
    /// Samples to skip at the start or end.
    SkipSamples,
    /// Audio service type (main, commentary and so on).
    AudioServiceType,
    /// Mastering display color volume, see [`MasteringDisplayMetadata`].
    MasteringDisplayMetadata,
    /// GOP timecode.
    GopTimecode,
    /// Spherical video mapping.
    Spherical,
    /// Content light level, see [`ContentLightLevel`].
    ContentLightLevel,
    /// Embedded ICC profile.
    IccProfile,
    /// SMPTE 12M timecodes.
    S12mTimecode,
    /// HDR10+ dynamic metadata.
    DynamicHdrPlus,
    /// Encoder regions of interest, see [`RegionsOfInterest`].
    RegionsOfInterest,
    /// Encoding parameters exported by a decoder.
    VideoEncParams,
    /// User data unregistered SEI.
    SeiUnregistered,
    /// Film grain synthesis parameters.
    FilmGrainParams,
    /// Object detection bounding boxes.
    DetectionBboxes,
    /// Raw Dolby Vision RPU.
    DoviRpuBuffer,
    /// Parsed Dolby Vision metadata.
    DoviMetadata,
    /// HDR Vivid dynamic metadata.
    DynamicHdrVivid,
    /// Ambient viewing environment.
    AmbientViewingEnvironment,
    /// Encoder hints about changed regions.
    VideoHint,
}

/// Auxiliary data attached to a frame, backed by a shared buffer.
#[derive(Debug, Clone)]
pub struct SideData {
    /// What the payload holds.
    pub kind: SideDataType,
    /// Payload bytes.
    pub buf: BufferRef,
    /// String metadata about the payload.
    pub metadata: Dictionary,
}

impl SideData {
    /// Wraps `buf` as side data of `kind`.
    pub fn new(kind: SideDataType, buf: BufferRef) -> Self {
        SideData {
            kind,
            buf,
            metadata: Dictionary::new(),
        }
    }

    /// Encodes a typed payload into a fresh buffer.
    pub fn from_payload<P: SideDataPayload>(payload: &P) -> Self {
        Self::new(P::TYPE, BufferRef::from_vec(Vec::from(payload.encode())))
    }

    /// Payload bytes.
    pub fn data(&self) -> &[u8] {
        self.buf.data()
    }

    /// Decodes the payload as `P`.
    pub fn decode<P: SideDataPayload>(&self) -> Result<P> {
        if self.kind != P::TYPE {
            return Err(AvError::InvalidData(format!(
                "side data is {:?}, not {:?}",
                self.kind,
                P::TYPE
            )));
        }
        P::decode(self.data())
    }
}

/// A side-data kind with a known byte layout.
///
/// All multi-byte fields are little-endian.
pub trait SideDataPayload: Sized {
    /// The kind this payload is stored under.
    const TYPE: SideDataType;

    /// Serialises the payload.
    fn encode(&self) -> Bytes;

    /// Parses a payload, failing with `InvalidData` when `data` is short.
    fn decode(data: &[u8]) -> Result<Self>;
}

fn expect_len(kind: SideDataType, data: &[u8], want: usize) -> Result<()> {
    if data.len() < want {
        return Err(AvError::InvalidData(format!(
            "{:?} payload needs {} bytes, got {}",
            kind,
            want,
            data.len()
        )));
    }
    Ok(())
}

fn put_rational(buf: &mut BytesMut, r: Rational) {
    buf.put_i32_le(r.num);
    buf.put_i32_le(r.den);
}

fn get_rational(buf: &mut &[u8]) -> Rational {
    let num = buf.get_i32_le();
    let den = buf.get_i32_le();
    Rational::new(num, den)
}

/// Row-major 3x3 matrix in 16.16 fixed point (the last column in 2.30)
/// mapping decoded coordinates to display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMatrix(pub [i32; 9]);

impl DisplayMatrix {
    /// No rotation, flip or scale.
    pub fn identity() -> Self {
        DisplayMatrix([1 << 16, 0, 0, 0, 1 << 16, 0, 0, 0, 1 << 30])
    }

    /// A pure clockwise rotation by `degrees`.
    pub fn from_rotation(degrees: f64) -> Self {
        let radians = -degrees.to_radians();
        let (s, c) = radians.sin_cos();
        let fp = |v: f64| (v * 65536.0).round() as i32;
        DisplayMatrix([fp(c), fp(-s), 0, fp(s), fp(c), 0, 0, 0, 1 << 30])
    }

    /// Clockwise rotation in degrees, or NaN for a degenerate matrix.
    pub fn rotation(&self) -> f64 {
        let m = |i: usize| self.0[i] as f64 / 65536.0;
        let scale0 = m(0).hypot(m(3));
        let scale1 = m(1).hypot(m(4));
        if scale0 == 0.0 || scale1 == 0.0 {
            return f64::NAN;
        }
        (m(1) / scale1).atan2(m(0) / scale0).to_degrees()
    }
}

impl SideDataPayload for DisplayMatrix {
    const TYPE: SideDataType = SideDataType::DisplayMatrix;

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(36);
        for v in self.0 {
            buf.put_i32_le(v);
        }
        buf.freeze()
    }

    fn decode(data: &[u8]) -> Result<Self> {
        expect_len(Self::TYPE, data, 36)?;
        let mut buf = data;
        let mut matrix = [0i32; 9];
        for v in matrix.iter_mut() {
            *v = buf.get_i32_le();
        }
        Ok(DisplayMatrix(matrix))
    }
}

/// Content light level, in cd/m².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentLightLevel {
    /// Maximum content light level.
    pub max_cll: u32,
    /// Maximum frame-average light level.
    pub max_fall: u32,
}

impl SideDataPayload for ContentLightLevel {
    const TYPE: SideDataType = SideDataType::ContentLightLevel;

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32_le(self.max_cll);
        buf.put_u32_le(self.max_fall);
        buf.freeze()
    }

    fn decode(data: &[u8]) -> Result<Self> {
        expect_len(Self::TYPE, data, 8)?;
        let mut buf = data;
        Ok(ContentLightLevel {
            max_cll: buf.get_u32_le(),
            max_fall: buf.get_u32_le(),
        })
    }
}

/// SMPTE ST 2086 mastering display color volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MasteringDisplayMetadata {
    /// CIE 1931 xy chromaticity of R, G, B.
    pub display_primaries: [[Rational; 2]; 3],
    /// CIE 1931 xy chromaticity of the white point.
    pub white_point: [Rational; 2],
    /// Minimum luminance in cd/m².
    pub min_luminance: Rational,
    /// Maximum luminance in cd/m².
    pub max_luminance: Rational,
    /// Whether `display_primaries` and `white_point` are set.
    pub has_primaries: bool,
    /// Whether the luminance fields are set.
    pub has_luminance: bool,
}

impl SideDataPayload for MasteringDisplayMetadata {
    const TYPE: SideDataType = SideDataType::MasteringDisplayMetadata;

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(82);
        for primary in &self.display_primaries {
            put_rational(&mut buf, primary[0]);
            put_rational(&mut buf, primary[1]);
        }
        put_rational(&mut buf, self.white_point[0]);
        put_rational(&mut buf, self.white_point[1]);
        put_rational(&mut buf, self.min_luminance);
        put_rational(&mut buf, self.max_luminance);
        buf.put_u8(self.has_primaries as u8);
        buf.put_u8(self.has_luminance as u8);
        buf.freeze()
    }

    fn decode(data: &[u8]) -> Result<Self> {
        expect_len(Self::TYPE, data, 82)?;
        let mut buf = data;
        let mut meta = MasteringDisplayMetadata::default();
        for primary in meta.display_primaries.iter_mut() {
            primary[0] = get_rational(&mut buf);
            primary[1] = get_rational(&mut buf);
        }
        meta.white_point = [get_rational(&mut buf), get_rational(&mut buf)];
        meta.min_luminance = get_rational(&mut buf);
        meta.max_luminance = get_rational(&mut buf);
        meta.has_primaries = buf.get_u8() != 0;
        meta.has_luminance = buf.get_u8() != 0;
        Ok(meta)
    }
}

/// One region an encoder should treat with a different quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    /// First row of the region, in pixels.
    pub top: i32,
    /// Last row of the region.
    pub bottom: i32,
    /// First column of the region.
    pub left: i32,
    /// Last column of the region.
    pub right: i32,
    /// Quantiser offset in [-1, 1]; negative means better quality.
    pub qoffset: Rational,
}

/// The list of regions carried by one side-data entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionsOfInterest(pub Vec<RegionOfInterest>);

const ROI_ENTRY_SIZE: usize = 24;

impl SideDataPayload for RegionsOfInterest {
    const TYPE: SideDataType = SideDataType::RegionsOfInterest;

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.0.len() * ROI_ENTRY_SIZE);
        for roi in &self.0 {
            buf.put_i32_le(roi.top);
            buf.put_i32_le(roi.bottom);
            buf.put_i32_le(roi.left);
            buf.put_i32_le(roi.right);
            put_rational(&mut buf, roi.qoffset);
        }
        buf.freeze()
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() % ROI_ENTRY_SIZE != 0 {
            return Err(AvError::InvalidData(format!(
                "region list of {} bytes is not a multiple of {}",
                data.len(),
                ROI_ENTRY_SIZE
            )));
        }
        let mut buf = data;
        let mut regions = Vec::with_capacity(data.len() / ROI_ENTRY_SIZE);
        while buf.has_remaining() {
            regions.push(RegionOfInterest {
                top: buf.get_i32_le(),
                bottom: buf.get_i32_le(),
                left: buf.get_i32_le(),
                right: buf.get_i32_le(),
                qoffset: get_rational(&mut buf),
            });
        }
        Ok(RegionsOfInterest(regions))
    }
}

/// A decoded payload of any registered kind.
pub type DecodedSideData = Box<dyn fmt::Debug + Send + Sync>;

type DecodeFn = Box<dyn Fn(&[u8]) -> Result<DecodedSideData> + Send + Sync>;

struct RegistryEntry {
    name: &'static str,
    decode: DecodeFn,
}

/// Runtime map from side-data kind to a decoder.
///
/// Kinds without an entry still travel through frames as raw buffers.
#[derive(Default)]
pub struct SideDataRegistry {
    entries: HashMap<SideDataType, RegistryEntry>,
}

impl SideDataRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing every built-in payload.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<DisplayMatrix>("display_matrix");
        registry.register::<ContentLightLevel>("content_light_level");
        registry.register::<MasteringDisplayMetadata>("mastering_display_metadata");
        registry.register::<RegionsOfInterest>("regions_of_interest");
        registry
    }

    /// Registers `P` under its own kind, replacing any previous decoder.
    pub fn register<P>(&mut self, name: &'static str)
    where
        P: SideDataPayload + fmt::Debug + Send + Sync + 'static,
    {
        self.register_fn(P::TYPE, name, |data| {
            P::decode(data).map(|p| Box::new(p) as DecodedSideData)
        });
    }

    /// Registers a decoder closure for `kind`.
    pub fn register_fn<F>(&mut self, kind: SideDataType, name: &'static str, decode: F)
    where
        F: Fn(&[u8]) -> Result<DecodedSideData> + Send + Sync + 'static,
    {
        log::debug!("registering side data decoder {} for {:?}", name, kind);
        self.entries.insert(
            kind,
            RegistryEntry {
                name,
                decode: Box::new(decode),
            },
        );
    }

    /// Whether a decoder is registered for `kind`.
    pub fn contains(&self, kind: SideDataType) -> bool {
        self.entries.contains_key(&kind)
    }

    /// The name `kind`'s decoder was registered under.
    pub fn name(&self, kind: SideDataType) -> Option<&'static str> {
        self.entries.get(&kind).map(|e| e.name)
    }

    /// Decodes `side_data` with its registered decoder, or fails with
    /// `Unsupported`.
    pub fn decode(&self, side_data: &SideData) -> Result<DecodedSideData> {
        let entry = self.entries.get(&side_data.kind).ok_or_else(|| {
            AvError::Unsupported(format!("no decoder registered for {:?}", side_data.kind))
        })?;
        (entry.decode)(side_data.data())
    }
}

impl fmt::Debug for SideDataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.values().map(|e| e.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_matrix_rotation() {
        let matrix = DisplayMatrix::from_rotation(90.0);
        assert!((matrix.rotation() - 90.0).abs() < 0.01);
        assert!(DisplayMatrix::identity().rotation().abs() < f64::EPSILON);
        assert!(DisplayMatrix([0; 9]).rotation().is_nan());

        let side = SideData::from_payload(&matrix);
        assert_eq!(side.kind, SideDataType::DisplayMatrix);
        assert_eq!(side.data().len(), 36);
        assert_eq!(side.decode::<DisplayMatrix>().unwrap(), matrix);
    }

    #[test]
    fn test_mastering_display_layout() {
        let meta = MasteringDisplayMetadata {
            display_primaries: [
                [Rational::new(34000, 50000), Rational::new(16000, 50000)],
                [Rational::new(13250, 50000), Rational::new(34500, 50000)],
                [Rational::new(7500, 50000), Rational::new(3000, 50000)],
            ],
            white_point: [Rational::new(15635, 50000), Rational::new(16450, 50000)],
            min_luminance: Rational::new(50, 10000),
            max_luminance: Rational::new(10_000_000, 10000),
            has_primaries: true,
            has_luminance: true,
        };
        let encoded = meta.encode();
        assert_eq!(encoded.len(), 82);
        assert_eq!(MasteringDisplayMetadata::decode(&encoded).unwrap(), meta);
        assert!(MasteringDisplayMetadata::decode(&encoded[..40]).is_err());
    }

    #[test]
    fn test_decode_checks_kind_and_length() {
        let side = SideData::new(SideDataType::IccProfile, BufferRef::from_vec(vec![0; 8]));
        assert!(matches!(
            side.decode::<ContentLightLevel>(),
            Err(AvError::InvalidData(_))
        ));
        assert!(ContentLightLevel::decode(&[1, 2, 3]).is_err());
        assert!(RegionsOfInterest::decode(&[0; 25]).is_err());
        assert_eq!(RegionsOfInterest::decode(&[]).unwrap(), RegionsOfInterest::default());
    }

    #[test]
    fn test_registry_dispatch() {
        let mut registry = SideDataRegistry::with_defaults();
        let cll = SideData::from_payload(&ContentLightLevel {
            max_cll: 1000,
            max_fall: 400,
        });
        let decoded = registry.decode(&cll).unwrap();
        assert_eq!(
            format!("{:?}", decoded),
            "ContentLightLevel { max_cll: 1000, max_fall: 400 }"
        );

        let icc = SideData::new(SideDataType::IccProfile, BufferRef::from_vec(b"icc".to_vec()));
        assert!(matches!(registry.decode(&icc), Err(AvError::Unsupported(_))));

        registry.register_fn(SideDataType::IccProfile, "icc_profile", |data| {
            Ok(Box::new(data.len()) as DecodedSideData)
        });
        assert_eq!(registry.name(SideDataType::IccProfile), Some("icc_profile"));
        assert_eq!(format!("{:?}", registry.decode(&icc).unwrap()), "3");
    }
}
