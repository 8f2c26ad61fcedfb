use std::fmt;

use crate::error::{AvError, Result};

/// Speaker positions. The discriminant is the bit index in a native mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// Front left.
    FrontLeft = 0,
    /// Front right.
    FrontRight = 1,
    /// Front center.
    FrontCenter = 2,
    /// Low-frequency effects.
    LowFrequency = 3,
    /// Back left.
    BackLeft = 4,
    /// Back right.
    BackRight = 5,
    /// Front left of center.
    FrontLeftOfCenter = 6,
    /// Front right of center.
    FrontRightOfCenter = 7,
    /// Back center.
    BackCenter = 8,
    /// Side left.
    SideLeft = 9,
    /// Side right.
    SideRight = 10,
    /// Top center.
    TopCenter = 11,
    /// Top front left.
    TopFrontLeft = 12,
    /// Top front center.
    TopFrontCenter = 13,
    /// Top front right.
    TopFrontRight = 14,
    /// Top back left.
    TopBackLeft = 15,
    /// Top back center.
    TopBackCenter = 16,
    /// Top back right.
    TopBackRight = 17,
    /// Left channel of a stereo downmix.
    StereoLeft = 29,
    /// Right channel of a stereo downmix.
    StereoRight = 30,
    /// Wide left.
    WideLeft = 31,
    /// Wide right.
    WideRight = 32,
    /// Surround direct left.
    SurroundDirectLeft = 33,
    /// Surround direct right.
    SurroundDirectRight = 34,
    /// Second low-frequency effects channel.
    LowFrequency2 = 35,
    /// Top side left.
    TopSideLeft = 36,
    /// Top side right.
    TopSideRight = 37,
    /// Bottom front center.
    BottomFrontCenter = 38,
    /// Bottom front left.
    BottomFrontLeft = 39,
    /// Bottom front right.
    BottomFrontRight = 40,
}

const ALL_CHANNELS: [Channel; 30] = [
    Channel::FrontLeft,
    Channel::FrontRight,
    Channel::FrontCenter,
    Channel::LowFrequency,
    Channel::BackLeft,
    Channel::BackRight,
    Channel::FrontLeftOfCenter,
    Channel::FrontRightOfCenter,
    Channel::BackCenter,
    Channel::SideLeft,
    Channel::SideRight,
    Channel::TopCenter,
    Channel::TopFrontLeft,
    Channel::TopFrontCenter,
    Channel::TopFrontRight,
    Channel::TopBackLeft,
    Channel::TopBackCenter,
    Channel::TopBackRight,
    Channel::StereoLeft,
    Channel::StereoRight,
    Channel::WideLeft,
    Channel::WideRight,
    Channel::SurroundDirectLeft,
    Channel::SurroundDirectRight,
    Channel::LowFrequency2,
    Channel::TopSideLeft,
    Channel::TopSideRight,
    Channel::BottomFrontCenter,
    Channel::BottomFrontLeft,
    Channel::BottomFrontRight,
];

impl Channel {
    /// This channel's bit in a native mask.
    pub fn mask(self) -> u64 {
        1u64 << self as u8
    }

    /// The channel at bit index `bit`, if it names one.
    pub fn from_bit(bit: u32) -> Option<Channel> {
        ALL_CHANNELS.iter().copied().find(|ch| *ch as u32 == bit)
    }

    /// Short label, e.g. `FL` or `LFE`.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Channel::FrontLeft => "FL",
            Channel::FrontRight => "FR",
            Channel::FrontCenter => "FC",
            Channel::LowFrequency => "LFE",
            Channel::BackLeft => "BL",
            Channel::BackRight => "BR",
            Channel::FrontLeftOfCenter => "FLC",
            Channel::FrontRightOfCenter => "FRC",
            Channel::BackCenter => "BC",
            Channel::SideLeft => "SL",
            Channel::SideRight => "SR",
            Channel::TopCenter => "TC",
            Channel::TopFrontLeft => "TFL",
            Channel::TopFrontCenter => "TFC",
            Channel::TopFrontRight => "TFR",
            Channel::TopBackLeft => "TBL",
            Channel::TopBackCenter => "TBC",
            Channel::TopBackRight => "TBR",
            Channel::StereoLeft => "DL",
            Channel::StereoRight => "DR",
            Channel::WideLeft => "WL",
            Channel::WideRight => "WR",
            Channel::SurroundDirectLeft => "SDL",
            Channel::SurroundDirectRight => "SDR",
            Channel::LowFrequency2 => "LFE2",
            Channel::TopSideLeft => "TSL",
            Channel::TopSideRight => "TSR",
            Channel::BottomFrontCenter => "BFC",
            Channel::BottomFrontLeft => "BFL",
            Channel::BottomFrontRight => "BFR",
        }
    }
}

/// Native channel masks for the common layouts.
pub mod masks {
    use super::Channel::*;

    const fn m(bits: &[super::Channel]) -> u64 {
        let mut mask = 0u64;
        let mut i = 0;
        while i < bits.len() {
            mask |= 1u64 << bits[i] as u8;
            i += 1;
        }
        mask
    }

    /// `mono`
    pub const MONO: u64 = m(&[FrontCenter]);
    /// `stereo`
    pub const STEREO: u64 = m(&[FrontLeft, FrontRight]);
    /// `2.1`
    pub const TWO_POINT_ONE: u64 = STEREO | m(&[LowFrequency]);
    /// `3.0(back)`
    pub const TWO_ONE: u64 = STEREO | m(&[BackCenter]);
    /// `3.0`
    pub const SURROUND: u64 = STEREO | m(&[FrontCenter]);
    /// `3.1`
    pub const THREE_POINT_ONE: u64 = SURROUND | m(&[LowFrequency]);
    /// `4.0`
    pub const FOUR_POINT_ZERO: u64 = SURROUND | m(&[BackCenter]);
    /// `4.1`
    pub const FOUR_POINT_ONE: u64 = FOUR_POINT_ZERO | m(&[LowFrequency]);
    /// `quad(side)`
    pub const TWO_TWO: u64 = STEREO | m(&[SideLeft, SideRight]);
    /// `quad`
    pub const QUAD: u64 = STEREO | m(&[BackLeft, BackRight]);
    /// `5.0(side)`
    pub const FIVE_POINT_ZERO: u64 = SURROUND | m(&[SideLeft, SideRight]);
    /// `5.1(side)`
    pub const FIVE_POINT_ONE: u64 = FIVE_POINT_ZERO | m(&[LowFrequency]);
    /// `5.0`
    pub const FIVE_POINT_ZERO_BACK: u64 = SURROUND | m(&[BackLeft, BackRight]);
    /// `5.1`
    pub const FIVE_POINT_ONE_BACK: u64 = FIVE_POINT_ZERO_BACK | m(&[LowFrequency]);
    /// `6.0`
    pub const SIX_POINT_ZERO: u64 = FIVE_POINT_ZERO | m(&[BackCenter]);
    /// `6.0(front)`
    pub const SIX_POINT_ZERO_FRONT: u64 = TWO_TWO | m(&[FrontLeftOfCenter, FrontRightOfCenter]);
    /// `3.1.2`
    pub const THREE_POINT_ONE_POINT_TWO: u64 = THREE_POINT_ONE | m(&[TopFrontLeft, TopFrontRight]);
    /// `hexagonal`
    pub const HEXAGONAL: u64 = FIVE_POINT_ZERO_BACK | m(&[BackCenter]);
    /// `6.1`
    pub const SIX_POINT_ONE: u64 = FIVE_POINT_ONE | m(&[BackCenter]);
    /// `6.1(back)`
    pub const SIX_POINT_ONE_BACK: u64 = FIVE_POINT_ONE_BACK | m(&[BackCenter]);
    /// `6.1(front)`
    pub const SIX_POINT_ONE_FRONT: u64 = SIX_POINT_ZERO_FRONT | m(&[LowFrequency]);
    /// `7.0`
    pub const SEVEN_POINT_ZERO: u64 = FIVE_POINT_ZERO | m(&[BackLeft, BackRight]);
    /// `7.0(front)`
    pub const SEVEN_POINT_ZERO_FRONT: u64 = FIVE_POINT_ZERO | m(&[FrontLeftOfCenter, FrontRightOfCenter]);
    /// `7.1`
    pub const SEVEN_POINT_ONE: u64 = FIVE_POINT_ONE | m(&[BackLeft, BackRight]);
    /// `7.1(wide-side)`
    pub const SEVEN_POINT_ONE_WIDE: u64 = FIVE_POINT_ONE | m(&[FrontLeftOfCenter, FrontRightOfCenter]);
    /// `7.1(wide)`
    pub const SEVEN_POINT_ONE_WIDE_BACK: u64 =
        FIVE_POINT_ONE_BACK | m(&[FrontLeftOfCenter, FrontRightOfCenter]);
    /// `5.1.2`
    pub const FIVE_POINT_ONE_POINT_TWO_BACK: u64 = FIVE_POINT_ONE_BACK | m(&[TopFrontLeft, TopFrontRight]);
    /// `octagonal`
    pub const OCTAGONAL: u64 = FIVE_POINT_ZERO | m(&[BackLeft, BackCenter, BackRight]);
    /// `cube`
    pub const CUBE: u64 = QUAD | m(&[TopFrontLeft, TopFrontRight, TopBackLeft, TopBackRight]);
    /// `5.1.4`
    pub const FIVE_POINT_ONE_POINT_FOUR_BACK: u64 = FIVE_POINT_ONE_POINT_TWO_BACK | m(&[TopBackLeft, TopBackRight]);
    /// `7.1.2`
    pub const SEVEN_POINT_ONE_POINT_TWO: u64 = SEVEN_POINT_ONE | m(&[TopFrontLeft, TopFrontRight]);
    /// `7.1.4`
    pub const SEVEN_POINT_ONE_POINT_FOUR_BACK: u64 = SEVEN_POINT_ONE_POINT_TWO | m(&[TopBackLeft, TopBackRight]);
    /// `7.2.3`
    pub const SEVEN_POINT_TWO_POINT_THREE: u64 =
        SEVEN_POINT_ONE_POINT_TWO | m(&[TopBackCenter, LowFrequency2]);
    /// `9.1.4`
    pub const NINE_POINT_ONE_POINT_FOUR_BACK: u64 =
        SEVEN_POINT_ONE_POINT_FOUR_BACK | m(&[FrontLeftOfCenter, FrontRightOfCenter]);
    /// `hexadecagonal`
    pub const HEXADECAGONAL: u64 = OCTAGONAL
        | m(&[
            WideLeft,
            WideRight,
            TopBackLeft,
            TopBackRight,
            TopBackCenter,
            TopFrontCenter,
            TopFrontLeft,
            TopFrontRight,
        ]);
    /// `downmix`
    pub const STEREO_DOWNMIX: u64 = m(&[StereoLeft, StereoRight]);
    /// `22.2`
    pub const TWENTY_TWO_POINT_TWO: u64 = SEVEN_POINT_ONE_POINT_FOUR_BACK
        | m(&[
            FrontLeftOfCenter,
            FrontRightOfCenter,
            BackCenter,
            LowFrequency2,
            TopFrontCenter,
            TopCenter,
            TopSideLeft,
            TopSideRight,
            TopBackCenter,
            BottomFrontCenter,
            BottomFrontLeft,
            BottomFrontRight,
        ]);
}

// Searched in order: the first entry with a matching count is the default.
const NAMED_LAYOUTS: &[(&str, u64)] = &[
    ("mono", masks::MONO),
    ("stereo", masks::STEREO),
    ("2.1", masks::TWO_POINT_ONE),
    ("3.0", masks::SURROUND),
    ("3.0(back)", masks::TWO_ONE),
    ("4.0", masks::FOUR_POINT_ZERO),
    ("quad", masks::QUAD),
    ("quad(side)", masks::TWO_TWO),
    ("3.1", masks::THREE_POINT_ONE),
    ("5.0", masks::FIVE_POINT_ZERO_BACK),
    ("5.0(side)", masks::FIVE_POINT_ZERO),
    ("4.1", masks::FOUR_POINT_ONE),
    ("5.1", masks::FIVE_POINT_ONE_BACK),
    ("5.1(side)", masks::FIVE_POINT_ONE),
    ("6.0", masks::SIX_POINT_ZERO),
    ("6.0(front)", masks::SIX_POINT_ZERO_FRONT),
    ("3.1.2", masks::THREE_POINT_ONE_POINT_TWO),
    ("hexagonal", masks::HEXAGONAL),
    ("6.1", masks::SIX_POINT_ONE),
    ("6.1(back)", masks::SIX_POINT_ONE_BACK),
    ("6.1(front)", masks::SIX_POINT_ONE_FRONT),
    ("7.0", masks::SEVEN_POINT_ZERO),
    ("7.0(front)", masks::SEVEN_POINT_ZERO_FRONT),
    ("7.1", masks::SEVEN_POINT_ONE),
    ("7.1(wide)", masks::SEVEN_POINT_ONE_WIDE_BACK),
    ("7.1(wide-side)", masks::SEVEN_POINT_ONE_WIDE),
    ("5.1.2", masks::FIVE_POINT_ONE_POINT_TWO_BACK),
    ("octagonal", masks::OCTAGONAL),
    ("cube", masks::CUBE),
    ("5.1.4", masks::FIVE_POINT_ONE_POINT_FOUR_BACK),
    ("7.1.2", masks::SEVEN_POINT_ONE_POINT_TWO),
    ("7.1.4", masks::SEVEN_POINT_ONE_POINT_FOUR_BACK),
    ("7.2.3", masks::SEVEN_POINT_TWO_POINT_THREE),
    ("9.1.4", masks::NINE_POINT_ONE_POINT_FOUR_BACK),
    ("hexadecagonal", masks::HEXADECAGONAL),
    ("downmix", masks::STEREO_DOWNMIX),
    ("22.2", masks::TWENTY_TWO_POINT_TWO),
];

/// Identity of one channel in a custom or ambisonic layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// A loudspeaker position.
    Speaker(Channel),
    /// Ambisonic component by ACN index.
    Ambisonic(u16),
    /// Present in the data but carrying nothing.
    Unused,
    /// Carries audio of unknown meaning.
    Unknown,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Speaker(ch) => f.write_str(ch.abbreviation()),
            ChannelId::Ambisonic(n) => write!(f, "AMBI{}", n),
            ChannelId::Unused => f.write_str("UNUSED"),
            ChannelId::Unknown => f.write_str("UNK"),
        }
    }
}

/// One entry of a custom channel map.
#[derive(Debug, Clone)]
pub struct CustomChannel {
    /// What the channel carries.
    pub id: ChannelId,
    /// Free-form label; ignored by equality.
    pub name: Option<String>,
}

impl CustomChannel {
    /// An unnamed entry.
    pub fn new(id: ChannelId) -> Self {
        CustomChannel { id, name: None }
    }

    /// An entry with a label.
    pub fn named(id: ChannelId, name: impl Into<String>) -> Self {
        CustomChannel {
            id,
            name: Some(name.into()),
        }
    }
}

impl PartialEq for CustomChannel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CustomChannel {}

/// Describes how many audio channels exist and what each one carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLayout {
    /// Only the count is known.
    Unspecified {
        /// Number of channels.
        nb_channels: usize,
    },
    /// Channels ordered by ascending bit index of `mask`.
    Native {
        /// Number of channels; equals the bits set in `mask`.
        nb_channels: usize,
        /// One bit per [`Channel`].
        mask: u64,
    },
    /// An explicit per-channel map.
    Custom {
        /// Number of channels; equals `map.len()`.
        nb_channels: usize,
        /// One entry per channel, in order.
        map: Vec<CustomChannel>,
    },
    /// Ambisonic components in ACN order, then the non-diegetic channels in `mask`.
    Ambisonic {
        /// Components plus non-diegetic channels.
        nb_channels: usize,
        /// Non-diegetic speakers following the components.
        mask: u64,
    },
}

impl Default for ChannelLayout {
    fn default() -> Self {
        ChannelLayout::Unspecified { nb_channels: 0 }
    }
}

/// Spherical-harmonic (degree, order) of ambisonic channel `n` in ACN order.
pub fn ambisonic_component(n: u32) -> (u32, i32) {
    let n = u64::from(n);
    let degree = (n as f64).sqrt() as u64;
    // Guard against sqrt rounding on large n
    let degree = if (degree + 1) * (degree + 1) <= n {
        degree + 1
    } else if degree * degree > n {
        degree - 1
    } else {
        degree
    };
    let order = n as i64 - (degree * (degree + 1)) as i64;
    (degree as u32, order as i32)
}

/// Highest ambisonic order whose components all have a [`ChannelId::Ambisonic`] index.
pub const MAX_AMBISONIC_ORDER: u32 = 255;

fn nth_set_bit(mask: u64, n: usize) -> Option<u32> {
    let mut remaining = mask;
    for _ in 0..n {
        if remaining == 0 {
            return None;
        }
        remaining &= remaining - 1;
    }
    (remaining != 0).then(|| remaining.trailing_zeros())
}

impl ChannelLayout {
    /// A native layout from a speaker mask.
    pub fn from_mask(mask: u64) -> Result<Self> {
        if mask == 0 {
            return Err(AvError::InvalidLayout("empty channel mask".into()));
        }
        Ok(ChannelLayout::Native {
            nb_channels: mask.count_ones() as usize,
            mask,
        })
    }

    /// A custom layout from explicit channel ids.
    pub fn custom(ids: impl IntoIterator<Item = ChannelId>) -> Self {
        let map: Vec<CustomChannel> = ids.into_iter().map(CustomChannel::new).collect();
        ChannelLayout::Custom {
            nb_channels: map.len(),
            map,
        }
    }

    /// A full-sphere ambisonic layout of the given order plus non-diegetic speakers.
    ///
    /// Orders above [`MAX_AMBISONIC_ORDER`] are `Unsupported`.
    pub fn ambisonic(order: u32, non_diegetic: u64) -> Result<Self> {
        if order > MAX_AMBISONIC_ORDER {
            return Err(AvError::Unsupported(format!(
                "ambisonic order {} exceeds {}",
                order, MAX_AMBISONIC_ORDER
            )));
        }
        let components = (order as usize + 1) * (order as usize + 1);
        Ok(ChannelLayout::Ambisonic {
            nb_channels: components + non_diegetic.count_ones() as usize,
            mask: non_diegetic,
        })
    }

    /// The canonical layout for `nb_channels`.
    pub fn default_for(nb_channels: usize) -> Result<Self> {
        NAMED_LAYOUTS
            .iter()
            .find(|(_, mask)| mask.count_ones() as usize == nb_channels)
            .map(|&(_, mask)| ChannelLayout::Native { nb_channels, mask })
            .ok_or_else(|| {
                AvError::Unsupported(format!("no default layout for {} channels", nb_channels))
            })
    }

    /// Resets to the canonical layout for `nb_channels`.
    ///
    /// Without a canonical mapping the layout becomes unspecified with just the
    /// count set, and `Unsupported` is returned.
    pub fn set_default(&mut self, nb_channels: usize) -> Result<()> {
        match Self::default_for(nb_channels) {
            Ok(layout) => {
                *self = layout;
                Ok(())
            }
            Err(err) => {
                *self = ChannelLayout::Unspecified { nb_channels };
                Err(err)
            }
        }
    }

    /// Number of channels.
    pub fn nb_channels(&self) -> usize {
        match self {
            ChannelLayout::Unspecified { nb_channels }
            | ChannelLayout::Native { nb_channels, .. }
            | ChannelLayout::Custom { nb_channels, .. }
            | ChannelLayout::Ambisonic { nb_channels, .. } => *nb_channels,
        }
    }

    /// The native mask, if any.
    pub fn mask(&self) -> Option<u64> {
        match self {
            ChannelLayout::Native { mask, .. } => Some(*mask),
            _ => None,
        }
    }

    /// Checks the per-order invariants.
    pub fn validate(&self) -> Result<()> {
        match self {
            ChannelLayout::Unspecified { .. } => Ok(()),
            ChannelLayout::Native { nb_channels, mask } => {
                if mask.count_ones() as usize != *nb_channels {
                    return Err(AvError::InvalidLayout(format!(
                        "mask {:#x} has {} channels, layout claims {}",
                        mask,
                        mask.count_ones(),
                        nb_channels
                    )));
                }
                Ok(())
            }
            ChannelLayout::Custom { nb_channels, map } => {
                if map.len() != *nb_channels {
                    return Err(AvError::InvalidLayout(format!(
                        "custom map has {} entries, layout claims {}",
                        map.len(),
                        nb_channels
                    )));
                }
                Ok(())
            }
            ChannelLayout::Ambisonic { nb_channels, mask } => {
                let extra = mask.count_ones() as usize;
                let components = nb_channels.checked_sub(extra).ok_or_else(|| {
                    AvError::InvalidLayout(format!(
                        "{} non-diegetic channels exceed {} total",
                        extra, nb_channels
                    ))
                })?;
                let order = (components as f64).sqrt() as usize;
                if components == 0 || order * order != components {
                    return Err(AvError::InvalidLayout(format!(
                        "{} ambisonic channels is not a full sphere",
                        components
                    )));
                }
                Ok(())
            }
        }
    }

    /// Identity of the channel at `index`.
    pub fn channel_from_index(&self, index: usize) -> Option<ChannelId> {
        if index >= self.nb_channels() {
            return None;
        }
        match self {
            ChannelLayout::Unspecified { .. } => None,
            ChannelLayout::Native { mask, .. } => nth_set_bit(*mask, index)
                .and_then(Channel::from_bit)
                .map(ChannelId::Speaker),
            ChannelLayout::Custom { map, .. } => map.get(index).map(|c| c.id),
            ChannelLayout::Ambisonic { nb_channels, mask } => {
                let components = nb_channels.checked_sub(mask.count_ones() as usize)?;
                if index < components {
                    u16::try_from(index).ok().map(ChannelId::Ambisonic)
                } else {
                    nth_set_bit(*mask, index - components)
                        .and_then(Channel::from_bit)
                        .map(ChannelId::Speaker)
                }
            }
        }
    }

    /// Position of `id` in this layout.
    pub fn index_from_channel(&self, id: ChannelId) -> Option<usize> {
        (0..self.nb_channels()).find(|&i| self.channel_from_index(i) == Some(id))
    }

    /// A short human readable description such as `5.1` or `FL+FR+LFE`.
    pub fn describe(&self) -> String {
        match self {
            ChannelLayout::Unspecified { nb_channels } => format!("{} channels", nb_channels),
            ChannelLayout::Native { mask, .. } => NAMED_LAYOUTS
                .iter()
                .find(|(_, m)| m == mask)
                .map(|(name, _)| name.to_string())
                .unwrap_or_else(|| self.join_ids()),
            ChannelLayout::Custom { map, .. } => map
                .iter()
                .map(|c| match &c.name {
                    Some(name) => format!("{}@{}", c.id, name),
                    None => c.id.to_string(),
                })
                .collect::<Vec<_>>()
                .join("+"),
            ChannelLayout::Ambisonic { nb_channels, mask } => {
                let components = nb_channels.saturating_sub(mask.count_ones() as usize);
                let order = (components as f64).sqrt() as usize;
                let mut desc = format!("ambisonic {}", order.saturating_sub(1));
                if *mask != 0 {
                    desc.push('+');
                    desc.push_str(&mask_abbreviations(*mask));
                }
                desc
            }
        }
    }

    fn join_ids(&self) -> String {
        (0..self.nb_channels())
            .filter_map(|i| self.channel_from_index(i))
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}

fn mask_abbreviations(mask: u64) -> String {
    ALL_CHANNELS
        .iter()
        .filter(|ch| mask & ch.mask() != 0)
        .map(|ch| ch.abbreviation())
        .collect::<Vec<_>>()
        .join("+")
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stereo_mask_validation() {
        let stereo = ChannelLayout::Native { nb_channels: 2, mask: 0b11 };
        assert!(stereo.validate().is_ok());

        let bad = ChannelLayout::Native { nb_channels: 2, mask: 0b111 };
        assert!(matches!(bad.validate(), Err(AvError::InvalidLayout(_))));
    }

    #[test]
    fn test_custom_length_validation() {
        let bad = ChannelLayout::Custom {
            nb_channels: 3,
            map: vec![CustomChannel::new(ChannelId::Unknown)],
        };
        assert!(matches!(bad.validate(), Err(AvError::InvalidLayout(_))));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ChannelLayout::default_for(1).unwrap().mask(), Some(masks::MONO));
        assert_eq!(ChannelLayout::default_for(2).unwrap().mask(), Some(masks::STEREO));
        assert_eq!(
            ChannelLayout::default_for(6).unwrap().mask(),
            Some(masks::FIVE_POINT_ONE_BACK)
        );
        assert_eq!(ChannelLayout::default_for(8).unwrap().mask(), Some(masks::SEVEN_POINT_ONE));
        assert_eq!(
            ChannelLayout::default_for(24).unwrap().mask(),
            Some(masks::TWENTY_TWO_POINT_TWO)
        );
    }

    #[test]
    fn test_set_default_falls_back_to_unspecified() {
        let mut layout = ChannelLayout::default();
        assert!(matches!(layout.set_default(11), Err(AvError::Unsupported(_))));
        assert_eq!(layout, ChannelLayout::Unspecified { nb_channels: 11 });

        layout.set_default(2).unwrap();
        assert_eq!(layout.describe(), "stereo");
    }

    #[test]
    fn test_custom_equality_ignores_names() {
        let a = ChannelLayout::Custom {
            nb_channels: 2,
            map: vec![
                CustomChannel::named(ChannelId::Speaker(Channel::FrontLeft), "left"),
                CustomChannel::new(ChannelId::Speaker(Channel::FrontRight)),
            ],
        };
        let b = ChannelLayout::custom([
            ChannelId::Speaker(Channel::FrontLeft),
            ChannelId::Speaker(Channel::FrontRight),
        ]);
        let c = ChannelLayout::custom([
            ChannelId::Speaker(Channel::FrontRight),
            ChannelId::Speaker(Channel::FrontLeft),
        ]);
        assert_eq!(a, b);
        assert_ne!(b, c);
        assert_ne!(b, ChannelLayout::from_mask(masks::STEREO).unwrap());
    }

    #[test]
    fn test_ambisonic_components() {
        assert_eq!(ambisonic_component(0), (0, 0));
        assert_eq!(ambisonic_component(1), (1, -1));
        assert_eq!(ambisonic_component(3), (1, 1));
        assert_eq!(ambisonic_component(4), (2, -2));
        assert_eq!(ambisonic_component(8), (2, 2));
        assert_eq!(ambisonic_component(15), (3, 3));
        assert_eq!(ambisonic_component(u32::MAX), (65535, 65535));
    }

    #[test]
    fn test_ambisonic_bounds() {
        let broken = ChannelLayout::Ambisonic {
            nb_channels: 1,
            mask: masks::STEREO,
        };
        assert_eq!(broken.channel_from_index(0), None);
        assert_eq!(broken.index_from_channel(ChannelId::Ambisonic(0)), None);
        assert!(broken.validate().is_err());

        let widest = ChannelLayout::ambisonic(MAX_AMBISONIC_ORDER, 0).unwrap();
        assert_eq!(widest.nb_channels(), 65536);
        assert_eq!(widest.channel_from_index(65535), Some(ChannelId::Ambisonic(65535)));
        assert!(matches!(
            ChannelLayout::ambisonic(u32::MAX, 0),
            Err(AvError::Unsupported(_))
        ));
    }

    #[test]
    fn test_ambisonic_layout() {
        let layout = ChannelLayout::ambisonic(1, masks::STEREO).unwrap();
        assert_eq!(layout.nb_channels(), 6);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.channel_from_index(3), Some(ChannelId::Ambisonic(3)));
        assert_eq!(
            layout.channel_from_index(5),
            Some(ChannelId::Speaker(Channel::FrontRight))
        );
        assert_eq!(layout.describe(), "ambisonic 1+FL+FR");

        let partial = ChannelLayout::Ambisonic { nb_channels: 3, mask: 0 };
        assert!(partial.validate().is_err());
    }

    #[test]
    fn test_index_lookup() {
        let layout = ChannelLayout::from_mask(masks::FIVE_POINT_ONE).unwrap();
        assert_eq!(
            layout.index_from_channel(ChannelId::Speaker(Channel::LowFrequency)),
            Some(3)
        );
        assert_eq!(
            layout.channel_from_index(4),
            Some(ChannelId::Speaker(Channel::SideLeft))
        );
        assert_eq!(layout.index_from_channel(ChannelId::Speaker(Channel::BackLeft)), None);
        assert_eq!(layout.describe(), "5.1(side)");

        let odd = ChannelLayout::from_mask(Channel::FrontLeft.mask() | Channel::LowFrequency.mask()).unwrap();
        assert_eq!(odd.describe(), "FL+LFE");
    }
}
