use image::{imageops, GrayImage, RgbaImage};
use std::fmt;

use crate::VisionError;

/// Side length of the averaging grid.
const GRID: u32 = 8;

/// Number of bits in a fingerprint.
pub const HASH_BITS: u32 = GRID * GRID;

/// 64-bit average-hash descriptor of an image region.
///
/// The top-left grid cell is the most significant bit, so the hex form reads
/// in row-major order and stays comparable with the embedded reference tables.
/// Fingerprints are only ever compared via Hamming distance.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Parse the 16-hex-digit form used by layout profiles.
    pub fn from_hex(text: &str) -> Result<Self, VisionError> {
        if text.len() != 16 {
            return Err(VisionError::BadFingerprint {
                text: text.to_string(),
            });
        }
        u64::from_str_radix(text, 16)
            .map(Self)
            .map_err(|_| VisionError::BadFingerprint {
                text: text.to_string(),
            })
    }

    /// Hamming distance: number of differing bits, in [0, 64].
    /// Symmetric, and zero exactly for equal fingerprints.
    pub const fn distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

/// Average hash of a grayscale region: resample to an 8x8 grid and set a bit
/// for every cell strictly brighter than the grid mean.
pub fn average_hash(img: &GrayImage) -> Fingerprint {
    let cells = imageops::resize(img, GRID, GRID, imageops::FilterType::Triangle);
    let sum: u64 = cells.pixels().map(|p| u64::from(p[0])).sum();
    let mean = sum as f64 / f64::from(HASH_BITS);

    let mut bits = 0u64;
    for (i, px) in cells.pixels().enumerate() {
        if f64::from(px[0]) > mean {
            bits |= 1 << (HASH_BITS as usize - 1 - i);
        }
    }
    Fingerprint(bits)
}

/// Average hash of a color region.
pub fn average_hash_rgba(img: &RgbaImage) -> Fingerprint {
    average_hash(&imageops::grayscale(img))
}

/// Raw luminance sum of a (typically binarized) region.
pub fn pixel_sum(img: &GrayImage) -> u64 {
    img.pixels().map(|p| u64::from(p[0])).sum()
}
