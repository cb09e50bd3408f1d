use image::GrayImage;
use lens_data::{DigitRow, LayoutProfile};
use serde::Serialize;
use std::fmt;
use tracing::trace;

use crate::phash::{self, Fingerprint};
use crate::preprocess;
use crate::VisionError;

/// Placeholder for a digit cell the game renders unlit.
pub const BLANK: char = ' ';

/// Fixed-width decode of one on-screen counter: one character per cell,
/// '0'-'9' or blank, upper row before lower row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCounter(String);

impl DecodedCounter {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when every cell reads '0', the HUD state at the start of a run.
    pub fn is_all_zero(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c == '0')
    }
}

impl fmt::Display for DecodedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference fingerprints for digits 0-9 of one counter font.
struct DigitTable([Fingerprint; 10]);

impl DigitTable {
    fn parse(hex: &[String; 10]) -> Result<Self, VisionError> {
        let mut table = [Fingerprint::from_bits(0); 10];
        for (slot, text) in table.iter_mut().zip(hex) {
            *slot = Fingerprint::from_hex(text)?;
        }
        Ok(Self(table))
    }

    /// Digit whose reference fingerprint is nearest by Hamming distance.
    /// A tie keeps the first match, so the lowest digit wins.
    fn nearest(&self, fingerprint: Fingerprint) -> (u8, u32) {
        let mut best_digit = 0u8;
        let mut best_distance = u32::MAX;
        for (digit, reference) in self.0.iter().enumerate() {
            let distance = fingerprint.distance(*reference);
            if distance < best_distance {
                best_digit = digit as u8;
                best_distance = distance;
            }
        }
        (best_digit, best_distance)
    }
}

/// Decodes the pre-cropped, pre-binarized counter strip into digit strings.
/// The score and EX-score counters differ only in cell geometry and
/// reference table, both supplied by the layout profile.
pub struct DigitDecoder {
    score_table: DigitTable,
    ex_table: DigitTable,
    score_upper: DigitRow,
    score_lower: DigitRow,
    ex_row: DigitRow,
}

impl DigitDecoder {
    pub fn from_profile(profile: &LayoutProfile) -> Result<Self, VisionError> {
        Ok(Self {
            score_table: DigitTable::parse(&profile.score_digits)?,
            ex_table: DigitTable::parse(&profile.ex_score_digits)?,
            score_upper: profile.score_upper,
            score_lower: profile.score_lower,
            ex_row: profile.ex_score,
        })
    }

    /// Eight cells: the four upper-row digits, then the four lower-row digits.
    pub fn decode_score(&self, strip: &GrayImage) -> Result<DecodedCounter, VisionError> {
        let mut text = String::with_capacity(8);
        self.decode_row(strip, &self.score_upper, &self.score_table, &mut text)?;
        self.decode_row(strip, &self.score_lower, &self.score_table, &mut text)?;
        Ok(DecodedCounter(text))
    }

    /// Five cells.
    pub fn decode_ex_score(&self, strip: &GrayImage) -> Result<DecodedCounter, VisionError> {
        let mut text = String::with_capacity(5);
        self.decode_row(strip, &self.ex_row, &self.ex_table, &mut text)?;
        Ok(DecodedCounter(text))
    }

    fn decode_row(
        &self,
        strip: &GrayImage,
        row: &DigitRow,
        table: &DigitTable,
        out: &mut String,
    ) -> Result<(), VisionError> {
        for index in 0..row.cells {
            let cell = preprocess::crop_gray(strip, row.cell_region(index))?;
            let sum = phash::pixel_sum(&cell);

            // An unlit leading cell is rendered fully dark, not as a '0'.
            if sum == 0 {
                out.push(BLANK);
                continue;
            }

            let (looked_up, distance) = table.nearest(phash::average_hash(&cell));
            // This font renders 5 and 8 nearly alike; the raw pixel sum
            // separates them where the fingerprint cannot.
            let digit = match row.five_eight_sum {
                Some(cutoff) if looked_up == 5 || looked_up == 8 => {
                    if sum > cutoff {
                        8
                    } else {
                        5
                    }
                }
                _ => looked_up,
            };
            trace!(
                "Cell {}: sum {}, nearest {} (distance {}), decoded {}",
                index,
                sum,
                looked_up,
                distance,
                digit
            );
            out.push(char::from(b'0' + digit));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_data::Region;

    const CELL_W: u32 = 10;
    const CELL_H: u32 = 12;

    /// Profile whose digit glyphs are horizontal stripe patterns: digit `d`
    /// lights the row groups matching the bits of `d + 1`, so every digit has
    /// a distinct fingerprint and no glyph is fully dark.
    fn test_profile() -> LayoutProfile {
        let mut profile = LayoutProfile::builtin();
        profile.score_strip = Region::new(0, 0, 60, 42);
        profile.score_upper = DigitRow {
            origin_x: 0,
            origin_y: 0,
            stride: 12,
            cell_width: CELL_W,
            cell_height: CELL_H,
            cells: 4,
            five_eight_sum: Some(10_000),
        };
        profile.score_lower = DigitRow {
            origin_x: 0,
            origin_y: 14,
            stride: 12,
            cell_width: CELL_W,
            cell_height: CELL_H,
            cells: 4,
            five_eight_sum: None,
        };
        profile.ex_score = DigitRow {
            origin_x: 0,
            origin_y: 28,
            stride: 12,
            cell_width: CELL_W,
            cell_height: CELL_H,
            cells: 5,
            five_eight_sum: None,
        };

        for d in 0..10u8 {
            let hash = phash::average_hash(&glyph(d, 255)).to_string();
            profile.score_digits[d as usize] = hash.clone();
            profile.ex_score_digits[d as usize] = hash;
        }
        profile.validate().unwrap();
        profile
    }

    /// Stripe glyph for digit `d` with the given lit intensity.
    fn glyph(d: u8, lit: u8) -> GrayImage {
        let pattern = d + 1;
        GrayImage::from_fn(CELL_W, CELL_H, |_, y| {
            let group = (y * 4 / CELL_H) as u8;
            if pattern >> group & 1 == 1 {
                image::Luma([lit])
            } else {
                image::Luma([0u8])
            }
        })
    }

    /// Paint `cells` into a row of the strip; `None` leaves a cell dark.
    fn paint_row(strip: &mut GrayImage, row: &DigitRow, cells: &[Option<(u8, u8)>]) {
        for (index, cell) in cells.iter().enumerate() {
            let Some((digit, lit)) = cell else { continue };
            let region = row.cell_region(index as u32);
            let img = glyph(*digit, *lit);
            for (x, y, px) in img.enumerate_pixels() {
                strip.put_pixel(region.x + x, region.y + y, *px);
            }
        }
    }

    #[test]
    fn test_geometry_round_trip() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();
        let mut strip = GrayImage::new(60, 42);

        let upper: Vec<_> = [1u8, 2, 3, 4].map(|d| Some((d, 255u8))).to_vec();
        let lower: Vec<_> = [9u8, 0, 7, 6].map(|d| Some((d, 255u8))).to_vec();
        paint_row(&mut strip, &profile.score_upper, &upper);
        paint_row(&mut strip, &profile.score_lower, &lower);

        let decoded = decoder.decode_score(&strip).unwrap();
        assert_eq!(decoded.as_str(), "12349076");
        // Identical pixels decode identically.
        assert_eq!(decoder.decode_score(&strip).unwrap(), decoded);
    }

    #[test]
    fn test_blank_on_zero_sum() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();
        let mut strip = GrayImage::new(60, 42);

        paint_row(
            &mut strip,
            &profile.score_upper,
            &[None, None, Some((0, 255)), Some((0, 255))],
        );
        paint_row(
            &mut strip,
            &profile.score_lower,
            &[Some((1, 255)), Some((3, 255)), Some((7, 255)), None],
        );

        let decoded = decoder.decode_score(&strip).unwrap();
        assert_eq!(decoded.as_str(), "  00137 ");
        assert!(!decoded.is_all_zero());
    }

    #[test]
    fn test_ex_score_row() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();
        let mut strip = GrayImage::new(60, 42);

        let cells: Vec<_> = [0u8, 0, 1, 2, 3].map(|d| Some((d, 255u8))).to_vec();
        paint_row(&mut strip, &profile.ex_score, &cells);

        assert_eq!(decoder.decode_ex_score(&strip).unwrap().as_str(), "00123");
    }

    #[test]
    fn test_all_zero_is_run_start() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();
        let mut strip = GrayImage::new(60, 42);

        let zeros: Vec<_> = [0u8; 4].map(|d| Some((d, 255u8))).to_vec();
        paint_row(&mut strip, &profile.score_upper, &zeros);
        paint_row(&mut strip, &profile.score_lower, &zeros);

        let decoded = decoder.decode_score(&strip).unwrap();
        assert_eq!(decoded.as_str(), "00000000");
        assert!(decoded.is_all_zero());
    }

    #[test]
    fn test_five_eight_override_follows_pixel_sum() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();

        // A full-intensity glyph 5 sums to 6 rows * 10 px * 255 = 15300,
        // above the 10000 cutoff; a dim copy has the same fingerprint but
        // sums to 6000, below it.
        let mut strip = GrayImage::new(60, 42);
        paint_row(
            &mut strip,
            &profile.score_upper,
            &[Some((1, 255)), Some((1, 255)), Some((5, 255)), Some((5, 100))],
        );
        paint_row(&mut strip, &profile.score_lower, &[Some((1, 255)); 4]);

        let decoded = decoder.decode_score(&strip).unwrap();
        assert_eq!(&decoded.as_str()[..4], "1185");
    }

    #[test]
    fn test_five_eight_override_disabled_row_keeps_lookup() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();

        // The lower row carries no cutoff, so the lookup result stands even
        // for a dim glyph.
        let mut strip = GrayImage::new(60, 42);
        paint_row(&mut strip, &profile.score_upper, &[Some((1, 255)); 4]);
        paint_row(
            &mut strip,
            &profile.score_lower,
            &[Some((8, 100)), Some((5, 255)), Some((1, 255)), Some((1, 255))],
        );

        let decoded = decoder.decode_score(&strip).unwrap();
        assert_eq!(&decoded.as_str()[4..], "8511");
    }

    #[test]
    fn test_tie_keeps_lowest_digit() {
        let mut profile = test_profile();
        // Digits 2 and 3 share a fingerprint; the scan keeps the first.
        profile.score_digits[3] = profile.score_digits[2].clone();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();

        let mut strip = GrayImage::new(60, 42);
        let cells: Vec<_> = [2u8, 1, 1, 1].map(|d| Some((d, 255u8))).to_vec();
        paint_row(&mut strip, &profile.score_upper, &cells);
        paint_row(&mut strip, &profile.score_lower, &cells);

        let decoded = decoder.decode_score(&strip).unwrap();
        assert_eq!(decoded.as_str(), "21112111");
    }

    #[test]
    fn test_undersized_strip_is_error() {
        let profile = test_profile();
        let decoder = DigitDecoder::from_profile(&profile).unwrap();
        let strip = GrayImage::new(20, 10);
        assert!(matches!(
            decoder.decode_score(&strip),
            Err(VisionError::OutOfBounds { .. })
        ));
    }
}
