use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pixel rectangle in the canonical (portrait) frame orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle lies entirely inside a `width` x `height` raster.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// One row of fixed-size, fixed-stride digit cells inside the counter strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitRow {
    pub origin_x: u32,
    pub origin_y: u32,
    /// Horizontal distance between the left edges of adjacent cells.
    pub stride: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub cells: u32,
    /// Pixel-sum cutoff deciding a 5-vs-8 lookup: above means 8, at or below
    /// means 5. `None` leaves the lookup result untouched for this row.
    pub five_eight_sum: Option<u64>,
}

impl DigitRow {
    /// Rectangle of the `index`-th cell, in strip coordinates.
    pub fn cell_region(&self, index: u32) -> Region {
        Region::new(
            self.origin_x + self.stride * index,
            self.origin_y,
            self.cell_width,
            self.cell_height,
        )
    }
}

/// Hex-encoded 64-bit reference fingerprints for the phase probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRefs {
    /// Gauge-area box shown only during play.
    pub onplay1: String,
    /// Thin status-bar strip under the play field.
    pub onplay2: String,
    /// Rank panel on the result screen.
    pub onresult: String,
    /// Detail panel on the result screen.
    pub onresult2: String,
    /// Top band of the song-select screen as it starts to leave.
    pub endselect: String,
    /// Whole frame of the result screen as it starts to leave.
    pub endresult: String,
}

/// Everything tied to the one supported capture layout: probe geometry,
/// match thresholds, and the reference fingerprint tables.
///
/// Loaded once by the caller and handed to the vision components, so an
/// alternate skin or resolution is a substitute profile, not a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutProfile {
    /// Frame size after rotation to the canonical portrait orientation.
    pub canonical_width: u32,
    pub canonical_height: u32,
    /// Luminance cutoff for the counter-strip binarization.
    pub monochrome_threshold: u8,
    /// Whole-frame green-channel sum below which a frame counts as a
    /// screen transition (fade/loading). Exclusive bound.
    pub transition_channel_sum: u64,
    /// Hamming-distance bound for the two in-play probes.
    pub in_play_max_distance: u32,
    /// Hamming-distance bound for the two result-screen probes.
    pub result_max_distance: u32,
    /// Hamming-distance bound for the end-of-select / end-of-result probes.
    pub end_screen_max_distance: u32,
    pub onplay1_region: Region,
    pub onplay2_region: Region,
    pub onresult_region: Region,
    pub onresult2_region: Region,
    pub endselect_region: Region,
    pub references: PhaseRefs,
    /// Region of the canonical frame holding both on-screen counters.
    pub score_strip: Region,
    pub score_upper: DigitRow,
    pub score_lower: DigitRow,
    pub ex_score: DigitRow,
    /// Hex fingerprints for score digits 0-9.
    pub score_digits: [String; 10],
    /// Hex fingerprints for EX-score digits 0-9 (different font rendering).
    pub ex_score_digits: [String; 10],
}

impl LayoutProfile {
    /// The shipped layout: a portrait-rotated 1080x1920 capture of the one
    /// supported cabinet skin.
    pub fn builtin() -> Self {
        Self {
            canonical_width: 1080,
            canonical_height: 1920,
            monochrome_threshold: 90,
            transition_channel_sum: 2_500_000,
            in_play_max_distance: 10,
            result_max_distance: 5,
            end_screen_max_distance: 10,
            onplay1_region: Region::new(0, 420, 130, 87),
            onplay2_region: Region::new(15, 876, 295, 15),
            onresult_region: Region::new(340, 1600, 199, 39),
            onresult2_region: Region::new(30, 1390, 209, 39),
            endselect_region: Region::new(0, 0, 1080, 380),
            references: PhaseRefs {
                onplay1: "183c7e7edbc3c3e7".into(),
                onplay2: "ffff00000000ffff".into(),
                onresult: "3c66c3dbdbc3663c".into(),
                onresult2: "0f0f0f0ff0f0f0f0".into(),
                endselect: "ff818181818181ff".into(),
                endresult: "00183c7e7e3c1800".into(),
            },
            score_strip: Region::new(691, 396, 389, 79),
            score_upper: DigitRow {
                origin_x: 0,
                origin_y: 0,
                stride: 52,
                cell_width: 47,
                cell_height: 45,
                cells: 4,
                five_eight_sum: Some(410_000),
            },
            score_lower: DigitRow {
                origin_x: 210,
                origin_y: 10,
                stride: 41,
                cell_width: 36,
                cell_height: 35,
                cells: 4,
                five_eight_sum: Some(250_000),
            },
            ex_score: DigitRow {
                origin_x: 240,
                origin_y: 61,
                stride: 16,
                cell_width: 13,
                cell_height: 18,
                cells: 5,
                five_eight_sum: Some(46_000),
            },
            score_digits: [
                "1f3f43c3c3c2fcf8".into(), // 0
                "1c3c0c0c0c0c0c0c".into(), // 1
                "7e7f033b7f407f7f".into(), // 2
                "7c7c023f7b037c78".into(), // 3
                "1e3e46c6c6ffff06".into(), // 4
                "7f7f404e5f037f7e".into(), // 5
                "7c7ec0feffc3ff7e".into(), // 6
                "fffe0e0c1c183030".into(), // 7
                "3f7fc3ffffc3fffc".into(), // 8
                "1e3f43c3ff033f3e".into(), // 9
            ],
            ex_score_digits: [
                "7ec3c3c3c3c3c33e".into(), // 0
                "0c0c0c0c0c0c0c0c".into(), // 1
                "7f0303077e407f7f".into(), // 2
                "7f0303071f037f7f".into(), // 3
                "0b1b33637f7f0303".into(), // 4
                "7f607c7f03037f7e".into(), // 5
                "ffc0e0ffc3c3ff7e".into(), // 6
                "ff0b03060c0c1818".into(), // 7
                "7ec3c343ffc3eb7e".into(), // 8
                "7fc3c3c37f0303ff".into(), // 9
            ],
        }
    }

    /// Load a substitute profile from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        let profile: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile {}", path.display()))?;
        profile
            .validate()
            .with_context(|| format!("Invalid profile {}", path.display()))?;
        tracing::info!("Loaded layout profile from {}", path.display());
        Ok(profile)
    }

    /// Reject geometry that does not fit the frame or the counter strip, and
    /// fingerprint strings that are not 16 hex digits.
    pub fn validate(&self) -> Result<()> {
        let (w, h) = (self.canonical_width, self.canonical_height);

        for (name, region) in [
            ("onplay1", &self.onplay1_region),
            ("onplay2", &self.onplay2_region),
            ("onresult", &self.onresult_region),
            ("onresult2", &self.onresult2_region),
            ("endselect", &self.endselect_region),
            ("score_strip", &self.score_strip),
        ] {
            if !region.fits_within(w, h) {
                bail!("{name} region {region:?} exceeds the {w}x{h} canonical frame");
            }
        }

        for (name, row) in [
            ("score_upper", &self.score_upper),
            ("score_lower", &self.score_lower),
            ("ex_score", &self.ex_score),
        ] {
            if row.cells == 0 {
                bail!("{name} row has no cells");
            }
            let last = row.cell_region(row.cells - 1);
            if !last.fits_within(self.score_strip.width, self.score_strip.height) {
                bail!(
                    "{name} cell {} ({last:?}) exceeds the {}x{} counter strip",
                    row.cells - 1,
                    self.score_strip.width,
                    self.score_strip.height
                );
            }
        }

        let refs = &self.references;
        for (name, hex) in [
            ("onplay1", &refs.onplay1),
            ("onplay2", &refs.onplay2),
            ("onresult", &refs.onresult),
            ("onresult2", &refs.onresult2),
            ("endselect", &refs.endselect),
            ("endresult", &refs.endresult),
        ] {
            validate_hex(name, hex)?;
        }
        for (i, hex) in self.score_digits.iter().enumerate() {
            validate_hex(&format!("score digit {i}"), hex)?;
        }
        for (i, hex) in self.ex_score_digits.iter().enumerate() {
            validate_hex(&format!("EX score digit {i}"), hex)?;
        }

        Ok(())
    }
}

impl Default for LayoutProfile {
    fn default() -> Self {
        Self::builtin()
    }
}

fn validate_hex(name: &str, hex: &str) -> Result<()> {
    if hex.len() != 16 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("{name} fingerprint {hex:?} is not 16 hex digits");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_validates() {
        LayoutProfile::builtin().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let profile = LayoutProfile::builtin();
        let json = serde_json::to_string_pretty(&profile).unwrap();
        let back: LayoutProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_cell_region_stride() {
        let row = LayoutProfile::builtin().score_lower;
        let first = row.cell_region(0);
        let second = row.cell_region(1);
        assert_eq!(first.x, 210);
        assert_eq!(second.x, 210 + 41);
        assert_eq!(first.y, second.y);
    }

    #[test]
    fn test_rejects_row_outside_strip() {
        let mut profile = LayoutProfile::builtin();
        profile.ex_score.origin_y = profile.score_strip.height;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_fingerprint() {
        let mut profile = LayoutProfile::builtin();
        profile.references.onplay1 = "not-a-fingerprint".into();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_load_nonexistent_is_error() {
        assert!(LayoutProfile::load(Path::new("/nonexistent/profile.json")).is_err());
    }
}
