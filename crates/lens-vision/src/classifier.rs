use image::RgbaImage;
use lens_data::{LayoutProfile, Region};
use serde::Serialize;
use tracing::{debug, trace};

use crate::phash::{self, Fingerprint};
use crate::preprocess;
use crate::VisionError;

/// Play-session stage inferred from a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Unknown,
    InPlay,
    Result,
    Transition,
}

/// One fingerprint probe: a fixed HUD region matched against a reference
/// within a Hamming-distance bound.
#[derive(Debug, Clone, Copy)]
struct Probe {
    region: Region,
    reference: Fingerprint,
    max_distance: u32,
}

impl Probe {
    fn new(region: Region, hex: &str, max_distance: u32) -> Result<Self, VisionError> {
        Ok(Self {
            region,
            reference: Fingerprint::from_hex(hex)?,
            max_distance,
        })
    }

    fn matches(&self, frame: &RgbaImage) -> Result<bool, VisionError> {
        let crop = preprocess::crop(frame, self.region)?;
        let distance = phash::average_hash_rgba(&crop).distance(self.reference);
        trace!(
            "Probe {:?}: distance {} (max {})",
            self.region,
            distance,
            self.max_distance
        );
        Ok(distance < self.max_distance)
    }
}

/// Classifies canonically-oriented frames into phases by fingerprinting fixed
/// HUD regions. Holds no cross-frame state; temporal tracking is the caller's
/// concern, so independent frames may be classified concurrently.
pub struct ScreenClassifier {
    onplay1: Probe,
    onplay2: Probe,
    onresult: Probe,
    onresult2: Probe,
    endselect: Probe,
    endresult: Fingerprint,
    end_screen_max_distance: u32,
    transition_channel_sum: u64,
}

impl ScreenClassifier {
    pub fn from_profile(profile: &LayoutProfile) -> Result<Self, VisionError> {
        let refs = &profile.references;
        Ok(Self {
            onplay1: Probe::new(
                profile.onplay1_region,
                &refs.onplay1,
                profile.in_play_max_distance,
            )?,
            onplay2: Probe::new(
                profile.onplay2_region,
                &refs.onplay2,
                profile.in_play_max_distance,
            )?,
            onresult: Probe::new(
                profile.onresult_region,
                &refs.onresult,
                profile.result_max_distance,
            )?,
            onresult2: Probe::new(
                profile.onresult2_region,
                &refs.onresult2,
                profile.result_max_distance,
            )?,
            endselect: Probe::new(
                profile.endselect_region,
                &refs.endselect,
                profile.end_screen_max_distance,
            )?,
            endresult: Fingerprint::from_hex(&refs.endresult)?,
            end_screen_max_distance: profile.end_screen_max_distance,
            transition_channel_sum: profile.transition_channel_sum,
        })
    }

    /// True only when both the gauge-area box and the status-bar strip match.
    /// Requiring both keeps a partially occluded HUD from reading as play.
    pub fn is_in_play(&self, frame: &RgbaImage) -> Result<bool, VisionError> {
        Ok(self.onplay1.matches(frame)? && self.onplay2.matches(frame)?)
    }

    /// True only when both result-screen panels match.
    pub fn is_result(&self, frame: &RgbaImage) -> Result<bool, VisionError> {
        Ok(self.onresult.matches(frame)? && self.onresult2.matches(frame)?)
    }

    /// True for fade/loading frames: the whole frame is overwhelmingly dark.
    /// The cutoff is exclusive; a frame summing exactly to it is not a
    /// transition.
    pub fn is_transition(&self, frame: &RgbaImage) -> bool {
        green_channel_sum(frame) < self.transition_channel_sum
    }

    /// Whether the song-select screen is about to leave.
    pub fn is_end_of_select(&self, frame: &RgbaImage) -> Result<bool, VisionError> {
        self.endselect.matches(frame)
    }

    /// Whether the result screen is about to leave. Matches the whole frame.
    pub fn is_end_of_result(&self, frame: &RgbaImage) -> bool {
        let distance = phash::average_hash_rgba(frame).distance(self.endresult);
        trace!(
            "End-of-result: distance {} (max {})",
            distance,
            self.end_screen_max_distance
        );
        distance < self.end_screen_max_distance
    }

    /// Decide the phase of one frame. Transition is checked first so that
    /// fade frames never reach the fingerprint probes.
    pub fn classify(&self, frame: &RgbaImage) -> Result<Phase, VisionError> {
        let phase = if self.is_transition(frame) {
            Phase::Transition
        } else if self.is_result(frame)? {
            Phase::Result
        } else if self.is_in_play(frame)? {
            Phase::InPlay
        } else {
            Phase::Unknown
        };
        debug!("Frame classified as {:?}", phase);
        Ok(phase)
    }
}

fn green_channel_sum(frame: &RgbaImage) -> u64 {
    frame.pixels().map(|p| u64::from(p[1])).sum()
}
