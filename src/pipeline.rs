use image::RgbaImage;
use serde::Serialize;
use tracing::{info, warn};

use lens_data::{LayoutProfile, Region};
use lens_state::SessionValidator;
use lens_vision::{
    preprocess, DecodedCounter, DigitDecoder, Phase, ScreenClassifier, VisionError,
};

/// Outcome of one frame through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReading {
    pub phase: Phase,
    pub in_play: bool,
    pub score: Option<DecodedCounter>,
    pub ex_score: Option<DecodedCounter>,
    /// False when the session validator rejected this frame's counters.
    pub accepted: bool,
}

impl FrameReading {
    fn without_counters(phase: Phase, in_play: bool) -> Self {
        Self {
            phase,
            in_play,
            score: None,
            ex_score: None,
            accepted: true,
        }
    }
}

/// Caller-side state machine around the per-frame core: tracks whether a run
/// is active, owns the session validator, and feeds it decoded counters in
/// capture order. Frames must be presented in strict capture order.
pub struct Pipeline {
    classifier: ScreenClassifier,
    decoder: DigitDecoder,
    validator: SessionValidator,
    strip_region: Region,
    monochrome_threshold: u8,
    in_play: bool,
}

impl Pipeline {
    pub fn from_profile(profile: &LayoutProfile) -> Result<Self, VisionError> {
        Ok(Self {
            classifier: ScreenClassifier::from_profile(profile)?,
            decoder: DigitDecoder::from_profile(profile)?,
            validator: SessionValidator::new(),
            strip_region: profile.score_strip,
            monochrome_threshold: profile.monochrome_threshold,
            in_play: false,
        })
    }

    /// Process one canonically-oriented frame.
    pub fn process(&mut self, frame: &RgbaImage) -> Result<FrameReading, VisionError> {
        let phase = self.classifier.classify(frame)?;

        match phase {
            Phase::Result | Phase::Transition => {
                if self.in_play {
                    info!("Run ended on {:?} frame", phase);
                    self.in_play = false;
                    self.validator.reset();
                }
                Ok(FrameReading::without_counters(phase, false))
            }
            Phase::InPlay => {
                if !self.in_play {
                    info!("Run started");
                    self.in_play = true;
                }
                let (score, ex_score) = self.decode_counters(frame)?;
                let accepted = self.validate(&score, &ex_score);
                Ok(FrameReading {
                    phase,
                    in_play: true,
                    score: Some(score),
                    ex_score: Some(ex_score),
                    accepted,
                })
            }
            Phase::Unknown => {
                // The gauge probes can miss the first frames of a run, but a
                // counter strip reading all zeros is the start-of-run HUD,
                // so it starts a run on its own.
                let (score, ex_score) = self.decode_counters(frame)?;
                if !self.in_play && score.is_all_zero() {
                    info!("Run started (all-zero counter strip)");
                    self.in_play = true;
                }
                if !self.in_play {
                    return Ok(FrameReading::without_counters(phase, false));
                }
                let accepted = self.validate(&score, &ex_score);
                Ok(FrameReading {
                    phase,
                    in_play: true,
                    score: Some(score),
                    ex_score: Some(ex_score),
                    accepted,
                })
            }
        }
    }

    /// Abort any active run, e.g. when the capture source restarts.
    pub fn reset(&mut self) {
        self.in_play = false;
        self.validator.reset();
    }

    pub fn is_in_play(&self) -> bool {
        self.in_play
    }

    pub fn last_accepted(&self) -> Option<(u64, u64)> {
        self.validator.last_accepted()
    }

    fn decode_counters(
        &self,
        frame: &RgbaImage,
    ) -> Result<(DecodedCounter, DecodedCounter), VisionError> {
        let strip = preprocess::crop(frame, self.strip_region)?;
        let mono = preprocess::binarize(&strip, self.monochrome_threshold);
        let score = self.decoder.decode_score(&mono)?;
        let ex_score = self.decoder.decode_ex_score(&mono)?;
        Ok((score, ex_score))
    }

    fn validate(&mut self, score: &DecodedCounter, ex_score: &DecodedCounter) -> bool {
        match self.validator.accept(score.as_str(), ex_score.as_str()) {
            Ok(()) => true,
            Err(violation) => {
                warn!("Discarding frame reading: {}", violation);
                false
            }
        }
    }
}
