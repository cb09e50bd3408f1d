pub mod classifier;
pub mod digits;
pub mod phash;
pub mod preprocess;

pub use classifier::{Phase, ScreenClassifier};
pub use digits::{DecodedCounter, DigitDecoder};
pub use phash::Fingerprint;
pub use preprocess::TopSide;

use lens_data::Region;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisionError {
    #[error("crop region {region:?} exceeds the {width}x{height} frame")]
    OutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },
    #[error("reference fingerprint {text:?} is not 16 hex digits")]
    BadFingerprint { text: String },
}
