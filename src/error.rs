/*!
Errors surfaced by descriptor extraction.
*/

use std::collections::TryReserveError;

use thiserror::Error;

use crate::dispatch::Backend;

/// Everything that can make a call fail as a whole.
///
/// Problems with a single keypoint never end up here, those are resolved by
/// clamping or reported through [`crate::Descriptors::rejected`].
#[derive(Debug, Error)]
pub enum LatchError {
    #[error("Image dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("Image geometry {width}x{height} with stride {stride} exceeds the signed 32 bit range")]
    DimensionTooLarge { width: u32, height: u32, stride: u32 },

    #[error("Stride {stride} is smaller than the image width {width}")]
    StrideTooSmall { width: u32, stride: u32 },

    #[error("Image buffer holds {actual} bytes, geometry requires at least {required}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("Output buffer holds {actual} words, {keypoints} keypoints require {required}")]
    OutputSize {
        keypoints: usize,
        required: usize,
        actual: usize,
    },

    #[error("Anchor table has no triplets")]
    EmptyAnchorTable,

    #[error("Anchor table has {count} triplets, at most {max} fit in a descriptor")]
    TooManyTriplets { count: usize, max: usize },

    #[error("Triplet {index} has offset ({dx}, {dy}), components are limited to +/-{max}")]
    OffsetOutOfRange {
        index: usize,
        dx: i32,
        dy: i32,
        max: i32,
    },

    #[error("Triplet {index} compares a patch against itself")]
    DegenerateTriplet { index: usize },

    #[error("Failed to allocate working memory: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Backend {0} is not supported by this cpu")]
    UnsupportedBackend(Backend),

    #[error("Thread count must be at least one")]
    InvalidThreadCount,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid value '{value}' for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

pub type LatchResult<T> = Result<T, LatchError>;
