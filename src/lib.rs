/*!
Upright LATCH 512 bit binary descriptors.

For every keypoint, 512 triplets of 7x7 patches are sampled around it. Bit `i` tells whether
patch `a` of triplet `i` is closer (sum of squared differences) to the anchor patch `c` than patch
`b` is. Offsets are applied in image axes, there is no rotation or scale compensation.

The scalar implementation in [`latch`] is the definition, the kernels in [`latch_simd`] produce
identical bits and are picked at runtime through [`dispatch`]. Keypoints are split over a worker
pool by [`partition`], the thread count never changes the output.
*/
pub mod anchor;
pub mod comparator;
pub mod dispatch;
pub mod error;
pub mod latch;
pub mod latch_simd;
pub mod packer;
pub mod partition;
pub mod sampler;
pub mod view;

pub use anchor::{AnchorTable, Offset, Triplet};
pub use dispatch::Backend;
pub use error::{LatchError, LatchResult};
pub use packer::{Descriptor, DESCRIPTOR_BITS, DESCRIPTOR_WORDS};
pub use partition::Threading;
pub use sampler::KeyPoint;
pub use view::ImageView;

use anchor::StridedTable;
use dispatch::BatchEvaluator;
use partition::Partitioner;

pub const THREADS_ENV: &str = "ULATCH_THREADS";
pub const BACKEND_ENV: &str = "ULATCH_BACKEND";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct LatchConfig {
    /// Number of workers keypoints are divided over.
    pub threading: Threading,

    /// Evaluator implementation, `Auto` picks the widest the cpu supports.
    pub backend: Backend,
}

impl LatchConfig {
    /// Defaults, overridden by `ULATCH_THREADS` (single, auto or a count) and `ULATCH_BACKEND`
    /// (auto, scalar, sse41, avx2) when set.
    pub fn from_env() -> LatchResult<Self> {
        let mut config = LatchConfig::default();
        if let Ok(v) = std::env::var(THREADS_ENV) {
            config.threading = v.parse()?;
        }
        if let Ok(v) = std::env::var(BACKEND_ENV) {
            config.backend = v.parse()?;
        }
        Ok(config)
    }
}

/// Descriptors for a batch of keypoints, in keypoint order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Descriptors {
    words: Vec<u64>,
    rejected: Vec<usize>,
}

impl Descriptors {
    pub fn len(&self) -> usize {
        self.words.len() / DESCRIPTOR_WORDS
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        let start = index.checked_mul(DESCRIPTOR_WORDS)?;
        let end = start.checked_add(DESCRIPTOR_WORDS)?;
        self.words.get(start..end)?.try_into().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> + '_ {
        self.words
            .chunks_exact(DESCRIPTOR_WORDS)
            .filter_map(|w| w.try_into().ok())
    }

    /// All words, descriptor `k` at `8k..8k + 8`.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Indices of keypoints with non-finite coordinates, their descriptors are all zero.
    pub fn rejected(&self) -> &[usize] {
        &self.rejected
    }

    pub fn into_words(self) -> Vec<u64> {
        self.words
    }
}

/// Descriptor engine with its evaluator and worker pool set up once.
pub struct Extractor {
    evaluator: &'static dyn BatchEvaluator,
    partitioner: Partitioner,
}

impl Extractor {
    pub fn new(config: &LatchConfig) -> LatchResult<Self> {
        let evaluator = dispatch::select(config.backend)?;
        let partitioner = Partitioner::new(config.threading)?;
        log::debug!(
            "descriptor extractor using {} with {} workers",
            evaluator.backend(),
            partitioner.workers()
        );
        Ok(Extractor {
            evaluator,
            partitioner,
        })
    }

    pub fn backend(&self) -> Backend {
        self.evaluator.backend()
    }

    pub fn workers(&self) -> usize {
        self.partitioner.workers()
    }

    pub fn compute(
        &self,
        image: &ImageView,
        table: &AnchorTable,
        keypoints: &[KeyPoint],
    ) -> LatchResult<Descriptors> {
        let mut words = Vec::new();
        words.try_reserve_exact(keypoints.len() * DESCRIPTOR_WORDS)?;
        words.resize(keypoints.len() * DESCRIPTOR_WORDS, 0);
        let rejected = self.compute_into(image, table, keypoints, &mut words)?;
        Ok(Descriptors { words, rejected })
    }

    /// Writes the descriptor of keypoint `k` to `out[8k..8k + 8]`, `out` must hold exactly
    /// 8 words per keypoint. Returns the indices of rejected keypoints.
    ///
    /// Nothing is written when an error is returned.
    pub fn compute_into(
        &self,
        image: &ImageView,
        table: &AnchorTable,
        keypoints: &[KeyPoint],
        out: &mut [u64],
    ) -> LatchResult<Vec<usize>> {
        let required = keypoints.len() * DESCRIPTOR_WORDS;
        if out.len() != required {
            return Err(LatchError::OutputSize {
                keypoints: keypoints.len(),
                required,
                actual: out.len(),
            });
        }
        if keypoints.is_empty() {
            return Ok(vec![]);
        }

        let strided = StridedTable::new(table, image.stride())?;
        let margin = table.margin();
        let rejected: Vec<usize> = keypoints
            .iter()
            .enumerate()
            .filter(|(_, kp)| sampler::locate(kp, image, margin).is_none())
            .map(|(i, _)| i)
            .collect();
        log::trace!(
            "describing {} keypoints on {}x{} image, {} rejected",
            keypoints.len(),
            image.width(),
            image.height(),
            rejected.len()
        );

        let evaluator = self.evaluator;
        self.partitioner.run(keypoints, out, |kps, words| {
            for (kp, slot) in kps.iter().zip(words.chunks_exact_mut(DESCRIPTOR_WORDS)) {
                let descriptor = match sampler::locate(kp, image, margin) {
                    Some(location) => evaluator.describe(image, &strided, location),
                    None => [0u64; DESCRIPTOR_WORDS],
                };
                slot.copy_from_slice(&descriptor);
            }
        });
        Ok(rejected)
    }
}

/// Descriptors for `keypoints` on a raw 8 bit image, using the upright anchor table.
///
/// `multithreaded` spreads the keypoints over one worker per cpu, the result is the same either
/// way.
///
/// ```
/// use upright_latch::{compute_descriptors, KeyPoint};
///
/// let data: Vec<u8> = (0..64 * 48).map(|i| (i * 31 % 251) as u8).collect();
/// let keypoints = [KeyPoint::new(32.0, 24.0), KeyPoint::new(f32::NAN, 1.0)];
/// let descriptors = compute_descriptors(&data, 64, 48, 64, &keypoints, false)?;
/// assert_eq!(descriptors.len(), 2);
/// assert_eq!(descriptors.rejected(), &[1]);
/// # Ok::<(), upright_latch::LatchError>(())
/// ```
pub fn compute_descriptors(
    image_data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    keypoints: &[KeyPoint],
    multithreaded: bool,
) -> LatchResult<Descriptors> {
    let image = ImageView::new(image_data, width, height, stride)?;
    let config = LatchConfig {
        threading: if multithreaded {
            Threading::Auto
        } else {
            Threading::Single
        },
        backend: Backend::Auto,
    };
    Extractor::new(&config)?.compute(&image, AnchorTable::upright(), keypoints)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_descriptors_access() {
        let descriptors = Descriptors {
            words: (0..16).collect(),
            rejected: vec![1],
        };
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors.get(1), Some(&[8, 9, 10, 11, 12, 13, 14, 15]));
        assert_eq!(descriptors.get(2), None);
        assert_eq!(descriptors.get(usize::MAX), None);
        assert_eq!(descriptors.iter().count(), 2);
        assert_eq!(descriptors.rejected(), &[1]);
    }

    #[test]
    fn test_output_size_checked_without_writes() {
        let data = [7u8; 32 * 32];
        let image = ImageView::new(&data, 32, 32, 32).unwrap();
        let extractor = Extractor::new(&LatchConfig {
            threading: Threading::Single,
            backend: Backend::Scalar,
        })
        .unwrap();
        let keypoints = [KeyPoint::new(16.0, 16.0)];
        let mut out = [u64::MAX; 9];
        let r = extractor.compute_into(&image, AnchorTable::upright(), &keypoints, &mut out);
        assert!(matches!(
            r,
            Err(LatchError::OutputSize {
                keypoints: 1,
                required: 8,
                actual: 9
            })
        ));
        assert_eq!(out, [u64::MAX; 9]);
    }

    #[test]
    fn test_rejected_slots_are_zero() {
        let data: Vec<u8> = (0..48 * 48).map(|i| (i * 7 % 251) as u8).collect();
        let image = ImageView::new(&data, 48, 48, 48).unwrap();
        let extractor = Extractor::new(&LatchConfig {
            threading: Threading::Single,
            backend: Backend::Auto,
        })
        .unwrap();
        let keypoints = [
            KeyPoint::new(24.0, 24.0),
            KeyPoint::new(f32::NAN, 3.0),
            KeyPoint::new(10.0, f32::NEG_INFINITY),
        ];
        let mut out = [u64::MAX; 24];
        let rejected = extractor
            .compute_into(&image, AnchorTable::upright(), &keypoints, &mut out)
            .unwrap();
        assert_eq!(rejected, vec![1, 2]);
        assert_ne!(out[0..8], [0u64; 8]);
        assert_eq!(out[8..24], [0u64; 16]);
    }

    #[test]
    fn test_geometry_rejected_up_front() {
        let data = [0u8; 16];
        let keypoints = [KeyPoint::new(1.0, 1.0)];
        assert!(matches!(
            compute_descriptors(&data, 4, 4, 3, &keypoints, false),
            Err(LatchError::StrideTooSmall { .. })
        ));
        assert!(matches!(
            compute_descriptors(&data, 4, 5, 4, &keypoints, false),
            Err(LatchError::BufferTooSmall { .. })
        ));
        assert!(matches!(
            compute_descriptors(&data, 0, 4, 4, &keypoints, true),
            Err(LatchError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn test_config_env() {
        // Only this test touches these variables.
        std::env::set_var(THREADS_ENV, "3");
        std::env::set_var(BACKEND_ENV, "scalar");
        let config = LatchConfig::from_env().unwrap();
        assert_eq!(config.threading, Threading::Fixed(3));
        assert_eq!(config.backend, Backend::Scalar);

        std::env::set_var(BACKEND_ENV, "gpu");
        assert!(matches!(
            LatchConfig::from_env(),
            Err(LatchError::InvalidConfig { key: "backend", .. })
        ));

        std::env::remove_var(THREADS_ENV);
        std::env::remove_var(BACKEND_ENV);
        assert_eq!(LatchConfig::from_env().unwrap(), LatchConfig::default());
    }
}
