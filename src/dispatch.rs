/*!
Picks the widest evaluator the cpu supports, once.
*/

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::anchor::StridedTable;
use crate::error::{LatchError, LatchResult};
use crate::latch;
use crate::packer::Descriptor;
use crate::sampler::Location;
use crate::view::ImageView;

/// Implementation used to evaluate the triplets.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Backend {
    /// Widest one available.
    #[default]
    Auto,
    Scalar,
    /// 128 bit, x86_64 with sse4.1.
    Sse41,
    /// 256 bit, x86_64 with avx2.
    Avx2,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Auto => "auto",
            Backend::Scalar => "scalar",
            Backend::Sse41 => "sse41",
            Backend::Avx2 => "avx2",
        };
        f.write_str(name)
    }
}

impl FromStr for Backend {
    type Err = LatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "scalar" => Ok(Backend::Scalar),
            "sse41" | "sse4.1" => Ok(Backend::Sse41),
            "avx2" => Ok(Backend::Avx2),
            _ => Err(LatchError::InvalidConfig {
                key: "backend",
                value: s.to_string(),
            }),
        }
    }
}

/// Turns one keypoint into its descriptor. All implementations produce identical bits.
pub trait BatchEvaluator: Send + Sync {
    fn backend(&self) -> Backend;

    fn describe(&self, image: &ImageView, table: &StridedTable, location: Location) -> Descriptor;
}

struct ScalarEvaluator;

impl BatchEvaluator for ScalarEvaluator {
    fn backend(&self) -> Backend {
        Backend::Scalar
    }

    fn describe(&self, image: &ImageView, table: &StridedTable, location: Location) -> Descriptor {
        latch::describe(image, table.table(), location)
    }
}

/// Only handed out by [`select`] after the feature check.
#[cfg(target_arch = "x86_64")]
struct Sse41Evaluator {
    _detected: (),
}

#[cfg(target_arch = "x86_64")]
impl BatchEvaluator for Sse41Evaluator {
    fn backend(&self) -> Backend {
        Backend::Sse41
    }

    fn describe(&self, image: &ImageView, table: &StridedTable, location: Location) -> Descriptor {
        unsafe { crate::latch_simd::sse41::describe(image, table, location) }
    }
}

/// Only handed out by [`select`] after the feature check.
#[cfg(target_arch = "x86_64")]
struct Avx2Evaluator {
    _detected: (),
}

#[cfg(target_arch = "x86_64")]
impl BatchEvaluator for Avx2Evaluator {
    fn backend(&self) -> Backend {
        Backend::Avx2
    }

    fn describe(&self, image: &ImageView, table: &StridedTable, location: Location) -> Descriptor {
        unsafe { crate::latch_simd::avx2::describe(image, table, location) }
    }
}

static SCALAR: ScalarEvaluator = ScalarEvaluator;
#[cfg(target_arch = "x86_64")]
static SSE41: Sse41Evaluator = Sse41Evaluator { _detected: () };
#[cfg(target_arch = "x86_64")]
static AVX2: Avx2Evaluator = Avx2Evaluator { _detected: () };

/// Whether `backend` can run here. `Auto` always can.
pub fn is_supported(backend: Backend) -> bool {
    match backend {
        Backend::Auto | Backend::Scalar => true,
        #[cfg(target_arch = "x86_64")]
        Backend::Sse41 => is_x86_feature_detected!("sse4.1") && is_x86_feature_detected!("ssse3"),
        #[cfg(target_arch = "x86_64")]
        Backend::Avx2 => is_x86_feature_detected!("avx2"),
        #[cfg(not(target_arch = "x86_64"))]
        Backend::Sse41 | Backend::Avx2 => false,
    }
}

/// The widest supported backend, detected on first use.
pub fn detect() -> Backend {
    static DETECTED: OnceLock<Backend> = OnceLock::new();
    *DETECTED.get_or_init(|| {
        let backend = [Backend::Avx2, Backend::Sse41]
            .into_iter()
            .find(|b| is_supported(*b))
            .unwrap_or(Backend::Scalar);
        log::debug!("detected descriptor backend: {backend}");
        backend
    })
}

pub fn select(backend: Backend) -> LatchResult<&'static dyn BatchEvaluator> {
    let backend = match backend {
        Backend::Auto => detect(),
        b => b,
    };
    if !is_supported(backend) {
        return Err(LatchError::UnsupportedBackend(backend));
    }
    match backend {
        #[cfg(target_arch = "x86_64")]
        Backend::Avx2 => Ok(&AVX2),
        #[cfg(target_arch = "x86_64")]
        Backend::Sse41 => Ok(&SSE41),
        _ => Ok(&SCALAR),
    }
}
