use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{LatchError, LatchResult};
use crate::packer::DESCRIPTOR_WORDS;
use crate::sampler::KeyPoint;

/// How many workers share a batch of keypoints.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Threading {
    /// Everything on the calling thread.
    Single,
    /// One worker per logical cpu.
    #[default]
    Auto,
    Fixed(usize),
}

impl Threading {
    pub fn worker_count(&self) -> LatchResult<usize> {
        match *self {
            Threading::Single => Ok(1),
            Threading::Auto => Ok(num_cpus::get().max(1)),
            Threading::Fixed(0) => Err(LatchError::InvalidThreadCount),
            Threading::Fixed(n) => Ok(n),
        }
    }
}

impl fmt::Display for Threading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threading::Single => f.write_str("single"),
            Threading::Auto => f.write_str("auto"),
            Threading::Fixed(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Threading {
    type Err = LatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Threading::Single),
            "auto" => Ok(Threading::Auto),
            n => match n.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Threading::Fixed(n)),
                _ => Err(LatchError::InvalidConfig {
                    key: "threads",
                    value: s.to_string(),
                }),
            },
        }
    }
}

/// Keypoints per worker when `count` keypoints are split over `workers`.
pub fn range_len(count: usize, workers: usize) -> usize {
    count.div_ceil(workers.max(1)).max(1)
}

/// The contiguous, disjoint keypoint ranges handed to the workers.
pub fn ranges(count: usize, workers: usize) -> Vec<Range<usize>> {
    let len = range_len(count, workers);
    (0..count)
        .step_by(len)
        .map(|start| start..(start + len).min(count))
        .collect()
}

/// Runs a job over every keypoint range, either inline or on a pool built once up front.
pub enum Partitioner {
    Sequential,
    Pooled(rayon::ThreadPool),
}

impl Partitioner {
    pub fn new(threading: Threading) -> LatchResult<Self> {
        let workers = threading.worker_count()?;
        if workers == 1 {
            return Ok(Partitioner::Sequential);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("latch-worker-{i}"))
            .build()?;
        log::debug!("built descriptor pool with {workers} workers");
        Ok(Partitioner::Pooled(pool))
    }

    pub fn workers(&self) -> usize {
        match self {
            Partitioner::Sequential => 1,
            Partitioner::Pooled(pool) => pool.current_num_threads(),
        }
    }

    /// Calls `job` with each keypoint range and the output words belonging to it.
    ///
    /// `out` holds [`DESCRIPTOR_WORDS`] words per keypoint. Returns once every range is done.
    pub fn run<F>(&self, keypoints: &[KeyPoint], out: &mut [u64], job: F)
    where
        F: Fn(&[KeyPoint], &mut [u64]) + Sync,
    {
        debug_assert_eq!(out.len(), keypoints.len() * DESCRIPTOR_WORDS);
        if keypoints.is_empty() {
            return;
        }
        match self {
            Partitioner::Sequential => job(keypoints, out),
            Partitioner::Pooled(pool) => {
                let job = &job;
                pool.scope(|s| {
                    let mut rest = out;
                    for r in ranges(keypoints.len(), pool.current_num_threads()) {
                        let (words, tail) =
                            std::mem::take(&mut rest).split_at_mut(r.len() * DESCRIPTOR_WORDS);
                        rest = tail;
                        let kps = &keypoints[r];
                        s.spawn(move |_| job(kps, words));
                    }
                });
            }
        }
    }
}
