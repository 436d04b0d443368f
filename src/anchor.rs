/*!
Anchor triplets that decide which patches are compared for every descriptor bit.

Each bit position owns three offsets relative to the keypoint: `a`, `b` and the anchor `c`. The bit
is set when the patch at `a` is more similar to the anchor patch than the patch at `b` is.

The default table is drawn once from a fixed-seed xoshiro256++ stream. Offsets are kept within
+/-21 pixels, which together with the 7x7 patch gives the 48x48 support window of LATCH. The same
table is produced on every platform and in every process, descriptors are therefore comparable
between runs.
*/
use std::sync::OnceLock;

use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::error::{LatchError, LatchResult};
use crate::packer::DESCRIPTOR_BITS;
use crate::sampler::PATCH_HALF;

/// Largest offset component accepted in a table.
pub const MAX_ANCHOR_OFFSET: i32 = 64;

/// Offset component range of the default table.
pub const UPRIGHT_RADIUS: i32 = 21;

const UPRIGHT_SEED: u64 = 0x4c41_5443_4835_3132;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Offset {
    pub dx: i8,
    pub dy: i8,
}

impl Offset {
    pub const fn new(dx: i8, dy: i8) -> Self {
        Offset { dx, dy }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Triplet {
    pub a: Offset,
    pub b: Offset,
    /// The anchor both other patches are measured against.
    pub c: Offset,
}

impl Triplet {
    pub const fn new(a: (i8, i8), b: (i8, i8), c: (i8, i8)) -> Self {
        Triplet {
            a: Offset::new(a.0, a.1),
            b: Offset::new(b.0, b.1),
            c: Offset::new(c.0, c.1),
        }
    }

    fn offsets(&self) -> [Offset; 3] {
        [self.a, self.b, self.c]
    }
}

/// Immutable, validated list of triplets. Triplet `i` produces descriptor bit `i`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnchorTable {
    triplets: Vec<Triplet>,
    radius: i32,
}

impl AnchorTable {
    pub fn new(triplets: Vec<Triplet>) -> LatchResult<Self> {
        if triplets.is_empty() {
            return Err(LatchError::EmptyAnchorTable);
        }
        if triplets.len() > DESCRIPTOR_BITS {
            return Err(LatchError::TooManyTriplets {
                count: triplets.len(),
                max: DESCRIPTOR_BITS,
            });
        }

        let mut radius = 0;
        for (index, triplet) in triplets.iter().enumerate() {
            if triplet.a == triplet.b {
                return Err(LatchError::DegenerateTriplet { index });
            }
            for o in triplet.offsets() {
                let (dx, dy) = (o.dx as i32, o.dy as i32);
                if dx.abs() > MAX_ANCHOR_OFFSET || dy.abs() > MAX_ANCHOR_OFFSET {
                    return Err(LatchError::OffsetOutOfRange {
                        index,
                        dx,
                        dy,
                        max: MAX_ANCHOR_OFFSET,
                    });
                }
                radius = radius.max(dx.abs()).max(dy.abs());
            }
        }
        Ok(AnchorTable { triplets, radius })
    }

    /// The process wide 512 triplet table.
    pub fn upright() -> &'static AnchorTable {
        static UPRIGHT: OnceLock<AnchorTable> = OnceLock::new();
        UPRIGHT.get_or_init(|| {
            let table = generate(UPRIGHT_SEED, UPRIGHT_RADIUS, DESCRIPTOR_BITS);
            log::debug!(
                "generated upright anchor table, {} triplets, radius {}",
                table.len(),
                table.radius()
            );
            table
        })
    }

    pub fn triplets(&self) -> &[Triplet] {
        &self.triplets
    }

    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Largest absolute offset component in the table.
    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Distance from the keypoint to the furthest pixel any patch may read.
    pub fn margin(&self) -> i32 {
        self.radius + PATCH_HALF
    }
}

/// Draws `count` triplets with components in `[-radius, radius]`, redrawing `b` while it equals `a`.
fn generate(seed: u64, radius: i32, count: usize) -> AnchorTable {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let span = (2 * radius + 1) as u32;
    let mut component = move || ((rng.next_u32() % span) as i32 - radius) as i8;
    let mut offset = move || {
        let dx = component();
        let dy = component();
        Offset::new(dx, dy)
    };

    let mut triplets = Vec::with_capacity(count);
    while triplets.len() < count {
        let a = offset();
        let mut b = offset();
        while b == a {
            b = offset();
        }
        let c = offset();
        triplets.push(Triplet { a, b, c });
    }
    let radius = triplets
        .iter()
        .flat_map(|t| t.offsets())
        .map(|o| (o.dx as i32).abs().max((o.dy as i32).abs()))
        .max()
        .unwrap_or(0);
    AnchorTable { triplets, radius }
}

/// A table resolved against one stride: byte offsets, relative to the keypoint's pixel, of the
/// top left corner of each of the three patches.
///
/// Built once per call, shared read-only by all workers.
pub struct StridedTable<'t> {
    table: &'t AnchorTable,
    corners: Vec<[isize; 3]>,
}

impl<'t> StridedTable<'t> {
    pub fn new(table: &'t AnchorTable, stride: u32) -> LatchResult<Self> {
        let stride = stride as isize;
        let half = PATCH_HALF as isize;
        let corner = |o: Offset| (o.dy as isize - half) * stride + (o.dx as isize - half);

        let mut corners = Vec::new();
        corners.try_reserve_exact(table.len())?;
        corners.extend(
            table
                .triplets()
                .iter()
                .map(|t| [corner(t.a), corner(t.b), corner(t.c)]),
        );
        Ok(StridedTable { table, corners })
    }

    pub fn table(&self) -> &'t AnchorTable {
        self.table
    }

    /// Patch corners for `a`, `b` and `c` of every triplet, in bit order.
    pub fn corners(&self) -> &[[isize; 3]] {
        &self.corners
    }
}
