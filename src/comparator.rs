use crate::sampler::Patch;

/// Sum of squared differences between two patches.
///
/// The largest possible value is 49 * 255^2, well within `u32`.
#[inline]
pub fn ssd(p: &Patch, q: &Patch) -> u32 {
    p.iter()
        .flatten()
        .zip(q.iter().flatten())
        .map(|(&l, &r)| {
            let d = l as i32 - r as i32;
            (d * d) as u32
        })
        .sum()
}

/// Bit for one triplet: whether `pa` is strictly closer to the anchor `pc` than `pb` is.
///
/// Equal distances produce `false`.
#[inline]
pub fn compare(pa: &Patch, pb: &Patch, pc: &Patch) -> bool {
    ssd(pa, pc) < ssd(pb, pc)
}
