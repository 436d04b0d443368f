/*!
Vector kernels for the upright LATCH descriptor.

```text
sse4.1: 4 triplets per step, one 7 pixel patch row per 128 bit register.
avx2:   8 triplets per step, patch rows of two triplets share one 256 bit register.
```

Each patch row is fetched with a single 8 byte load, widened to 16 bits. The eighth pixel does not
belong to the patch, it is masked out of the differences before they are squared and pairwise
summed with madd. After seven rows the per triplet partial sums are folded with hadd until one
32 bit lane holds one triplet's distance, a signed compare and a movemask then yield the bits in
triplet order.

Both kernels only handle keypoints for which every load stays inside the image, see
[`crate::sampler::is_interior`]. Other keypoints, and the triplets left over after the last full
step, go through [`crate::latch`] which produces the same bits.

Intrinsics reference: <https://www.intel.com/content/www/us/en/docs/intrinsics-guide/index.html#techs=SSE_ALL,AVX_ALL>
*/

#[cfg(target_arch = "x86_64")]
pub mod sse41 {
    use std::arch::x86_64::*;

    use crate::anchor::StridedTable;
    use crate::latch;
    use crate::packer::{merge_lanes, set_bit, Descriptor, DESCRIPTOR_WORDS};
    use crate::sampler::{is_interior, Location, PATCH_SIZE};
    use crate::view::ImageView;

    const STEP: usize = 4;

    /// Loads 8 pixels starting at `at` as 16 bit lanes.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    unsafe fn load_row(data: &[u8], at: usize) -> __m128i {
        let row = &data[at..at + 8];
        _mm_cvtepu8_epi16(_mm_loadl_epi64(row.as_ptr() as *const __m128i))
    }

    /// Descriptor for `location`.
    ///
    /// # Safety
    /// The cpu must support sse4.1 and ssse3.
    #[target_feature(enable = "sse2,ssse3,sse4.1")]
    pub unsafe fn describe(
        image: &ImageView,
        table: &StridedTable,
        location: Location,
    ) -> Descriptor {
        let triplets = table.table();
        if !is_interior(image, location, triplets.margin()) {
            return latch::describe(image, triplets, location);
        }

        let data = image.data();
        let stride = image.stride() as usize;
        let base = location.y as isize * stride as isize + location.x as isize;
        // Interior guarantees the patch corners are not before the start of the buffer.
        let at = |rel: isize| (base + rel) as usize;

        // Lane 7 holds the pixel past the patch.
        let lane_mask = _mm_set_epi16(0, -1, -1, -1, -1, -1, -1, -1);

        let mut descriptor = [0u64; DESCRIPTOR_WORDS];
        let corners = table.corners();
        let full = corners.len() / STEP * STEP;

        for (g, group) in corners[..full].chunks_exact(STEP).enumerate() {
            let mut acc_a = [_mm_setzero_si128(); STEP];
            let mut acc_b = [_mm_setzero_si128(); STEP];
            for row in 0..PATCH_SIZE {
                let step = row * stride;
                for (k, corner) in group.iter().enumerate() {
                    let a = load_row(data, at(corner[0]) + step);
                    let b = load_row(data, at(corner[1]) + step);
                    let c = load_row(data, at(corner[2]) + step);
                    let da = _mm_and_si128(_mm_sub_epi16(a, c), lane_mask);
                    let db = _mm_and_si128(_mm_sub_epi16(b, c), lane_mask);
                    acc_a[k] = _mm_add_epi32(acc_a[k], _mm_madd_epi16(da, da));
                    acc_b[k] = _mm_add_epi32(acc_b[k], _mm_madd_epi16(db, db));
                }
            }

            // Fold four partial sums per triplet into one lane per triplet.
            let sum_a = _mm_hadd_epi32(
                _mm_hadd_epi32(acc_a[0], acc_a[1]),
                _mm_hadd_epi32(acc_a[2], acc_a[3]),
            );
            let sum_b = _mm_hadd_epi32(
                _mm_hadd_epi32(acc_b[0], acc_b[1]),
                _mm_hadd_epi32(acc_b[2], acc_b[3]),
            );

            // Distances are at most 49 * 255^2, the signed compare is exact. Ties stay zero.
            let closer = _mm_cmpgt_epi32(sum_b, sum_a);
            let bits = _mm_movemask_ps(_mm_castsi128_ps(closer)) as u32;
            merge_lanes(&mut descriptor, g * STEP, bits, STEP as u32);
        }

        for (i, triplet) in triplets.triplets().iter().enumerate().skip(full) {
            set_bit(&mut descriptor, i, latch::triplet_bit(image, location, triplet));
        }
        descriptor
    }
}

#[cfg(target_arch = "x86_64")]
pub mod avx2 {
    use std::arch::x86_64::*;

    use crate::anchor::StridedTable;
    use crate::latch;
    use crate::packer::{merge_lanes, set_bit, Descriptor, DESCRIPTOR_WORDS};
    use crate::sampler::{is_interior, Location, PATCH_SIZE};
    use crate::view::ImageView;

    const STEP: usize = 8;
    const HALF: usize = STEP / 2;

    /// Loads 8 pixels at `lo` into the lower 128 bits and 8 at `hi` into the upper, as 16 bit lanes.
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn load_pair(data: &[u8], lo: usize, hi: usize) -> __m256i {
        let lo = &data[lo..lo + 8];
        let hi = &data[hi..hi + 8];
        let lo = _mm_loadl_epi64(lo.as_ptr() as *const __m128i);
        let hi = _mm_loadl_epi64(hi.as_ptr() as *const __m128i);
        _mm256_cvtepu8_epi16(_mm_unpacklo_epi64(lo, hi))
    }

    /// Descriptor for `location`.
    ///
    /// # Safety
    /// The cpu must support avx2.
    #[target_feature(enable = "avx2")]
    pub unsafe fn describe(
        image: &ImageView,
        table: &StridedTable,
        location: Location,
    ) -> Descriptor {
        let triplets = table.table();
        if !is_interior(image, location, triplets.margin()) {
            return latch::describe(image, triplets, location);
        }

        let data = image.data();
        let stride = image.stride() as usize;
        let base = location.y as isize * stride as isize + location.x as isize;
        let at = |rel: isize| (base + rel) as usize;

        // Lane 7 of each 128 bit half holds the pixel past the patch.
        let lane_mask = _mm256_set_epi16(
            0, -1, -1, -1, -1, -1, -1, -1, //
            0, -1, -1, -1, -1, -1, -1, -1,
        );

        let mut descriptor = [0u64; DESCRIPTOR_WORDS];
        let corners = table.corners();
        let full = corners.len() / STEP * STEP;

        for (g, group) in corners[..full].chunks_exact(STEP).enumerate() {
            // Register k carries triplet k in its lower half and triplet k + 4 in its upper half,
            // which makes the hadd tree below come out in triplet order.
            let mut acc_a = [_mm256_setzero_si256(); HALF];
            let mut acc_b = [_mm256_setzero_si256(); HALF];
            for row in 0..PATCH_SIZE {
                let step = row * stride;
                for k in 0..HALF {
                    let (lo, hi) = (&group[k], &group[k + HALF]);
                    let a = load_pair(data, at(lo[0]) + step, at(hi[0]) + step);
                    let b = load_pair(data, at(lo[1]) + step, at(hi[1]) + step);
                    let c = load_pair(data, at(lo[2]) + step, at(hi[2]) + step);
                    let da = _mm256_and_si256(_mm256_sub_epi16(a, c), lane_mask);
                    let db = _mm256_and_si256(_mm256_sub_epi16(b, c), lane_mask);
                    acc_a[k] = _mm256_add_epi32(acc_a[k], _mm256_madd_epi16(da, da));
                    acc_b[k] = _mm256_add_epi32(acc_b[k], _mm256_madd_epi16(db, db));
                }
            }

            // hadd works per 128 bit half:
            //   hadd(acc0, acc1) = [t0 t0 t1 t1 | t4 t4 t5 t5]
            //   hadd(acc2, acc3) = [t2 t2 t3 t3 | t6 t6 t7 t7]
            //   hadd of those    = [t0 t1 t2 t3 | t4 t5 t6 t7]
            let sum_a = _mm256_hadd_epi32(
                _mm256_hadd_epi32(acc_a[0], acc_a[1]),
                _mm256_hadd_epi32(acc_a[2], acc_a[3]),
            );
            let sum_b = _mm256_hadd_epi32(
                _mm256_hadd_epi32(acc_b[0], acc_b[1]),
                _mm256_hadd_epi32(acc_b[2], acc_b[3]),
            );

            let closer = _mm256_cmpgt_epi32(sum_b, sum_a);
            let bits = _mm256_movemask_ps(_mm256_castsi256_ps(closer)) as u32;
            merge_lanes(&mut descriptor, g * STEP, bits, STEP as u32);
        }

        for (i, triplet) in triplets.triplets().iter().enumerate().skip(full) {
            set_bit(&mut descriptor, i, latch::triplet_bit(image, location, triplet));
        }
        descriptor
    }
}

#[cfg(all(test, target_arch = "x86_64"))]
mod test {
    use crate::anchor::{AnchorTable, StridedTable, Triplet};
    use crate::latch;
    use crate::sampler::Location;
    use crate::view::ImageView;

    use rand_xoshiro::rand_core::{RngCore, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn noise(width: u32, height: u32, stride: u32, seed: u64) -> Vec<u8> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut data = vec![0u8; (stride * height) as usize];
        rng.fill_bytes(&mut data);
        data
    }

    fn check_against_scalar(image: &ImageView, table: &AnchorTable) {
        let strided = StridedTable::new(table, image.stride()).unwrap();
        for y in 0..image.height() as i32 {
            for x in (0..image.width() as i32).step_by(3) {
                let location = Location { x, y };
                let expected = latch::describe(image, table, location);
                if is_x86_feature_detected!("sse4.1") && is_x86_feature_detected!("ssse3") {
                    let got = unsafe { super::sse41::describe(image, &strided, location) };
                    assert_eq!(got, expected, "sse4.1 mismatch at {location:?}");
                }
                if is_x86_feature_detected!("avx2") {
                    let got = unsafe { super::avx2::describe(image, &strided, location) };
                    assert_eq!(got, expected, "avx2 mismatch at {location:?}");
                }
            }
        }
    }

    #[test]
    fn test_upright_matches_scalar() {
        // Padded rows, so the stride is exercised.
        let data = noise(70, 60, 77, 1);
        let image = ImageView::new(&data, 70, 60, 77).unwrap();
        check_against_scalar(&image, AnchorTable::upright());
    }

    #[test]
    fn test_partial_steps_match_scalar() {
        // 11 triplets: two sse steps, one avx2 step, remainders on both.
        let triplets = (0..11i8)
            .map(|i| Triplet::new((i - 5, 2), (3, i - 4), (-(i % 3), i % 5 - 2)))
            .collect();
        let table = AnchorTable::new(triplets).unwrap();
        let data = noise(40, 36, 40, 2);
        let image = ImageView::new(&data, 40, 36, 40).unwrap();
        check_against_scalar(&image, &table);
    }

    #[test]
    fn test_extreme_values() {
        // Alternating 0 / 255 columns maximise the distances.
        let data: Vec<u8> = (0..64 * 64)
            .map(|i| if (i % 64) % 2 == 0 { 0 } else { 255 })
            .collect();
        let image = ImageView::new(&data, 64, 64, 64).unwrap();
        check_against_scalar(&image, AnchorTable::upright());
    }
}
