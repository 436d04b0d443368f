/*!
Reference implementation of the upright LATCH descriptor.

Every bit samples three 7x7 patches with border clamping and compares their squared distances, one
triplet at a time. This is slow, but it is the definition the vector kernels in
[`crate::latch_simd`] are checked against.
*/
use crate::anchor::{AnchorTable, Triplet};
use crate::comparator::compare;
use crate::packer::{pack, Descriptor};
use crate::sampler::{sample_patch, Location};
use crate::view::ImageView;

/// Outcome of a single triplet for the keypoint at `location`.
#[inline]
pub fn triplet_bit(image: &ImageView, location: Location, triplet: &Triplet) -> bool {
    let pa = sample_patch(image, location, triplet.a);
    let pb = sample_patch(image, location, triplet.b);
    let pc = sample_patch(image, location, triplet.c);
    compare(&pa, &pb, &pc)
}

pub fn describe(image: &ImageView, table: &AnchorTable, location: Location) -> Descriptor {
    pack(
        table
            .triplets()
            .iter()
            .map(|t| triplet_bit(image, location, t)),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    /// 8x8, every column is ten times its x coordinate, rows are identical.
    fn column_gradient() -> Vec<u8> {
        (0..8u8).flat_map(|_| (0..8u8).map(|x| x * 10)).collect()
    }

    #[test]
    fn test_hand_computed_gradient() {
        let data = column_gradient();
        let image = ImageView::new(&data, 8, 8, 8).unwrap();
        let table = AnchorTable::new(vec![
            // Vertical shift is free on this image, horizontal is not: 1.
            Triplet::new((0, 1), (1, 0), (0, 0)),
            // Mirror of the above: 0.
            Triplet::new((2, 0), (0, -2), (0, 0)),
            // Both zero distance, tie: 0.
            Triplet::new((0, 3), (0, -3), (0, 0)),
            // Anchor covers columns 1..=7 (10..70).
            // a: columns 0..=6, every pixel 10 off, 7 * 7 * 100 = 4900.
            // b: columns 3..=9 clamp to 3,4,5,6,7,7,7, off by 20,20,20,20,20,10,0,
            //    7 * (5 * 400 + 100) = 14700.
            // 4900 < 14700: 1.
            Triplet::new((-1, 0), (2, 0), (0, 0)),
        ])
        .unwrap();

        let center = Location { x: 4, y: 4 };
        let a = sample_patch(&image, center, table.triplets()[3].a);
        let b = sample_patch(&image, center, table.triplets()[3].b);
        let c = sample_patch(&image, center, table.triplets()[3].c);
        assert_eq!(crate::comparator::ssd(&a, &c), 4900);
        assert_eq!(crate::comparator::ssd(&b, &c), 14700);

        let descriptor = describe(&image, &table, center);
        assert_eq!(descriptor, [0b1001, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_row_gradient_clamps_vertically() {
        // Transposed gradient, values depend on y only.
        let data: Vec<u8> = (0..8u8).flat_map(|y| [y * 10; 8]).collect();
        let image = ImageView::new(&data, 8, 8, 8).unwrap();
        let table = AnchorTable::new(vec![
            // Both shifted past the bottom edge by different amounts. a: rows 6..=12 clamp to
            // 6,7,7,7,7,7,7. b: rows 9..=15 all clamp to 7. Anchor rows 0..=6.
            // a: 7 * (60^2 + 60^2 + 50^2 + 40^2 + 30^2 + 20^2 + 10^2) = 7 * 12700
            // b: 7 * (70^2 + 60^2 + 50^2 + 40^2 + 30^2 + 20^2 + 10^2) = 7 * 14000
            Triplet::new((0, 6), (0, 9), (0, 0)),
            // Swapped: 0.
            Triplet::new((0, 9), (0, 6), (0, 0)),
            // Past the edge both patches read the same clamped row 7: tie.
            Triplet::new((0, 10), (0, 12), (0, 0)),
        ])
        .unwrap();
        let descriptor = describe(&image, &table, Location { x: 4, y: 3 });
        assert_eq!(descriptor[0], 0b001);
    }

    #[test]
    fn test_flat_image_is_all_ties() {
        let data = [128u8; 64 * 64];
        let image = ImageView::new(&data, 64, 64, 64).unwrap();
        let descriptor = describe(&image, AnchorTable::upright(), Location { x: 32, y: 32 });
        assert_eq!(descriptor, [0; 8]);
    }
}
