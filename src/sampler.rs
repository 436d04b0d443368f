use crate::anchor::Offset;
use crate::view::ImageView;

/// Patches are `PATCH_SIZE` x `PATCH_SIZE`, centered on the offset position.
pub const PATCH_HALF: i32 = 3;
pub const PATCH_SIZE: usize = (2 * PATCH_HALF + 1) as usize;

/// Keypoint as handed out by a detector, only the position is used.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32) -> Self {
        KeyPoint { x, y }
    }
}

impl From<(f32, f32)> for KeyPoint {
    fn from((x, y): (f32, f32)) -> Self {
        KeyPoint { x, y }
    }
}

impl From<(u32, u32)> for KeyPoint {
    fn from((x, y): (u32, u32)) -> Self {
        KeyPoint {
            x: x as f32,
            y: y as f32,
        }
    }
}

/// Integer pixel a descriptor is computed at.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

/// Rounds a keypoint to its pixel, halves away from zero.
///
/// Positions further than `margin` off the image are pulled back to `margin`, all reads from there
/// on clamp to the same border pixels so the descriptor does not change. Returns `None` for
/// non-finite coordinates.
pub fn locate(keypoint: &KeyPoint, image: &ImageView, margin: i32) -> Option<Location> {
    if !keypoint.x.is_finite() || !keypoint.y.is_finite() {
        return None;
    }
    let clamp = |v: f32, extent: u32| {
        // Float to int casts saturate, the clamp then brings it in range.
        (v.round() as i64).clamp(-(margin as i64), extent as i64 - 1 + margin as i64) as i32
    };
    Some(Location {
        x: clamp(keypoint.x, image.width()),
        y: clamp(keypoint.y, image.height()),
    })
}

/// Whether all reads for `location` stay inside the image, including the eighth byte of the
/// 8 wide row loads done by the vector kernels.
pub fn is_interior(image: &ImageView, location: Location, margin: i32) -> bool {
    location.x >= margin
        && location.y >= margin
        && location.x + margin + 1 < image.width() as i32
        && location.y + margin < image.height() as i32
}

/// Pixel neighbourhood, row major.
pub type Patch = [[u8; PATCH_SIZE]; PATCH_SIZE];

/// The patch centered at `location + offset`, every pixel clamped onto the image.
pub fn sample_patch(image: &ImageView, location: Location, offset: Offset) -> Patch {
    let cx = location.x + offset.dx as i32;
    let cy = location.y + offset.dy as i32;
    let mut patch = [[0u8; PATCH_SIZE]; PATCH_SIZE];
    for (row, dy) in patch.iter_mut().zip(-PATCH_HALF..=PATCH_HALF) {
        for (p, dx) in row.iter_mut().zip(-PATCH_HALF..=PATCH_HALF) {
            *p = image.pixel_clamped(cx + dx, cy + dy);
        }
    }
    patch
}
