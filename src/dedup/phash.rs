//! 64-bit difference hash for near-duplicate image detection
//!
//! The hash is built from a 9x8 grayscale thumbnail: each bit records whether
//! a pixel is brighter than its right-hand neighbor. Rescaled, recompressed,
//! and lightly edited copies of an image land within a few bits of each other.

use image::imageops::FilterType;
use image::DynamicImage;

const HASH_WIDTH: u32 = 9;
const HASH_HEIGHT: u32 = 8;

/// Computes the 64-bit difference hash of an image
pub fn difference_hash(img: &DynamicImage) -> u64 {
    let small = img
        .resize_exact(HASH_WIDTH, HASH_HEIGHT, FilterType::Triangle)
        .to_luma8();

    let mut hash = 0u64;
    let mut bit = 0;
    for y in 0..HASH_HEIGHT {
        for x in 0..HASH_WIDTH - 1 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

/// Number of differing bits between two hashes
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
