// crates/vidtex-media/src/helpers/bgr.rs
//
// Packed 24-bit pixel utilities shared by the backends and the frame exchange.
//
// "Packed" means strides are removed: each row is exactly width * bpp bytes.
// Decoder frames may carry row padding; pack_rows strips it.

/// Copy `height` rows of `row_bytes` out of a strided plane.
///
/// Returns `None` if the plane is too short for the requested geometry, which
/// callers treat as a malformed picture rather than panicking on the slice.
pub fn pack_rows(plane: &[u8], stride: usize, row_bytes: usize, height: usize) -> Option<Vec<u8>> {
    if height == 0 {
        return Some(Vec::new());
    }
    if stride < row_bytes || plane.len() < (height - 1) * stride + row_bytes {
        return None;
    }
    let mut out = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let s = row * stride;
        out.extend_from_slice(&plane[s..s + row_bytes]);
    }
    Some(out)
}

/// Swap the first and third byte of every 3-byte pixel (BGR ⇄ RGB).
pub fn swap_red_blue(packed: &[u8]) -> Vec<u8> {
    packed
        .chunks_exact(3)
        .flat_map(|p| [p[2], p[1], p[0]])
        .collect()
}

/// Expand 8-bit luma to BGR24 (grey pixels).
pub fn gray_to_bgr(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&y| [y, y, y]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_rows_strips_padding() {
        // 2x2 RGB with 2 bytes of padding per row.
        let plane = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        let packed = pack_rows(&plane, 8, 6, 2).unwrap();
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn pack_rows_allows_unpadded_last_row() {
        let plane = [1, 2, 3, 0, 4, 5, 6];
        assert_eq!(pack_rows(&plane, 4, 3, 2), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn pack_rows_rejects_short_plane() {
        assert_eq!(pack_rows(&[0; 5], 3, 3, 2), None);
        assert_eq!(pack_rows(&[0; 12], 2, 3, 2), None);
    }

    #[test]
    fn swap_is_an_involution() {
        let bgr = [10, 20, 30, 40, 50, 60];
        let rgb = swap_red_blue(&bgr);
        assert_eq!(rgb, vec![30, 20, 10, 60, 50, 40]);
        assert_eq!(swap_red_blue(&rgb), bgr.to_vec());
    }

    #[test]
    fn gray_expands_to_three_channels() {
        assert_eq!(gray_to_bgr(&[7, 200]), vec![7, 7, 7, 200, 200, 200]);
    }
}
