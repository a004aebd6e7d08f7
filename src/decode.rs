//! Applies the per-component linear decode transform to raw sample values.
//!
//! The `Decode` array maps each component's raw range `[0, 2^BPC-1]`
//! through an affine remap onto `[dmin, dmax]`, saturating at both ends.
//! [`crate::image::PdfImage`] precomputes `addend[j] = max * dmin` and
//! `coefficient[j] = dmax - dmin` once at construction time so this
//! function stays a tight per-sample multiply-add.

use crate::bits::SampleBuffer;

/// Apply the decode transform in place.
///
/// `addends`/`coefficients` must each have `num_components` entries, one
/// per color component, cycling across the row the way raw samples are
/// interleaved.
pub fn apply_decode(
    samples: &mut SampleBuffer,
    num_components: u8,
    bits_per_component: u8,
    addends: &[f32],
    coefficients: &[f32],
) {
    debug_assert_eq!(addends.len(), num_components as usize);
    debug_assert_eq!(coefficients.len(), num_components as usize);

    let nc = num_components as usize;
    let max = max_value(bits_per_component);

    if bits_per_component == 1 {
        // A 1-bpc image's only two valid decode arrays are [0,1] (identity,
        // never reaches here) and [1,0] (boolean complement).
        for i in 0..samples.len() {
            let v = samples.get_f32(i);
            samples.set_f32(i, 1.0 - v);
        }
        return;
    }

    for i in 0..samples.len() {
        let j = i % nc;
        let v = samples.get_f32(i);
        let decoded = (addends[j] + coefficients[j] * v).clamp(0.0, max);
        samples.set_f32(i, decoded);
    }
}

/// `2^bits_per_component - 1`, the maximum raw sample value.
pub fn max_value(bits_per_component: u8) -> f32 {
    ((1u32 << bits_per_component) - 1) as f32
}

/// Precompute `(addend, coefficient)` pairs for every component from a
/// `Decode` array.
pub fn decode_coefficients(
    decode: &[(f32, f32)],
    bits_per_component: u8,
) -> (Vec<f32>, Vec<f32>) {
    let max = max_value(bits_per_component);
    let mut addends = Vec::with_capacity(decode.len());
    let mut coefficients = Vec::with_capacity(decode.len());

    for &(dmin, dmax) in decode {
        addends.push(max * dmin);
        coefficients.push(dmax - dmin);
    }

    (addends, coefficients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::SampleBuffer;

    #[test]
    fn identity_decode_is_a_noop_by_convention() {
        // needsDecode is false for an identity [0,1]*NC decode array, so
        // apply_decode is simply never called; verify the math would be
        // a no-op if it were.
        let (addends, coefficients) = decode_coefficients(&[(0.0, 1.0), (0.0, 1.0)], 8);
        let mut samples = SampleBuffer::U8(vec![10, 200]);
        apply_decode(&mut samples, 2, 8, &addends, &coefficients);
        assert_eq!(samples, SampleBuffer::U8(vec![10, 200]));
    }

    #[test]
    fn inverted_1bpc_complements() {
        let (addends, coefficients) = decode_coefficients(&[(1.0, 0.0)], 1);
        let mut samples = SampleBuffer::U8(vec![0, 1, 1, 0]);
        apply_decode(&mut samples, 1, 1, &addends, &coefficients);
        assert_eq!(samples, SampleBuffer::U8(vec![1, 0, 0, 1]));
    }

    #[test]
    fn affine_decode_clamps_both_ends() {
        // Decode [0.5, 1.5] on an 8-bit component: value 0 -> 0.5*255=127.5
        // clamped stays 127.5 truncated by set_f32 to 127; value 255 ->
        // (0.5*255) + 1.0*255 = 382.5, clamped to 255.
        let (addends, coefficients) = decode_coefficients(&[(0.5, 1.5)], 8);
        let mut samples = SampleBuffer::U8(vec![0, 255]);
        apply_decode(&mut samples, 1, 8, &addends, &coefficients);
        assert_eq!(samples, SampleBuffer::U8(vec![127, 255]));
    }
}
