use crate::predict::BPS;

#[inline]
fn mul1(a: i32) -> i32 {
    ((a * 20091) >> 16) + a
}

#[inline]
fn mul2(a: i32) -> i32 {
    (a * 35468) >> 16
}

/// Inverse DCT of a 4x4 block, added to the prediction at `pos` of a workspace with stride
/// [`BPS`].
pub(crate) fn add_inverse_dct(coeffs: &[i16; 16], buf: &mut [u8], pos: usize) {
    let mut tmp = [0i32; 16];
    for i in 0..4 {
        let in0 = coeffs[i] as i32;
        let in4 = coeffs[4 + i] as i32;
        let in8 = coeffs[8 + i] as i32;
        let in12 = coeffs[12 + i] as i32;
        let a = in0 + in8;
        let b = in0 - in8;
        let c = mul2(in4) - mul1(in12);
        let d = mul1(in4) + mul2(in12);
        tmp[4 * i] = a + d;
        tmp[4 * i + 1] = b + c;
        tmp[4 * i + 2] = b - c;
        tmp[4 * i + 3] = a - d;
    }

    for y in 0..4 {
        let dc = tmp[y] + 4;
        let a = dc + tmp[8 + y];
        let b = dc - tmp[8 + y];
        let c = mul2(tmp[4 + y]) - mul1(tmp[12 + y]);
        let d = mul1(tmp[4 + y]) + mul2(tmp[12 + y]);

        let row = &mut buf[pos + y * BPS..][..4];
        for (sample, v) in row.iter_mut().zip([a + d, b + c, b - c, a - d]) {
            *sample = (*sample as i32 + (v >> 3)).clamp(0, 255) as u8;
        }
    }
}

/// Inverse Walsh-Hadamard transform of the Y2 block. Writes the DC coefficients of the 16 luma
/// blocks.
pub(crate) fn inverse_wht(input: &[i16; 16], blocks: &mut [[i16; 16]]) {
    let mut tmp = [0i32; 16];
    for i in 0..4 {
        let a0 = input[i] as i32 + input[12 + i] as i32;
        let a1 = input[4 + i] as i32 + input[8 + i] as i32;
        let a2 = input[4 + i] as i32 - input[8 + i] as i32;
        let a3 = input[i] as i32 - input[12 + i] as i32;
        tmp[i] = a0 + a1;
        tmp[8 + i] = a0 - a1;
        tmp[4 + i] = a3 + a2;
        tmp[12 + i] = a3 - a2;
    }

    for (i, row) in blocks.chunks_exact_mut(4).take(4).enumerate() {
        let dc = tmp[4 * i] + 3;
        let a0 = dc + tmp[4 * i + 3];
        let a1 = tmp[4 * i + 1] + tmp[4 * i + 2];
        let a2 = tmp[4 * i + 1] - tmp[4 * i + 2];
        let a3 = dc - tmp[4 * i + 3];
        row[0][0] = ((a0 + a1) >> 3) as i16;
        row[1][0] = ((a3 + a2) >> 3) as i16;
        row[2][0] = ((a0 - a1) >> 3) as i16;
        row[3][0] = ((a3 - a2) >> 3) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_only_idct() {
        for dc in [-2000i16, -37, -4, 0, 3, 4, 100, 2047] {
            let mut coeffs = [0i16; 16];
            coeffs[0] = dc;
            let mut buf = vec![128u8; BPS * 4];
            add_inverse_dct(&coeffs, &mut buf, 0);
            let expected = (128 + ((dc as i32 + 4) >> 3)).clamp(0, 255) as u8;
            for y in 0..4 {
                assert_eq!(&buf[y * BPS..][..4], &[expected; 4], "dc = {dc}");
            }
        }
    }

    #[test]
    fn idct_first_row_ac() {
        // A single horizontal AC coefficient produces a gradient that's constant down columns.
        let mut coeffs = [0i16; 16];
        coeffs[1] = 80;
        let mut buf = vec![100u8; BPS * 4];
        add_inverse_dct(&coeffs, &mut buf, 0);
        let row0 = buf[..4].to_vec();
        for y in 1..4 {
            assert_eq!(&buf[y * BPS..][..4], &row0[..]);
        }
        assert!(row0[0] > row0[1] && row0[1] > row0[2] && row0[2] > row0[3]);
        assert_eq!(row0[0] as i32 - 100, -(row0[3] as i32 - 100));
    }

    #[test]
    fn wht_dc_only() {
        for dc in [-1000i16, -5, 0, 4, 5, 13, 999] {
            let mut input = [0i16; 16];
            input[0] = dc;
            let mut blocks = [[0i16; 16]; 16];
            inverse_wht(&input, &mut blocks);
            let expected = ((dc as i32 + 3) >> 3) as i16;
            for block in &blocks {
                assert_eq!(block[0], expected);
            }
        }
    }

    #[test]
    fn wht_inverts_forward() {
        // Forward WHT of a known DC pattern, scaled as the encoder does.
        let dcs: [i32; 16] = [
            10, -20, 30, -40, 50, -60, 70, -80, 90, -100, 110, -120, 130, -140, 150, -160,
        ];
        let mut tmp = [0i32; 16];
        for i in 0..4 {
            let row = &dcs[4 * i..][..4];
            let a0 = row[0] + row[2];
            let a1 = row[1] + row[3];
            let a2 = row[1] - row[3];
            let a3 = row[0] - row[2];
            tmp[4 * i] = a0 + a1;
            tmp[4 * i + 1] = a3 + a2;
            tmp[4 * i + 2] = a3 - a2;
            tmp[4 * i + 3] = a0 - a1;
        }
        let mut input = [0i16; 16];
        for i in 0..4 {
            let a0 = tmp[i] + tmp[8 + i];
            let a1 = tmp[4 + i] + tmp[12 + i];
            let a2 = tmp[4 + i] - tmp[12 + i];
            let a3 = tmp[i] - tmp[8 + i];
            input[i] = ((a0 + a1) >> 1) as i16;
            input[4 + i] = ((a3 + a2) >> 1) as i16;
            input[8 + i] = ((a3 - a2) >> 1) as i16;
            input[12 + i] = ((a0 - a1) >> 1) as i16;
        }

        let mut blocks = [[0i16; 16]; 16];
        inverse_wht(&input, &mut blocks);
        for (block, &expected) in blocks.iter().zip(&dcs) {
            assert_eq!(block[0] as i32, expected);
        }
    }
}
