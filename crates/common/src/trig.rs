//! Integer trigonometry for fixed-point transforms.
//!
//! Angles are integers; results are scaled by `1 << TRIG_SHIFT`.

/// Precision of [`sin`]: the result is `sin(angle) * 2^15`.
pub const TRIG_SHIFT: u32 = 15;

/// Precision of the interpolated sine/cosine used by transforms.
pub const TRANSFORM_SHIFT: u32 = 10;

/// `sin(i°) * 32767` for `i` in `0..=90`.
const SIN_0_90: [i32; 91] = [
    0, 572, 1144, 1715, 2286, 2856, 3425, 3993, 4560, 5126,
    5690, 6252, 6813, 7371, 7927, 8481, 9032, 9580, 10126, 10668,
    11207, 11743, 12275, 12803, 13328, 13848, 14364, 14876, 15383, 15886,
    16383, 16876, 17364, 17846, 18323, 18794, 19260, 19720, 20173, 20621,
    21062, 21497, 21925, 22347, 22762, 23170, 23571, 23964, 24351, 24730,
    25101, 25465, 25821, 26169, 26509, 26841, 27165, 27481, 27788, 28087,
    28377, 28659, 28932, 29196, 29451, 29697, 29934, 30162, 30381, 30591,
    30791, 30982, 31163, 31335, 31498, 31650, 31794, 31927, 32051, 32165,
    32269, 32364, 32448, 32523, 32587, 32642, 32687, 32722, 32747, 32762,
    32767,
];

/// Sine of an angle in whole degrees, in Q15. Any angle is accepted.
pub fn sin(angle: i32) -> i32 {
    let angle = angle.rem_euclid(360) as usize;
    match angle {
        0..=90 => SIN_0_90[angle],
        91..=180 => SIN_0_90[180 - angle],
        181..=270 => -SIN_0_90[angle - 180],
        _ => -SIN_0_90[360 - angle],
    }
}

/// Cosine of an angle in whole degrees, in Q15.
#[inline]
pub fn cos(angle: i32) -> i32 {
    sin(angle + 90)
}

/// Sine and cosine of an angle in tenths of a degree.
///
/// The two whole-degree neighbours are looked up and linearly interpolated,
/// then the result is reduced to [`TRANSFORM_SHIFT`] bits of precision.
pub fn sin_cos_tenths(angle: i32) -> (i32, i32) {
    let angle = angle.rem_euclid(3600);
    let low = angle / 10;
    let high = low + 1;
    let rem = angle - low * 10;

    let sinma = (sin(low) * (10 - rem) + sin(high) * rem) / 10;
    let cosma = (cos(low) * (10 - rem) + cos(high) * rem) / 10;

    (
        sinma >> (TRIG_SHIFT - TRANSFORM_SHIFT),
        cosma >> (TRIG_SHIFT - TRANSFORM_SHIFT),
    )
}
