// Population read-out: thresholded centroid of an activation snapshot.

use crate::ring::RingGeometry;

/// Returned when no site clears the detection threshold.
pub const NO_PEAK: f64 = -1.0;

/// Activation must exceed this (strictly) to count toward the centroid.
pub const DETECTION_THRESHOLD: f64 = 0.1;

/// Decode the physical position of the activation peak on the ring.
///
/// Sites are thresholded to a binary mask, then averaged in a frame shifted
/// by half the ring so a peak touching both ends still reads out as one
/// location. `%` below is the IEEE remainder with the dividend's sign, which
/// is what the frame shift relies on. The result is in physical coordinates
/// (`index * step_size + step_size`); a silent field returns [`NO_PEAK`].
pub fn decode_centroid(activation: &[f64], ring: RingGeometry) -> f64 {
    assert_eq!(
        activation.len(),
        ring.size,
        "activation length must match ring size"
    );
    let size = ring.size as f64;
    let at_limits = activation[0] > DETECTION_THRESHOLD
        || activation[ring.size - 1] > DETECTION_THRESHOLD;
    let shift = if at_limits { 10.0 * size } else { 0.0 };

    let mut sum_weighted = 0.0;
    let mut sum_active: f64 = 0.0;
    for (i, &a) in activation.iter().enumerate() {
        if a > DETECTION_THRESHOLD {
            let distance = (i as f64 - 0.5 * size + shift) % size;
            sum_weighted += distance;
            sum_active += 1.0;
        }
    }
    if sum_active <= 0.0 {
        return NO_PEAK;
    }

    let mut centroid = 0.0;
    if sum_active.abs() > 1e-6 {
        centroid = (0.5 * size + sum_weighted / sum_active) % size;
        if at_limits && centroid < 0.0 {
            centroid += size;
        }
    }
    centroid * ring.step_size + ring.step_size
}
