// Circular coordinate frame shared by fields, kernels, and the decoder.

/// Geometry of a one-dimensional periodic lattice.
///
/// A field with `size` sites and physical spacing `step_size` covers the
/// circle `(0, extent]`. Site `i` sits at the physical coordinate
/// `(i + 1) * step_size`; the first site does not sit at zero because the
/// lattice is a sampling of the open ring, not of a closed interval.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RingGeometry {
    pub size: usize,
    pub step_size: f64,
}

impl RingGeometry {
    pub fn new(size: usize, step_size: f64) -> Self {
        assert!(size > 0, "ring must have at least one site");
        assert!(
            step_size > 0.0 && step_size.is_finite(),
            "step size must be positive and finite"
        );
        Self { size, step_size }
    }

    /// Total physical circumference covered by the lattice.
    #[inline]
    pub fn extent(&self) -> f64 {
        self.size as f64 * self.step_size
    }

    /// Physical coordinate of site `i`.
    #[inline]
    pub fn coord_of(&self, i: usize) -> f64 {
        debug_assert!(i < self.size);
        (i as f64 + 1.0) * self.step_size
    }

    /// Shortest physical distance between two coordinates on the ring.
    #[inline]
    pub fn circular_distance(&self, a: f64, b: f64) -> f64 {
        let extent = self.extent();
        let d = (a - b).abs() % extent;
        d.min(extent - d)
    }

    /// Shortest distance between two positions expressed in index units.
    #[inline]
    pub fn index_distance(&self, a: f64, b: f64) -> f64 {
        let n = self.size as f64;
        let d = (a - b).abs() % n;
        d.min(n - d)
    }

    /// Wrap a possibly out-of-range signed index onto `0..size`.
    #[inline]
    pub fn wrap_index(&self, i: isize) -> usize {
        let n = self.size as isize;
        (((i % n) + n) % n) as usize
    }
}
