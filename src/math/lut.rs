/// A lookup table of values sampled at uniform spacing, starting at zero.
///
/// Lookups snap to the nearest sample.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LookupTable<T> {
    step: f64,
    values: Vec<T>,
}

impl<T> LookupTable<T> {
    /// Creates a lookup table from values spaced `step` apart.
    ///
    /// # Panics
    /// If `values` is empty or `step` is not positive.
    pub fn from_values(step: f64, values: Vec<T>) -> Self {
        assert!(!values.is_empty(), "Lookup table must have at least one value");
        assert!(step > 0.0, "Lookup table step must be positive");
        Self { step, values }
    }

    /// The spacing between samples.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; a lookup table holds at least one sample.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The `x` value of the last sample.
    pub fn max_x(&self) -> f64 {
        (self.values.len() - 1) as f64 * self.step
    }

    /// The index of the sample nearest `x`, clamped to the table.
    pub fn nearest_index(&self, x: f64) -> usize {
        let idx = (x / self.step).round();
        if idx <= 0.0 {
            0
        } else {
            usize::min(idx as usize, self.values.len() - 1)
        }
    }

    /// Samples the lookup table, clamping `x` to the table's range.
    pub fn sample(&self, x: f64) -> &T {
        &self.values[self.nearest_index(x)]
    }

    /// Samples the lookup table, returning `None` if the nearest sample
    /// would lie outside of it.
    pub fn get(&self, x: f64) -> Option<&T> {
        let idx = (x / self.step).round();
        if idx < 0.0 || idx >= self.values.len() as f64 {
            None
        } else {
            self.values.get(idx as usize)
        }
    }

    /// The samples in order.
    pub fn values(&self) -> &[T] {
        &self.values
    }
}
