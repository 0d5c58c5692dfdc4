//! Circular value history of a data renderer.

/// `memory` rows of `nb_values` samples, plus a running range per value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataHistory {
    nb_values: usize,
    memory: usize,
    /// Row-major: row `r` holds `values[r * nb_values..(r + 1) * nb_values]`.
    values: Vec<f64>,
    /// Row of the most recent sample; `None` before the first push.
    current: Option<usize>,
    /// `[min0, max0, min1, max1, ...]`.
    min_max: Vec<f64>,
    update_min_max: bool,
}

impl DataHistory {
    /// Create an empty history. At least one value and two rows are kept.
    ///
    /// Ranges come from `min_max` when given; otherwise they start inverted
    /// so the first samples define them (auto-tracking) or default to 0..1.
    pub fn new(nb_values: usize, memory: usize, min_max: Option<&[f64]>, update_min_max: bool) -> Self {
        let nb_values = nb_values.max(1);
        let memory = memory.max(2);
        let fallback = if update_min_max {
            [f64::INFINITY, f64::NEG_INFINITY]
        } else {
            [0.0, 1.0]
        };
        let mut ranges = Vec::with_capacity(2 * nb_values);
        for i in 0..nb_values {
            match min_max.and_then(|m| m.get(2 * i..2 * i + 2)) {
                Some(pair) => ranges.extend_from_slice(pair),
                None => ranges.extend_from_slice(&fallback),
            }
        }
        Self {
            nb_values,
            memory,
            values: vec![0.0; nb_values * memory],
            current: None,
            min_max: ranges,
            update_min_max,
        }
    }

    pub fn nb_values(&self) -> usize {
        self.nb_values
    }

    pub fn memory(&self) -> usize {
        self.memory
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn updates_min_max(&self) -> bool {
        self.update_min_max
    }

    /// Switch range tracking on or off. Stored samples and ranges are kept.
    pub fn set_update_min_max(&mut self, update: bool) {
        self.update_min_max = update;
    }

    /// Store a new sample. Missing values are recorded as 0.
    pub fn push(&mut self, sample: &[f64]) {
        let row = match self.current {
            Some(current) => (current + 1) % self.memory,
            None => 0,
        };
        self.current = Some(row);
        for i in 0..self.nb_values {
            let value = sample.get(i).copied().unwrap_or(0.0);
            if self.update_min_max {
                self.min_max[2 * i] = self.min_max[2 * i].min(value);
                self.min_max[2 * i + 1] = self.min_max[2 * i + 1].max(value);
            }
            self.values[row * self.nb_values + i] = value;
        }
    }

    /// Raw value `index` of the sample `age` pushes ago (0 = current).
    pub fn value_at(&self, age: usize, index: usize) -> f64 {
        let Some(current) = self.current else {
            return 0.0;
        };
        if index >= self.nb_values {
            return 0.0;
        }
        let row = (current + self.memory - age % self.memory) % self.memory;
        self.values[row * self.nb_values + index]
    }

    pub fn current_value(&self, index: usize) -> f64 {
        self.value_at(0, index)
    }

    pub fn previous_value(&self, index: usize) -> f64 {
        self.value_at(1, index)
    }

    pub fn min_max(&self, index: usize) -> (f64, f64) {
        match self.min_max.get(2 * index..2 * index + 2) {
            Some(pair) => (pair[0], pair[1]),
            None => (0.0, 1.0),
        }
    }

    pub fn set_min_max(&mut self, index: usize, min: f64, max: f64) {
        if index < self.nb_values {
            self.min_max[2 * index] = min;
            self.min_max[2 * index + 1] = max;
        }
    }

    /// Map a raw value into 0..=1 with the running range of value `index`.
    /// An empty range yields 0.
    pub fn normalize(&self, index: usize, raw: f64) -> f64 {
        let (min, max) = self.min_max(index);
        if !(max > min) {
            return 0.0;
        }
        ((raw - min) / (max - min)).clamp(0.0, 1.0)
    }

    pub fn normalized(&self, age: usize, index: usize) -> f64 {
        self.normalize(index, self.value_at(age, index))
    }

    pub fn normalized_current(&self, index: usize) -> f64 {
        self.normalized(0, index)
    }

    /// Interpolate between the previous and current sample; `fraction` is
    /// the share of the smoothing still to run (1 = previous, 0 = current).
    pub fn normalized_with_latency(&self, index: usize, fraction: f64) -> f64 {
        let f = fraction.clamp(0.0, 1.0);
        self.normalized(1, index) * f + self.normalized(0, index) * (1.0 - f)
    }

    /// Normalized samples of value `index`, oldest first.
    pub fn normalized_series(&self, index: usize) -> Vec<f64> {
        if self.is_empty() {
            return Vec::new();
        }
        (0..self.memory).rev().map(|age| self.normalized(age, index)).collect()
    }

    /// Change the depth. Existing rows stay where they are, new rows are
    /// zeroed and the current row is clamped into the new range.
    pub fn resize(&mut self, memory: usize) {
        let memory = memory.max(2);
        if memory == self.memory {
            return;
        }
        self.values.resize(memory * self.nb_values, 0.0);
        self.memory = memory;
        if let Some(current) = self.current {
            if current >= memory {
                self.current = Some(memory - 1);
            }
        }
    }

    /// Row `row` as stored, regardless of age.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        self.values.get(row * self.nb_values..(row + 1) * self.nb_values)
    }
}
