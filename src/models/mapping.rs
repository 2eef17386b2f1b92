use serde::{Deserialize, Serialize};

/// Which side of an edit a mapped position sticks to when the edit touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Left,
    Right,
}

/// A single replaced range: `old_size` positions starting at `start` became `new_size` positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMap {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

impl StepMap {
    pub fn new(start: usize, old_size: usize, new_size: usize) -> Self {
        Self {
            start,
            old_size,
            new_size,
        }
    }

    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        let end = self.start + self.old_size;
        if pos < self.start {
            return pos;
        }
        if pos > end {
            return pos - self.old_size + self.new_size;
        }

        // Touching positions of a non-empty range stay on their own edge.
        let bias = if self.old_size == 0 {
            bias
        } else if pos == self.start {
            Bias::Left
        } else if pos == end {
            Bias::Right
        } else {
            bias
        };

        match bias {
            Bias::Left => self.start,
            Bias::Right => self.start + self.new_size,
        }
    }
}

/// Ordered step maps produced by one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    /// Translate a pre-transaction position into the post-transaction coordinate space.
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.maps.iter().fold(pos, |pos, step| step.map(pos, bias))
    }
}
