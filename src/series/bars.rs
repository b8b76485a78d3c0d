use crate::quote::Bar;

/// A bar plus its position in the accumulation order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredBar {
    pub seq: u64,
    pub bar: Bar,
}

/// Ordered bar series. Realtime accumulation appends one bar at a time;
/// a historical load replaces the whole series.
#[derive(Debug, Clone, Default)]
pub struct BarStore {
    bars: Vec<StoredBar>,
    next_seq: u64,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one accumulated bar and return its sequence number.
    pub fn append_one(&mut self, bar: Bar) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.bars.push(StoredBar { seq, bar });
        seq
    }

    pub fn load_batch<I>(&mut self, bars: I)
    where
        I: IntoIterator<Item = Bar>,
    {
        self.clear();
        for bar in bars {
            self.append_one(bar);
        }
    }

    /// Resets the sequence counter too.
    pub fn clear(&mut self) {
        self.bars.clear();
        self.next_seq = 0;
    }

    pub fn snapshot(&self) -> Vec<Bar> {
        self.bars.iter().map(|stored| stored.bar).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|stored| stored.bar.close).collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
