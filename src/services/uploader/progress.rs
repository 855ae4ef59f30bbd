use std::sync::Mutex;

/// Integer percent of `sent` over `total`, rounded to nearest.
pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = sent.min(total);
    ((sent * 100 + total / 2) / total) as u8
}

/// Per-chunk percent cells aggregated into a single 0-100 stream.
///
/// Each chunk owns one cell. Cell updates are monotonic: a report lower
/// than or equal to the cell's current value is dropped, so late transport
/// callbacks can never walk the aggregate backwards. Every effective
/// update emits the rounded mean of all cells, and the emission happens
/// under the cell lock, so concurrent chunk callbacks always observe a
/// non-decreasing sequence. Once [`ProgressTracker::close`] is called,
/// all further reports are dropped.
pub struct ProgressTracker {
    state: Mutex<State>,
    emit: Box<dyn Fn(u8) + Send + Sync>,
}

struct State {
    cells: Vec<u8>,
    closed: bool,
}

impl ProgressTracker {
    pub fn new(chunk_count: usize, emit: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::new(State {
                cells: vec![0; chunk_count],
                closed: false,
            }),
            emit: Box::new(emit),
        }
    }

    /// Records `percent` for the chunk at `index`.
    ///
    /// The emit callback runs with the lock held, which keeps emissions in
    /// cell-update order; the callback must not call back into the tracker.
    pub fn update(&self, index: usize, percent: u8) {
        let percent = percent.min(100);
        let mut state = self.state.lock().unwrap();
        if state.closed || percent <= state.cells[index] {
            return;
        }
        state.cells[index] = percent;
        (self.emit)(aggregate(&state.cells));
    }

    /// Stops emission for good. Reports from chunk tasks still running
    /// after the upload reached its terminal outcome are dropped.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

/// Rounded arithmetic mean. All cells at 100 yields exactly 100.
fn aggregate(cells: &[u8]) -> u8 {
    if cells.is_empty() {
        return 100;
    }
    let sum: u32 = cells.iter().map(|&c| u32::from(c)).sum();
    let n = cells.len() as u32;
    ((sum + n / 2) / n) as u8
}
