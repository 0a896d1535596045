use foundation::time::Timestamp;

/// Animation-frame metadata.
///
/// Hosts stamp each frame with a monotonically increasing index and the host
/// time at which the frame started.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// 0 before the first frame has run.
    pub index: u64,
    pub time: Timestamp,
}

impl Frame {
    pub fn new(index: u64, time: Timestamp) -> Self {
        Self { index, time }
    }

    pub fn next(self, time: Timestamp) -> Self {
        Self::new(self.index + 1, time)
    }
}
