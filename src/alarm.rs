//! Consecutive-defect alarm.

/// Running counter over consecutive defective frames.
///
/// A processed frame with damaged items adds its damaged count; a frame
/// with none resets the counter to zero. Reaching the threshold fires
/// the alarm exactly once and resets the counter. Whether the pipeline
/// also pauses on a fired alarm is the loop's decision, not this one's.
#[derive(Debug)]
pub struct DefectAlarm {
    consecutive: u32,
    threshold: u32,
}

impl DefectAlarm {
    /// `threshold` is validated positive by configuration loading.
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Fold one processed frame's damaged count in. Returns true when
    /// the alarm fires for this frame.
    pub fn observe(&mut self, damaged: u32) -> bool {
        if damaged == 0 {
            self.consecutive = 0;
            return false;
        }
        self.consecutive = self.consecutive.saturating_add(damaged);
        if self.consecutive >= self.threshold {
            self.consecutive = 0;
            return true;
        }
        false
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
