use alloc::sync::Arc;

use chrono::{DateTime, Local};

/// Default half-width of the bounded neighbourhood scans (grouping refresh and activity checks).
pub const DEFAULT_SCAN_WINDOW: usize = 100;

/// Default size of the avatar handle attached to room alerts.
pub const DEFAULT_ALERT_AVATAR_SIZE: u32 = 128;

/// A provider of the current local time.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Configuration for [`crate::TimelineProjection`].
#[derive(Clone)]
pub struct TimelineOptions {
    /// How many rows in each direction neighbourhood scans may visit.
    ///
    /// Scans are a cost/accuracy tradeoff: a sender whose notable activity lies beyond the window
    /// is assumed to be notable, so visibility errs towards showing rows.
    pub scan_window: usize,
    /// Used to label sections relative to "today".
    pub clock: Clock,
}

impl TimelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_window(mut self, scan_window: usize) -> Self {
        self.scan_window = scan_window;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub(crate) fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
            clock: Arc::new(Local::now),
        }
    }
}

impl core::fmt::Debug for TimelineOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimelineOptions")
            .field("scan_window", &self.scan_window)
            .field("clock", &"Clock(..)")
            .finish()
    }
}

/// Configuration for [`crate::RosterProjection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RosterOptions {
    pub alert_avatar_size: u32,
}

impl RosterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alert_avatar_size(mut self, size: u32) -> Self {
        self.alert_avatar_size = size;
        self
    }
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            alert_avatar_size: DEFAULT_ALERT_AVATAR_SIZE,
        }
    }
}
