use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall-clock readings derived from tokio's monotonic clock.
///
/// The wall time is sampled once; later readings add the monotonic time
/// elapsed since then, so timestamps and loop timers share one time base.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// A clock whose current reading is `wall`
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self { wall, mono: Instant::now() }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed()).unwrap_or(chrono::Duration::MAX);
        self.wall.checked_add_signed(elapsed).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
