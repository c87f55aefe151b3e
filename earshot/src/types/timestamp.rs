use std::fmt;
use std::sync::OnceLock;

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

const CLOCK: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");
const LONG: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Placeholder shown for an event time that has never been set.
pub const NEVER: &str = "--:--:--";

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Record the device's UTC offset for every later [`Timestamp::now`].
///
/// The `time` crate only reads the local offset while the process is
/// single-threaded, so binaries look it up before starting the runtime
/// and hand it over here. Only the first call has an effect.
pub fn set_local_offset(offset: UtcOffset) {
    let _ = LOCAL_OFFSET.set(offset);
}

/// The offset set by [`set_local_offset`], or UTC if none was.
pub fn local_offset() -> UtcOffset {
    LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC)
}

/// Wall-clock instant in the device's local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc().to_offset(local_offset()))
    }

    pub fn from_datetime(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    /// `HH:MM:SS`, as shown in the status log and API.
    pub fn clock(&self) -> String {
        self.0.format(CLOCK).unwrap_or_else(|_| NEVER.to_string())
    }

    /// `YYYYmmdd_HHMMSS`, used in capture file names.
    pub fn file_stamp(&self) -> String {
        self.0
            .format(FILE_STAMP)
            .unwrap_or_else(|_| "00000000_000000".to_string())
    }

    /// `YYYY-mm-dd HH:MM:SS`, used in alert bodies.
    pub fn long(&self) -> String {
        self.0.format(LONG).unwrap_or_else(|_| self.clock())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clock())
    }
}
