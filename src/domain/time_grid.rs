use chrono::{NaiveDateTime, NaiveTime, Timelike};

/// The day's addressable time slots: a fixed operating window walked at a
/// fixed granularity. All timetable math is anchored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGrid {
    slot_minutes: u32,
    operating_start: NaiveTime,
    operating_end: NaiveTime,
}

impl TimeGrid {
    /// `slot_minutes` must divide an hour; `end_hour` is exclusive for slot
    /// generation but a reservation may still end exactly on it.
    pub fn new(slot_minutes: u32, start_hour: u32, end_hour: u32) -> Result<Self, String> {
        if slot_minutes == 0 || 60 % slot_minutes != 0 {
            return Err(format!(
                "slot_minutes must divide an hour, got {slot_minutes}"
            ));
        }
        if start_hour >= end_hour || end_hour > 24 {
            return Err(format!(
                "operating window must satisfy start < end <= 24, got {start_hour}..{end_hour}"
            ));
        }
        let operating_start =
            NaiveTime::from_hms_opt(start_hour, 0, 0).ok_or_else(|| format!(
                "invalid operating start hour {start_hour}"
            ))?;
        // 24:00 has no NaiveTime; treat it as the last representable instant.
        let operating_end = NaiveTime::from_hms_opt(end_hour, 0, 0)
            .unwrap_or(NaiveTime::from_hms_opt(23, 59, 59).expect("valid fixed time"));
        Ok(Self {
            slot_minutes,
            operating_start,
            operating_end,
        })
    }

    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    pub fn operating_start(&self) -> NaiveTime {
        self.operating_start
    }

    pub fn operating_end(&self) -> NaiveTime {
        self.operating_end
    }

    /// Ordered slot-start times covering the operating window, half-open at
    /// the closing hour. Recomputed on every call.
    pub fn slots(&self) -> Vec<NaiveTime> {
        let start = minutes_from_midnight(self.operating_start);
        let end = minutes_from_midnight(self.operating_end);
        (start..end)
            .step_by(self.slot_minutes as usize)
            .filter_map(|minutes| NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0))
            .collect()
    }

    /// True iff the time-of-day is an exact multiple of the slot duration
    /// measured from midnight.
    pub fn is_aligned(&self, timestamp: NaiveDateTime) -> bool {
        let time = timestamp.time();
        time.second() == 0
            && time.nanosecond() == 0
            && minutes_from_midnight(time) % self.slot_minutes == 0
    }

    /// Signed minute offset from the operating start; negative before the
    /// window opens. Callers reject negatives, never clamp them.
    pub fn minutes_from_operating_start(&self, timestamp: NaiveDateTime) -> i64 {
        i64::from(minutes_from_midnight(timestamp.time()))
            - i64::from(minutes_from_midnight(self.operating_start))
    }

    /// Inclusive window check: a reservation may end exactly at closing.
    pub fn is_within_window(&self, timestamp: NaiveDateTime) -> bool {
        let time = timestamp.time();
        time >= self.operating_start && time <= self.operating_end
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(30, 7, 22).expect("canonical grid is valid")
    }
}

fn minutes_from_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}
