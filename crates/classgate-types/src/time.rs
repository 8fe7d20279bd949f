use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64); // ms since epoch, UTC

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }
}

/// A calendar month in UTC; the unit every quota counter is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// `YYYY-MM`, as used inside ledger keys.
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// First instant of the following month, in unix seconds.
    pub fn rollover_unix(&self) -> i64 {
        self.next().start().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_label_and_rollover() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let period = Period::containing(at);
        assert_eq!(period.label(), "2024-03");
        let expected = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(period.rollover_unix(), expected.timestamp());
    }

    #[test]
    fn december_rolls_into_next_year() {
        let at = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let period = Period::containing(at);
        assert_eq!(period.next(), Period { year: 2024, month: 1 });
        assert_eq!(
            period.rollover_unix(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn user_id_serializes_transparently() {
        let id = crate::id::UserId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
