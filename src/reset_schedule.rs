//! 入站流量定期重置周期
//!
//! 支持 `daily`、`weekly`（周一）、`monthly`（每月 1 日）以及 `<N>d` 固定天数间隔。
//! 日历周期一律按 UTC 零点计算。

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};

use crate::error::TrafficError;

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetSchedule {
    Daily,
    Weekly,
    Monthly,
    /// 从上次重置时刻起每 N 天
    EveryDays(u32),
}

impl ResetSchedule {
    /// 解析重置周期表达式，空串或 `never` 表示未启用
    pub fn parse(expr: &str) -> Result<Option<Self>, TrafficError> {
        let expr = expr.trim().to_ascii_lowercase();
        let schedule = match expr.as_str() {
            "" | "never" => return Ok(None),
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            other => {
                let days = other
                    .strip_suffix('d')
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| TrafficError::Configuration(format!("无效的流量重置周期: {}", other)))?;
                Self::EveryDays(days)
            }
        };
        Ok(Some(schedule))
    }

    /// 包含 `now` 的日历周期起点；固定间隔没有日历起点
    pub fn period_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let start = match self {
            Self::Daily => today,
            Self::Weekly => today.checked_sub_days(Days::new(u64::from(
                today.weekday().num_days_from_monday(),
            )))?,
            Self::Monthly => NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?,
            Self::EveryDays(_) => return None,
        };
        midnight(start)
    }

    /// 严格晚于 `after` 的下一个重置时刻，用于校验周期划分
    #[cfg(test)]
    fn next_boundary(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Daily => {
                let start = self.period_start(after)?.date_naive();
                midnight(start.checked_add_days(Days::new(1))?)
            }
            Self::Weekly => {
                let start = self.period_start(after)?.date_naive();
                midnight(start.checked_add_days(Days::new(7))?)
            }
            Self::Monthly => {
                let date = after.date_naive();
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                midnight(NaiveDate::from_ymd_opt(year, month, 1)?)
            }
            Self::EveryDays(days) => {
                DateTime::from_timestamp_millis(after.timestamp_millis() + i64::from(*days) * DAY_MS)
            }
        }
    }

    /// 返回 `(last_reset, now]` 区间内最近一次已越过的重置时刻
    ///
    /// 错过多个周期时只返回最后一个，折算只发生一次。
    /// `last_reset_ms <= 0` 表示从未重置，此时返回当前周期的锚点。
    pub fn due_boundary(&self, last_reset_ms: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let now_ms = now.timestamp_millis();
        let boundary = match self {
            Self::EveryDays(days) => {
                if last_reset_ms <= 0 {
                    return Some(now);
                }
                let period = i64::from(*days) * DAY_MS;
                let elapsed = now_ms - last_reset_ms;
                if elapsed < period {
                    return None;
                }
                DateTime::from_timestamp_millis(last_reset_ms + elapsed / period * period)?
            }
            _ => self.period_start(now)?,
        };

        (boundary.timestamp_millis() > last_reset_ms).then_some(boundary)
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(ResetSchedule::parse("").unwrap(), None);
        assert_eq!(ResetSchedule::parse("never").unwrap(), None);
        assert_eq!(ResetSchedule::parse("Daily").unwrap(), Some(ResetSchedule::Daily));
        assert_eq!(ResetSchedule::parse("weekly").unwrap(), Some(ResetSchedule::Weekly));
        assert_eq!(ResetSchedule::parse(" monthly ").unwrap(), Some(ResetSchedule::Monthly));
        assert_eq!(ResetSchedule::parse("30d").unwrap(), Some(ResetSchedule::EveryDays(30)));

        assert!(matches!(
            ResetSchedule::parse("0d"),
            Err(TrafficError::Configuration(_))
        ));
        assert!(ResetSchedule::parse("hourly").is_err());
        assert!(ResetSchedule::parse("d").is_err());
    }

    #[test]
    fn test_daily_boundaries() {
        let schedule = ResetSchedule::Daily;
        let now = at(2025, 3, 19, 15, 30);
        assert_eq!(schedule.period_start(now), Some(at(2025, 3, 19, 0, 0)));
        assert_eq!(schedule.next_boundary(now), Some(at(2025, 3, 20, 0, 0)));
        // 恰好在零点时下一个边界是次日零点
        assert_eq!(schedule.next_boundary(at(2025, 3, 19, 0, 0)), Some(at(2025, 3, 20, 0, 0)));

        let yesterday = at(2025, 3, 18, 0, 0).timestamp_millis();
        assert_eq!(schedule.due_boundary(yesterday, now), Some(at(2025, 3, 19, 0, 0)));
        let today = at(2025, 3, 19, 0, 0).timestamp_millis();
        assert_eq!(schedule.due_boundary(today, now), None);
    }

    #[test]
    fn test_weekly_boundaries() {
        let schedule = ResetSchedule::Weekly;
        // 2025-03-19 是周三
        let now = at(2025, 3, 19, 15, 30);
        assert_eq!(schedule.period_start(now), Some(at(2025, 3, 17, 0, 0)));
        assert_eq!(schedule.next_boundary(now), Some(at(2025, 3, 24, 0, 0)));
        // 周一当天就是周期起点
        assert_eq!(schedule.period_start(at(2025, 3, 17, 8, 0)), Some(at(2025, 3, 17, 0, 0)));

        let last_week = at(2025, 3, 10, 0, 0).timestamp_millis();
        assert_eq!(schedule.due_boundary(last_week, now), Some(at(2025, 3, 17, 0, 0)));
        let sunday = at(2025, 3, 16, 23, 59).timestamp_millis();
        assert_eq!(schedule.due_boundary(sunday, now), Some(at(2025, 3, 17, 0, 0)));
        let monday = at(2025, 3, 17, 0, 0).timestamp_millis();
        assert_eq!(schedule.due_boundary(monday, now), None);
    }

    #[test]
    fn test_monthly_boundaries() {
        let schedule = ResetSchedule::Monthly;
        let now = at(2025, 3, 19, 15, 30);
        assert_eq!(schedule.period_start(now), Some(at(2025, 3, 1, 0, 0)));
        assert_eq!(schedule.next_boundary(now), Some(at(2025, 4, 1, 0, 0)));
        assert_eq!(schedule.next_boundary(at(2025, 12, 31, 23, 0)), Some(at(2026, 1, 1, 0, 0)));

        // 错过多个月份只折算到最近的月初
        let december = at(2024, 12, 1, 0, 0).timestamp_millis();
        assert_eq!(schedule.due_boundary(december, now), Some(at(2025, 3, 1, 0, 0)));
        let this_month = at(2025, 3, 1, 0, 0).timestamp_millis();
        assert_eq!(schedule.due_boundary(this_month, now), None);
    }

    #[test]
    fn test_interval_boundaries() {
        let schedule = ResetSchedule::EveryDays(7);
        let last = at(2025, 3, 1, 12, 0);
        assert_eq!(schedule.next_boundary(last), Some(at(2025, 3, 8, 12, 0)));

        // 不足一个周期
        assert_eq!(schedule.due_boundary(last.timestamp_millis(), at(2025, 3, 8, 11, 59)), None);
        // 恰好一个周期
        assert_eq!(
            schedule.due_boundary(last.timestamp_millis(), at(2025, 3, 8, 12, 0)),
            Some(at(2025, 3, 8, 12, 0))
        );
        // 跨越两个半周期，对齐到最后一个边界而不是当前时刻
        assert_eq!(
            schedule.due_boundary(last.timestamp_millis(), at(2025, 3, 19, 15, 30)),
            Some(at(2025, 3, 15, 12, 0))
        );
    }

    #[test]
    fn test_never_reset_anchors_to_current_period() {
        let now = at(2025, 3, 19, 15, 30);
        assert_eq!(ResetSchedule::Monthly.due_boundary(0, now), Some(at(2025, 3, 1, 0, 0)));
        assert_eq!(ResetSchedule::EveryDays(3).due_boundary(0, now), Some(now));
    }
}
