//! Settlement window embedded in a market title
//!
//! Titles look like `Bitcoin Up or Down - March 5, 11:45PM-12:00AM ET`. The
//! times are exchange-local; conversion to UTC uses a fixed offset.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Parse `<Month> <day>, <h:mm><AM|PM> - <h:mm><AM|PM> ET` out of `title`.
///
/// The year is taken from `now`. An end time before the start rolls into
/// the next day. `utc_offset_hours` is the exchange offset from UTC
/// (-5 for EST), so UTC = local - offset.
pub fn parse_title_window(
    title: &str,
    now: DateTime<Utc>,
    utc_offset_hours: i32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let raw = find_window(title)?;

    let date = parse_month_day(raw.month, raw.day, now.year())?;
    let start = NaiveDateTime::new(date, raw.start);
    let mut end = NaiveDateTime::new(date, raw.end);
    if end < start {
        end += Duration::days(1);
    }

    let to_utc = Duration::hours(-i64::from(utc_offset_hours));
    Some(((start + to_utc).and_utc(), (end + to_utc).and_utc()))
}

struct RawWindow<'a> {
    month: &'a str,
    day: u32,
    start: NaiveTime,
    end: NaiveTime,
}

/// First position in `title` where the whole pattern matches
fn find_window(title: &str) -> Option<RawWindow<'_>> {
    title
        .char_indices()
        .filter(|(i, c)| {
            c.is_ascii_alphabetic()
                && !title[..*i]
                    .chars()
                    .next_back()
                    .is_some_and(|p| p.is_ascii_alphabetic())
        })
        .find_map(|(i, _)| match_at(&title[i..]))
}

fn match_at(s: &str) -> Option<RawWindow<'_>> {
    let mut cur = Cursor(s);

    let month = cur.take_while(|c| c.is_ascii_alphabetic())?;
    cur.literal(" ")?;
    let day = cur.digits(1, 2)?.parse().ok()?;
    cur.literal(", ")?;
    let start = cur.clock()?;
    cur.spaces();
    cur.dash()?;
    cur.spaces();
    let end = cur.clock()?;
    cur.spaces();
    cur.literal("ET")?;

    Some(RawWindow {
        month,
        day,
        start,
        end,
    })
}

fn parse_month_day(month: &str, day: u32, year: i32) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{month} {day} {year}"), "%B %d %Y").ok()
}

struct Cursor<'a>(&'a str);

impl<'a> Cursor<'a> {
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> Option<&'a str> {
        let end = self.0.find(|c: char| !pred(c)).unwrap_or(self.0.len());
        if end == 0 {
            return None;
        }
        let (head, tail) = self.0.split_at(end);
        self.0 = tail;
        Some(head)
    }

    fn digits(&mut self, min: usize, max: usize) -> Option<&'a str> {
        let run = self.take_while(|c| c.is_ascii_digit())?;
        (min..=max).contains(&run.len()).then_some(run)
    }

    fn literal(&mut self, lit: &str) -> Option<()> {
        self.0 = self.0.strip_prefix(lit)?;
        Some(())
    }

    fn spaces(&mut self) {
        self.0 = self.0.trim_start();
    }

    fn dash(&mut self) -> Option<()> {
        let mut chars = self.0.chars();
        match chars.next()? {
            '-' | '\u{2013}' | '\u{2014}' => {
                self.0 = chars.as_str();
                Some(())
            }
            _ => None,
        }
    }

    /// `h:mm` followed by optional spaces and AM/PM
    fn clock(&mut self) -> Option<NaiveTime> {
        let hour = self.digits(1, 2)?;
        self.literal(":")?;
        let minute = self.digits(2, 2)?;
        self.spaces();
        let meridiem = if self.literal("AM").is_some() {
            "AM"
        } else {
            self.literal("PM")?;
            "PM"
        };
        NaiveTime::parse_from_str(&format!("{hour}:{minute} {meridiem}"), "%I:%M %p").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_standard_title() {
        let (start, end) =
            parse_title_window("Bitcoin Up or Down - March 5, 11:00AM-11:15AM ET", now(), -5)
                .unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 5, 16, 15, 0).unwrap());
    }

    #[test]
    fn test_parse_spaced_and_en_dash() {
        let (start, end) =
            parse_title_window("BTC Up or Down March 5, 9:45 PM \u{2013} 10:00 PM ET", now(), -5)
                .unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 6, 2, 45, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 6, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_end_before_start_rolls_over_midnight() {
        let (start, end) =
            parse_title_window("Bitcoin Up or Down - March 5, 11:45PM-12:00AM ET", now(), -5)
                .unwrap();
        assert_eq!(end - start, Duration::minutes(15));
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 6, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_offset_is_configurable() {
        let (start, _) =
            parse_title_window("Bitcoin Up or Down - March 5, 11:00AM-11:15AM ET", now(), -4)
                .unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 5, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_no_window_in_title() {
        assert!(parse_title_window("Bitcoin above $100,000 on Friday?", now(), -5).is_none());
        assert!(parse_title_window("Bitcoin Up or Down - March 5, 11:00AM-11:15AM", now(), -5).is_none());
        assert!(parse_title_window("Bitcoin Up or Down - Smarch 5, 11:00AM-11:15AM ET", now(), -5).is_none());
    }
}
