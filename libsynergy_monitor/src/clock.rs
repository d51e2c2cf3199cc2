use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// The current wall-clock time, in the same offset-free form the instrument logs use.
///
/// Falls back to UTC when the local offset cannot be determined (some platforms refuse to
/// report it once more than one thread is running).
pub fn local_now() -> PrimitiveDateTime {
    wall_clock(OffsetDateTime::now_local().ok())
}

/// Strip the offset and sub-second part of `local`, or of the current UTC time if the local
/// time is unknown
fn wall_clock(local: Option<OffsetDateTime>) -> PrimitiveDateTime {
    let now = match local {
        Some(now) => now,
        None => {
            log::warn!(
                "Could not determine the local UTC offset; using UTC, which shifts time windows by the local offset"
            );
            OffsetDateTime::now_utc()
        }
    };
    PrimitiveDateTime::new(now.date(), now.time().replace_nanosecond(0).unwrap_or(now.time()))
}

/// `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(timestamp: PrimitiveDateTime) -> String {
    timestamp
        .format(&format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(datetime!(2025-05-12 08:04:09)),
            "2025-05-12 08:04:09"
        );
    }

    #[test]
    fn test_wall_clock_drops_offset_and_fraction() {
        let local = datetime!(2025-05-12 12:48:37.750 +02:00);
        assert_eq!(wall_clock(Some(local)), datetime!(2025-05-12 12:48:37));
    }

    #[test]
    fn test_wall_clock_falls_back_to_utc() {
        let before = OffsetDateTime::now_utc();
        let now = wall_clock(None);
        let after = OffsetDateTime::now_utc();
        assert_eq!(now.nanosecond(), 0);
        assert!(now >= PrimitiveDateTime::new(before.date(), before.time()) - time::Duration::SECOND);
        assert!(now <= PrimitiveDateTime::new(after.date(), after.time()));
    }

    #[test]
    fn test_local_now_has_second_resolution() {
        assert_eq!(local_now().nanosecond(), 0);
    }
}
