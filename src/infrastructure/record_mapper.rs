use crate::domain::models::{BenchId, Reservation, ReservationDraft};
use crate::infrastructure::store_client::{
    CreateReservationRequest, ReservationRecord, UpdateReservationRequest,
};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Converts a store record into a domain reservation, or `None` when the
/// record is not usable. A malformed record is a diagnostic, never a hard
/// failure: the rest of the day must still render.
pub fn decode_record(record: &ReservationRecord, timezone: Tz) -> Option<Reservation> {
    let id = non_empty(record.id.as_deref())?;
    let bench_field = non_empty(record.bench_id.as_deref())?;
    let Some(bench_id) = BenchId::parse(&bench_field) else {
        tracing::warn!(%id, bench = %bench_field, "discarding record with unknown bench");
        return None;
    };
    let user_name = match non_empty(record.user_name.as_deref()) {
        Some(name) => name,
        None => {
            tracing::warn!(%id, "discarding record without a user name");
            return None;
        }
    };
    let start_time = match parse_wire_timestamp(record.start_time.as_deref(), timezone) {
        Some(value) => value,
        None => {
            tracing::warn!(%id, raw = ?record.start_time, "discarding record with bad start_time");
            return None;
        }
    };
    let end_time = match parse_wire_timestamp(record.end_time.as_deref(), timezone) {
        Some(value) => value,
        None => {
            tracing::warn!(%id, raw = ?record.end_time, "discarding record with bad end_time");
            return None;
        }
    };
    if end_time <= start_time {
        tracing::warn!(%id, "discarding record whose end is not after its start");
        return None;
    }

    Some(Reservation {
        id,
        bench_id,
        user_name,
        start_time,
        end_time,
    })
}

pub fn encode_create(draft: &ReservationDraft, timezone: Tz) -> CreateReservationRequest {
    CreateReservationRequest {
        bench_id: draft.bench_id.as_str().to_string(),
        user_name: draft.user_name.trim().to_string(),
        start_time: format_wire_timestamp(draft.start_time, timezone),
        end_time: format_wire_timestamp(draft.end_time, timezone),
    }
}

pub fn encode_update(draft: &ReservationDraft, timezone: Tz) -> UpdateReservationRequest {
    UpdateReservationRequest {
        user_name: draft.user_name.trim().to_string(),
        start_time: format_wire_timestamp(draft.start_time, timezone),
        end_time: format_wire_timestamp(draft.end_time, timezone),
    }
}

/// Offset-bearing timestamps are converted into the venue timezone; bare
/// local datetimes are taken as already venue-local (the store emits both
/// shapes historically).
fn parse_wire_timestamp(value: Option<&str>, timezone: Tz) -> Option<NaiveDateTime> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&timezone).naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

fn format_wire_timestamp(value: NaiveDateTime, timezone: Tz) -> String {
    match timezone.from_local_datetime(&value).earliest() {
        Some(instant) => instant.to_rfc3339(),
        // Nonexistent local time (DST gap): send the wall-clock value as-is.
        None => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Asia::Tokyo;

    fn full_record() -> ReservationRecord {
        ReservationRecord {
            id: Some("rsv-1".to_string()),
            bench_id: Some("front".to_string()),
            user_name: Some("高橋".to_string()),
            start_time: Some("2026-08-06T09:00:00+09:00".to_string()),
            end_time: Some("2026-08-06T10:30:00+09:00".to_string()),
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 6)
            .expect("valid date")
            .and_hms_opt(hour, minute, 0)
            .expect("valid time")
    }

    #[test]
    fn decode_maps_offset_timestamps_into_venue_time() {
        let reservation = decode_record(&full_record(), Tokyo).expect("record decodes");
        assert_eq!(reservation.id, "rsv-1");
        assert_eq!(reservation.bench_id, BenchId::Front);
        assert_eq!(reservation.start_time, at(9, 0));
        assert_eq!(reservation.end_time, at(10, 30));
    }

    #[test]
    fn decode_converts_utc_instants_to_jst_wall_clock() {
        let mut record = full_record();
        record.start_time = Some("2026-08-06T00:00:00Z".to_string());
        record.end_time = Some("2026-08-06T01:00:00Z".to_string());
        let reservation = decode_record(&record, Tokyo).expect("record decodes");
        assert_eq!(reservation.start_time, at(9, 0));
        assert_eq!(reservation.end_time, at(10, 0));
    }

    #[test]
    fn decode_accepts_bare_local_datetimes() {
        let mut record = full_record();
        record.start_time = Some("2026-08-06T09:00:00".to_string());
        record.end_time = Some("2026-08-06T09:30:00".to_string());
        let reservation = decode_record(&record, Tokyo).expect("record decodes");
        assert_eq!(reservation.start_time, at(9, 0));
    }

    #[test]
    fn decode_discards_records_missing_required_fields() {
        for strip in ["id", "bench_id", "user_name", "start_time", "end_time"] {
            let mut record = full_record();
            match strip {
                "id" => record.id = None,
                "bench_id" => record.bench_id = None,
                "user_name" => record.user_name = Some("  ".to_string()),
                "start_time" => record.start_time = None,
                _ => record.end_time = None,
            }
            assert!(decode_record(&record, Tokyo).is_none(), "kept record without {strip}");
        }
    }

    #[test]
    fn decode_discards_unknown_bench_and_reversed_interval() {
        let mut unknown_bench = full_record();
        unknown_bench.bench_id = Some("middle".to_string());
        assert!(decode_record(&unknown_bench, Tokyo).is_none());

        let mut reversed = full_record();
        reversed.start_time = Some("2026-08-06T11:00:00+09:00".to_string());
        assert!(decode_record(&reversed, Tokyo).is_none());
    }

    #[test]
    fn encode_renders_venue_local_times_with_offset() {
        let draft = ReservationDraft {
            bench_id: BenchId::Back,
            user_name: " 伊藤 ".to_string(),
            start_time: at(9, 0),
            end_time: at(10, 0),
        };
        let request = encode_create(&draft, Tokyo);
        assert_eq!(request.bench_id, "back");
        assert_eq!(request.user_name, "伊藤");
        assert_eq!(request.start_time, "2026-08-06T09:00:00+09:00");
        assert_eq!(request.end_time, "2026-08-06T10:00:00+09:00");

        let update = encode_update(&draft, Tokyo);
        assert_eq!(update.start_time, request.start_time);
    }

    #[test]
    fn encode_then_decode_preserves_wall_clock_times() {
        let draft = ReservationDraft {
            bench_id: BenchId::Front,
            user_name: "渡辺".to_string(),
            start_time: at(13, 30),
            end_time: at(15, 0),
        };
        let request = encode_create(&draft, Tokyo);
        let record = ReservationRecord {
            id: Some("rsv-2".to_string()),
            bench_id: Some(request.bench_id),
            user_name: Some(request.user_name),
            start_time: Some(request.start_time),
            end_time: Some(request.end_time),
        };
        let reservation = decode_record(&record, Tokyo).expect("roundtrip decodes");
        assert_eq!(reservation.start_time, draft.start_time);
        assert_eq!(reservation.end_time, draft.end_time);
    }
}
