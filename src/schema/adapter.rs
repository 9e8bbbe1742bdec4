//! Adapter for turning event logs into ordered [`Event`] sequences
//!
//! Parsing, record validation, token classification, ordering and the
//! minimum-length check all happen here, so the estimation core only ever
//! sees well-formed, time-ordered input.

use tracing::{debug, warn};

use crate::error::ComputeError;
use crate::schema::raw_event::*;
use crate::types::Event;

/// Fewest events from which a transition can be observed
pub const MIN_EVENTS: usize = 2;

/// Supported event log encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    /// Header row with `timestamp` and `event` columns
    Csv,
    /// One JSON record per line
    Ndjson,
    /// JSON array of records
    Json,
}

/// Adapter for converting event logs to ordered events
pub struct EventLogAdapter;

impl EventLogAdapter {
    /// Parse `input` in the given format
    pub fn parse(input: &str, format: EventFormat) -> Result<Vec<RawEvent>, ComputeError> {
        match format {
            EventFormat::Csv => Self::parse_csv(input),
            EventFormat::Ndjson => Self::parse_ndjson(input),
            EventFormat::Json => Self::parse_array(input),
        }
    }

    /// Parse CSV with a header row.
    ///
    /// The `timestamp` and `event` columns may appear in any position; other
    /// columns are ignored. Blank lines are skipped.
    pub fn parse_csv(csv: &str) -> Result<Vec<RawEvent>, ComputeError> {
        let mut lines = csv
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(ComputeError::ParseError("CSV input is empty".to_string()));
        };
        let columns = split_csv_line(header.trim_start_matches('\u{feff}'));
        let ts_idx = column_index(&columns, TIMESTAMP_COLUMN)?;
        let event_idx = column_index(&columns, EVENT_COLUMN)?;
        let min_fields = ts_idx.max(event_idx) + 1;

        let mut events = Vec::new();
        for (line_num, line) in lines {
            let fields = split_csv_line(line);
            if fields.len() < min_fields {
                return Err(ComputeError::ParseError(format!(
                    "line {}: expected at least {} columns, found {}",
                    line_num + 1,
                    min_fields,
                    fields.len()
                )));
            }

            let raw_ts = fields[ts_idx].trim();
            let timestamp: f64 = raw_ts.parse().map_err(|e| {
                ComputeError::ParseError(format!(
                    "line {}: invalid timestamp {:?}: {}",
                    line_num + 1,
                    raw_ts,
                    e
                ))
            })?;

            events.push(RawEvent::new(timestamp, fields[event_idx].trim()));
        }

        Ok(events)
    }

    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<RawEvent>, ComputeError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEvent>, ComputeError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate, classify and order records for extraction.
    ///
    /// With `strict` set, an unknown or blank action token is an error.
    /// Otherwise the record becomes an unrecognized event that breaks
    /// adjacency. A non-finite timestamp is always an error.
    pub fn to_events(raw: &[RawEvent], strict: bool) -> Result<Vec<Event>, ComputeError> {
        let mut events = Vec::with_capacity(raw.len());
        let mut unrecognized = 0usize;

        for (idx, record) in raw.iter().enumerate() {
            match record.validate() {
                Err(e @ ValidationError::NonFiniteTimestamp(_)) => {
                    return Err(ComputeError::InvalidTimestamp(format!(
                        "record {}: {}",
                        idx + 1,
                        e
                    )));
                }
                // A blank token is classified like any other unknown token below.
                Err(ValidationError::EmptyEvent) | Ok(()) => {}
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Invalid record {}: {}",
                        idx + 1,
                        e
                    )));
                }
            }

            match record.action() {
                Some(action) => events.push(Event::new(record.timestamp, action)),
                None if strict => {
                    return Err(ComputeError::UnknownAction(format!(
                        "record {}: {:?}",
                        idx + 1,
                        record.event.trim()
                    )));
                }
                None => {
                    unrecognized += 1;
                    events.push(Event::unrecognized(record.timestamp));
                }
            }
        }

        if events.len() < MIN_EVENTS {
            return Err(ComputeError::InsufficientEvents(format!(
                "need at least {} events to analyze transitions, got {}",
                MIN_EVENTS,
                events.len()
            )));
        }

        if unrecognized > 0 {
            warn!(
                count = unrecognized,
                "unrecognized action tokens kept as gaps in the sequence"
            );
        }

        let ordered = events
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp);
        if !ordered {
            debug!("event log was not time-ordered, sorting by timestamp");
            events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }

        Ok(events)
    }

    /// Validate a batch of records, returning only the failures.
    ///
    /// Blank and unknown tokens only count as failures with `strict` set,
    /// matching what [`to_events`](Self::to_events) accepts.
    pub fn validate_events(raw: &[RawEvent], strict: bool) -> Vec<ValidationResult> {
        raw.iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                let error = match record.validate() {
                    Err(ValidationError::EmptyEvent) if !strict => return None,
                    Err(e) => e,
                    Ok(()) if strict && record.action().is_none() => {
                        ValidationError::UnknownAction(record.event.trim().to_string())
                    }
                    Ok(()) => return None,
                };
                Some(ValidationResult {
                    index: idx,
                    timestamp: record.timestamp,
                    error,
                })
            })
            .collect()
    }

    /// Render events as CSV with a `timestamp,event` header.
    ///
    /// Unrecognized events have no token to write and are omitted.
    pub fn write_csv(events: &[Event]) -> String {
        let mut out = format!("{TIMESTAMP_COLUMN},{EVENT_COLUMN}\n");
        for event in events {
            if let Some(action) = event.action {
                out.push_str(&format!("{},{}\n", event.timestamp, action));
            }
        }
        out
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub timestamp: f64,
    pub error: ValidationError,
}

fn column_index(columns: &[String], name: &str) -> Result<usize, ComputeError> {
    columns
        .iter()
        .position(|c| c.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| ComputeError::MissingField(format!("CSV column '{name}'")))
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
///
/// Input is split into lines before this runs, so a quoted field containing
/// a line break is not supported.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    const SAMPLE_CSV: &str = "timestamp,event\n0.0,scroll\n2.0,scroll\n5.0,like\n7.0,scroll\n";

    #[test]
    fn test_parse_csv() {
        let events = EventLogAdapter::parse_csv(SAMPLE_CSV).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], RawEvent::new(5.0, "like"));
    }

    #[test]
    fn test_parse_csv_column_order_and_extras() {
        let csv = "\u{feff}user,Event,Timestamp\nu1,\"like\",1.5\n\nu1, Dubious_Scroll ,3\n";
        let events = EventLogAdapter::parse_csv(csv).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RawEvent::new(1.5, "like"));
        assert_eq!(events[1].timestamp, 3.0);
        assert_eq!(events[1].action(), Some(Action::DubiousScroll));
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let err = EventLogAdapter::parse_csv("time,event\n1,scroll\n").unwrap_err();
        assert!(matches!(err, ComputeError::MissingField(_)));
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn test_parse_csv_bad_timestamp_reports_line() {
        let err = EventLogAdapter::parse_csv("timestamp,event\n1,scroll\nabc,like\n").unwrap_err();
        assert!(matches!(err, ComputeError::ParseError(_)));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_csv_short_row() {
        let err = EventLogAdapter::parse_csv("timestamp,event\n1\n").unwrap_err();
        assert!(err.to_string().contains("expected at least 2 columns"));
    }

    #[test]
    fn test_parse_csv_empty() {
        assert!(EventLogAdapter::parse_csv("\n\n").is_err());
    }

    #[test]
    fn test_split_csv_line_quotes() {
        assert_eq!(
            split_csv_line(r#"1,"a, ""b""",c"#),
            vec!["1".to_string(), "a, \"b\"".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_parse_csv_rejects_line_break_in_quotes() {
        let err = EventLogAdapter::parse_csv("timestamp,event\n0,\"scr\noll\"\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn test_parse_ndjson_and_array() {
        let ndjson = "{\"timestamp\": 0, \"event\": \"scroll\"}\n\n{\"timestamp\": 1, \"action\": \"like\"}\n";
        let from_ndjson = EventLogAdapter::parse(ndjson, EventFormat::Ndjson).unwrap();

        let array = r#"[{"timestamp": 0, "event": "scroll"}, {"timestamp": 1, "event": "like"}]"#;
        let from_array = EventLogAdapter::parse(array, EventFormat::Json).unwrap();

        assert_eq!(from_ndjson, from_array);
        assert_eq!(from_ndjson.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let err = EventLogAdapter::parse_ndjson("{\"timestamp\": 0, \"event\": \"scroll\"}\nnope\n")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_to_events_sorts_by_timestamp() {
        let raw = vec![
            RawEvent::new(5.0, "like"),
            RawEvent::new(0.0, "scroll"),
            RawEvent::new(2.0, "dubious_scroll"),
        ];
        let events = EventLogAdapter::to_events(&raw, false).unwrap();
        let times: Vec<f64> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![0.0, 2.0, 5.0]);
        assert_eq!(events[1].action, Some(Action::DubiousScroll));
    }

    #[test]
    fn test_to_events_keeps_unknown_as_gap() {
        let raw = vec![
            RawEvent::new(0.0, "scroll"),
            RawEvent::new(3.0, "unknown"),
            RawEvent::new(7.0, "like"),
        ];
        let events = EventLogAdapter::to_events(&raw, false).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], Event::unrecognized(3.0));
    }

    #[test]
    fn test_to_events_keeps_blank_token_as_gap() {
        let raw = EventLogAdapter::parse_csv("timestamp,event\n0,scroll\n1,scroll\n2,\n3,like\n")
            .unwrap();
        assert_eq!(raw[2], RawEvent::new(2.0, ""));

        let events = EventLogAdapter::to_events(&raw, false).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], Event::unrecognized(2.0));

        let err = EventLogAdapter::to_events(&raw, true).unwrap_err();
        assert!(matches!(err, ComputeError::UnknownAction(_)));
    }

    #[test]
    fn test_to_events_strict_rejects_unknown() {
        let raw = vec![RawEvent::new(0.0, "scroll"), RawEvent::new(3.0, "tap")];
        let err = EventLogAdapter::to_events(&raw, true).unwrap_err();
        assert!(matches!(err, ComputeError::UnknownAction(_)));
    }

    #[test]
    fn test_to_events_requires_two_events() {
        let err = EventLogAdapter::to_events(&[RawEvent::new(0.0, "scroll")], false).unwrap_err();
        assert!(matches!(err, ComputeError::InsufficientEvents(_)));

        let err = EventLogAdapter::to_events(&[], false).unwrap_err();
        assert!(matches!(err, ComputeError::InsufficientEvents(_)));
    }

    #[test]
    fn test_to_events_rejects_non_finite_timestamp() {
        let raw = vec![RawEvent::new(0.0, "scroll"), RawEvent::new(f64::INFINITY, "like")];
        let err = EventLogAdapter::to_events(&raw, false).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_write_csv_parses_back() {
        let events = vec![
            Event::new(0.0, Action::Scroll),
            Event::unrecognized(0.5),
            Event::new(1.25, Action::DubiousScroll),
            Event::new(4.0, Action::Like),
        ];

        let csv = EventLogAdapter::write_csv(&events);
        assert_eq!(csv, "timestamp,event\n0,scroll\n1.25,dubious_scroll\n4,like\n");

        let raw = EventLogAdapter::parse_csv(&csv).unwrap();
        let parsed = EventLogAdapter::to_events(&raw, true).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1], Event::new(1.25, Action::DubiousScroll));
    }

    #[test]
    fn test_validate_events() {
        let raw = vec![
            RawEvent::new(0.0, "scroll"),
            RawEvent::new(f64::NAN, "like"),
            RawEvent::new(2.0, "tap"),
            RawEvent::new(3.0, ""),
        ];

        let lenient = EventLogAdapter::validate_events(&raw, false);
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].index, 1);

        let strict = EventLogAdapter::validate_events(&raw, true);
        assert_eq!(strict.len(), 3);
        assert_eq!(
            strict[1].error,
            ValidationError::UnknownAction("tap".to_string())
        );
        assert_eq!(strict[2].error, ValidationError::EmptyEvent);
    }
}
