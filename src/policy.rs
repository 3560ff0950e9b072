//! Per-provider ticketing policy: availability switches, airline
//! filters, and the time-windowed ticketing schedule.
//!
//! Evaluation is a pure function of the policy and the current instant;
//! the caller supplies `now` through the [`crate::service::Clock`]
//! collaborator so decisions stay deterministic under test.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::model::NormalizedItinerary;

pub const DEFAULT_TIMEZONE: &str = "Asia/Baghdad";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketingMode {
    Full,
    AvailabilityOnly,
}

impl Default for TicketingMode {
    fn default() -> Self {
        TicketingMode::Full
    }
}

/// One schedule rule. `days` uses 0=Mon .. 6=Sun; `start`/`end` are
/// `HH:MM` local times, with `start > end` denoting an overnight window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleRule {
    pub days: BTreeSet<u8>,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketingSchedule {
    pub enabled: bool,
    pub timezone: String,
    pub rules: Vec<ScheduleRule>,
}

impl Default for TicketingSchedule {
    fn default() -> Self {
        TicketingSchedule {
            enabled: false,
            timezone: DEFAULT_TIMEZONE.to_string(),
            rules: vec![ScheduleRule {
                days: (0..=6).collect(),
                start: "00:00".to_string(),
                end: "23:59".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderPolicy {
    pub availability_enabled: bool,
    pub seats_estimation_enabled: bool,
    pub ticketing_mode: TicketingMode,
    pub filters_enabled: bool,
    pub blocked_airlines: Vec<String>,
    pub blocked_suppliers: Vec<String>,
    pub ticketing_schedule: TicketingSchedule,
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        ProviderPolicy {
            availability_enabled: true,
            seats_estimation_enabled: true,
            ticketing_mode: TicketingMode::Full,
            filters_enabled: true,
            blocked_airlines: Vec::new(),
            blocked_suppliers: Vec::new(),
            ticketing_schedule: TicketingSchedule::default(),
        }
    }
}

/// The effective decision for one provider at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub availability: bool,
    pub ticketing_mode: TicketingMode,
    pub ticketing_schedule_ok: bool,
    pub ticketing_effective: bool,
    pub filters_enabled: bool,
    pub blocked_airlines: Vec<String>,
    pub seats_estimation_enabled: bool,
}

impl PolicyDecision {
    /// A provider missing from the store is treated as fully disabled.
    pub fn disabled() -> Self {
        PolicyDecision {
            availability: false,
            ticketing_mode: TicketingMode::AvailabilityOnly,
            ticketing_schedule_ok: false,
            ticketing_effective: false,
            filters_enabled: true,
            blocked_airlines: Vec::new(),
            seats_estimation_enabled: false,
        }
    }
}

fn parse_hhmm(v: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(v.trim(), "%H:%M").ok()
}

fn schedule_tz(schedule: &TicketingSchedule) -> Tz {
    schedule
        .timezone
        .trim()
        .parse()
        .unwrap_or_else(|_| DEFAULT_TIMEZONE.parse().expect("valid default timezone"))
}

/// Whether the schedule allows ticketing at `now`. Disabled schedules
/// always allow; enabled schedules with no matching rule do not.
pub fn schedule_allows(schedule: &TicketingSchedule, now: DateTime<Utc>) -> bool {
    if !schedule.enabled {
        return true;
    }

    let local = now.with_timezone(&schedule_tz(schedule));
    let weekday = local.weekday().num_days_from_monday() as u8;
    let tnow = local.time();

    schedule.rules.iter().any(|rule| {
        if !rule.days.contains(&weekday) {
            return false;
        }
        let (Some(start), Some(end)) = (parse_hhmm(&rule.start), parse_hhmm(&rule.end)) else {
            return false;
        };
        if start <= end {
            start <= tnow && tnow <= end
        } else {
            // overnight window, e.g. 22:00-02:00
            tnow >= start || tnow <= end
        }
    })
}

pub fn evaluate(policy: &ProviderPolicy, provider_id: &str, now: DateTime<Utc>) -> PolicyDecision {
    let blocked_supplier = policy
        .blocked_suppliers
        .iter()
        .any(|s| s.trim().eq_ignore_ascii_case(provider_id));
    let availability = policy.availability_enabled && !blocked_supplier;

    let ticketing_schedule_ok = schedule_allows(&policy.ticketing_schedule, now);
    let ticketing_effective =
        availability && policy.ticketing_mode == TicketingMode::Full && ticketing_schedule_ok;

    let blocked_airlines = policy
        .blocked_airlines
        .iter()
        .map(|a| a.trim().to_ascii_uppercase())
        .filter(|a| !a.is_empty())
        .collect();

    PolicyDecision {
        availability,
        ticketing_mode: policy.ticketing_mode,
        ticketing_schedule_ok,
        ticketing_effective,
        filters_enabled: policy.filters_enabled,
        blocked_airlines,
        seats_estimation_enabled: policy.seats_estimation_enabled,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleWindow {
    pub start: String,
    pub end: String,
}

/// Operator-facing schedule context; not used for the gating decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleWindows {
    pub enabled: bool,
    pub timezone: String,
    pub now: String,
    pub current_window: Option<ScheduleWindow>,
    pub next_window: Option<ScheduleWindow>,
}

/// Concrete datetime windows implied by the rules over the next seven
/// days: the window containing `now` (if any) and the next one after it.
pub fn compute_windows(schedule: &TicketingSchedule, now: DateTime<Utc>) -> ScheduleWindows {
    let tz = schedule_tz(schedule);
    let local = now.with_timezone(&tz);

    let mut windows: Vec<(DateTime<Tz>, DateTime<Tz>)> = Vec::new();
    for rule in &schedule.rules {
        let (Some(start), Some(end)) = (parse_hhmm(&rule.start), parse_hhmm(&rule.end)) else {
            continue;
        };
        for offset in 0..8i64 {
            let date = local.date_naive() + Duration::days(offset);
            let weekday = date.weekday().num_days_from_monday() as u8;
            if !rule.days.contains(&weekday) {
                continue;
            }
            let Some(start_dt) = tz.from_local_datetime(&date.and_time(start)).earliest() else {
                continue;
            };
            let end_date = if end >= start { date } else { date + Duration::days(1) };
            let Some(end_dt) = tz.from_local_datetime(&end_date.and_time(end)).earliest() else {
                continue;
            };
            windows.push((start_dt, end_dt));
        }
    }
    windows.sort_by_key(|w| w.0);

    let current = windows.iter().find(|w| w.0 <= local && local <= w.1).cloned();
    let next = match &current {
        Some(cur) => windows.iter().find(|w| w.0 > cur.1).cloned(),
        None => windows.iter().find(|w| w.0 > local).cloned(),
    };

    let fmt = |w: &(DateTime<Tz>, DateTime<Tz>)| ScheduleWindow {
        start: w.0.to_rfc3339(),
        end: w.1.to_rfc3339(),
    };

    ScheduleWindows {
        enabled: schedule.enabled,
        timezone: schedule.timezone.clone(),
        now: local.to_rfc3339(),
        current_window: current.as_ref().map(fmt),
        next_window: next.as_ref().map(fmt),
    }
}

/// Removes itineraries whose first segment is operated by a blocked
/// airline. Applied once to each result list before it leaves the
/// engine; case-insensitive on the airline code.
pub fn filter_blocked_airlines(decision: &PolicyDecision, results: &mut Vec<NormalizedItinerary>) {
    if !decision.filters_enabled || decision.blocked_airlines.is_empty() {
        return;
    }
    results.retain(|it| {
        let code = it
            .segments
            .first()
            .map(|s| s.airline.trim().to_ascii_uppercase())
            .unwrap_or_default();
        !decision.blocked_airlines.contains(&code)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Segment;
    use chrono::TimeZone;
    use test_case::test_case;

    fn overnight_schedule() -> TicketingSchedule {
        TicketingSchedule {
            enabled: true,
            timezone: "Asia/Baghdad".to_string(),
            rules: vec![ScheduleRule {
                days: (0..=6).collect(),
                start: "22:00".to_string(),
                end: "02:00".to_string(),
            }],
        }
    }

    /// Baghdad is UTC+3; build a Utc instant from a Baghdad wall time.
    fn baghdad(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        let tz: Tz = "Asia/Baghdad".parse().unwrap();
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().with_timezone(&Utc)
    }

    #[test_case(23, 30 => true; "late evening inside window")]
    #[test_case(1, 0 => true; "after midnight inside window")]
    #[test_case(12, 0 => false; "midday outside window")]
    fn overnight_window(hour: u32, minute: u32) -> bool {
        schedule_allows(&overnight_schedule(), baghdad(2026, 3, 4, hour, minute))
    }

    #[test]
    fn disabled_schedule_always_allows() {
        let mut schedule = overnight_schedule();
        schedule.enabled = false;
        assert!(schedule_allows(&schedule, baghdad(2026, 3, 4, 12, 0)));
    }

    #[test]
    fn enabled_schedule_without_matching_rule_denies() {
        let mut schedule = overnight_schedule();
        schedule.rules[0].days = [0].into_iter().collect(); // Monday only
        // 2026-03-04 is a Wednesday
        assert!(!schedule_allows(&schedule, baghdad(2026, 3, 4, 23, 30)));
        schedule.rules.clear();
        assert!(!schedule_allows(&schedule, baghdad(2026, 3, 4, 23, 30)));
    }

    #[test]
    fn effective_requires_all_three_conditions() {
        let now = baghdad(2026, 3, 4, 12, 0);
        let policy = ProviderPolicy::default();
        let decision = evaluate(&policy, "OTA", now);
        assert!(decision.availability);
        assert!(decision.ticketing_effective);

        let mut p = policy.clone();
        p.ticketing_mode = TicketingMode::AvailabilityOnly;
        assert!(!evaluate(&p, "OTA", now).ticketing_effective);

        let mut p = policy.clone();
        p.blocked_suppliers = vec!["ota".to_string()];
        let d = evaluate(&p, "OTA", now);
        assert!(!d.availability);
        assert!(!d.ticketing_effective);

        let mut p = policy.clone();
        p.ticketing_schedule = overnight_schedule();
        let d = evaluate(&p, "OTA", now);
        assert!(d.availability);
        assert!(!d.ticketing_effective);
    }

    #[test]
    fn windows_report_current_and_next() {
        let schedule = TicketingSchedule {
            enabled: true,
            timezone: "Asia/Baghdad".to_string(),
            rules: vec![ScheduleRule {
                days: (0..=6).collect(),
                start: "09:00".to_string(),
                end: "18:00".to_string(),
            }],
        };

        let inside = compute_windows(&schedule, baghdad(2026, 3, 4, 12, 0));
        let current = inside.current_window.unwrap();
        assert!(current.start.starts_with("2026-03-04T09:00:00"));
        assert!(current.end.starts_with("2026-03-04T18:00:00"));
        let next = inside.next_window.unwrap();
        assert!(next.start.starts_with("2026-03-05T09:00:00"));

        let outside = compute_windows(&schedule, baghdad(2026, 3, 4, 20, 0));
        assert!(outside.current_window.is_none());
        assert!(outside.next_window.unwrap().start.starts_with("2026-03-05T09:00:00"));
    }

    #[test]
    fn overnight_window_ends_next_day() {
        let windows = compute_windows(&overnight_schedule(), baghdad(2026, 3, 4, 23, 0));
        let current = windows.current_window.unwrap();
        assert!(current.start.starts_with("2026-03-04T22:00:00"));
        assert!(current.end.starts_with("2026-03-05T02:00:00"));
    }

    fn itinerary_with_airline(code: &str) -> NormalizedItinerary {
        NormalizedItinerary {
            segments: vec![Segment { airline: code.to_string(), ..Default::default() }],
            ..Default::default()
        }
    }

    #[test]
    fn blocked_airline_filter_is_case_insensitive() {
        let mut policy = ProviderPolicy::default();
        policy.blocked_airlines = vec!["ia".to_string()];
        let decision = evaluate(&policy, "OTA", Utc::now());

        let mut results = vec![itinerary_with_airline("IA"), itinerary_with_airline("TK")];
        filter_blocked_airlines(&decision, &mut results);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].segments[0].airline, "TK");
    }

    #[test]
    fn filter_noop_when_disabled() {
        let mut policy = ProviderPolicy::default();
        policy.blocked_airlines = vec!["IA".to_string()];
        policy.filters_enabled = false;
        let decision = evaluate(&policy, "OTA", Utc::now());

        let mut results = vec![itinerary_with_airline("IA")];
        filter_blocked_airlines(&decision, &mut results);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn policy_deserializes_from_store_json() {
        let raw = r#"{
            "availability_enabled": true,
            "ticketing_mode": "availability_only",
            "filters_enabled": true,
            "blocked_airlines": ["IA"],
            "ticketing_schedule": {
                "enabled": true,
                "timezone": "Asia/Baghdad",
                "rules": [{"days": [0,1,2,3,4], "start": "09:00", "end": "18:00"}]
            }
        }"#;
        let policy: ProviderPolicy = serde_json::from_str(raw).unwrap();
        assert_eq!(policy.ticketing_mode, TicketingMode::AvailabilityOnly);
        assert_eq!(policy.ticketing_schedule.rules[0].days.len(), 5);
    }
}
