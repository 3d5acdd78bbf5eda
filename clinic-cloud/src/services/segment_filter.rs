//! Segment filter evaluation
//!
//! Two renditions of the same predicate set: [`matches`] evaluates one
//! patient in-process, [`apply_to_query`] appends the equivalent SQL
//! conditions for the `patients p` table. Both go through [`normalize`]
//! first, so blank values mean "no constraint" on either path.
//!
//! Semantics:
//! - only active patients match
//! - age is whole years on `now`'s UTC date, bounds inclusive; a patient
//!   without a birth date fails any age bound
//! - gender compares case-insensitively
//! - tags match when at least one tag is shared
//! - a visit is a COMPLETED appointment starting at or before `now`;
//!   "last visit within N days" needs a visit at or after `now - N days`,
//!   "no visit in N days" needs none

use chrono::{Months, NaiveDate};
use shared::models::{AppointmentStatus, Patient, SegmentFilters};
use shared::util::{DAY_MS, millis_to_date};

use crate::db::query_builder::{QueryBuilder, QueryValue};

/// Drop values that carry no constraint: blank strings, empty tag lists
/// and zero-day visit windows.
pub fn normalize(filters: &SegmentFilters) -> SegmentFilters {
    let non_blank = |s: &Option<String>| {
        s.as_ref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    SegmentFilters {
        min_age: filters.min_age,
        max_age: filters.max_age,
        gender: non_blank(&filters.gender),
        tags: filters.tags.clone().filter(|t| !t.is_empty()),
        last_visit_within_days: filters.last_visit_within_days.filter(|d| *d > 0),
        no_visit_in_days: filters.no_visit_in_days.filter(|d| *d > 0),
        source: non_blank(&filters.source),
        accepts_whatsapp: filters.accepts_whatsapp,
        accepts_email: filters.accepts_email,
    }
}

/// Latest birth date that is at least `years` old on `today`
pub fn birth_date_cutoff(today: NaiveDate, years: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(years.checked_mul(12)?))
}

fn window_start(now: i64, days: u32) -> i64 {
    now.saturating_sub(i64::from(days).saturating_mul(DAY_MS))
}

/// Evaluate the filters against one patient.
///
/// `visit_starts` holds the start times of the patient's COMPLETED
/// appointments; future ones are ignored here.
pub fn matches(filters: &SegmentFilters, patient: &Patient, visit_starts: &[i64], now: i64) -> bool {
    let f = normalize(filters);

    if !patient.is_active {
        return false;
    }

    if f.min_age.is_some() || f.max_age.is_some() {
        let (Some(birth), Some(today)) = (patient.birth_date, millis_to_date(now)) else {
            return false;
        };
        if let Some(min) = f.min_age {
            match birth_date_cutoff(today, min) {
                Some(cutoff) if birth <= cutoff => {}
                _ => return false,
            }
        }
        if let Some(max) = f.max_age {
            if let Some(cutoff) = max.checked_add(1).and_then(|y| birth_date_cutoff(today, y)) {
                if birth <= cutoff {
                    return false;
                }
            }
        }
    }

    if let Some(gender) = &f.gender {
        let same = patient
            .gender
            .as_deref()
            .is_some_and(|g| g.to_lowercase() == gender.to_lowercase());
        if !same {
            return false;
        }
    }

    if let Some(tags) = &f.tags {
        if !patient.tags.iter().any(|t| tags.contains(t)) {
            return false;
        }
    }

    let visited_since = |days: u32| {
        let from = window_start(now, days);
        visit_starts.iter().any(|&t| t >= from && t <= now)
    };
    if let Some(days) = f.last_visit_within_days {
        if !visited_since(days) {
            return false;
        }
    }
    if let Some(days) = f.no_visit_in_days {
        if visited_since(days) {
            return false;
        }
    }

    if let Some(source) = &f.source {
        if patient.source.as_deref() != Some(source.as_str()) {
            return false;
        }
    }
    if let Some(flag) = f.accepts_whatsapp {
        if patient.accepts_whatsapp != flag {
            return false;
        }
    }
    if let Some(flag) = f.accepts_email {
        if patient.accepts_email != flag {
            return false;
        }
    }

    true
}

/// Append the SQL form of the filters; the caller has already scoped the
/// query to `p.tenant_id`.
pub fn apply_to_query(qb: &mut QueryBuilder, filters: &SegmentFilters, now: i64) {
    let f = normalize(filters);

    qb.add_condition("p.is_active = TRUE");

    if f.min_age.is_some() || f.max_age.is_some() {
        qb.add_condition("p.birth_date IS NOT NULL");
        let today = millis_to_date(now);
        if let Some(min) = f.min_age {
            match today.and_then(|d| birth_date_cutoff(d, min)) {
                Some(cutoff) => {
                    qb.add_bound("p.birth_date <= {}", QueryValue::Date(cutoff));
                }
                None => {
                    qb.add_condition("FALSE");
                }
            }
        }
        if let Some(max) = f.max_age {
            let cutoff = max
                .checked_add(1)
                .and_then(|y| today.and_then(|d| birth_date_cutoff(d, y)));
            if let Some(cutoff) = cutoff {
                qb.add_bound("p.birth_date > {}", QueryValue::Date(cutoff));
            }
        }
    }

    if let Some(gender) = f.gender {
        qb.add_bound("LOWER(p.gender) = LOWER({})", QueryValue::Text(gender));
    }

    if let Some(tags) = f.tags {
        qb.add_bound("p.tags && {}", QueryValue::TextArray(tags));
    }

    let visit_exists = format!(
        "EXISTS (SELECT 1 FROM appointments a WHERE a.tenant_id = p.tenant_id \
         AND a.patient_id = p.id AND a.status = '{}' AND a.start_at <= {{0}} AND a.start_at >= {{1}})",
        AppointmentStatus::Completed.as_db()
    );
    if let Some(days) = f.last_visit_within_days {
        qb.add_bound_pair(
            &visit_exists,
            QueryValue::Integer(now),
            QueryValue::Integer(window_start(now, days)),
        );
    }
    if let Some(days) = f.no_visit_in_days {
        qb.add_bound_pair(
            &format!("NOT {visit_exists}"),
            QueryValue::Integer(now),
            QueryValue::Integer(window_start(now, days)),
        );
    }

    if let Some(source) = f.source {
        qb.add_bound("p.source = {}", QueryValue::Text(source));
    }
    if let Some(flag) = f.accepts_whatsapp {
        qb.add_bound("p.accepts_whatsapp = {}", QueryValue::Bool(flag));
    }
    if let Some(flag) = f.accepts_email {
        qb.add_bound("p.accepts_email = {}", QueryValue::Bool(flag));
    }
}
