//! Seat allocation for the transport bus.
//!
//! The bus has 46 numbered seats; seats 1-3 may only be taken by priority
//! patients. Seat state is never stored: it is derived per query from the
//! active bookings of a travel day (primary seat plus companion seat), so
//! every check runs against the latest committed data. There is no lock
//! between a validation and the subsequent insert; the partial unique index
//! on (travel day, seat) settles concurrent winners at persistence time.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use thiserror::Error;

pub const TOTAL_SEATS: i32 = 46;
pub const PRIORITY_SEAT_LIMIT: i32 = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAvailability {
    pub seat_number: i32,
    pub is_available: bool,
    pub is_priority_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeatRejection {
    #[error("Número da poltrona inválido")]
    InvalidSeatNumber,
    #[error("Poltrona já está ocupada")]
    SeatTaken,
    #[error("Poltronas 1, 2 e 3 são exclusivas para pacientes prioritários")]
    PriorityRequired,
    #[error("Poltrona do acompanhante já está ocupada")]
    CompanionSeatTaken,
    #[error("Poltrona acabou de ser ocupada por outro agendamento")]
    PersistenceConflict,
}

fn is_priority_only(seat: i32) -> bool {
    seat <= PRIORITY_SEAT_LIMIT
}

fn in_range(seat: i32) -> bool {
    (1..=TOTAL_SEATS).contains(&seat)
}

/// Seats already assigned (primary or companion) on the given travel day.
/// Time-of-day is ignored: two bookings on the same day conflict even at
/// different hours.
pub async fn occupied_seats(pool: &PgPool, date: NaiveDate) -> Result<HashSet<i32>, sqlx::Error> {
    let start = date.and_time(NaiveTime::MIN);
    let end = start + chrono::Duration::days(1);

    let rows: Vec<(i32, Option<i32>)> = sqlx::query_as(
        r#"
        SELECT seat_number, companion_seat_number
        FROM appointments
        WHERE is_active = TRUE
          AND appointment_date >= $1
          AND appointment_date < $2
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut occupied = HashSet::new();
    for (seat, companion_seat) in rows {
        occupied.insert(seat);
        if let Some(seat) = companion_seat {
            occupied.insert(seat);
        }
    }

    Ok(occupied)
}

/// Per-seat availability as seen by a viewer with the given priority flag.
/// Always 46 entries, seat-ascending. A non-priority viewer sees the
/// priority seats as unavailable even when they are physically empty.
pub fn compute_availability(occupied: &HashSet<i32>, is_priority: bool) -> Vec<SeatAvailability> {
    (1..=TOTAL_SEATS)
        .map(|seat| {
            let priority_only = is_priority_only(seat);
            SeatAvailability {
                seat_number: seat,
                is_available: !occupied.contains(&seat) && (is_priority || !priority_only),
                is_priority_only: priority_only,
            }
        })
        .collect()
}

/// Validates a booking request against the occupancy of its travel day.
/// Checks short-circuit in order: seat range, primary seat free, priority
/// rule, companion seat free. The companion seat is checked against the
/// same occupied set only; rejecting `companion_seat == seat` is the
/// request-validation layer's job.
pub fn validate_seat_request(
    occupied: &HashSet<i32>,
    seat: i32,
    is_priority: bool,
    companion_seat: Option<i32>,
) -> Result<(), SeatRejection> {
    if !in_range(seat) {
        return Err(SeatRejection::InvalidSeatNumber);
    }
    if let Some(companion) = companion_seat {
        if !in_range(companion) {
            return Err(SeatRejection::InvalidSeatNumber);
        }
    }

    if occupied.contains(&seat) {
        return Err(SeatRejection::SeatTaken);
    }

    if is_priority_only(seat) && !is_priority {
        return Err(SeatRejection::PriorityRequired);
    }

    if let Some(companion) = companion_seat {
        if occupied.contains(&companion) {
            return Err(SeatRejection::CompanionSeatTaken);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn occupied(seats: &[i32]) -> HashSet<i32> {
        seats.iter().copied().collect()
    }

    #[test]
    fn empty_day_has_46_entries_with_priority_flags() {
        let availability = compute_availability(&HashSet::new(), false);

        assert_eq!(availability.len(), 46);
        for entry in &availability {
            assert_eq!(entry.is_priority_only, entry.seat_number <= 3);
            if entry.seat_number <= 3 {
                // Intentional: a non-priority viewer never sees seats 1-3
                assert!(!entry.is_available);
            } else {
                assert!(entry.is_available);
            }
        }
    }

    #[test]
    fn empty_day_is_fully_available_to_priority_viewer() {
        let availability = compute_availability(&HashSet::new(), true);
        assert!(availability.iter().all(|e| e.is_available));
    }

    #[test]
    fn entries_are_seat_ascending() {
        let availability = compute_availability(&occupied(&[7, 12]), true);
        let seats: Vec<i32> = availability.iter().map(|e| e.seat_number).collect();
        assert_eq!(seats, (1..=46).collect::<Vec<i32>>());
    }

    #[test]
    fn idempotent_without_intervening_writes() {
        let set = occupied(&[1, 17, 46]);
        let first = compute_availability(&set, false);
        let second = compute_availability(&set, false);

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.seat_number, b.seat_number);
            assert_eq!(a.is_available, b.is_available);
            assert_eq!(a.is_priority_only, b.is_priority_only);
        }
    }

    #[test]
    fn freed_seat_becomes_available_again() {
        let mut set = occupied(&[10]);
        assert!(!compute_availability(&set, false)[9].is_available);

        // Cancellation removes the booking from the occupied set
        set.remove(&10);
        assert!(compute_availability(&set, false)[9].is_available);
    }

    #[test]
    fn priority_seat_requires_priority_flag() {
        let set = HashSet::new();
        assert_eq!(
            validate_seat_request(&set, 2, false, None),
            Err(SeatRejection::PriorityRequired)
        );
        assert_eq!(validate_seat_request(&set, 2, true, None), Ok(()));
    }

    #[test]
    fn taken_seat_rejected_before_priority_rule() {
        let set = occupied(&[2]);
        assert_eq!(
            validate_seat_request(&set, 2, false, None),
            Err(SeatRejection::SeatTaken)
        );
    }

    #[test]
    fn out_of_range_seats_rejected() {
        let set = HashSet::new();
        assert_eq!(
            validate_seat_request(&set, 0, true, None),
            Err(SeatRejection::InvalidSeatNumber)
        );
        assert_eq!(
            validate_seat_request(&set, 47, true, None),
            Err(SeatRejection::InvalidSeatNumber)
        );
        assert_eq!(
            validate_seat_request(&set, 10, true, Some(47)),
            Err(SeatRejection::InvalidSeatNumber)
        );
    }

    #[test]
    fn companion_seat_checked_against_same_occupied_set() {
        let set = occupied(&[20]);
        assert_eq!(
            validate_seat_request(&set, 10, false, Some(20)),
            Err(SeatRejection::CompanionSeatTaken)
        );
        assert_eq!(validate_seat_request(&set, 10, false, Some(21)), Ok(()));

        // The checker itself does not compare companion with the primary
        // seat; that rule lives in the request validation layer.
        assert_eq!(validate_seat_request(&set, 10, false, Some(10)), Ok(()));
    }

    proptest! {
        // Under the strictest viewer (priority), the unavailable set is
        // exactly the occupied set.
        #[test]
        fn unavailable_equals_occupied_for_priority_viewer(
            seats in proptest::collection::hash_set(1..=46i32, 0..46)
        ) {
            let availability = compute_availability(&seats, true);
            let unavailable: HashSet<i32> = availability
                .iter()
                .filter(|e| !e.is_available)
                .map(|e| e.seat_number)
                .collect();
            prop_assert_eq!(unavailable, seats);
        }

        // A non-priority viewer sees the occupied set plus seats 1-3.
        #[test]
        fn non_priority_viewer_also_loses_priority_seats(
            seats in proptest::collection::hash_set(1..=46i32, 0..46)
        ) {
            let availability = compute_availability(&seats, false);
            let mut expected = seats.clone();
            expected.extend(1..=3);

            let unavailable: HashSet<i32> = availability
                .iter()
                .filter(|e| !e.is_available)
                .map(|e| e.seat_number)
                .collect();
            prop_assert_eq!(unavailable, expected);
        }

        // Validation accepts exactly the requests whose seats are free and
        // allowed for the requester.
        #[test]
        fn validation_matches_availability(
            seats in proptest::collection::hash_set(1..=46i32, 0..46),
            seat in 1..=46i32,
            is_priority in any::<bool>(),
        ) {
            let availability = compute_availability(&seats, is_priority);
            let entry = &availability[(seat - 1) as usize];
            let verdict = validate_seat_request(&seats, seat, is_priority, None);
            prop_assert_eq!(entry.is_available, verdict.is_ok());
        }
    }
}
