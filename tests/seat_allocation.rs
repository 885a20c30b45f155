//! Seat allocation behavior exercised through the public services API,
//! simulating the occupancy sets the database would produce.

use std::collections::HashSet;

use hospital_transport::services::seats::{
    compute_availability, validate_seat_request, SeatRejection, PRIORITY_SEAT_LIMIT, TOTAL_SEATS,
};

fn occupied(seats: &[i32]) -> HashSet<i32> {
    seats.iter().copied().collect()
}

#[test]
fn empty_day_reports_every_seat() {
    let availability = compute_availability(&HashSet::new(), false);

    assert_eq!(availability.len(), TOTAL_SEATS as usize);
    for entry in &availability {
        assert_eq!(entry.is_priority_only, entry.seat_number <= PRIORITY_SEAT_LIMIT);
        assert_eq!(entry.is_available, entry.seat_number > PRIORITY_SEAT_LIMIT);
    }
}

#[test]
fn unavailable_seats_match_occupancy_for_priority_viewer() {
    let set = occupied(&[1, 5, 23, 46]);
    let availability = compute_availability(&set, true);

    let unavailable: HashSet<i32> = availability
        .iter()
        .filter(|e| !e.is_available)
        .map(|e| e.seat_number)
        .collect();

    assert_eq!(unavailable, set);
}

#[test]
fn repeated_queries_agree_when_nothing_changes() {
    let set = occupied(&[2, 9, 30]);
    let first = compute_availability(&set, false);
    let second = compute_availability(&set, false);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.seat_number, b.seat_number);
        assert_eq!(a.is_available, b.is_available);
    }
}

#[test]
fn priority_seat_rules_on_booking() {
    let set = HashSet::new();

    assert_eq!(
        validate_seat_request(&set, 2, false, None),
        Err(SeatRejection::PriorityRequired)
    );
    assert_eq!(validate_seat_request(&set, 2, true, None), Ok(()));
}

#[test]
fn companion_seats_count_as_occupied() {
    // A booking holding seat 10 with companion on 11 blocks both
    let set = occupied(&[10, 11]);

    assert_eq!(
        validate_seat_request(&set, 11, false, None),
        Err(SeatRejection::SeatTaken)
    );
    assert_eq!(
        validate_seat_request(&set, 12, false, Some(10)),
        Err(SeatRejection::CompanionSeatTaken)
    );
}

#[test]
fn both_sides_of_a_race_can_pass_validation() {
    // Two requests for the same seat validated against the same snapshot:
    // the checker accepts both; only the database unique index on
    // (day, seat) decides the winner at insert time.
    let snapshot = HashSet::new();

    assert_eq!(validate_seat_request(&snapshot, 20, false, None), Ok(()));
    assert_eq!(validate_seat_request(&snapshot, 20, false, None), Ok(()));

    // After the winner commits, a re-read snapshot rejects the loser's retry
    let after_insert = occupied(&[20]);
    assert_eq!(
        validate_seat_request(&after_insert, 20, false, None),
        Err(SeatRejection::SeatTaken)
    );
}

#[test]
fn cancellation_frees_the_seat() {
    let mut set = occupied(&[15]);
    assert_eq!(
        validate_seat_request(&set, 15, false, None),
        Err(SeatRejection::SeatTaken)
    );

    // Soft-deleting the booking removes its seats from the occupied set
    set.remove(&15);
    assert_eq!(validate_seat_request(&set, 15, false, None), Ok(()));
    assert!(compute_availability(&set, false)[14].is_available);
}
