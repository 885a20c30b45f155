//! Annual report aggregation over a year's bookings.

use chrono::Datelike;
use std::collections::HashMap;

use crate::models::appointment::{treatment_description, Appointment};

const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

#[derive(Debug, Clone)]
pub struct AnnualReport {
    pub year: i32,
    pub total_appointments: usize,
    pub total_passengers: usize,
    pub total_priority_passengers: usize,
    pub total_companions: usize,
    pub unique_destinations: usize,
    /// (month name, count), calendar order, months without trips omitted
    pub by_month: Vec<(String, usize)>,
    /// (treatment label, count), most frequent first
    pub by_treatment_type: Vec<(String, usize)>,
    /// (destination, count), top 10 most frequent first
    pub by_destination: Vec<(String, usize)>,
}

pub fn build_annual_report(year: i32, appointments: &[Appointment]) -> AnnualReport {
    let total_companions = appointments.iter().filter(|a| a.companion_id.is_some()).count();

    let mut month_counts = [0usize; 12];
    let mut treatment_counts: HashMap<String, usize> = HashMap::new();
    let mut destination_counts: HashMap<String, usize> = HashMap::new();

    for appointment in appointments {
        let month = appointment.appointment_date.month0() as usize;
        month_counts[month] += 1;

        let treatment = treatment_description(appointment.treatment_type, None);
        *treatment_counts.entry(treatment).or_insert(0) += 1;

        *destination_counts
            .entry(appointment.destination_hospital.clone())
            .or_insert(0) += 1;
    }

    let by_month = month_counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(i, &count)| (MONTH_NAMES[i].to_string(), count))
        .collect();

    let mut by_treatment_type: Vec<(String, usize)> = treatment_counts.into_iter().collect();
    by_treatment_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let unique_destinations = destination_counts.len();
    let mut by_destination: Vec<(String, usize)> = destination_counts.into_iter().collect();
    by_destination.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    by_destination.truncate(10);

    AnnualReport {
        year,
        total_appointments: appointments.len(),
        total_passengers: appointments.len() + total_companions,
        total_priority_passengers: appointments.iter().filter(|a| a.is_priority).count(),
        total_companions,
        unique_destinations,
        by_month,
        by_treatment_type,
        by_destination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn appointment(month: u32, treatment: i32, destination: &str, priority: bool, companion: bool) -> Appointment {
        let date = NaiveDate::from_ymd_opt(2025, month, 15)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            medical_record_number: "12345".to_string(),
            destination_hospital: destination.to_string(),
            treatment_type: treatment,
            treatment_type_other: None,
            is_priority: priority,
            seat_number: 10,
            appointment_date: date,
            companion_id: companion.then(Uuid::new_v4),
            companion_seat_number: companion.then_some(11),
            created_by_user_id: Uuid::new_v4(),
            is_ticket_printed: false,
            printed_at: None,
            created_at: date,
            updated_at: None,
            is_active: true,
        }
    }

    #[test]
    fn empty_year_produces_zeroed_report() {
        let report = build_annual_report(2025, &[]);
        assert_eq!(report.total_appointments, 0);
        assert_eq!(report.total_passengers, 0);
        assert!(report.by_month.is_empty());
        assert!(report.by_treatment_type.is_empty());
        assert!(report.by_destination.is_empty());
    }

    #[test]
    fn totals_count_companions_as_passengers() {
        let appointments = vec![
            appointment(1, 1, "Hospital A", true, true),
            appointment(1, 2, "Hospital A", false, false),
            appointment(3, 1, "Hospital B", false, true),
        ];
        let report = build_annual_report(2025, &appointments);

        assert_eq!(report.total_appointments, 3);
        assert_eq!(report.total_passengers, 5);
        assert_eq!(report.total_priority_passengers, 1);
        assert_eq!(report.total_companions, 2);
        assert_eq!(report.unique_destinations, 2);
    }

    #[test]
    fn months_come_out_in_calendar_order() {
        let appointments = vec![
            appointment(11, 1, "Hospital A", false, false),
            appointment(2, 1, "Hospital A", false, false),
            appointment(2, 1, "Hospital A", false, false),
        ];
        let report = build_annual_report(2025, &appointments);

        assert_eq!(
            report.by_month,
            vec![("Fevereiro".to_string(), 2), ("Novembro".to_string(), 1)]
        );
    }

    #[test]
    fn breakdowns_rank_by_frequency() {
        let appointments = vec![
            appointment(1, 2, "Hospital B", false, false),
            appointment(2, 2, "Hospital B", false, false),
            appointment(3, 1, "Hospital A", false, false),
        ];
        let report = build_annual_report(2025, &appointments);

        assert_eq!(report.by_treatment_type[0], ("Mensal".to_string(), 2));
        assert_eq!(report.by_treatment_type[1], ("Semanal".to_string(), 1));
        assert_eq!(report.by_destination[0], ("Hospital B".to_string(), 2));
    }

    #[test]
    fn destination_list_keeps_only_top_ten() {
        let mut appointments = Vec::new();
        for i in 0..12 {
            appointments.push(appointment(1, 1, &format!("Hospital {}", i), false, false));
        }
        let report = build_annual_report(2025, &appointments);

        assert_eq!(report.unique_destinations, 12);
        assert_eq!(report.by_destination.len(), 10);
    }
}
