//! PDF documents: boarding ticket, passenger list and annual report.
//!
//! Layout is plain text positioned with a descending y cursor over builtin
//! Helvetica fonts; list documents paginate when the cursor reaches the
//! bottom margin.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use std::io::BufWriter;

use crate::models::appointment::treatment_description;
use crate::models::{Appointment, Patient, User};
use crate::services::reports::AnnualReport;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const BOTTOM_MARGIN: f32 = 20.0;

pub struct TicketData<'a> {
    pub appointment: &'a Appointment,
    pub patient: &'a Patient,
    pub companion: Option<&'a Patient>,
    pub issued_by: &'a User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerKind {
    Patient,
    PriorityPatient,
    Companion,
}

impl PassengerKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Patient => "Paciente",
            Self::PriorityPatient => "Prioritário",
            Self::Companion => "Acompanhante",
        }
    }
}

pub struct ManifestEntry {
    pub seat_number: i32,
    pub full_name: String,
    pub cpf: String,
    pub kind: PassengerKind,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self> {
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("PDF font error: {e}"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("PDF font error: {e}"))?;
        Ok(Self { regular, bold })
    }
}

// Descending cursor over a (possibly growing) set of portrait pages
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageCursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference, top: f32) -> Self {
        Self { doc, layer, y: top }
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < BOTTOM_MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_H - 20.0;
        }
    }

    fn text(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, step: f32) {
        self.y -= step;
    }

    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef, step: f32) {
        self.ensure_space(step);
        self.text(text, size, x, font);
        self.advance(step);
    }
}

fn finish(doc: PdfDocumentReference) -> Result<Vec<u8>> {
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| anyhow!("PDF save error: {e}"))?;
    buf.into_inner()
        .map_err(|e| anyhow!("PDF buffer error: {e}"))
}

pub fn format_cpf(cpf: &str) -> String {
    let digits: String = cpf.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 11 {
        return cpf.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Boarding ticket: two identical copies side by side on an A4 landscape
/// page (one for the patient, one for the transport desk).
pub fn appointment_ticket(data: &TicketData<'_>) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Passagem {}", data.appointment.id),
        Mm(PAGE_H),
        Mm(PAGE_W),
        "Layer 1",
    );
    let fonts = Fonts::load(&doc)?;
    let layer = doc.get_page(page).get_layer(layer);

    draw_ticket_copy(&layer, &fonts, 12.0, data);
    draw_ticket_copy(&layer, &fonts, 160.0, data);

    finish(doc)
}

fn draw_ticket_copy(layer: &PdfLayerReference, fonts: &Fonts, x0: f32, data: &TicketData<'_>) {
    let appointment = data.appointment;
    let patient = data.patient;
    let mut y = 198.0;

    let mut heading = |text: &str, y: &mut f32| {
        layer.use_text(text, 10.0, Mm(x0), Mm(*y), &fonts.bold);
        *y -= 6.0;
    };
    let mut field = |label: &str, value: &str, y: &mut f32| {
        layer.use_text(label, 8.0, Mm(x0), Mm(*y), &fonts.bold);
        layer.use_text(value, 8.0, Mm(x0 + 38.0), Mm(*y), &fonts.regular);
        *y -= 4.5;
    };

    layer.use_text("HOSPITAL MUNICIPAL", 12.0, Mm(x0), Mm(y), &fonts.bold);
    y -= 5.0;
    layer.use_text(
        "Transporte de Pacientes - Comprovante de Viagem",
        8.0,
        Mm(x0),
        Mm(y),
        &fonts.regular,
    );
    y -= 8.0;

    heading("DADOS DO PACIENTE", &mut y);
    field("Nome Completo:", &patient.full_name, &mut y);
    field("CPF:", &format_cpf(&patient.cpf), &mut y);
    field("Cartão SUS:", &patient.sus_card_number, &mut y);
    field(
        "Data de Nascimento:",
        &patient.birth_date.format("%d/%m/%Y").to_string(),
        &mut y,
    );
    field("Telefone:", &patient.phone_number, &mut y);
    y -= 3.0;

    heading("DADOS DO AGENDAMENTO", &mut y);
    field("Prontuário:", &appointment.medical_record_number, &mut y);
    field("Hospital de Destino:", &appointment.destination_hospital, &mut y);
    field(
        "Tipo de Tratamento:",
        &treatment_description(
            appointment.treatment_type,
            appointment.treatment_type_other.as_deref(),
        ),
        &mut y,
    );
    field(
        "Data da Viagem:",
        &appointment.appointment_date.format("%d/%m/%Y").to_string(),
        &mut y,
    );
    field(
        "Horário:",
        &appointment.appointment_date.format("%H:%M").to_string(),
        &mut y,
    );
    y -= 4.0;

    // Seat callout
    layer.use_text("SUA POLTRONA", 10.0, Mm(x0 + 40.0), Mm(y), &fonts.bold);
    y -= 12.0;
    layer.use_text(
        format!("{:02}", appointment.seat_number),
        34.0,
        Mm(x0 + 46.0),
        Mm(y),
        &fonts.bold,
    );
    y -= 9.0;

    if let Some(companion) = data.companion {
        heading("DADOS DO ACOMPANHANTE", &mut y);
        field("Nome Completo:", &companion.full_name, &mut y);
        field("CPF:", &format_cpf(&companion.cpf), &mut y);
        field("Cartão SUS:", &companion.sus_card_number, &mut y);
        let companion_seat = appointment
            .companion_seat_number
            .map(|s| format!("{:02}", s))
            .unwrap_or_else(|| "N/A".to_string());
        field("Poltrona:", &companion_seat, &mut y);
        y -= 3.0;
    }

    heading("INSTRUÇÕES IMPORTANTES:", &mut y);
    for instruction in [
        "- Apresente este comprovante no dia da viagem;",
        "- Chegue com 30 minutos de antecedência;",
        "- Traga documento de identificação com foto;",
        "- Em caso de imprevistos, contate o hospital: (88) 9 8193-9906.",
    ] {
        layer.use_text(instruction, 7.5, Mm(x0), Mm(y), &fonts.regular);
        y -= 4.0;
    }
    y -= 4.0;

    field("Emitido por:", &data.issued_by.full_name, &mut y);
    field(
        "Data/Hora:",
        &appointment.created_at.format("%d/%m/%Y %H:%M").to_string(),
        &mut y,
    );
}

/// Passenger list for a travel day, one row per occupied seat, followed by
/// a summary block.
pub fn passenger_list(entries: &[ManifestEntry], date: NaiveDate) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Lista de Passageiros {}", date.format("%Y-%m-%d")),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let fonts = Fonts::load(&doc)?;
    let layer = doc.get_page(page).get_layer(layer);
    let mut cursor = PageCursor::new(&doc, layer, PAGE_H - 20.0);

    cursor.line("HOSPITAL MUNICIPAL", 16.0, 70.0, &fonts.bold, 8.0);
    cursor.line("Lista de Passageiros", 12.0, 80.0, &fonts.regular, 6.0);
    cursor.line(
        &format!("Data da Viagem: {}", date.format("%d/%m/%Y")),
        10.0,
        78.0,
        &fonts.regular,
        10.0,
    );

    // Table header
    cursor.ensure_space(7.0);
    cursor.text("Poltrona", 9.0, 15.0, &fonts.bold);
    cursor.text("Nome Completo", 9.0, 40.0, &fonts.bold);
    cursor.text("CPF", 9.0, 125.0, &fonts.bold);
    cursor.text("Tipo", 9.0, 165.0, &fonts.bold);
    cursor.advance(6.0);

    let mut sorted: Vec<&ManifestEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.seat_number);

    for entry in &sorted {
        cursor.ensure_space(5.5);
        cursor.text(&format!("{:02}", entry.seat_number), 9.0, 15.0, &fonts.regular);
        cursor.text(&entry.full_name, 9.0, 40.0, &fonts.regular);
        cursor.text(&format_cpf(&entry.cpf), 9.0, 125.0, &fonts.regular);
        cursor.text(entry.kind.label(), 9.0, 165.0, &fonts.regular);
        cursor.advance(5.5);
    }

    let patients = entries
        .iter()
        .filter(|e| e.kind != PassengerKind::Companion)
        .count();
    let companions = entries.len() - patients;
    let priority_seats_taken = entries
        .iter()
        .filter(|e| e.kind == PassengerKind::PriorityPatient && e.seat_number <= 3)
        .count();

    cursor.advance(6.0);
    cursor.line("RESUMO", 11.0, 15.0, &fonts.bold, 6.0);
    cursor.line(&format!("Pacientes: {}", patients), 9.0, 15.0, &fonts.regular, 5.0);
    cursor.line(
        &format!("Acompanhantes: {}", companions),
        9.0,
        15.0,
        &fonts.regular,
        5.0,
    );
    cursor.line(
        &format!("Total de Passageiros: {}", entries.len()),
        9.0,
        15.0,
        &fonts.bold,
        5.0,
    );
    cursor.line(
        &format!("Poltronas Prioritárias Ocupadas: {}", priority_seats_taken),
        9.0,
        15.0,
        &fonts.regular,
        5.0,
    );

    finish(doc)
}

/// Annual summary: general statistics and the month/treatment/destination
/// breakdowns.
pub fn annual_report(report: &AnnualReport) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Relatório Anual {}", report.year),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let fonts = Fonts::load(&doc)?;
    let layer = doc.get_page(page).get_layer(layer);
    let mut cursor = PageCursor::new(&doc, layer, PAGE_H - 20.0);

    cursor.line("HOSPITAL MUNICIPAL", 16.0, 70.0, &fonts.bold, 8.0);
    cursor.line(
        &format!("Relatório Anual - {}", report.year),
        13.0,
        75.0,
        &fonts.regular,
        6.0,
    );
    cursor.line(
        "Sistema de Transporte de Pacientes",
        10.0,
        78.0,
        &fonts.regular,
        12.0,
    );

    cursor.line("ESTATÍSTICAS GERAIS", 11.0, 15.0, &fonts.bold, 7.0);
    for (label, value) in [
        ("Total de Agendamentos:", report.total_appointments),
        ("Total de Passageiros:", report.total_passengers),
        ("Pacientes Prioritários:", report.total_priority_passengers),
        ("Viagens com Acompanhante:", report.total_companions),
        ("Destinos Únicos:", report.unique_destinations),
    ] {
        cursor.ensure_space(5.5);
        cursor.text(label, 9.0, 15.0, &fonts.bold);
        cursor.text(&value.to_string(), 9.0, 75.0, &fonts.regular);
        cursor.advance(5.5);
    }

    cursor.advance(6.0);
    cursor.line("VIAGENS POR MÊS", 11.0, 15.0, &fonts.bold, 7.0);
    for (month, count) in &report.by_month {
        cursor.ensure_space(5.5);
        cursor.text(&month.to_uppercase(), 9.0, 15.0, &fonts.bold);
        cursor.text(&count.to_string(), 9.0, 75.0, &fonts.regular);
        cursor.advance(5.5);
    }

    cursor.advance(6.0);
    cursor.line("POR TIPO DE TRATAMENTO", 11.0, 15.0, &fonts.bold, 7.0);
    for (treatment, count) in &report.by_treatment_type {
        cursor.ensure_space(5.5);
        cursor.text(treatment, 9.0, 15.0, &fonts.bold);
        cursor.text(&count.to_string(), 9.0, 75.0, &fonts.regular);
        cursor.advance(5.5);
    }

    cursor.advance(6.0);
    cursor.line("TOP 10 DESTINOS MAIS FREQUENTES", 11.0, 15.0, &fonts.bold, 7.0);
    for (rank, (destination, count)) in report.by_destination.iter().enumerate() {
        cursor.ensure_space(5.5);
        cursor.text(&format!("#{}", rank + 1), 9.0, 15.0, &fonts.bold);
        cursor.text(destination, 9.0, 28.0, &fonts.regular);
        cursor.text(&count.to_string(), 9.0, 165.0, &fonts.bold);
        cursor.advance(5.5);
    }

    finish(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::reports::build_annual_report;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn sample_patient(name: &str, cpf: &str) -> Patient {
        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Patient {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            rg: "1234567".to_string(),
            cpf: cpf.to_string(),
            age: 62,
            birth_date: NaiveDate::from_ymd_opt(1963, 5, 20).unwrap(),
            sus_card_number: "123456789012345".to_string(),
            phone_number: "(88) 99999-0000".to_string(),
            mother_name: "Maria da Silva".to_string(),
            created_at: now,
            updated_at: None,
            is_active: true,
        }
    }

    fn sample_appointment() -> Appointment {
        let date = NaiveDate::from_ymd_opt(2025, 10, 2)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            medical_record_number: "55821".to_string(),
            destination_hospital: "Hospital Regional do Cariri".to_string(),
            treatment_type: 1,
            treatment_type_other: None,
            is_priority: true,
            seat_number: 2,
            appointment_date: date,
            companion_id: None,
            companion_seat_number: None,
            created_by_user_id: Uuid::new_v4(),
            is_ticket_printed: false,
            printed_at: None,
            created_at: date,
            updated_at: None,
            is_active: true,
        }
    }

    fn sample_user() -> User {
        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        User {
            id: Uuid::new_v4(),
            full_name: "Ana Souza".to_string(),
            username: "ana.souza".to_string(),
            password_hash: User::hash_password("secret1"),
            role: "Employee".to_string(),
            created_at: now,
            updated_at: None,
            is_active: true,
        }
    }

    #[test]
    fn cpf_mask() {
        assert_eq!(format_cpf("12345678901"), "123.456.789-01");
        assert_eq!(format_cpf("123.456.789-01"), "123.456.789-01");
        // Anything that is not 11 digits passes through untouched
        assert_eq!(format_cpf("1234"), "1234");
    }

    #[test]
    fn ticket_produces_a_pdf() {
        let appointment = sample_appointment();
        let patient = sample_patient("José Pereira", "12345678901");
        let companion = sample_patient("Rita Pereira", "10987654321");
        let user = sample_user();

        let bytes = appointment_ticket(&TicketData {
            appointment: &appointment,
            patient: &patient,
            companion: Some(&companion),
            issued_by: &user,
        })
        .unwrap();

        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn passenger_list_paginates_past_one_page() {
        let entries: Vec<ManifestEntry> = (1..=46)
            .map(|seat| ManifestEntry {
                seat_number: seat,
                full_name: format!("Passageiro {}", seat),
                cpf: "12345678901".to_string(),
                kind: if seat <= 3 {
                    PassengerKind::PriorityPatient
                } else {
                    PassengerKind::Patient
                },
            })
            .collect();

        let date = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        let bytes = passenger_list(&entries, date).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn annual_report_produces_a_pdf() {
        let report = build_annual_report(2025, &[sample_appointment()]);
        let bytes = annual_report(&report).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
