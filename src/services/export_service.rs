use crate::dto::application_dto::ApplicantRow;
use crate::error::Result;
use crate::models::opening::FieldDescriptor;
use rust_xlsxwriter::*;

pub struct ExportService;

impl ExportService {
    /// Builds the applicants workbook for one listing: fixed applicant
    /// columns first, then one column per form field so every answer lands
    /// under its own header.
    pub fn applicants_xlsx(
        opening_title: &str,
        fields: &[FieldDescriptor],
        applicants: &[ApplicantRow],
    ) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Applicants")?;

        let header_bg = Color::RGB(0x0F172A);
        let border_color = Color::RGB(0xE2E8F0);
        let alt_row = Color::RGB(0xF8FAFC);
        let hired_color = Color::RGB(0x10B981);

        let mut columns: Vec<(String, f64)> = vec![
            ("#".to_string(), 6.0),
            ("Name".to_string(), 28.0),
            ("Email".to_string(), 30.0),
            ("Applied".to_string(), 18.0),
            ("Seen".to_string(), 18.0),
            ("Hired".to_string(), 10.0),
        ];
        for field in fields {
            columns.push((field.label.clone(), 32.0));
        }

        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let title_format = Format::new()
            .set_font_size(14)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 32)?;
        worksheet.merge_range(
            0,
            0,
            0,
            (columns.len() - 1) as u16,
            &format!("Applicants for {}", opening_title),
            &title_format,
        )?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let header_row = 1;
        worksheet.set_row_height(header_row, 24)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, name, &header_format)?;
        }

        let data_start = 2u32;
        for (idx, applicant) in applicants.iter().enumerate() {
            let row = data_start + idx as u32;
            let bg = if idx % 2 == 0 { alt_row } else { Color::White };

            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);
            let wrap_fmt = base_fmt.clone().set_text_wrap();

            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(
                row,
                1,
                &applicant.applicant.name,
                &base_fmt.clone().set_bold(),
            )?;
            worksheet.write_string_with_format(row, 2, &applicant.applicant.email, &base_fmt)?;

            let applied = applicant.created_at.format("%d.%m.%Y %H:%M").to_string();
            worksheet.write_string_with_format(row, 3, &applied, &center_fmt)?;

            let seen = applicant
                .seen_at
                .map(|at| at.format("%d.%m.%Y %H:%M").to_string())
                .unwrap_or_else(|| "Unseen".to_string());
            worksheet.write_string_with_format(row, 4, &seen, &center_fmt)?;

            if applicant.is_hired {
                let hired_fmt = Format::new()
                    .set_font_size(10)
                    .set_bold()
                    .set_font_color(Color::White)
                    .set_background_color(hired_color)
                    .set_align(FormatAlign::Center)
                    .set_align(FormatAlign::VerticalCenter)
                    .set_border(FormatBorder::Thin)
                    .set_border_color(border_color);
                worksheet.write_string_with_format(row, 5, "Yes", &hired_fmt)?;
            } else {
                worksheet.write_string_with_format(row, 5, "No", &center_fmt)?;
            }

            for (offset, field) in fields.iter().enumerate() {
                let value = applicant
                    .answers
                    .iter()
                    .find(|answer| answer.label == field.label)
                    .map(|answer| answer.value.as_str())
                    .unwrap_or("");
                worksheet.write_string_with_format(row, (6 + offset) as u16, value, &wrap_fmt)?;
            }
        }

        // Header stays visible while scrolling the data.
        worksheet.set_freeze_panes(2, 0)?;
        if !applicants.is_empty() {
            worksheet.autofilter(
                1,
                0,
                data_start + applicants.len() as u32 - 1,
                (columns.len() - 1) as u16,
            )?;
        }

        Ok(workbook.save_to_buffer()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::application_dto::ApplicantProfile;
    use crate::models::application::Answer;
    use chrono::Utc;
    use uuid::Uuid;

    fn applicant(name: &str, hired: bool) -> ApplicantRow {
        ApplicantRow {
            id: Uuid::new_v4(),
            opening_id: Uuid::new_v4(),
            opening_title: "Backend Engineer".to_string(),
            opening_slug: "backend-engineer".to_string(),
            applicant: ApplicantProfile {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                avatar: None,
                created_at: Utc::now(),
            },
            answers: vec![Answer {
                label: "Cover Letter".to_string(),
                value: "I would like to apply.".to_string(),
                field_type: "textarea".to_string(),
            }],
            is_hired: hired,
            seen_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn workbook_builds_for_a_populated_listing() {
        let fields = vec![FieldDescriptor {
            label: "Cover Letter".to_string(),
            field_type: "textarea".to_string(),
        }];
        let rows = vec![applicant("Ada", true), applicant("Grace", false)];

        let bytes = ExportService::applicants_xlsx("Backend Engineer", &fields, &rows)
            .expect("workbook must build");
        // XLSX files are zip archives; PK is the zip magic.
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn workbook_builds_with_no_applicants() {
        let bytes = ExportService::applicants_xlsx("Backend Engineer", &[], &[])
            .expect("workbook must build");
        assert!(!bytes.is_empty());
    }
}
