// src/report/excel.rs
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};

use super::style;
use super::{cell_text, optional_text, rating_text, ReportData, NO_DATA};
use crate::dashboard::DashboardStats;
use crate::filter::StudentProgress;
use crate::models::{Category, Rating, TeachingPlan};
use crate::AppError;

const STUDENT_HEADERS: [&str; 12] = [
    "Name",
    "Class",
    "Age",
    "Learning Ability",
    "Writing Speed",
    "Social Skills",
    "Pre-Literacy",
    "Pre-Numeracy",
    "Motor Skills",
    "Emotional Development",
    "Parent Contact",
    "Notes",
];

const HISTORY_HEADERS: [&str; 9] = [
    "Student",
    "Class",
    "Date",
    "Social Skills",
    "Pre-Literacy",
    "Pre-Numeracy",
    "Motor Skills",
    "Emotional Development",
    "Comments",
];

const PLAN_HEADERS: [&str; 9] = [
    "Title",
    "Type",
    "Class",
    "Start Date",
    "End Date",
    "Description",
    "Activities",
    "Goals",
    "Created By",
];

struct Formats {
    header: Format,
    ratings: Vec<(Rating, Format)>,
}

impl Formats {
    fn new() -> Self {
        Formats {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(style::HEADER_FILL))
                .set_border_bottom(FormatBorder::Thin),
            ratings: Rating::ALL
                .iter()
                .map(|r| (*r, Format::new().set_font_color(Color::RGB(style::rating_color(*r)))))
                .collect(),
        }
    }

    fn rating(&self, rating: Rating) -> Option<&Format> {
        self.ratings.iter().find(|(r, _)| *r == rating).map(|(_, f)| f)
    }
}

/// 学生报表: Students / Summary / Progress History；计划报表: Plans
pub fn render(data: &ReportData, stats: Option<&DashboardStats>) -> Result<Vec<u8>, AppError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    match data {
        ReportData::Students(rows) => {
            workbook.push_worksheet(students_sheet(rows, &formats)?);
            if let Some(stats) = stats {
                workbook.push_worksheet(summary_sheet(stats, &formats)?);
            }
            workbook.push_worksheet(history_sheet(rows, &formats)?);
        }
        ReportData::Plans(plans) => {
            workbook.push_worksheet(plans_sheet(plans, &formats)?);
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn new_sheet(name: &str, headers: &[&str], formats: &Formats) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(name)?;
    for (col, label) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *label, &formats.header)?;
        sheet.set_column_width(col as u16, (label.len() as f64 + 4.0).max(12.0))?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(sheet)
}

fn write_rating(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    rating: Option<Rating>,
    formats: &Formats,
) -> Result<(), XlsxError> {
    match rating.and_then(|r| formats.rating(r)) {
        Some(format) => sheet.write_string_with_format(row, col, rating_text(rating), format)?,
        None => sheet.write_string(row, col, rating_text(rating))?,
    };
    Ok(())
}

fn students_sheet(rows: &[StudentProgress], formats: &Formats) -> Result<Worksheet, XlsxError> {
    let mut sheet = new_sheet("Students", &STUDENT_HEADERS, formats)?;
    if rows.is_empty() {
        sheet.write_string(1, 0, NO_DATA)?;
    }

    for (index, progress) in rows.iter().enumerate() {
        let row = index as u32 + 1;
        let student = &progress.student;
        sheet.write_string(row, 0, cell_text(&student.name))?;
        sheet.write_string(row, 1, student.class.as_str())?;
        sheet.write_number(row, 2, student.age)?;
        sheet.write_string(row, 3, student.learning_ability.as_str())?;
        sheet.write_string(row, 4, student.reported_writing_speed().as_str())?;
        for (offset, category) in Category::ALL.iter().enumerate() {
            write_rating(
                &mut sheet,
                row,
                5 + offset as u16,
                progress.latest_rating(*category),
                formats,
            )?;
        }
        sheet.write_string(row, 10, cell_text(optional_text(student.parent_contact.as_deref())))?;
        sheet.write_string(row, 11, cell_text(optional_text(student.notes.as_deref())))?;
    }
    Ok(sheet)
}

fn history_sheet(rows: &[StudentProgress], formats: &Formats) -> Result<Worksheet, XlsxError> {
    let mut sheet = new_sheet("Progress History", &HISTORY_HEADERS, formats)?;
    let mut row = 1u32;

    for progress in rows {
        for entry in &progress.entries {
            sheet.write_string(row, 0, cell_text(&progress.student.name))?;
            sheet.write_string(row, 1, progress.student.class.as_str())?;
            sheet.write_string(row, 2, entry.date.format("%Y-%m-%d").to_string())?;
            for (offset, category) in Category::ALL.iter().enumerate() {
                write_rating(
                    &mut sheet,
                    row,
                    3 + offset as u16,
                    Some(entry.rating(*category)),
                    formats,
                )?;
            }
            sheet.write_string(row, 8, cell_text(optional_text(entry.comments.as_deref())))?;
            row += 1;
        }
    }

    if row == 1 {
        sheet.write_string(1, 0, NO_DATA)?;
    }
    Ok(sheet)
}

fn summary_sheet(stats: &DashboardStats, formats: &Formats) -> Result<Worksheet, XlsxError> {
    let mut sheet = new_sheet("Summary", &["Metric", "Count"], formats)?;
    sheet.set_column_width(0, 28.0)?;

    let mut metrics: Vec<(String, usize)> = vec![("Total Students".into(), stats.total_students)];
    metrics.extend(
        stats
            .students_by_class
            .iter()
            .map(|c| (format!("Class: {}", c.label), c.count)),
    );
    metrics.extend(
        stats
            .students_by_ability
            .iter()
            .map(|c| (format!("Learning Ability: {}", c.label), c.count)),
    );
    metrics.push(("Progress Entries".into(), stats.total_progress_entries));

    let mut row = 1u32;
    for (label, count) in metrics {
        sheet.write_string(row, 0, label)?;
        sheet.write_number(row, 1, count as f64)?;
        row += 1;
    }

    // 各维度评级分布
    row += 1;
    for (col, label) in ["Category", "Excellent", "Good", "Needs Improvement"]
        .iter()
        .enumerate()
    {
        sheet.write_string_with_format(row, col as u16, *label, &formats.header)?;
    }
    for ratings in &stats.ratings {
        row += 1;
        sheet.write_string(row, 0, ratings.category)?;
        for (offset, rating) in Rating::ALL.iter().enumerate() {
            sheet.write_number(row, 1 + offset as u16, ratings.count(*rating) as f64)?;
        }
    }
    Ok(sheet)
}

fn plans_sheet(plans: &[TeachingPlan], formats: &Formats) -> Result<Worksheet, XlsxError> {
    let mut sheet = new_sheet("Plans", &PLAN_HEADERS, formats)?;
    if plans.is_empty() {
        sheet.write_string(1, 0, NO_DATA)?;
    }

    for (index, plan) in plans.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, cell_text(&plan.title))?;
        sheet.write_string(row, 1, plan.plan_type.as_str())?;
        sheet.write_string(row, 2, plan.class.as_str())?;
        sheet.write_string(row, 3, plan.start_date.format("%Y-%m-%d").to_string())?;
        sheet.write_string(row, 4, plan.end_date.format("%Y-%m-%d").to_string())?;
        sheet.write_string(row, 5, cell_text(optional_text(plan.description.as_deref())))?;
        sheet.write_string(row, 6, cell_text(optional_text(plan.activities.as_deref())))?;
        sheet.write_string(row, 7, cell_text(optional_text(plan.goals.as_deref())))?;
        let creator = plan.created_by.as_ref().map(|c| c.name.as_str());
        sheet.write_string(row, 8, cell_text(optional_text(creator)))?;
    }
    Ok(sheet)
}
