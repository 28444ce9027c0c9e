// src/report/mod.rs
// 报表生成：把过滤、关联后的记录排版成 PDF 或 Excel
pub mod excel;
pub mod layout;
pub mod pdf;
pub mod style;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use image::RgbImage;
use serde::Serialize;

use crate::config::Branding;
use crate::dashboard::DashboardStats;
use crate::filter::StudentProgress;
use crate::models::{Rating, TeachingPlan};
use crate::AppError;

pub const NO_DATA: &str = "No data available";
pub const NO_PROGRESS: &str = "No progress entries available.";
pub const NOT_AVAILABLE: &str = "N/A";

// Excel 单元格的字符上限
pub const MAX_CELL_CHARS: usize = 32_767;

// 缩略图的最大边长 (像素)
const THUMBNAIL_PX: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Student,
    Plan,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Student => "student",
            ReportKind::Plan => "plan",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Student => "Student Progress Report",
            ReportKind::Plan => "Teaching Plan Report",
        }
    }
}

impl FromStr for ReportKind {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "student" | "students" => Ok(ReportKind::Student),
            "plan" | "plans" | "teaching-plans" => Ok(ReportKind::Plan),
            other => Err(AppError::NotFound(format!("Unknown report type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Xlsx,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ReportFormat {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            other => Err(AppError::BadRequest(format!("Unsupported report format: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub include_photos: bool,
    pub include_progress_history: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            include_photos: false,
            include_progress_history: true,
        }
    }
}

/// 已过滤、已关联的报表数据快照
#[derive(Debug, Clone)]
pub enum ReportData {
    Students(Vec<StudentProgress>),
    Plans(Vec<TeachingPlan>),
}

impl ReportData {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportData::Students(_) => ReportKind::Student,
            ReportData::Plans(_) => ReportKind::Plan,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportData::Students(rows) => rows.len(),
            ReportData::Plans(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 学生照片的缩略图
#[derive(Debug, Clone)]
pub struct Photo {
    pub pixels: RgbImage,
}

impl Photo {
    pub fn decode(bytes: &[u8]) -> Result<Photo, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        let pixels = decoded.thumbnail(THUMBNAIL_PX, THUMBNAIL_PX).to_rgb8();
        Ok(Photo { pixels })
    }
}

/// 页眉页脚需要的固定信息
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub branding: Branding,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ReportFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// `<type>_report_<YYYY-MM-DD>.<ext>`
pub fn file_name(kind: ReportKind, format: ReportFormat, on: NaiveDate) -> String {
    format!(
        "{}_report_{}.{}",
        kind.as_str(),
        on.format("%Y-%m-%d"),
        format.extension()
    )
}

pub fn rating_text(rating: Option<Rating>) -> &'static str {
    rating.map_or(NOT_AVAILABLE, Rating::as_str)
}

pub fn optional_text(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
}

/// 超长文本截断到单元格上限，报表照常生成
pub fn cell_text(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => &value[..cut],
        None => value,
    }
}

/// 生成报表文件；photos 与学生顺序一一对应 (计划报表可为空)
pub fn render(
    data: &ReportData,
    format: ReportFormat,
    options: ReportOptions,
    photos: &[Option<Photo>],
    ctx: &ReportContext,
) -> Result<ReportFile, AppError> {
    let bytes = match format {
        ReportFormat::Pdf => {
            let layout = layout::build(data, options, photos, ctx);
            pdf::render(&layout, photos)?
        }
        ReportFormat::Xlsx => {
            let stats = match data {
                ReportData::Students(rows) => Some(DashboardStats::from_progress(rows)),
                ReportData::Plans(_) => None,
            };
            excel::render(data, stats.as_ref())?
        }
    };

    Ok(ReportFile {
        bytes,
        content_type: format.content_type(),
        filename: file_name(data.kind(), format, ctx.generated_at.date()),
    })
}
