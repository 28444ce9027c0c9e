// src/report/layout.rs
// PDF 排版：先把内容分配到各页 (单位 mm，从页面顶端起算)，再交给渲染器绘制
use crate::config::Branding;
use crate::filter::StudentProgress;
use crate::models::{Category, Rating, TeachingPlan};

use super::style::{Column, PLAN_COLUMNS, PROGRESS_COLUMNS, STUDENT_COLUMNS};
use super::{
    optional_text, rating_text, Photo, ReportContext, ReportData, ReportOptions, NO_DATA,
    NO_PROGRESS,
};

// A4 横向
pub const PAGE_WIDTH: f32 = 297.0;
pub const PAGE_HEIGHT: f32 = 210.0;
pub const MARGIN: f32 = 12.0;
pub const FOOTER_HEIGHT: f32 = 12.0;

pub const HEADING_HEIGHT: f32 = 9.0;
pub const PHOTO_SIZE: f32 = 20.0;
pub const PHOTO_HEADING_HEIGHT: f32 = PHOTO_SIZE + 4.0;
pub const TABLE_HEADER_HEIGHT: f32 = 10.0;
pub const ROW_HEIGHT: f32 = 6.5;
pub const NOTE_HEIGHT: f32 = 7.0;
pub const GAP_HEIGHT: f32 = 4.0;

/// 页眉高度随地址行数变化
pub fn header_height(branding: &Branding) -> f32 {
    8.0 + 5.0 * branding.address_lines.len() as f32 + 7.0 + 5.0 + 4.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub rating: Option<Rating>,
}

impl Cell {
    fn text(text: impl Into<String>) -> Self {
        Cell {
            text: text.into(),
            rating: None,
        }
    }

    fn rating(rating: Option<Rating>) -> Self {
        Cell {
            text: rating_text(rating).to_string(),
            rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// 小节标题；photo 为学生下标 (仅当缩略图可用时存在)
    Heading { text: String, photo: Option<usize> },
    TableHeader { columns: &'static [Column] },
    Row { columns: &'static [Column], cells: Vec<Cell> },
    /// 横跨整个表格的提示行，如 "No data available"
    EmptyRow { columns: &'static [Column], text: String },
    Note(String),
    Gap,
}

impl Block {
    pub fn height(&self) -> f32 {
        match self {
            Block::Heading { photo: Some(_), .. } => PHOTO_HEADING_HEIGHT,
            Block::Heading { photo: None, .. } => HEADING_HEIGHT,
            Block::TableHeader { .. } => TABLE_HEADER_HEIGHT,
            Block::Row { .. } | Block::EmptyRow { .. } => ROW_HEIGHT,
            Block::Note(_) => NOTE_HEIGHT,
            Block::Gap => GAP_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub top: f32,
    pub block: Block,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub blocks: Vec<Placed>,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub title: String,
    pub ctx: ReportContext,
    pub pages: Vec<Page>,
}

impl Layout {
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![self.ctx.branding.school_name.clone()];
        lines.extend(self.ctx.branding.address_lines.iter().cloned());
        lines.push(self.title.clone());
        lines.push(format!(
            "Generated: {}",
            self.ctx.generated_at.format("%Y-%m-%d %H:%M")
        ));
        lines
    }

    /// (左侧页码, 右侧生成日期)
    pub fn footer(&self, index: usize) -> (String, String) {
        (
            format!("Page {} of {}", index + 1, self.pages.len()),
            format!("Generated on {}", self.ctx.generated_at.format("%Y-%m-%d")),
        )
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.blocks.iter().map(|b| &b.block))
    }
}

// --- 分页器 ---

struct Paginator {
    pages: Vec<Page>,
    current: Page,
    cursor: f32,
    body_top: f32,
    body_bottom: f32,
    // 跨页时需要重复的表头
    open_table: Option<&'static [Column]>,
}

impl Paginator {
    fn new(branding: &Branding) -> Self {
        let body_top = MARGIN + header_height(branding);
        Paginator {
            pages: Vec::new(),
            current: Page::default(),
            cursor: body_top,
            body_top,
            body_bottom: PAGE_HEIGHT - MARGIN - FOOTER_HEIGHT,
            open_table: None,
        }
    }

    fn break_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.cursor = self.body_top;
        if let Some(columns) = self.open_table {
            self.place(Block::TableHeader { columns });
        }
    }

    fn place(&mut self, block: Block) {
        let top = self.cursor;
        self.cursor += block.height();
        self.current.blocks.push(Placed { top, block });
    }

    /// 剩余空间不足 `needed` 时换页 (空白页不再换)
    fn reserve(&mut self, needed: f32) {
        if self.cursor + needed > self.body_bottom && !self.current.blocks.is_empty() {
            self.break_page();
        }
    }

    fn push(&mut self, block: Block) {
        self.reserve(block.height());
        self.place(block);
    }

    /// 标题与其后至少一行内容放在同一页
    fn heading(&mut self, text: String, photo: Option<usize>) {
        let heading = Block::Heading { text, photo };
        self.reserve(heading.height() + TABLE_HEADER_HEIGHT + ROW_HEIGHT);
        self.place(heading);
    }

    fn begin_table(&mut self, columns: &'static [Column]) {
        self.open_table = None;
        self.reserve(TABLE_HEADER_HEIGHT + ROW_HEIGHT);
        self.place(Block::TableHeader { columns });
        self.open_table = Some(columns);
    }

    fn end_table(&mut self) {
        self.open_table = None;
    }

    fn finish(mut self) -> Vec<Page> {
        if !self.current.blocks.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

/// 把报表数据排成页面
pub fn build(
    data: &ReportData,
    options: ReportOptions,
    photos: &[Option<Photo>],
    ctx: &ReportContext,
) -> Layout {
    let mut pager = Paginator::new(&ctx.branding);

    match data {
        ReportData::Students(rows) => student_body(&mut pager, rows, options, photos),
        ReportData::Plans(plans) => plan_body(&mut pager, plans),
    }

    Layout {
        title: data.kind().title().to_string(),
        ctx: ctx.clone(),
        pages: pager.finish(),
    }
}

fn student_body(
    pager: &mut Paginator,
    rows: &[StudentProgress],
    options: ReportOptions,
    photos: &[Option<Photo>],
) {
    pager.heading("Student Summary".into(), None);
    pager.begin_table(STUDENT_COLUMNS);
    if rows.is_empty() {
        pager.push(Block::EmptyRow {
            columns: STUDENT_COLUMNS,
            text: NO_DATA.into(),
        });
    }
    for row in rows {
        pager.push(Block::Row {
            columns: STUDENT_COLUMNS,
            cells: student_cells(row),
        });
    }
    pager.end_table();

    if !(options.include_progress_history || options.include_photos) {
        return;
    }

    for (index, row) in rows.iter().enumerate() {
        // 照片获取失败时此处为 None，只是少了缩略图
        let photo = options
            .include_photos
            .then(|| photos.get(index).and_then(Option::as_ref).map(|_| index))
            .flatten();

        pager.push(Block::Gap);
        let student = &row.student;
        pager.heading(
            format!("{} ({})", student.name, student.class.as_str()),
            photo,
        );

        if !options.include_progress_history {
            continue;
        }
        if row.entries.is_empty() {
            pager.push(Block::Note(NO_PROGRESS.into()));
            continue;
        }

        pager.begin_table(PROGRESS_COLUMNS);
        for entry in &row.entries {
            let mut cells = vec![Cell::text(entry.date.format("%Y-%m-%d").to_string())];
            cells.extend(Category::ALL.iter().map(|c| Cell::rating(Some(entry.rating(*c)))));
            cells.push(Cell::text(optional_text(entry.comments.as_deref())));
            pager.push(Block::Row {
                columns: PROGRESS_COLUMNS,
                cells,
            });
        }
        pager.end_table();
    }
}

fn student_cells(row: &StudentProgress) -> Vec<Cell> {
    let student = &row.student;
    let mut cells = vec![
        Cell::text(student.name.clone()),
        Cell::text(student.class.as_str()),
        Cell::text(student.age.to_string()),
        Cell::text(student.learning_ability.as_str()),
        Cell::text(student.reported_writing_speed().as_str()),
    ];
    cells.extend(Category::ALL.iter().map(|c| Cell::rating(row.latest_rating(*c))));
    cells
}

fn plan_body(pager: &mut Paginator, plans: &[TeachingPlan]) {
    pager.heading("Teaching Plans".into(), None);
    pager.begin_table(PLAN_COLUMNS);
    if plans.is_empty() {
        pager.push(Block::EmptyRow {
            columns: PLAN_COLUMNS,
            text: NO_DATA.into(),
        });
    }
    for plan in plans {
        let creator = plan.created_by.as_ref().map(|c| c.name.as_str());
        pager.push(Block::Row {
            columns: PLAN_COLUMNS,
            cells: vec![
                Cell::text(plan.title.clone()),
                Cell::text(plan.plan_type.as_str()),
                Cell::text(plan.class.as_str()),
                Cell::text(format!(
                    "{} to {}",
                    plan.start_date.format("%Y-%m-%d"),
                    plan.end_date.format("%Y-%m-%d")
                )),
                Cell::text(optional_text(creator)),
            ],
        });
    }
    pager.end_table();
}
