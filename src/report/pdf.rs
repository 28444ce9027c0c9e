// src/report/pdf.rs
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point, Rgb,
};

use super::layout::{Block, Layout, Placed, MARGIN, PAGE_HEIGHT, PAGE_WIDTH, PHOTO_SIZE};
use super::style::{self, Column};
use super::Photo;
use crate::AppError;

const MM_PER_PT: f32 = 0.3528;
// Helvetica 的平均字宽约为字号的 0.55 倍
const AVG_GLYPH_EM: f32 = 0.55;

const BODY_PT: f32 = 8.0;
const HEADING_PT: f32 = 10.5;
const TITLE_PT: f32 = 14.0;
const SMALL_PT: f32 = 7.5;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn pdf_error<E: std::fmt::Debug>(err: E) -> AppError {
    AppError::Report(format!("{err:?}"))
}

/// 按顺序绘制每一页：页眉、正文块、页脚
pub fn render(layout: &Layout, photos: &[Option<Photo>]) -> Result<Vec<u8>, AppError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(layout.title.clone(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    for (index, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        draw_header(&layer, &fonts, layout);
        for placed in &page.blocks {
            draw_block(&layer, &fonts, placed, photos);
        }
        draw_footer(&layer, &fonts, layout, index);
    }

    doc.save_to_bytes().map_err(pdf_error)
}

/// 页面顶端距离转换为 PDF 坐标 (原点在左下角)
fn y_from_top(top: f32) -> Mm {
    Mm(PAGE_HEIGHT - top)
}

fn set_text_color(layer: &PdfLayerReference, rgb: u32) {
    let (r, g, b) = style::rgb_components(rgb);
    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
}

fn rule(layer: &PdfLayerReference, top: f32, thickness: f32) {
    let (r, g, b) = style::rgb_components(style::RULE_COLOR);
    layer.set_outline_color(Color::Rgb(Rgb::new(r, g, b, None)));
    layer.set_outline_thickness(thickness);
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(MARGIN), y_from_top(top)), false),
            (Point::new(Mm(PAGE_WIDTH - MARGIN), y_from_top(top)), false),
        ],
        is_closed: false,
    });
}

/// 按估算字宽截断，超出列宽时以 "..." 结尾
pub fn fit_text(text: &str, width_mm: f32, size_pt: f32) -> String {
    let glyph = size_pt * AVG_GLYPH_EM * MM_PER_PT;
    let max_chars = ((width_mm - 2.0) / glyph).floor().max(1.0) as usize;
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// 表头文字按单词折成最多两行
pub fn wrap_label(label: &str, width_mm: f32, size_pt: f32) -> Vec<String> {
    let glyph = size_pt * AVG_GLYPH_EM * MM_PER_PT;
    let max_chars = ((width_mm - 2.0) / glyph).floor().max(1.0) as usize;
    if label.chars().count() <= max_chars {
        return vec![label.to_string()];
    }

    let mut lines: Vec<String> = vec![String::new()];
    for word in label.split_whitespace() {
        let current = lines.last_mut().map(|l| l.chars().count()).unwrap_or(0);
        if current > 0 && current + 1 + word.chars().count() > max_chars && lines.len() < 2 {
            lines.push(String::new());
        }
        if let Some(line) = lines.last_mut() {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
    }
    lines
        .into_iter()
        .map(|l| fit_text(&l, width_mm, size_pt))
        .collect()
}

fn draw_header(layer: &PdfLayerReference, fonts: &Fonts, layout: &Layout) {
    let branding = &layout.ctx.branding;
    let mut top = MARGIN + 6.0;

    set_text_color(layer, style::TEXT_COLOR);
    layer.use_text(
        branding.school_name.clone(),
        TITLE_PT,
        Mm(MARGIN),
        y_from_top(top),
        &fonts.bold,
    );
    top += 2.0;

    set_text_color(layer, style::MUTED_COLOR);
    for line in &branding.address_lines {
        top += 5.0;
        layer.use_text(line.clone(), BODY_PT, Mm(MARGIN), y_from_top(top), &fonts.regular);
    }

    top += 7.0;
    set_text_color(layer, style::TEXT_COLOR);
    layer.use_text(
        layout.title.clone(),
        HEADING_PT + 1.5,
        Mm(MARGIN),
        y_from_top(top),
        &fonts.bold,
    );

    top += 5.0;
    set_text_color(layer, style::MUTED_COLOR);
    layer.use_text(
        format!("Generated: {}", layout.ctx.generated_at.format("%Y-%m-%d %H:%M")),
        SMALL_PT,
        Mm(MARGIN),
        y_from_top(top),
        &fonts.regular,
    );

    rule(layer, top + 2.5, 0.8);
}

fn draw_footer(layer: &PdfLayerReference, fonts: &Fonts, layout: &Layout, index: usize) {
    let (page_label, date_label) = layout.footer(index);
    let top = PAGE_HEIGHT - MARGIN;

    rule(layer, top - 5.0, 0.4);
    set_text_color(layer, style::MUTED_COLOR);
    layer.use_text(page_label, SMALL_PT, Mm(MARGIN), y_from_top(top), &fonts.regular);

    let width = date_label.chars().count() as f32 * SMALL_PT * AVG_GLYPH_EM * MM_PER_PT;
    layer.use_text(
        date_label,
        SMALL_PT,
        Mm(PAGE_WIDTH - MARGIN - width),
        y_from_top(top),
        &fonts.regular,
    );
}

fn draw_block(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    placed: &Placed,
    photos: &[Option<Photo>],
) {
    let top = placed.top;
    match &placed.block {
        Block::Heading { text, photo } => {
            let mut text_x = MARGIN;
            if let Some(pixels) = photo.and_then(|i| photos.get(i)).and_then(Option::as_ref) {
                draw_photo(layer, pixels, MARGIN, top + 2.0);
                text_x += PHOTO_SIZE + 4.0;
            }
            set_text_color(layer, style::TEXT_COLOR);
            layer.use_text(
                text.clone(),
                HEADING_PT,
                Mm(text_x),
                y_from_top(top + 6.5),
                &fonts.bold,
            );
        }
        Block::TableHeader { columns } => {
            set_text_color(layer, style::TEXT_COLOR);
            let mut x = MARGIN;
            for column in columns.iter() {
                for (line_no, line) in wrap_label(column.label, column.width, BODY_PT)
                    .into_iter()
                    .enumerate()
                {
                    layer.use_text(
                        line,
                        BODY_PT,
                        Mm(x + 1.0),
                        y_from_top(top + 4.0 + line_no as f32 * 3.5),
                        &fonts.bold,
                    );
                }
                x += column.width;
            }
            rule(layer, top + 9.5, 0.5);
        }
        Block::Row { columns, cells } => {
            draw_cells(layer, fonts, columns, cells, top);
            rule(layer, top + 6.3, 0.1);
        }
        Block::EmptyRow { text, .. } => {
            set_text_color(layer, style::MUTED_COLOR);
            layer.use_text(
                text.clone(),
                BODY_PT,
                Mm(MARGIN + 1.0),
                y_from_top(top + 4.5),
                &fonts.regular,
            );
            rule(layer, top + 6.3, 0.1);
        }
        Block::Note(text) => {
            set_text_color(layer, style::MUTED_COLOR);
            layer.use_text(
                text.clone(),
                BODY_PT,
                Mm(MARGIN + 1.0),
                y_from_top(top + 4.5),
                &fonts.regular,
            );
        }
        Block::Gap => {}
    }
}

fn draw_cells(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    columns: &[Column],
    cells: &[super::layout::Cell],
    top: f32,
) {
    let mut x = MARGIN;
    for (column, cell) in columns.iter().zip(cells) {
        let color = cell.rating.map_or(style::TEXT_COLOR, style::rating_color);
        set_text_color(layer, color);
        layer.use_text(
            fit_text(&cell.text, column.width, BODY_PT),
            BODY_PT,
            Mm(x + 1.0),
            y_from_top(top + 4.5),
            &fonts.regular,
        );
        x += column.width;
    }
}

fn draw_photo(layer: &PdfLayerReference, photo: &Photo, left: f32, top: f32) {
    let width_px = photo.pixels.width().max(1) as f32;
    // 以 dpi 控制最终尺寸：最长边为 PHOTO_SIZE mm
    let longest = width_px.max(photo.pixels.height() as f32);
    let dpi = longest * 25.4 / PHOTO_SIZE;
    let height_mm = photo.pixels.height() as f32 * 25.4 / dpi;

    let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(photo.pixels.clone()));
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(left)),
            translate_y: Some(y_from_top(top + height_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}
