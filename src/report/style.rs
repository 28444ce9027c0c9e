// src/report/style.rs
// 报表中的固定样式与列定义，统一用查表代替分散的分支判断
use crate::models::Rating;

/// 评级对应的显示颜色 (RGB)
const RATING_COLORS: [(Rating, u32); 3] = [
    (Rating::Excellent, 0x1E_7B_34),
    (Rating::Good, 0x1F_5F_AD),
    (Rating::NeedsImprovement, 0xB2_3B_1E),
];

pub const TEXT_COLOR: u32 = 0x20_20_20;
pub const MUTED_COLOR: u32 = 0x6B_6B_6B;
pub const RULE_COLOR: u32 = 0xB0_B7_C3;
pub const HEADER_FILL: u32 = 0xD9_E1_F2;

pub fn rating_color(rating: Rating) -> u32 {
    RATING_COLORS
        .iter()
        .find(|(r, _)| *r == rating)
        .map(|(_, rgb)| *rgb)
        .unwrap_or(TEXT_COLOR)
}

/// 拆成 0.0..=1.0 的三个分量 (PDF 颜色空间)
pub fn rgb_components(rgb: u32) -> (f32, f32, f32) {
    let channel = |shift: u32| ((rgb >> shift) & 0xFF) as f32 / 255.0;
    (channel(16), channel(8), channel(0))
}

// --- 表格列 (标题与宽度, 单位 mm; A4 横向正文宽度 273mm) ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub label: &'static str,
    pub width: f32,
}

const fn col(label: &'static str, width: f32) -> Column {
    Column { label, width }
}

pub const STUDENT_COLUMNS: &[Column] = &[
    col("Name", 45.0),
    col("Class", 18.0),
    col("Age", 12.0),
    col("Learning Ability", 28.0),
    col("Writing Speed", 28.0),
    col("Social Skills", 28.0),
    col("Pre-Literacy", 28.0),
    col("Pre-Numeracy", 28.0),
    col("Motor Skills", 28.0),
    col("Emotional Development", 28.0),
];

pub const PROGRESS_COLUMNS: &[Column] = &[
    col("Date", 24.0),
    col("Social Skills", 28.0),
    col("Pre-Literacy", 28.0),
    col("Pre-Numeracy", 28.0),
    col("Motor Skills", 28.0),
    col("Emotional Development", 28.0),
    col("Comments", 109.0),
];

pub const PLAN_COLUMNS: &[Column] = &[
    col("Title", 80.0),
    col("Type", 30.0),
    col("Class", 25.0),
    col("Date Range", 62.0),
    col("Creator", 76.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rating_has_a_color() {
        for rating in Rating::ALL {
            assert_ne!(rating_color(rating), TEXT_COLOR);
        }
    }

    #[test]
    fn components_are_normalised() {
        assert_eq!(rgb_components(0xFF_00_00), (1.0, 0.0, 0.0));
        let (r, g, b) = rgb_components(HEADER_FILL);
        assert!(r < 1.0 && g < 1.0 && b <= 1.0);
    }

    #[test]
    fn tables_fit_landscape_body() {
        for columns in [STUDENT_COLUMNS, PROGRESS_COLUMNS, PLAN_COLUMNS] {
            let total: f32 = columns.iter().map(|c| c.width).sum();
            assert!(total <= 273.0, "table is {total}mm wide");
        }
    }
}
