// src/dashboard.rs
use serde::Serialize;

use crate::filter::StudentProgress;
use crate::models::{
    Category, ClassLevel, LearningAbility, PlanType, ProgressEntry, Rating, Student, TeachingPlan,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Count {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRatings {
    pub category: &'static str,
    pub excellent: usize,
    pub good: usize,
    pub needs_improvement: usize,
}

impl CategoryRatings {
    pub fn count(&self, rating: Rating) -> usize {
        match rating {
            Rating::Excellent => self.excellent,
            Rating::Good => self.good,
            Rating::NeedsImprovement => self.needs_improvement,
        }
    }
}

/// 仪表盘统计 (也用于 Excel 的 Summary 工作表)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub students_by_class: Vec<Count>,
    pub students_by_ability: Vec<Count>,
    pub total_plans: usize,
    pub plans_by_type: Vec<Count>,
    pub total_progress_entries: usize,
    pub ratings: Vec<CategoryRatings>,
}

impl DashboardStats {
    pub fn compute(
        students: &[Student],
        plans: &[TeachingPlan],
        entries: &[ProgressEntry],
    ) -> Self {
        DashboardStats {
            total_students: students.len(),
            students_by_class: ClassLevel::ALL
                .iter()
                .map(|c| Count {
                    label: c.as_str(),
                    count: students.iter().filter(|s| s.class == *c).count(),
                })
                .collect(),
            students_by_ability: LearningAbility::ALL
                .iter()
                .map(|a| Count {
                    label: a.as_str(),
                    count: students.iter().filter(|s| s.learning_ability == *a).count(),
                })
                .collect(),
            total_plans: plans.len(),
            plans_by_type: PlanType::ALL
                .iter()
                .map(|t| Count {
                    label: t.as_str(),
                    count: plans.iter().filter(|p| p.plan_type == *t).count(),
                })
                .collect(),
            total_progress_entries: entries.len(),
            ratings: Category::ALL
                .iter()
                .map(|c| {
                    let tally = |r: Rating| entries.iter().filter(|e| e.rating(*c) == r).count();
                    CategoryRatings {
                        category: c.label(),
                        excellent: tally(Rating::Excellent),
                        good: tally(Rating::Good),
                        needs_improvement: tally(Rating::NeedsImprovement),
                    }
                })
                .collect(),
        }
    }

    /// 学生报表：由已关联的数据计算，不含计划
    pub fn from_progress(rows: &[StudentProgress]) -> Self {
        let students: Vec<Student> = rows.iter().map(|r| r.student.clone()).collect();
        let entries: Vec<ProgressEntry> = rows.iter().flat_map(|r| r.entries.clone()).collect();
        Self::compute(&students, &[], &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::fixtures::{date, entry, plan, scenario_one};
    use crate::filter::join_progress;

    #[test]
    fn counts_by_class_and_rating() {
        let (students, mut entries) = scenario_one();
        entries.push(entry("p3", "b", date(2024, 1, 5), Rating::NeedsImprovement));
        let plans = vec![
            plan("1", "Shapes", PlanType::Weekly, ClassLevel::Lkg, date(2024, 1, 1)),
            plan("2", "Term", PlanType::Annual, ClassLevel::Lkg, date(2024, 1, 1)),
        ];
        let stats = DashboardStats::compute(&students, &plans, &entries);

        assert_eq!(stats.total_students, 3);
        assert!(stats.students_by_class.iter().all(|c| c.count == 1));
        assert_eq!(stats.total_plans, 2);
        assert_eq!(stats.plans_by_type[2], Count { label: "Weekly", count: 1 });
        assert_eq!(stats.total_progress_entries, 3);

        let social = &stats.ratings[0];
        assert_eq!(social.category, "Social Skills");
        assert_eq!(social.count(Rating::Excellent), 1);
        assert_eq!(social.count(Rating::Good), 1);
        assert_eq!(social.count(Rating::NeedsImprovement), 1);
    }

    #[test]
    fn from_progress_matches_compute() {
        let (students, entries) = scenario_one();
        let rows = join_progress(&students, &entries);
        let stats = DashboardStats::from_progress(&rows);
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.total_progress_entries, 2);
        assert_eq!(stats.total_plans, 0);
    }
}
