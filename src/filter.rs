// src/filter.rs
// 过滤与聚合：纯函数，不修改输入，保持输入顺序
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{
    parse_wire_date, Category, ClassLevel, PlanType, ProgressEntry, Rating, Role, Student,
    Teacher, TeachingPlan,
};
use crate::AppError;

// --- 1. 过滤条件 ---

/// 闭区间 [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && self.start <= end
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub class: Option<ClassLevel>,
    pub teacher_id: Option<String>,
    pub student_id: Option<String>,
    pub plan_type: Option<PlanType>,
    pub role: Option<Role>,
    pub date_range: Option<DateRange>,
    // 已转为小写
    pub search: Option<String>,
}

impl FilterSpec {
    /// 是否存在以学生为目标的条件 (进度记录需通过学生关联判断)
    fn has_student_predicate(&self) -> bool {
        self.class.is_some() || self.teacher_id.is_some()
    }
}

/// 前端传来的原始查询参数
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub class: Option<String>,
    pub teacher_id: Option<String>,
    pub student_id: Option<String>,
    #[serde(rename = "type")]
    pub plan_type: Option<String>,
    pub role: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
}

impl FilterQuery {
    /// 未知的枚举值按 "all" 处理；日期区间必须完整且有序
    pub fn into_spec(self) -> Result<FilterSpec, AppError> {
        let date_range = parse_date_range(self.start_date.as_deref(), self.end_date.as_deref())?;

        Ok(FilterSpec {
            class: parse_choice(self.class.as_deref(), &ClassLevel::ALL, ClassLevel::as_str),
            teacher_id: non_empty(self.teacher_id),
            student_id: non_empty(self.student_id),
            plan_type: parse_choice(self.plan_type.as_deref(), &PlanType::ALL, PlanType::as_str),
            role: parse_choice(self.role.as_deref(), &[Role::Teacher, Role::Admin], Role::as_str),
            date_range,
            search: non_empty(self.search).map(|s| s.to_lowercase()),
        })
    }
}

fn parse_choice<T: Copy>(
    raw: Option<&str>,
    choices: &[T],
    label: fn(T) -> &'static str,
) -> Option<T> {
    let raw = raw?.trim();
    let found = choices
        .iter()
        .copied()
        .find(|c| label(*c).eq_ignore_ascii_case(raw));
    if found.is_none() && !raw.is_empty() && !raw.eq_ignore_ascii_case("all") {
        tracing::debug!("忽略未知的过滤值: {}", raw);
    }
    found
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
}

fn parse_date_range(start: Option<&str>, end: Option<&str>) -> Result<Option<DateRange>, AppError> {
    let start = start.map(str::trim).filter(|s| !s.is_empty());
    let end = end.map(str::trim).filter(|s| !s.is_empty());

    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = parse_wire_date(start)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid start date: {start}")))?;
            let end = parse_wire_date(end)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid end date: {end}")))?;
            if start > end {
                return Err(AppError::BadRequest(
                    "Start date must not be after end date".into(),
                ));
            }
            Ok(Some(DateRange { start, end }))
        }
        _ => Err(AppError::BadRequest(
            "Both start date and end date are required for a date range".into(),
        )),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn opt_contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| contains_ci(h, needle))
}

// --- 2. 各类记录的过滤 ---

pub fn student_matches(student: &Student, spec: &FilterSpec) -> bool {
    spec.class.map_or(true, |c| student.class == c)
        && spec
            .teacher_id
            .as_deref()
            .map_or(true, |t| student.teacher_id.as_deref() == Some(t))
        && spec.student_id.as_deref().map_or(true, |id| student.id == id)
        && spec
            .search
            .as_deref()
            .map_or(true, |q| contains_ci(&student.name, q))
}

pub fn filter_students(students: &[Student], spec: &FilterSpec) -> Vec<Student> {
    students
        .iter()
        .filter(|s| student_matches(s, spec))
        .cloned()
        .collect()
}

pub fn plan_matches(plan: &TeachingPlan, spec: &FilterSpec) -> bool {
    spec.class.map_or(true, |c| plan.class == c)
        && spec.plan_type.map_or(true, |t| plan.plan_type == t)
        && spec.teacher_id.as_deref().map_or(true, |t| {
            plan.created_by.as_ref().is_some_and(|c| c.id == t)
        })
        && spec
            .date_range
            .map_or(true, |r| r.overlaps(plan.start_date, plan.end_date))
        && spec.search.as_deref().map_or(true, |q| {
            contains_ci(&plan.title, q) || opt_contains_ci(plan.description.as_deref(), q)
        })
}

pub fn filter_plans(plans: &[TeachingPlan], spec: &FilterSpec) -> Vec<TeachingPlan> {
    plans
        .iter()
        .filter(|p| plan_matches(p, spec))
        .cloned()
        .collect()
}

pub fn teacher_matches(teacher: &Teacher, spec: &FilterSpec) -> bool {
    spec.class
        .map_or(true, |c| teacher.assigned_classes.contains(&c))
        && spec.role.map_or(true, |r| teacher.role == r)
        && spec.teacher_id.as_deref().map_or(true, |id| teacher.id == id)
        && spec.search.as_deref().map_or(true, |q| {
            contains_ci(&teacher.name, q) || contains_ci(&teacher.email, q)
        })
}

pub fn filter_teachers(teachers: &[Teacher], spec: &FilterSpec) -> Vec<Teacher> {
    teachers
        .iter()
        .filter(|t| teacher_matches(t, spec))
        .cloned()
        .collect()
}

/// 进度记录的班级/教师条件通过关联的学生判断；搜索匹配学生姓名或评语
pub fn filter_progress(
    entries: &[ProgressEntry],
    students: &[Student],
    spec: &FilterSpec,
) -> Vec<ProgressEntry> {
    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();

    entries
        .iter()
        .filter(|entry| {
            let student = by_id.get(entry.student_id.as_str()).copied();

            let student_ok = !spec.has_student_predicate()
                || student.is_some_and(|s| {
                    spec.class.map_or(true, |c| s.class == c)
                        && spec
                            .teacher_id
                            .as_deref()
                            .map_or(true, |t| s.teacher_id.as_deref() == Some(t))
                });

            student_ok
                && spec
                    .student_id
                    .as_deref()
                    .map_or(true, |id| entry.student_id == id)
                && spec.date_range.map_or(true, |r| r.contains(entry.date))
                && spec.search.as_deref().map_or(true, |q| {
                    student.is_some_and(|s| contains_ci(&s.name, q))
                        || opt_contains_ci(entry.comments.as_deref(), q)
                })
        })
        .cloned()
        .collect()
}

// --- 3. 聚合：学生与进度记录关联 ---

#[derive(Debug, Clone, PartialEq)]
pub struct StudentProgress {
    pub student: Student,
    // 按日期升序
    pub entries: Vec<ProgressEntry>,
}

impl StudentProgress {
    pub fn latest(&self) -> Option<&ProgressEntry> {
        self.entries.last()
    }

    /// 每个维度的最新评级；没有记录时为 None
    pub fn latest_rating(&self, category: Category) -> Option<Rating> {
        self.latest().map(|e| e.rating(category))
    }
}

/// 每个学生对应一项，顺序与学生列表一致；不属于任何学生的记录被丢弃
pub fn join_progress(students: &[Student], entries: &[ProgressEntry]) -> Vec<StudentProgress> {
    let mut grouped: HashMap<&str, Vec<ProgressEntry>> = HashMap::new();
    for entry in entries {
        grouped
            .entry(entry.student_id.as_str())
            .or_default()
            .push(entry.clone());
    }

    students
        .iter()
        .map(|student| {
            let mut entries = grouped.remove(student.id.as_str()).unwrap_or_default();
            entries.sort_by_key(|e| e.date);
            StudentProgress {
                student: student.clone(),
                entries,
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> FilterQuery {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn unknown_and_all_values_mean_no_filter() {
        let spec = query(&[("class", "Kindergarten"), ("type", "all"), ("teacherId", "all")])
            .into_spec()
            .unwrap();
        assert_eq!(spec, FilterSpec::default());

        let spec = query(&[("class", "lkg"), ("type", "weekly")]).into_spec().unwrap();
        assert_eq!(spec.class, Some(ClassLevel::Lkg));
        assert_eq!(spec.plan_type, Some(PlanType::Weekly));
    }

    #[test]
    fn half_open_or_inverted_date_range_is_rejected() {
        assert!(query(&[("startDate", "2024-01-01")]).into_spec().is_err());
        assert!(query(&[("startDate", "2024-02-01"), ("endDate", "2024-01-01")])
            .into_spec()
            .is_err());
        assert!(query(&[("startDate", "2024-01-01"), ("endDate", "soon")])
            .into_spec()
            .is_err());
    }

    #[test]
    fn students_satisfy_every_predicate() {
        let (students, _) = scenario_one();
        let specs = [
            FilterSpec::default(),
            FilterSpec { class: Some(ClassLevel::Lkg), ..Default::default() },
            FilterSpec { teacher_id: Some("t1".into()), ..Default::default() },
            FilterSpec {
                teacher_id: Some("t1".into()),
                search: Some("aa".into()),
                ..Default::default()
            },
            FilterSpec {
                class: Some(ClassLevel::Ukg),
                teacher_id: Some("t1".into()),
                ..Default::default()
            },
        ];

        for spec in &specs {
            let out = filter_students(&students, spec);
            assert!(out.iter().all(|s| students.contains(s)));
            assert!(out.iter().all(|s| student_matches(s, spec)));
            let expected = students.iter().filter(|s| student_matches(s, spec)).count();
            assert_eq!(out.len(), expected);
        }

        let ukg_t1 = filter_students(&students, &specs[4]);
        assert!(ukg_t1.is_empty());
    }

    #[test]
    fn search_is_case_insensitive() {
        let (students, _) = scenario_one();
        let spec = query(&[("search", "CHIT")]).into_spec().unwrap();
        let out = filter_students(&students, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "c");
    }

    #[test]
    fn filtering_is_idempotent() {
        let plans = vec![
            plan("1", "Shapes", PlanType::Weekly, ClassLevel::Lkg, date(2024, 3, 1)),
            plan("2", "Festival songs", PlanType::Monthly, ClassLevel::Ukg, date(2024, 4, 1)),
            plan("3", "Year overview", PlanType::Annual, ClassLevel::Lkg, date(2024, 6, 1)),
        ];
        let spec = FilterSpec {
            class: Some(ClassLevel::Lkg),
            ..Default::default()
        };
        let once = filter_plans(&plans, &spec);
        let twice = filter_plans(&plans, &spec);
        assert_eq!(once, twice);
        assert_eq!(filter_plans(&once, &spec), once);
        assert_eq!(once.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["1", "3"]);
    }

    #[test]
    fn plan_date_range_keeps_overlapping_plans() {
        let plans = vec![
            plan("1", "Shapes", PlanType::Weekly, ClassLevel::Lkg, date(2024, 2, 28)),
            plan("2", "Rhymes", PlanType::Weekly, ClassLevel::Lkg, date(2024, 3, 10)),
        ];
        let spec = FilterSpec {
            date_range: Some(DateRange { start: date(2024, 3, 1), end: date(2024, 3, 5) }),
            ..Default::default()
        };
        let out = filter_plans(&plans, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn progress_date_range_is_inclusive() {
        let (students, mut entries) = scenario_one();
        entries.push(entry("p3", "b", date(2024, 1, 31), Rating::Good));
        let spec = FilterSpec {
            date_range: Some(DateRange { start: date(2024, 1, 10), end: date(2024, 1, 31) }),
            ..Default::default()
        };
        let out = filter_progress(&entries, &students, &spec);
        let ids: Vec<_> = out.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p3"]);
    }

    #[test]
    fn progress_class_filter_goes_through_student() {
        let (students, mut entries) = scenario_one();
        entries.push(entry("p3", "b", date(2024, 1, 12), Rating::Good));
        entries.push(entry("orphan", "zz", date(2024, 1, 12), Rating::Good));
        let spec = FilterSpec {
            class: Some(ClassLevel::Lkg),
            ..Default::default()
        };
        let out = filter_progress(&entries, &students, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "p3");

        // 没有学生条件时孤立记录保留
        let all = filter_progress(&entries, &students, &FilterSpec::default());
        assert_eq!(all.len(), entries.len());
    }

    #[test]
    fn scenario_one_joins_only_january_entry() {
        let (students, entries) = scenario_one();
        let spec = query(&[
            ("class", "all"),
            ("startDate", "2024-01-01"),
            ("endDate", "2024-01-31"),
        ])
        .into_spec()
        .unwrap();

        let kept = filter_progress(&entries, &students, &spec);
        let joined = join_progress(&filter_students(&students, &spec), &kept);

        assert_eq!(joined.len(), 3);
        assert_eq!(joined[0].entries.len(), 1);
        assert_eq!(joined[0].entries[0].date, date(2024, 1, 10));
        assert_eq!(joined[0].latest_rating(Category::PreLiteracy), Some(Rating::Good));
        assert!(joined[1].entries.is_empty());
        assert!(joined[2].entries.is_empty());
        assert_eq!(joined[2].latest_rating(Category::MotorSkills), None);
    }

    #[test]
    fn join_sorts_entries_by_date() {
        let (students, entries) = scenario_one();
        let joined = join_progress(&students, &entries);
        let dates: Vec<_> = joined[0].entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, [date(2024, 1, 10), date(2024, 2, 10)]);
        assert_eq!(joined[0].latest_rating(Category::SocialSkills), Some(Rating::Excellent));
    }

    #[test]
    fn teachers_filter_by_class_and_role() {
        let teachers = vec![
            Teacher {
                id: "t1".into(),
                name: "Meera".into(),
                email: "meera@school.test".into(),
                role: Role::Teacher,
                assigned_classes: vec![ClassLevel::Lkg],
            },
            Teacher {
                id: "t2".into(),
                name: "Admin".into(),
                email: "office@school.test".into(),
                role: Role::Admin,
                assigned_classes: vec![],
            },
        ];
        let spec = FilterSpec {
            class: Some(ClassLevel::Lkg),
            ..Default::default()
        };
        assert_eq!(filter_teachers(&teachers, &spec).len(), 1);

        let spec = FilterSpec {
            role: Some(Role::Admin),
            search: Some("office".into()),
            ..Default::default()
        };
        let out = filter_teachers(&teachers, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "t2");
    }
}
