// src/models.rs
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

// --- 1. 枚举 (线上传输使用显示字符串) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLevel {
    Nursery,
    #[serde(rename = "LKG")]
    Lkg,
    #[serde(rename = "UKG")]
    Ukg,
}

impl ClassLevel {
    pub const ALL: [ClassLevel; 3] = [ClassLevel::Nursery, ClassLevel::Lkg, ClassLevel::Ukg];

    pub fn as_str(self) -> &'static str {
        match self {
            ClassLevel::Nursery => "Nursery",
            ClassLevel::Lkg => "LKG",
            ClassLevel::Ukg => "UKG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LearningAbility {
    Talented,
    Average,
    #[serde(rename = "Slow Learner")]
    SlowLearner,
}

impl LearningAbility {
    pub const ALL: [LearningAbility; 3] = [
        LearningAbility::Talented,
        LearningAbility::Average,
        LearningAbility::SlowLearner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LearningAbility::Talented => "Talented",
            LearningAbility::Average => "Average",
            LearningAbility::SlowLearner => "Slow Learner",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WritingSpeed {
    #[serde(rename = "Speed Writing")]
    SpeedWriting,
    #[serde(rename = "Slow Writing")]
    SlowWriting,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl WritingSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            WritingSpeed::SpeedWriting => "Speed Writing",
            WritingSpeed::SlowWriting => "Slow Writing",
            WritingSpeed::NotApplicable => "N/A",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl Rating {
    pub const ALL: [Rating; 3] = [Rating::Excellent, Rating::Good, Rating::NeedsImprovement];

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::NeedsImprovement => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanType {
    Annual,
    Monthly,
    Weekly,
}

impl PlanType {
    pub const ALL: [PlanType; 3] = [PlanType::Annual, PlanType::Monthly, PlanType::Weekly];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Annual => "Annual",
            PlanType::Monthly => "Monthly",
            PlanType::Weekly => "Weekly",
        }
    }

    /// 根据计划类型推算结束日期 (包含首尾两天)
    /// Weekly: +6 天; Monthly: +1 月 -1 天; Annual: +1 年 -1 天
    pub fn end_date_for(self, start: NaiveDate) -> NaiveDate {
        let end = match self {
            PlanType::Weekly => start.checked_add_days(Days::new(6)),
            PlanType::Monthly => start
                .checked_add_months(Months::new(1))
                .and_then(|d| d.pred_opt()),
            PlanType::Annual => start
                .checked_add_months(Months::new(12))
                .and_then(|d| d.pred_opt()),
        };
        end.unwrap_or(NaiveDate::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

/// 五个发展评估维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SocialSkills,
    PreLiteracy,
    PreNumeracy,
    MotorSkills,
    EmotionalDevelopment,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::SocialSkills,
        Category::PreLiteracy,
        Category::PreNumeracy,
        Category::MotorSkills,
        Category::EmotionalDevelopment,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::SocialSkills => "Social Skills",
            Category::PreLiteracy => "Pre-Literacy",
            Category::PreNumeracy => "Pre-Numeracy",
            Category::MotorSkills => "Motor Skills",
            Category::EmotionalDevelopment => "Emotional Development",
        }
    }
}

// --- 2. 日期解析 (上游可能返回 "2024-01-10" 或 "2024-01-10T00:00:00.000Z") ---

pub fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn deserialize_wire_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_wire_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}

// --- 3. 上游实体 (入口处一次性完成类型化) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub age: u8,
    pub class: ClassLevel,
    pub learning_ability: LearningAbility,
    pub writing_speed: WritingSpeed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Student {
    /// Nursery 班级一律报告为 N/A，不论存储的值是什么
    pub fn reported_writing_speed(&self) -> WritingSpeed {
        if self.class == ClassLevel::Nursery {
            WritingSpeed::NotApplicable
        } else {
            self.writing_speed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    #[serde(alias = "_id")]
    pub id: String,
    pub student_id: String,
    #[serde(deserialize_with = "deserialize_wire_date")]
    pub date: NaiveDate,
    pub social_skills: Rating,
    pub pre_literacy: Rating,
    pub pre_numeracy: Rating,
    pub motor_skills: Rating,
    // 旧版前端写入的是 emotionalDev
    #[serde(alias = "emotionalDev")]
    pub emotional_development: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl ProgressEntry {
    pub fn rating(&self, category: Category) -> Rating {
        match category {
            Category::SocialSkills => self.social_skills,
            Category::PreLiteracy => self.pre_literacy,
            Category::PreNumeracy => self.pre_numeracy,
            Category::MotorSkills => self.motor_skills,
            Category::EmotionalDevelopment => self.emotional_development,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCreator {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingPlan {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub class: ClassLevel,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(deserialize_with = "deserialize_wire_date")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_wire_date")]
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<PlanCreator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_classes: Vec<ClassLevel>,
}

// --- 4. 写入模型 (在任何网络请求之前完成校验) ---

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_nursery_writing_speed"))]
pub struct StudentSchema {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(range(min = 3, max = 5, message = "Age must be between 3 and 5"))]
    pub age: u8,
    pub class: ClassLevel,
    pub learning_ability: LearningAbility,
    pub writing_speed: WritingSpeed,
    #[validate(url(message = "Photo must be a valid URL"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn validate_nursery_writing_speed(student: &StudentSchema) -> Result<(), ValidationError> {
    if student.class == ClassLevel::Nursery && student.writing_speed != WritingSpeed::NotApplicable
    {
        let mut err = ValidationError::new("nursery_writing_speed");
        err.message = Some("Writing speed must be N/A for Nursery students".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSchema {
    #[validate(length(min = 1, message = "Student is required"))]
    pub student_id: String,
    pub date: NaiveDate,
    pub social_skills: Rating,
    pub pre_literacy: Rating,
    pub pre_numeracy: Rating,
    pub motor_skills: Rating,
    pub emotional_development: Rating,
    #[validate(length(max = 1000, message = "Comments are limited to 1000 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_plan_dates"))]
pub struct PlanSchema {
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub class: ClassLevel,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    pub start_date: NaiveDate,
    // 缺省时按计划类型推算
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl PlanSchema {
    /// 补全结束日期后再发往上游
    pub fn with_end_date(mut self) -> Self {
        if self.end_date.is_none() {
            self.end_date = Some(self.plan_type.end_date_for(self.start_date));
        }
        self
    }
}

fn validate_plan_dates(plan: &PlanSchema) -> Result<(), ValidationError> {
    match plan.end_date {
        Some(end) if end < plan.start_date => {
            let mut err = ValidationError::new("plan_dates");
            err.message = Some("End date must not be before start date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeacherSchema {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_classes: Vec<ClassLevel>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeacherSchema {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_classes: Vec<ClassLevel>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ResetPasswordSchema {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

// --- 5. 认证模型 ---

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoginSchema {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// 上游 /api/auth/login 的返回
#[derive(Debug, Deserialize)]
pub struct UpstreamLogin {
    pub token: String,
    pub user: Teacher,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub name: String,
    pub role: Role,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoUpload {
    #[serde(alias = "secure_url")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_plan_spans_seven_days() {
        assert_eq!(PlanType::Weekly.end_date_for(date(2024, 3, 1)), date(2024, 3, 7));
    }

    #[test]
    fn monthly_and_annual_end_one_day_early() {
        assert_eq!(PlanType::Monthly.end_date_for(date(2024, 3, 1)), date(2024, 3, 31));
        assert_eq!(PlanType::Annual.end_date_for(date(2024, 6, 1)), date(2025, 5, 31));
    }

    #[test]
    fn plan_schema_fills_missing_end_date() {
        let plan: PlanSchema = serde_json::from_value(json!({
            "type": "Weekly",
            "class": "LKG",
            "title": "Colours week",
            "startDate": "2024-03-01"
        }))
        .unwrap();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.with_end_date().end_date, Some(date(2024, 3, 7)));
    }

    #[test]
    fn plan_schema_rejects_inverted_dates() {
        let plan: PlanSchema = serde_json::from_value(json!({
            "type": "Monthly",
            "class": "UKG",
            "title": "Numbers",
            "startDate": "2024-03-10",
            "endDate": "2024-03-01"
        }))
        .unwrap();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn nursery_student_requires_na_writing_speed() {
        let mut student: StudentSchema = serde_json::from_value(json!({
            "name": "Asha",
            "age": 3,
            "class": "Nursery",
            "learningAbility": "Average",
            "writingSpeed": "Slow Writing"
        }))
        .unwrap();
        assert!(student.validate().is_err());

        student.writing_speed = WritingSpeed::NotApplicable;
        assert!(student.validate().is_ok());

        student.age = 6;
        assert!(student.validate().is_err());
    }

    #[test]
    fn progress_entry_accepts_mongo_ids_and_legacy_field() {
        let entry: ProgressEntry = serde_json::from_value(json!({
            "_id": "p1",
            "studentId": "s1",
            "date": "2024-01-10T00:00:00.000Z",
            "socialSkills": "Good",
            "preLiteracy": "Excellent",
            "preNumeracy": "Needs Improvement",
            "motorSkills": "Good",
            "emotionalDev": "Excellent"
        }))
        .unwrap();
        assert_eq!(entry.id, "p1");
        assert_eq!(entry.date, date(2024, 1, 10));
        assert_eq!(entry.rating(Category::EmotionalDevelopment), Rating::Excellent);
        assert_eq!(entry.comments, None);
    }

    #[test]
    fn nursery_reports_na_regardless_of_stored_value() {
        let student: Student = serde_json::from_value(json!({
            "id": "s1",
            "name": "Ravi",
            "age": 3,
            "class": "Nursery",
            "learningAbility": "Talented",
            "writingSpeed": "Speed Writing"
        }))
        .unwrap();
        assert_eq!(student.reported_writing_speed(), WritingSpeed::NotApplicable);
    }
}
