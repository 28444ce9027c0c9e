// src/service.rs
// 前端只需要的两个操作：list_filtered 与 generate_report
use std::str::FromStr;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::api::{ApiClient, UpstreamQuery};
use crate::auth::Session;
use crate::dashboard::DashboardStats;
use crate::filter::{self, FilterSpec};
use crate::models::{ProgressEntry, Student, Teacher, TeachingPlan};
use crate::report::{
    self, Photo, ReportContext, ReportData, ReportFile, ReportFormat, ReportKind, ReportOptions,
};
use crate::{AppError, AppState};

// 并发获取照片/进度记录的上限
const FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Students,
    Progress,
    Plans,
    Teachers,
}

impl FromStr for RecordKind {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "students" => Ok(RecordKind::Students),
            "progress" => Ok(RecordKind::Progress),
            "plans" | "teaching-plans" => Ok(RecordKind::Plans),
            "teachers" => Ok(RecordKind::Teachers),
            other => Err(AppError::NotFound(format!("Unknown record kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Records {
    Students(Vec<Student>),
    Progress(Vec<ProgressEntry>),
    Plans(Vec<TeachingPlan>),
    Teachers(Vec<Teacher>),
}

impl Records {
    pub fn len(&self) -> usize {
        match self {
            Records::Students(r) => r.len(),
            Records::Progress(r) => r.len(),
            Records::Plans(r) => r.len(),
            Records::Teachers(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn upstream_query(spec: &FilterSpec) -> UpstreamQuery {
    UpstreamQuery {
        class: spec.class,
        teacher_id: spec.teacher_id.clone(),
        plan_type: spec.plan_type,
        student_id: spec.student_id.clone(),
    }
}

// --- 1. 数据获取 (条件转发上游，本地再过滤一次) ---

async fn fetch_students(
    api: &ApiClient,
    session: &Session,
    spec: &FilterSpec,
) -> Result<Vec<Student>, AppError> {
    let students = api
        .list_students(&session.api_token, &upstream_query(spec))
        .await?;
    Ok(filter::filter_students(&students, spec))
}

/// 按学生逐个获取进度记录；上游 404 视为没有记录。
/// 上游若忽略 studentId 会返回全部记录，因此每批只保留属于该学生的条目
async fn fetch_progress_for(
    api: &ApiClient,
    session: &Session,
    students: &[Student],
) -> Result<Vec<ProgressEntry>, AppError> {
    let ids: Vec<String> = students.iter().map(|s| s.id.clone()).collect();

    let batches: Vec<Result<Vec<ProgressEntry>, AppError>> = stream::iter(ids)
        .map(|student_id| async move {
            match api.list_progress(&session.api_token, Some(student_id.as_str())).await {
                Ok(entries) => Ok(entries
                    .into_iter()
                    .filter(|e| e.student_id == student_id)
                    .collect()),
                Err(err) if err.is_not_found() => {
                    tracing::debug!(student = %student_id, "学生没有进度记录");
                    Ok(Vec::new())
                }
                Err(err) => Err(err),
            }
        })
        .buffered(FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut entries = Vec::new();
    for batch in batches {
        entries.extend(batch?);
    }
    Ok(entries)
}

async fn fetch_plans(
    api: &ApiClient,
    session: &Session,
    spec: &FilterSpec,
) -> Result<Vec<TeachingPlan>, AppError> {
    let plans = api
        .list_plans(&session.api_token, &upstream_query(spec))
        .await?;
    Ok(filter::filter_plans(&plans, spec))
}

/// 返回满足所有条件的记录子集，顺序与上游一致
pub async fn list_filtered(
    api: &ApiClient,
    session: &Session,
    kind: RecordKind,
    spec: &FilterSpec,
) -> Result<Records, AppError> {
    let records = match kind {
        RecordKind::Students => Records::Students(fetch_students(api, session, spec).await?),
        RecordKind::Plans => Records::Plans(fetch_plans(api, session, spec).await?),
        RecordKind::Teachers => {
            let teachers = api.list_teachers(&session.api_token).await?;
            Records::Teachers(filter::filter_teachers(&teachers, spec))
        }
        RecordKind::Progress => {
            // 进度的搜索条件匹配学生姓名或评语，不能先按姓名筛掉学生
            let student_spec = FilterSpec {
                search: None,
                ..spec.clone()
            };
            let students = fetch_students(api, session, &student_spec).await?;
            let entries = fetch_progress_for(api, session, &students).await?;
            Records::Progress(filter::filter_progress(&entries, &students, spec))
        }
    };

    tracing::debug!(?kind, count = records.len(), "过滤完成");
    Ok(records)
}

pub async fn dashboard(
    api: &ApiClient,
    session: &Session,
    spec: &FilterSpec,
) -> Result<DashboardStats, AppError> {
    let students = fetch_students(api, session, spec).await?;
    let plans = fetch_plans(api, session, spec).await?;
    let entries = fetch_progress_for(api, session, &students).await?;
    let entries = filter::filter_progress(&entries, &students, spec);
    Ok(DashboardStats::compute(&students, &plans, &entries))
}

// --- 2. 照片 (失败或超时只记录日志，不影响报表) ---

async fn fetch_photos(state: &AppState, students: &[Student]) -> Vec<Option<Photo>> {
    let limit = state.config.photo_timeout;
    let targets: Vec<(String, Option<String>)> = students
        .iter()
        .map(|s| (s.id.clone(), s.photo_url.clone()))
        .collect();

    stream::iter(targets)
        .map(|(student_id, url)| async move {
            let url = url?;
            let fetched = tokio::time::timeout(limit, state.api.fetch_photo(&url, limit)).await;
            let bytes = match fetched {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(err)) => {
                    tracing::warn!(student = %student_id, "照片获取失败: {}", err);
                    return None;
                }
                Err(_) => {
                    tracing::warn!(student = %student_id, "照片获取超时 ({:?})", limit);
                    return None;
                }
            };
            match Photo::decode(&bytes) {
                Ok(photo) => Some(photo),
                Err(err) => {
                    tracing::warn!(student = %student_id, "照片无法解码: {}", err);
                    None
                }
            }
        })
        // buffered 保证输出顺序与学生顺序一致
        .buffered(FETCH_CONCURRENCY)
        .collect()
        .await
}

// --- 3. 报表 ---

pub async fn generate_report(
    state: &AppState,
    session: &Session,
    kind: ReportKind,
    format: ReportFormat,
    spec: &FilterSpec,
    options: ReportOptions,
) -> Result<ReportFile, AppError> {
    let report_id = Uuid::new_v4();
    tracing::info!(
        %report_id,
        kind = kind.as_str(),
        format = format.extension(),
        user = %session.user_id,
        "开始生成报表"
    );

    // 取数快照：之后的生成只读这份数据
    let (data, photos) = match kind {
        ReportKind::Student => {
            // 搜索只作用于学生姓名；进度记录仅按日期区间筛选
            let students = fetch_students(&state.api, session, spec).await?;
            let entries = fetch_progress_for(&state.api, session, &students).await?;
            let entry_spec = FilterSpec {
                search: None,
                ..spec.clone()
            };
            let entries = filter::filter_progress(&entries, &students, &entry_spec);
            let photos = if options.include_photos && format == ReportFormat::Pdf {
                fetch_photos(state, &students).await
            } else {
                Vec::new()
            };
            (
                ReportData::Students(filter::join_progress(&students, &entries)),
                photos,
            )
        }
        ReportKind::Plan => (
            ReportData::Plans(fetch_plans(&state.api, session, spec).await?),
            Vec::new(),
        ),
    };

    let ctx = ReportContext {
        branding: state.config.branding.clone(),
        generated_at: chrono::Local::now().naive_local(),
    };
    let records = data.len();

    // 排版与编码是 CPU 密集操作，放到阻塞线程池
    let file = tokio::task::spawn_blocking(move || {
        report::render(&data, format, options, &photos, &ctx)
    })
    .await
    .map_err(|e| {
        tracing::error!(%report_id, "报表任务异常退出: {}", e);
        AppError::Internal
    })??;

    tracing::info!(
        %report_id,
        records,
        bytes = file.bytes.len(),
        filename = %file.filename,
        "报表生成完成"
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_parses_path_segments() {
        assert_eq!("Students".parse::<RecordKind>().unwrap(), RecordKind::Students);
        assert_eq!("teaching-plans".parse::<RecordKind>().unwrap(), RecordKind::Plans);
        assert!(matches!("grades".parse::<RecordKind>(), Err(AppError::NotFound(_))));
    }

    #[test]
    fn upstream_query_forwards_supported_filters() {
        let spec = FilterSpec {
            class: Some(crate::models::ClassLevel::Ukg),
            teacher_id: Some("t9".into()),
            search: Some("ab".into()),
            ..Default::default()
        };
        let query = upstream_query(&spec);
        assert_eq!(query.class, spec.class);
        assert_eq!(query.teacher_id.as_deref(), Some("t9"));
        assert!(query.plan_type.is_none());
    }
}
