//! View types for HTTP API boundary
//!
//! These types use camelCase serialization for the React client.
//! Row types in db/ use snake_case for database compatibility.
//!
//! Pattern:
//! - Service layer returns row and detail types (CategoryRow, ModuleDetail, etc.)
//! - HTTP layer converts to View types (CategoryView, ModuleDetailView, etc.)
//! - ts-rs generates camelCase TypeScript from View types
//!
//! Boolean coercion: SQLite stores bools as integers. Views expose proper bools.

use serde::Serialize;
use ts_rs::TS;

use crate::db::{
    AlternativeRow, CategoryOutline, CategoryRow, CompletionCounts, CompletionRow, DbStats, ModuleContentRow,
    ModuleRow, QuestionRow, TrailOutline, TrailRow, UserRow,
};
use crate::services::category_service::CategoryDetail;
use crate::services::challenge_service::{ChallengeDetail, ChallengeResult};
use crate::services::module_service::ModuleDetail;
use crate::services::progress::{CategoryProgress, ChallengeStatus, ModuleProgress, TrailProgress};

// ============================================================================
// Trail Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct TrailView {
    pub id: String,
    pub name: String,
}

impl From<TrailRow> for TrailView {
    fn from(row: TrailRow) -> Self {
        Self { id: row.id, name: row.name }
    }
}

/// Trail with its ordered categories
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct TrailOutlineView {
    pub id: String,
    pub name: String,
    pub categories: Vec<CategoryOutlineView>,
}

impl From<TrailOutline> for TrailOutlineView {
    fn from(outline: TrailOutline) -> Self {
        Self {
            id: outline.id,
            name: outline.name,
            categories: outline.categories.into_iter().map(CategoryOutlineView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct CategoryOutlineView {
    pub id: String,
    pub name: String,
    pub order: i32,
    pub modules: Vec<ModuleView>,
    pub challenge: Option<ChallengeRefView>,
}

impl From<CategoryOutline> for CategoryOutlineView {
    fn from(c: CategoryOutline) -> Self {
        Self {
            id: c.id,
            name: c.name,
            order: c.order_index as i32,
            modules: c.modules.into_iter().map(ModuleView::from).collect(),
            challenge: c.challenge_id.map(|id| ChallengeRefView { id }),
        }
    }
}

// ============================================================================
// Category Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct CategoryView {
    pub id: String,
    pub trail_id: String,
    pub name: String,
    pub order: i32,
}

impl From<CategoryRow> for CategoryView {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            trail_id: row.trail_id,
            name: row.name,
            order: row.order_index as i32,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct CategoryDetailView {
    pub id: String,
    pub trail_id: String,
    pub name: String,
    pub order: i32,
    pub modules: Vec<ModuleView>,
    pub challenge: Option<ChallengeRefView>,
}

impl From<CategoryDetail> for CategoryDetailView {
    fn from(detail: CategoryDetail) -> Self {
        Self {
            id: detail.category.id,
            trail_id: detail.category.trail_id,
            name: detail.category.name,
            order: detail.category.order_index as i32,
            modules: detail.modules.into_iter().map(ModuleView::from).collect(),
            challenge: detail.challenge_id.map(|id| ChallengeRefView { id }),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ChallengeRefView {
    pub id: String,
}

// ============================================================================
// Module Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ModuleView {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
}

impl From<ModuleRow> for ModuleView {
    fn from(row: ModuleRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            title: row.title,
            description: row.description,
        }
    }
}

/// Module with contents and the caller's completion flag
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ModuleDetailView {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub contents: Vec<ModuleContentView>,
    pub completed: bool,
}

impl From<ModuleDetail> for ModuleDetailView {
    fn from(detail: ModuleDetail) -> Self {
        Self {
            id: detail.module.id,
            category_id: detail.module.category_id,
            title: detail.module.title,
            description: detail.module.description,
            contents: detail.contents.into_iter().map(ModuleContentView::from).collect(),
            completed: detail.completed,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ModuleContentView {
    pub id: String,
    pub module_id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub description: String,
    pub url: String,
}

impl From<ModuleContentRow> for ModuleContentView {
    fn from(row: ModuleContentRow) -> Self {
        Self {
            id: row.id,
            module_id: row.module_id,
            content_type: row.content_type,
            description: row.description,
            url: row.url,
        }
    }
}

// ============================================================================
// Challenge Views
// ============================================================================

/// Challenge as administrators see it, correct answers included
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ChallengeView {
    pub id: String,
    pub category_id: String,
    pub questions: Vec<QuestionView>,
}

impl From<ChallengeDetail> for ChallengeView {
    fn from(detail: ChallengeDetail) -> Self {
        Self {
            id: detail.challenge.id,
            category_id: detail.challenge.category_id,
            questions: detail.questions.into_iter().map(QuestionView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct QuestionView {
    pub id: String,
    pub challenge_id: String,
    pub question: String,
    pub content_module_id: Option<String>,
    pub alternatives: Vec<AlternativeView>,
}

impl From<QuestionRow> for QuestionView {
    fn from(row: QuestionRow) -> Self {
        Self {
            id: row.id,
            challenge_id: row.challenge_id,
            question: row.question,
            content_module_id: row.module_id,
            alternatives: row.alternatives.into_iter().map(AlternativeView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct AlternativeView {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

impl From<AlternativeRow> for AlternativeView {
    fn from(row: AlternativeRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            is_correct: row.is_correct,
        }
    }
}

/// Challenge as a learner sees it before answering: no correctness flags
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ChallengeToRespondView {
    pub id: String,
    pub category_id: String,
    pub questions: Vec<QuestionToRespondView>,
}

impl From<ChallengeDetail> for ChallengeToRespondView {
    fn from(detail: ChallengeDetail) -> Self {
        Self {
            id: detail.challenge.id,
            category_id: detail.challenge.category_id,
            questions: detail
                .questions
                .into_iter()
                .map(|q| QuestionToRespondView {
                    id: q.id,
                    question: q.question,
                    alternatives: q
                        .alternatives
                        .into_iter()
                        .map(|a| AlternativeToRespondView { id: a.id, text: a.text })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct QuestionToRespondView {
    pub id: String,
    pub question: String,
    pub alternatives: Vec<AlternativeToRespondView>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct AlternativeToRespondView {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ChallengeResultView {
    pub success: bool,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub study_suggestions: Option<Vec<ModuleView>>,
}

impl From<ChallengeResult> for ChallengeResultView {
    fn from(result: ChallengeResult) -> Self {
        Self {
            success: result.success,
            percentage: result.percentage,
            message: result.message,
            study_suggestions: result
                .study_suggestions
                .map(|modules| modules.into_iter().map(ModuleView::from).collect()),
        }
    }
}

// ============================================================================
// Progress Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct TrailProgressView {
    pub trail: TrailProgressBodyView,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct TrailProgressBodyView {
    pub id: String,
    pub name: String,
    pub categories: Vec<CategoryProgressView>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct CategoryProgressView {
    pub id: String,
    pub name: String,
    pub order: i32,
    pub modules: Vec<ModuleProgressView>,
    pub challenge: Option<ChallengeStatusView>,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ModuleProgressView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct ChallengeStatusView {
    pub id: String,
    pub completed: bool,
}

impl From<TrailProgress> for TrailProgressView {
    fn from(progress: TrailProgress) -> Self {
        Self {
            trail: TrailProgressBodyView {
                id: progress.trail.id,
                name: progress.trail.name,
                categories: progress.trail.categories.into_iter().map(CategoryProgressView::from).collect(),
            },
        }
    }
}

impl From<CategoryProgress> for CategoryProgressView {
    fn from(c: CategoryProgress) -> Self {
        Self {
            id: c.id,
            name: c.name,
            order: c.order as i32,
            modules: c.modules.into_iter().map(ModuleProgressView::from).collect(),
            challenge: c.challenge.map(ChallengeStatusView::from),
            blocked: c.blocked,
        }
    }
}

impl From<ModuleProgress> for ModuleProgressView {
    fn from(m: ModuleProgress) -> Self {
        Self {
            id: m.id,
            title: m.title,
            description: m.description,
            completed: m.completed,
        }
    }
}

impl From<ChallengeStatus> for ChallengeStatusView {
    fn from(s: ChallengeStatus) -> Self {
        Self { id: s.id, completed: s.completed }
    }
}

// ============================================================================
// User & Completion Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct UserView {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub birth_date: String,
    pub role: String,
    pub created_at: String,
}

/// Totals shown on the learner's profile
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct CompletionCountsView {
    #[ts(type = "number")]
    pub completed_modules: u64,
    #[ts(type = "number")]
    pub completed_challenges: u64,
}

impl From<CompletionCounts> for CompletionCountsView {
    fn from(counts: CompletionCounts) -> Self {
        Self {
            completed_modules: counts.modules,
            completed_challenges: counts.challenges,
        }
    }
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            birth_date: row.birth_date,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

/// A module or challenge completion; `targetId` is the module or challenge id
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct CompletionView {
    pub id: String,
    pub user_id: String,
    pub target_id: String,
    pub completed_at: String,
}

impl From<CompletionRow> for CompletionView {
    fn from(row: CompletionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            target_id: row.target_id,
            completed_at: row.completed_at,
        }
    }
}

// ============================================================================
// Health View
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../frontend/src/types/generated/")]
pub struct HealthView {
    pub status: String,
    pub version: String,
    #[ts(type = "number")]
    pub trails: u64,
    #[ts(type = "number")]
    pub categories: u64,
    #[ts(type = "number")]
    pub modules: u64,
    #[ts(type = "number")]
    pub challenges: u64,
    #[ts(type = "number")]
    pub users: u64,
}

impl From<DbStats> for HealthView {
    fn from(stats: DbStats) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trails: stats.trail_count,
            categories: stats.category_count,
            modules: stats.module_count,
            challenges: stats.challenge_count,
            users: stats.user_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_view_shape() {
        let progress = TrailProgress {
            trail: crate::services::progress::TrailProgressBody {
                id: "t".into(),
                name: "Frontend".into(),
                categories: vec![CategoryProgress {
                    id: "c".into(),
                    name: "HTML".into(),
                    order: 1,
                    modules: vec![],
                    challenge: None,
                    blocked: false,
                }],
            },
        };

        let json = serde_json::to_value(TrailProgressView::from(progress)).unwrap();
        assert_eq!(json["trail"]["categories"][0]["order"], 1);
        assert!(json["trail"]["categories"][0]["challenge"].is_null());
        assert_eq!(json["trail"]["categories"][0]["blocked"], false);
    }

    #[test]
    fn test_failed_result_omits_message() {
        let view = ChallengeResultView::from(ChallengeResult {
            success: false,
            percentage: 50.0,
            message: None,
            study_suggestions: Some(vec![]),
        });
        let json = serde_json::to_value(view).unwrap();
        assert!(json.get("message").is_none());
        assert!(json["studySuggestions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_content_type_field_name() {
        let view = ModuleContentView::from(ModuleContentRow {
            id: "1".into(),
            module_id: "m".into(),
            content_type: "video".into(),
            description: "d".into(),
            url: "https://example.com".into(),
        });
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["moduleId"], "m");
    }
}
