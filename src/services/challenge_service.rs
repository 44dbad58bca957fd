//! Challenge service - challenges, questions and scored responses
//!
//! Every category holds at most one challenge. Responding to a challenge
//! scores the answers; reaching the pass percentage records a
//! ChallengeCompletion, otherwise the modules linked to wrongly answered
//! questions come back as study suggestions.

use std::collections::HashSet;
use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::db::{
    categories, challenges, completions, modules, ChallengeRow, LearningDb, ModuleRow, NewAlternative, QuestionRow,
};
use crate::error::{FieldError, TrailError};

use super::events::{EventBus, LearningEvent};

pub const PASS_MESSAGE: &str = "Challenge completed successfully!";

/// Body of `POST /challenges`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeInput {
    pub category_id: String,
}

/// One alternative of a question body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeInput {
    pub text: String,
    pub is_correct: bool,
}

/// Body of `POST /challenge-questions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionInput {
    pub question: String,
    pub challenge_id: String,
    pub content_module_id: Option<String>,
    pub alternatives: Vec<AlternativeInput>,
}

/// Body of `PATCH /challenge-questions/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionInput {
    pub question: Option<String>,
    pub challenge_id: Option<String>,
    pub content_module_id: Option<String>,
    pub alternatives: Option<Vec<AlternativeInput>>,
}

/// One answer: question id and the chosen alternative id
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionResponse {
    pub id: String,
    pub response: String,
}

/// Body of `POST /challenges/{id}/respond`
#[derive(Debug, Clone, Deserialize)]
pub struct RespondInput {
    pub responses: Vec<QuestionResponse>,
}

/// Challenge with its questions and alternatives
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeDetail {
    pub challenge: ChallengeRow,
    pub questions: Vec<QuestionRow>,
}

/// Outcome of a scored response
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeResult {
    pub success: bool,
    pub percentage: f64,
    pub message: Option<String>,
    pub study_suggestions: Option<Vec<ModuleRow>>,
}

/// Challenge service for business logic
pub struct ChallengeService {
    db: Arc<LearningDb>,
    events: Arc<EventBus>,
    pass_percentage: f64,
}

impl ChallengeService {
    /// Create a new challenge service
    pub fn new(db: Arc<LearningDb>, events: Arc<EventBus>, pass_percentage: f64) -> Self {
        Self { db, events, pass_percentage }
    }

    // =========================================================================
    // Challenge Operations
    // =========================================================================

    /// Challenges with questions, optionally restricted to one trail
    pub fn list(&self, trail_id: Option<&str>) -> Result<Vec<ChallengeDetail>, TrailError> {
        self.db.with_conn(|conn| {
            challenges::list_challenges(conn, trail_id)?
                .into_iter()
                .map(|challenge| {
                    let questions = challenges::questions_for_challenge(conn, &challenge.id)?;
                    Ok(ChallengeDetail { challenge, questions })
                })
                .collect()
        })
    }

    /// Challenge with questions and alternatives
    pub fn get(&self, id: &str) -> Result<ChallengeDetail, TrailError> {
        self.db.with_conn(|conn| load_detail(conn, id))
    }

    /// Create the challenge of a category
    pub fn create(&self, input: CreateChallengeInput) -> Result<ChallengeRow, TrailError> {
        let challenge = self.db.transaction(|conn| {
            if categories::get_category(conn, &input.category_id)?.is_none() {
                return Err(TrailError::NotFound(format!(
                    "Category with id {} not found",
                    input.category_id
                )));
            }
            if challenges::challenge_for_category(conn, &input.category_id)?.is_some() {
                return Err(TrailError::InvalidInput(format!(
                    "Category {} already has a challenge",
                    input.category_id
                )));
            }
            challenges::create_challenge(conn, &input.category_id)
        })?;

        self.events.emit(LearningEvent::ChallengeCreated {
            id: challenge.id.clone(),
            category_id: challenge.category_id.clone(),
        });

        Ok(challenge)
    }

    /// Delete a challenge with its questions and completions
    pub fn delete(&self, id: &str) -> Result<(), TrailError> {
        if !self.db.transaction(|conn| challenges::delete_challenge(conn, id))? {
            return Err(not_found(id));
        }

        self.events.emit(LearningEvent::ChallengeDeleted { id: id.to_string() });
        Ok(())
    }

    // =========================================================================
    // Question Operations
    // =========================================================================

    /// Question by ID with alternatives
    pub fn get_question(&self, id: &str) -> Result<QuestionRow, TrailError> {
        self.db
            .with_conn(|conn| challenges::get_question(conn, id))?
            .ok_or_else(|| question_not_found(id))
    }

    /// Add a question to a challenge
    pub fn create_question(&self, input: CreateQuestionInput) -> Result<QuestionRow, TrailError> {
        let mut errors = Vec::new();
        let text = required(&mut errors, "question", &input.question);
        let alternatives = check_alternatives(&mut errors, &input.alternatives);
        if !errors.is_empty() {
            return Err(TrailError::Validation(errors));
        }
        ensure_single_correct(&alternatives)?;

        self.db.transaction(|conn| {
            let challenge = challenges::get_challenge(conn, &input.challenge_id)?
                .ok_or_else(|| not_found(&input.challenge_id))?;
            if let Some(module_id) = input.content_module_id.as_deref() {
                check_module_category(conn, module_id, &challenge)?;
            }

            challenges::create_question(
                conn,
                &challenge.id,
                &text,
                input.content_module_id.as_deref(),
                &alternatives,
            )
        })
    }

    /// Partially update a question; supplied alternatives replace the old ones
    pub fn update_question(&self, id: &str, input: UpdateQuestionInput) -> Result<QuestionRow, TrailError> {
        let mut errors = Vec::new();
        let text = input.question.as_deref().map(|q| required(&mut errors, "question", q));
        let alternatives = input
            .alternatives
            .as_deref()
            .map(|alts| check_alternatives(&mut errors, alts));
        if !errors.is_empty() {
            return Err(TrailError::Validation(errors));
        }
        if let Some(alternatives) = &alternatives {
            ensure_single_correct(alternatives)?;
        }

        self.db.transaction(|conn| {
            let mut question = challenges::get_question(conn, id)?.ok_or_else(|| question_not_found(id))?;

            if let Some(text) = text {
                question.question = text;
            }
            if let Some(challenge_id) = input.challenge_id {
                if challenges::get_challenge(conn, &challenge_id)?.is_none() {
                    return Err(not_found(&challenge_id));
                }
                question.challenge_id = challenge_id;
            }
            if let Some(module_id) = input.content_module_id {
                question.module_id = Some(module_id);
            }
            if let Some(module_id) = question.module_id.as_deref() {
                let challenge = challenges::get_challenge(conn, &question.challenge_id)?
                    .ok_or_else(|| not_found(&question.challenge_id))?;
                check_module_category(conn, module_id, &challenge)?;
            }

            challenges::update_question(conn, &question)?;
            if let Some(alternatives) = &alternatives {
                challenges::replace_alternatives(conn, id, alternatives)?;
            }

            challenges::get_question(conn, id)?.ok_or_else(|| question_not_found(id))
        })
    }

    /// Delete a question and its alternatives
    pub fn delete_question(&self, id: &str) -> Result<(), TrailError> {
        if !self.db.transaction(|conn| challenges::delete_question(conn, id))? {
            return Err(question_not_found(id));
        }
        Ok(())
    }

    // =========================================================================
    // Responding
    // =========================================================================

    /// Score `input` for `user_id`, recording a completion on a pass
    pub fn respond(&self, id: &str, user_id: &str, input: RespondInput) -> Result<ChallengeResult, TrailError> {
        let result = self.db.transaction(|conn| {
            let detail = load_detail(conn, id)?;
            let questions = &detail.questions;

            if questions.is_empty() {
                return Err(TrailError::InvalidInput(format!("Challenge {} has no questions", id)));
            }
            if input.responses.len() != questions.len() {
                return Err(TrailError::InvalidInput(
                    "The number of responses does not match the number of questions".to_string(),
                ));
            }

            let question_ids: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
            let response_ids: HashSet<&str> = input.responses.iter().map(|r| r.id.as_str()).collect();
            if question_ids != response_ids {
                return Err(TrailError::InvalidInput("Some question id is invalid".to_string()));
            }

            let mut correct = 0usize;
            let mut suggested: Vec<String> = Vec::new();
            for response in &input.responses {
                let Some(question) = questions.iter().find(|q| q.id == response.id) else {
                    continue;
                };
                if question.correct_alternative() == Some(response.response.as_str()) {
                    correct += 1;
                } else if let Some(module_id) = &question.module_id {
                    if !suggested.contains(module_id) {
                        suggested.push(module_id.clone());
                    }
                }
            }

            let percentage = correct as f64 / questions.len() as f64 * 100.0;

            if percentage >= self.pass_percentage {
                completions::record_challenge_completion(conn, user_id, id, None)?;
                return Ok(ChallengeResult {
                    success: true,
                    percentage,
                    message: Some(PASS_MESSAGE.to_string()),
                    study_suggestions: None,
                });
            }

            let mut study_suggestions = Vec::with_capacity(suggested.len());
            for module_id in &suggested {
                if let Some(module) = modules::get_module(conn, module_id)? {
                    study_suggestions.push(module);
                }
            }

            Ok(ChallengeResult {
                success: false,
                percentage,
                message: None,
                study_suggestions: Some(study_suggestions),
            })
        })?;

        info!(
            challenge_id = %id,
            user_id = %user_id,
            percentage = result.percentage,
            passed = result.success,
            "Challenge response scored"
        );
        self.events.emit(LearningEvent::ChallengeAttempted {
            user_id: user_id.to_string(),
            challenge_id: id.to_string(),
            percentage: result.percentage,
            passed: result.success,
        });

        Ok(result)
    }
}

fn load_detail(conn: &Connection, id: &str) -> Result<ChallengeDetail, TrailError> {
    let challenge = challenges::get_challenge(conn, id)?.ok_or_else(|| not_found(id))?;
    let questions = challenges::questions_for_challenge(conn, id)?;
    Ok(ChallengeDetail { challenge, questions })
}

/// A question's study module must exist and sit in the challenge's category
fn check_module_category(conn: &Connection, module_id: &str, challenge: &ChallengeRow) -> Result<(), TrailError> {
    let module = modules::get_module(conn, module_id)?
        .ok_or_else(|| TrailError::NotFound(format!("Module with id {} not found", module_id)))?;
    if module.category_id != challenge.category_id {
        return Err(TrailError::InvalidInput(
            "The content module must belong to the challenge's category".to_string(),
        ));
    }
    Ok(())
}

fn ensure_single_correct(alternatives: &[NewAlternative]) -> Result<(), TrailError> {
    if alternatives.iter().filter(|a| a.is_correct).count() > 1 {
        return Err(TrailError::InvalidInput(
            "A question must have only one correct alternative".to_string(),
        ));
    }
    Ok(())
}

fn check_alternatives(errors: &mut Vec<FieldError>, alternatives: &[AlternativeInput]) -> Vec<NewAlternative> {
    if alternatives.is_empty() {
        errors.push(FieldError::new("alternatives", "alternatives should not be empty"));
    }
    alternatives
        .iter()
        .enumerate()
        .map(|(i, a)| NewAlternative {
            text: required(errors, &format!("alternatives.{}.text", i), &a.text),
            is_correct: a.is_correct,
        })
        .collect()
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{} should not be empty", field)));
    }
    value.to_string()
}

fn not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Challenge with id {} not found", id))
}

fn question_not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Question with id {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::trails;

    struct Fixture {
        service: ChallengeService,
        db: Arc<LearningDb>,
        category_id: String,
        module_id: String,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(LearningDb::open_in_memory().unwrap());
        let (category_id, module_id) = db
            .with_conn(|conn| {
                let trail = trails::create_trail(conn, "Frontend")?;
                let category = categories::create_category(conn, &trail.id, "HTML")?;
                let module = modules::create_module(conn, &category.id, "Tags", "Basic tags")?;
                Ok((category.id, module.id))
            })
            .unwrap();

        Fixture {
            service: ChallengeService::new(db.clone(), Arc::new(EventBus::new()), 70.0),
            db,
            category_id,
            module_id,
        }
    }

    fn alt(text: &str, is_correct: bool) -> AlternativeInput {
        AlternativeInput { text: text.into(), is_correct }
    }

    fn question(f: &Fixture, challenge_id: &str, text: &str, module: bool) -> QuestionRow {
        f.service
            .create_question(CreateQuestionInput {
                question: text.into(),
                challenge_id: challenge_id.into(),
                content_module_id: module.then(|| f.module_id.clone()),
                alternatives: vec![alt("right", true), alt("wrong", false)],
            })
            .unwrap()
    }

    fn answer(q: &QuestionRow, correct: bool) -> QuestionResponse {
        let alt = q.alternatives.iter().find(|a| a.is_correct == correct).unwrap();
        QuestionResponse { id: q.id.clone(), response: alt.id.clone() }
    }

    fn challenge(f: &Fixture) -> ChallengeRow {
        f.service
            .create(CreateChallengeInput { category_id: f.category_id.clone() })
            .unwrap()
    }

    #[test]
    fn test_second_challenge_for_category_rejected() {
        let f = fixture();
        challenge(&f);
        let err = f
            .service
            .create(CreateChallengeInput { category_id: f.category_id.clone() })
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
    }

    #[test]
    fn test_question_rejects_two_correct_alternatives() {
        let f = fixture();
        let c = challenge(&f);
        let err = f
            .service
            .create_question(CreateQuestionInput {
                question: "Q".into(),
                challenge_id: c.id,
                content_module_id: None,
                alternatives: vec![alt("a", true), alt("b", true)],
            })
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
    }

    #[test]
    fn test_question_module_must_share_category() {
        let f = fixture();
        let c = challenge(&f);
        let other_module = f
            .db
            .with_conn(|conn| {
                let trail = trails::create_trail(conn, "Backend")?;
                let category = categories::create_category(conn, &trail.id, "SQL")?;
                modules::create_module(conn, &category.id, "Joins", "Joins")
            })
            .unwrap();

        let err = f
            .service
            .create_question(CreateQuestionInput {
                question: "Q".into(),
                challenge_id: c.id,
                content_module_id: Some(other_module.id),
                alternatives: vec![alt("a", true)],
            })
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
    }

    #[test]
    fn test_passing_records_completion() {
        let f = fixture();
        let c = challenge(&f);
        let q1 = question(&f, &c.id, "Q1", false);
        let q2 = question(&f, &c.id, "Q2", false);
        let q3 = question(&f, &c.id, "Q3", false);
        let q4 = question(&f, &c.id, "Q4", true);

        let result = f
            .service
            .respond(
                &c.id,
                "u1",
                RespondInput {
                    responses: vec![answer(&q1, true), answer(&q2, true), answer(&q3, true), answer(&q4, false)],
                },
            )
            .unwrap();

        assert!(result.success);
        assert_eq!(result.percentage, 75.0);
        assert_eq!(result.message.as_deref(), Some(PASS_MESSAGE));
        assert!(f
            .db
            .with_conn(|conn| completions::is_challenge_completed(conn, "u1", &c.id))
            .unwrap());
    }

    #[test]
    fn test_failing_suggests_distinct_modules() {
        let f = fixture();
        let c = challenge(&f);
        let q1 = question(&f, &c.id, "Q1", true);
        let q2 = question(&f, &c.id, "Q2", true);
        let q3 = question(&f, &c.id, "Q3", false);

        let result = f
            .service
            .respond(
                &c.id,
                "u1",
                RespondInput { responses: vec![answer(&q1, false), answer(&q2, false), answer(&q3, true)] },
            )
            .unwrap();

        assert!(!result.success);
        let suggestions = result.study_suggestions.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, f.module_id);
        assert!(!f
            .db
            .with_conn(|conn| completions::is_challenge_completed(conn, "u1", &c.id))
            .unwrap());
    }

    #[test]
    fn test_response_count_and_ids_checked() {
        let f = fixture();
        let c = challenge(&f);
        let q1 = question(&f, &c.id, "Q1", false);
        question(&f, &c.id, "Q2", false);

        let err = f
            .service
            .respond(&c.id, "u1", RespondInput { responses: vec![answer(&q1, true)] })
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));

        let bogus = QuestionResponse { id: "nope".into(), response: "x".into() };
        let err = f
            .service
            .respond(&c.id, "u1", RespondInput { responses: vec![answer(&q1, true), bogus] })
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
    }

    #[test]
    fn test_challenge_without_questions_cannot_be_answered() {
        let f = fixture();
        let c = challenge(&f);
        let err = f
            .service
            .respond(&c.id, "u1", RespondInput { responses: vec![] })
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
    }

    #[test]
    fn test_update_question_replaces_alternatives() {
        let f = fixture();
        let c = challenge(&f);
        let q = question(&f, &c.id, "Q1", false);

        let updated = f
            .service
            .update_question(
                &q.id,
                UpdateQuestionInput {
                    question: Some("Q1 revised".into()),
                    alternatives: Some(vec![alt("x", false), alt("y", false), alt("z", true)]),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.question, "Q1 revised");
        assert_eq!(updated.alternatives.len(), 3);
        assert_eq!(updated.alternatives[2].text, "z");
        assert!(updated.alternatives[2].is_correct);
    }
}
