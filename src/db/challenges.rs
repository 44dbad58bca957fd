//! Challenge, question and alternative CRUD operations

use rusqlite::{Connection, OptionalExtension, params, Row};
use serde::{Deserialize, Serialize};

use super::{completions, new_id};
use crate::error::TrailError;

/// Challenge row from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeRow {
    pub id: String,
    pub category_id: String,
}

impl ChallengeRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            category_id: row.get("category_id")?,
        })
    }
}

/// Question row with its alternatives loaded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionRow {
    pub id: String,
    pub challenge_id: String,
    pub question: String,
    pub module_id: Option<String>,
    pub position: i64,
    #[serde(default)]
    pub alternatives: Vec<AlternativeRow>,
}

impl QuestionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            challenge_id: row.get("challenge_id")?,
            question: row.get("question")?,
            module_id: row.get("module_id")?,
            position: row.get("position")?,
            alternatives: vec![],
        })
    }

    /// Id of the alternative marked correct, if any
    pub fn correct_alternative(&self) -> Option<&str> {
        self.alternatives.iter().find(|a| a.is_correct).map(|a| a.id.as_str())
    }
}

/// Answer alternative row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlternativeRow {
    pub id: String,
    pub question_id: String,
    pub text: String,
    pub is_correct: bool,
    pub position: i64,
}

impl AlternativeRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            question_id: row.get("question_id")?,
            text: row.get("text")?,
            is_correct: row.get::<_, i64>("is_correct")? != 0,
            position: row.get("position")?,
        })
    }
}

/// Alternative to insert for a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlternative {
    pub text: String,
    pub is_correct: bool,
}

// ============================================================================
// Challenges
// ============================================================================

/// Get challenge by ID
pub fn get_challenge(conn: &Connection, id: &str) -> Result<Option<ChallengeRow>, TrailError> {
    let challenge = conn
        .query_row(
            "SELECT id, category_id FROM challenges WHERE id = ?",
            params![id],
            |row| ChallengeRow::from_row(row),
        )
        .optional()?;
    Ok(challenge)
}

/// Get the challenge gating a category
pub fn challenge_for_category(conn: &Connection, category_id: &str) -> Result<Option<ChallengeRow>, TrailError> {
    let challenge = conn
        .query_row(
            "SELECT id, category_id FROM challenges WHERE category_id = ?",
            params![category_id],
            |row| ChallengeRow::from_row(row),
        )
        .optional()?;
    Ok(challenge)
}

/// List challenges, optionally restricted to the categories of one trail
pub fn list_challenges(conn: &Connection, trail_id: Option<&str>) -> Result<Vec<ChallengeRow>, TrailError> {
    let mut stmt = conn.prepare(
        "SELECT ch.id, ch.category_id FROM challenges ch
         JOIN categories c ON c.id = ch.category_id
         WHERE (?1 IS NULL OR c.trail_id = ?1)
         ORDER BY c.trail_id ASC, c.order_index ASC",
    )?;

    let challenges = stmt
        .query_map(params![trail_id], |row| ChallengeRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(challenges)
}

/// Insert a challenge for a category
pub fn create_challenge(conn: &Connection, category_id: &str) -> Result<ChallengeRow, TrailError> {
    let challenge = ChallengeRow {
        id: new_id(),
        category_id: category_id.to_string(),
    };

    conn.execute(
        "INSERT INTO challenges (id, category_id) VALUES (?, ?)",
        params![challenge.id, challenge.category_id],
    )?;

    Ok(challenge)
}

/// Delete a challenge with its questions and completions
pub fn delete_challenge(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    for question in questions_for_challenge(conn, id)? {
        delete_question(conn, &question.id)?;
    }
    completions::delete_challenge_completions(conn, id)?;

    let changes = conn.execute("DELETE FROM challenges WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

// ============================================================================
// Questions
// ============================================================================

/// Questions of a challenge in insertion order, with alternatives
pub fn questions_for_challenge(conn: &Connection, challenge_id: &str) -> Result<Vec<QuestionRow>, TrailError> {
    let mut stmt = conn.prepare(
        "SELECT id, challenge_id, question, module_id, position FROM challenge_questions
         WHERE challenge_id = ? ORDER BY position ASC, rowid ASC",
    )?;

    let rows = stmt
        .query_map(params![challenge_id], |row| QuestionRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut questions = Vec::with_capacity(rows.len());
    for mut question in rows {
        question.alternatives = alternatives_for_question(conn, &question.id)?;
        questions.push(question);
    }

    Ok(questions)
}

/// Get question by ID with alternatives
pub fn get_question(conn: &Connection, id: &str) -> Result<Option<QuestionRow>, TrailError> {
    let question = conn
        .query_row(
            "SELECT id, challenge_id, question, module_id, position FROM challenge_questions WHERE id = ?",
            params![id],
            |row| QuestionRow::from_row(row),
        )
        .optional()?;

    match question {
        Some(mut q) => {
            q.alternatives = alternatives_for_question(conn, &q.id)?;
            Ok(Some(q))
        }
        None => Ok(None),
    }
}

fn alternatives_for_question(conn: &Connection, question_id: &str) -> Result<Vec<AlternativeRow>, TrailError> {
    let mut stmt = conn.prepare(
        "SELECT id, question_id, text, is_correct, position FROM question_alternatives
         WHERE question_id = ? ORDER BY position ASC",
    )?;

    let alternatives = stmt
        .query_map(params![question_id], |row| AlternativeRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(alternatives)
}

/// Insert a question with its alternatives at the end of the challenge
pub fn create_question(
    conn: &Connection,
    challenge_id: &str,
    question: &str,
    module_id: Option<&str>,
    alternatives: &[NewAlternative],
) -> Result<QuestionRow, TrailError> {
    let position: i64 = conn.query_row(
        "SELECT COUNT(*) FROM challenge_questions WHERE challenge_id = ?",
        params![challenge_id],
        |row| row.get(0),
    )?;

    let id = new_id();
    conn.execute(
        "INSERT INTO challenge_questions (id, challenge_id, question, module_id, position) VALUES (?, ?, ?, ?, ?)",
        params![id, challenge_id, question, module_id, position],
    )?;
    replace_alternatives(conn, &id, alternatives)?;

    get_question(conn, &id)?
        .ok_or_else(|| TrailError::Internal("Question not found after insert".to_string()))
}

/// Persist text, challenge and module of an existing question
pub fn update_question(conn: &Connection, question: &QuestionRow) -> Result<bool, TrailError> {
    let changes = conn.execute(
        "UPDATE challenge_questions SET challenge_id = ?, question = ?, module_id = ? WHERE id = ?",
        params![question.challenge_id, question.question, question.module_id, question.id],
    )?;
    Ok(changes > 0)
}

/// Replace every alternative of a question
pub fn replace_alternatives(
    conn: &Connection,
    question_id: &str,
    alternatives: &[NewAlternative],
) -> Result<(), TrailError> {
    conn.execute("DELETE FROM question_alternatives WHERE question_id = ?", params![question_id])?;

    for (position, alternative) in alternatives.iter().enumerate() {
        conn.execute(
            "INSERT INTO question_alternatives (id, question_id, text, is_correct, position) VALUES (?, ?, ?, ?, ?)",
            params![new_id(), question_id, alternative.text, alternative.is_correct as i64, position as i64],
        )?;
    }

    Ok(())
}

/// Delete a question and its alternatives
pub fn delete_question(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    conn.execute("DELETE FROM question_alternatives WHERE question_id = ?", params![id])?;
    let changes = conn.execute("DELETE FROM challenge_questions WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

/// Delete every question that points at a module
pub fn delete_questions_for_module(conn: &Connection, module_id: &str) -> Result<usize, TrailError> {
    let ids: Vec<String> = {
        let mut stmt = conn.prepare("SELECT id FROM challenge_questions WHERE module_id = ?")?;
        let ids = stmt
            .query_map(params![module_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };

    for id in &ids {
        delete_question(conn, id)?;
    }

    Ok(ids.len())
}
