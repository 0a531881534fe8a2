//! Response and answer persistence.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use consurvey_core::{
    Answer, AnswerId, AnswerInput, QuestionId, ResponseId, ResponseWithAnswers, SurveyId,
    SurveyResponse, ValidationError,
};

use crate::store::{ClearedResponses, NewResponse, StoreError};

const ANSWER_COLUMNS: &str = "id, response_id, question_id, answer_text, answer_value, created_at";

pub async fn response_survey(pool: &PgPool, id: ResponseId) -> Result<Option<SurveyId>, sqlx::Error> {
    let survey: Option<i64> = sqlx::query_scalar("SELECT survey_id FROM survey_responses WHERE id = $1")
        .bind(id.get())
        .fetch_optional(pool)
        .await?;
    Ok(survey.map(SurveyId::new))
}

/// Insert a response and its answers in one transaction.
pub async fn insert_response(pool: &PgPool, new: &NewResponse) -> Result<ResponseId, StoreError> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM surveys WHERE id = $1")
        .bind(new.survey_id.get())
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(StoreError::NotFound(format!("survey {}", new.survey_id)));
    }
    check_questions(&mut tx, new.survey_id, &new.answers).await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO survey_responses (survey_id, respondent_email, respondent_name, ip_address, user_agent)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(new.survey_id.get())
    .bind(&new.respondent.email)
    .bind(&new.respondent.name)
    .bind(&new.ip_address)
    .bind(&new.user_agent)
    .fetch_one(&mut *tx)
    .await?;
    let id = ResponseId::new(id);

    insert_answers(&mut tx, id, &new.answers).await?;
    tx.commit().await?;
    Ok(id)
}

/// Attach answers for questions the response has not answered yet.
///
/// `None` when the response is not part of `survey`. The response row is
/// locked so concurrent attaches for one response serialize.
pub async fn attach_answers(
    pool: &PgPool,
    survey: SurveyId,
    response: ResponseId,
    rows: &[AnswerInput],
) -> Result<Option<u64>, StoreError> {
    let mut tx = pool.begin().await?;

    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM survey_responses WHERE id = $1 AND survey_id = $2 FOR UPDATE",
    )
    .bind(response.get())
    .bind(survey.get())
    .fetch_optional(&mut *tx)
    .await?;
    if found.is_none() {
        return Ok(None);
    }
    check_questions(&mut tx, survey, rows).await?;

    let answered: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT question_id FROM answers WHERE response_id = $1")
            .bind(response.get())
            .fetch_all(&mut *tx)
            .await?;
    let answered: BTreeSet<i64> = answered.into_iter().collect();
    let fresh: Vec<AnswerInput> = rows
        .iter()
        .filter(|r| !answered.contains(&r.question_id.get()))
        .cloned()
        .collect();

    insert_answers(&mut tx, response, &fresh).await?;
    tx.commit().await?;
    Ok(Some(fresh.len() as u64))
}

/// The newest `limit` responses of a survey with their answers.
pub async fn list_responses(
    pool: &PgPool,
    survey: SurveyId,
    limit: u32,
) -> Result<Vec<ResponseWithAnswers>, sqlx::Error> {
    let responses = sqlx::query_as::<_, ResponseRow>(
        "SELECT id, survey_id, respondent_email, respondent_name, submitted_at, ip_address,
                user_agent, metadata
         FROM survey_responses WHERE survey_id = $1
         ORDER BY submitted_at DESC, id DESC LIMIT $2",
    )
    .bind(survey.get())
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    let ids: Vec<i64> = responses.iter().map(|r| r.id).collect();
    let answers = sqlx::query_as::<_, AnswerRow>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE response_id = ANY($1) ORDER BY id"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_response: HashMap<i64, Vec<Answer>> = HashMap::new();
    for row in answers {
        by_response.entry(row.response_id).or_default().push(row.into_record());
    }

    Ok(responses
        .into_iter()
        .map(|r| {
            let answers = by_response.remove(&r.id).unwrap_or_default();
            ResponseWithAnswers {
                response: r.into_record(),
                answers,
            }
        })
        .collect())
}

pub async fn answers_for_questions(
    pool: &PgPool,
    ids: &[QuestionId],
) -> Result<Vec<Answer>, sqlx::Error> {
    let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    let rows = sqlx::query_as::<_, AnswerRow>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE question_id = ANY($1) ORDER BY id"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(AnswerRow::into_record).collect())
}

/// Delete every answer and response.
///
/// GM interest and deliveries cascade; coupon codes lose their response link.
pub async fn clear(pool: &PgPool) -> Result<ClearedResponses, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let answers = sqlx::query("DELETE FROM answers").execute(&mut *tx).await?;
    let responses = sqlx::query("DELETE FROM survey_responses").execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(ClearedResponses {
        answers: answers.rows_affected(),
        responses: responses.rows_affected(),
    })
}

pub async fn delete_answers_for_questions(
    pool: &PgPool,
    ids: &[QuestionId],
) -> Result<u64, sqlx::Error> {
    let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    let result = sqlx::query("DELETE FROM answers WHERE question_id = ANY($1)")
        .bind(&ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn check_questions(
    tx: &mut Transaction<'_, Postgres>,
    survey: SurveyId,
    rows: &[AnswerInput],
) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }
    let wanted: Vec<i64> = rows.iter().map(|r| r.question_id.get()).collect();
    let known: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM questions WHERE survey_id = $1 AND id = ANY($2)")
            .bind(survey.get())
            .bind(&wanted)
            .fetch_all(&mut **tx)
            .await?;
    match rows.iter().find(|r| !known.contains(&r.question_id.get())) {
        Some(unknown) => Err(ValidationError::UnknownQuestion(unknown.question_id).into()),
        None => Ok(()),
    }
}

async fn insert_answers(
    tx: &mut Transaction<'_, Postgres>,
    response: ResponseId,
    rows: &[AnswerInput],
) -> Result<(), sqlx::Error> {
    for row in rows {
        sqlx::query(
            "INSERT INTO answers (response_id, question_id, answer_text, answer_value)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(response.get())
        .bind(row.question_id.get())
        .bind(&row.answer_text)
        .bind(&row.answer_value)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: i64,
    survey_id: i64,
    respondent_email: Option<String>,
    respondent_name: Option<String>,
    submitted_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: serde_json::Value,
}

impl ResponseRow {
    fn into_record(self) -> SurveyResponse {
        SurveyResponse {
            id: ResponseId::new(self.id),
            survey_id: SurveyId::new(self.survey_id),
            respondent_email: self.respondent_email,
            respondent_name: self.respondent_name,
            submitted_at: self.submitted_at,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: self.metadata,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    id: i64,
    response_id: i64,
    question_id: i64,
    answer_text: Option<String>,
    answer_value: Option<String>,
    created_at: DateTime<Utc>,
}

impl AnswerRow {
    fn into_record(self) -> Answer {
        Answer {
            id: AnswerId::new(self.id),
            response_id: ResponseId::new(self.response_id),
            question_id: QuestionId::new(self.question_id),
            answer_text: self.answer_text,
            answer_value: self.answer_value,
            created_at: self.created_at,
        }
    }
}
