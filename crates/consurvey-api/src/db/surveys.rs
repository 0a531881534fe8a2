//! Survey, question and option persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use consurvey_core::{
    OptionAvailability, OptionId, Question, QuestionId, QuestionOption, QuestionRole, QuestionType,
    Survey, SurveyDefinition, SurveyId,
};

use super::parse_column;

const QUESTION_COLUMNS: &str = "id, survey_id, question_text, question_type, is_required, \
     display_order, placeholder_text, validation_rules, role";
const OPTION_COLUMNS: &str = "id, question_id, option_text, option_value, display_order";

/// Load a survey with its questions and their options.
pub async fn load_definition(
    pool: &PgPool,
    id: SurveyId,
) -> Result<Option<SurveyDefinition>, sqlx::Error> {
    let Some(survey) = sqlx::query_as::<_, SurveyRow>(
        "SELECT id, title, description, is_active, settings, created_at, updated_at
         FROM surveys WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let questions = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE survey_id = $1 ORDER BY display_order, id"
    ))
    .bind(id.get())
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, OptionRow>(
        "SELECT o.id, o.question_id, o.option_text, o.option_value, o.display_order
         FROM question_options o JOIN questions q ON q.id = o.question_id
         WHERE q.survey_id = $1 ORDER BY o.display_order, o.id",
    )
    .bind(id.get())
    .fetch_all(pool)
    .await?;
    let options: Vec<QuestionOption> = options.into_iter().map(OptionRow::into_record).collect();

    let questions = questions
        .into_iter()
        .map(|row| {
            let mut question = row.into_record();
            question.options = options
                .iter()
                .filter(|o| o.question_id == question.id)
                .cloned()
                .collect();
            question
        })
        .collect();

    Ok(Some(SurveyDefinition::new(survey.into_record(), questions)))
}

/// Load one question with its options.
pub async fn load_question(pool: &PgPool, id: QuestionId) -> Result<Option<Question>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id.get())
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let options = sqlx::query_as::<_, OptionRow>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options WHERE question_id = $1 ORDER BY display_order, id"
    ))
    .bind(id.get())
    .fetch_all(pool)
    .await?;

    let mut question = row.into_record();
    question.options = options.into_iter().map(OptionRow::into_record).collect();
    Ok(Some(question))
}

/// Load an option and the role of the question it belongs to.
pub async fn load_option_with_role(
    pool: &PgPool,
    id: OptionId,
) -> Result<Option<(QuestionOption, Option<QuestionRole>)>, sqlx::Error> {
    let row = sqlx::query_as::<_, OptionRoleRow>(
        "SELECT o.id, o.question_id, o.option_text, o.option_value, o.display_order, q.role
         FROM question_options o JOIN questions q ON q.id = o.question_id
         WHERE o.id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| {
        let role = r.role.as_deref().and_then(|raw| {
            raw.parse::<QuestionRole>()
                .map_err(|_| tracing::warn!(option_id = r.id, role = raw, "unknown question role"))
                .ok()
        });
        let option = OptionRow {
            id: r.id,
            question_id: r.question_id,
            option_text: r.option_text,
            option_value: r.option_value,
            display_order: r.display_order,
        };
        (option.into_record(), role)
    }))
}

/// Append an option after the question's last one.
pub async fn insert_option(
    pool: &PgPool,
    question_id: QuestionId,
    text: &str,
    value: &str,
) -> Result<QuestionOption, sqlx::Error> {
    let row = sqlx::query_as::<_, OptionRow>(&format!(
        "INSERT INTO question_options (question_id, option_text, option_value, display_order)
         SELECT $1, $2, $3, COALESCE(MAX(display_order), 0) + 1
         FROM question_options WHERE question_id = $1
         RETURNING {OPTION_COLUMNS}"
    ))
    .bind(question_id.get())
    .bind(text)
    .bind(value)
    .fetch_one(pool)
    .await?;

    Ok(row.into_record())
}

/// Change an option's display text.
pub async fn update_option_text(
    pool: &PgPool,
    id: OptionId,
    text: &str,
) -> Result<Option<QuestionOption>, sqlx::Error> {
    let row = sqlx::query_as::<_, OptionRow>(&format!(
        "UPDATE question_options SET option_text = $1 WHERE id = $2 RETURNING {OPTION_COLUMNS}"
    ))
    .bind(text)
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(OptionRow::into_record))
}

/// Delete an option. Assignments referencing it cascade.
pub async fn delete_option(pool: &PgPool, id: OptionId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM question_options WHERE id = $1")
        .bind(id.get())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct SurveyRow {
    id: i64,
    title: String,
    description: Option<String>,
    is_active: bool,
    settings: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SurveyRow {
    fn into_record(self) -> Survey {
        Survey {
            id: SurveyId::new(self.id),
            title: self.title,
            description: self.description,
            is_active: self.is_active,
            settings: self.settings,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    survey_id: i64,
    question_text: String,
    question_type: String,
    is_required: bool,
    display_order: i32,
    placeholder_text: Option<String>,
    validation_rules: serde_json::Value,
    role: Option<String>,
}

impl QuestionRow {
    fn into_record(self) -> Question {
        let question_type =
            parse_column("questions", self.id, &self.question_type, QuestionType::ShortText);
        let role = self.role.as_deref().and_then(|raw| {
            raw.parse::<QuestionRole>()
                .map_err(|_| tracing::warn!(question_id = self.id, role = raw, "unknown question role"))
                .ok()
        });
        Question {
            id: QuestionId::new(self.id),
            survey_id: SurveyId::new(self.survey_id),
            question_text: self.question_text,
            question_type,
            is_required: self.is_required,
            display_order: self.display_order,
            placeholder_text: self.placeholder_text,
            validation_rules: self.validation_rules,
            role,
            options: Vec::new(),
            availability: OptionAvailability::Unfiltered,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: i64,
    question_id: i64,
    option_text: String,
    option_value: String,
    display_order: i32,
}

impl OptionRow {
    fn into_record(self) -> QuestionOption {
        QuestionOption {
            id: OptionId::new(self.id),
            question_id: QuestionId::new(self.question_id),
            option_text: self.option_text,
            option_value: self.option_value,
            display_order: self.display_order,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OptionRoleRow {
    id: i64,
    question_id: i64,
    option_text: String,
    option_value: String,
    display_order: i32,
    role: Option<String>,
}
