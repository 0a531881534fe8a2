//! CSV export of responses and GM interest records.
//!
//! Every field is quoted and embedded quotes are doubled, so the output
//! opens cleanly in spreadsheet tools regardless of content.

use std::collections::BTreeMap;

use crate::answer::ResponseWithAnswers;
use crate::gm_interest::GmInterestRow;
use crate::identity::QuestionId;
use crate::question::Question;

/// Quote one CSV field.
pub fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn line<S: AsRef<str>>(fields: impl IntoIterator<Item = S>) -> String {
    fields
        .into_iter()
        .map(|f| quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pivot responses into one row per response and one column per question.
///
/// Multiple answer rows for the same question are joined with `"; "`.
pub fn responses_csv(questions: &[Question], responses: &[ResponseWithAnswers]) -> String {
    let mut header = vec![
        "Response ID".to_string(),
        "Submitted At".to_string(),
        "Email".to_string(),
        "Name".to_string(),
    ];
    header.extend(questions.iter().map(|q| q.question_text.clone()));

    let mut out = line(&header);
    out.push('\n');

    for r in responses {
        let mut by_question: BTreeMap<QuestionId, Vec<&str>> = BTreeMap::new();
        for a in &r.answers {
            let shown = a.answer_text.as_deref().or(a.answer_value.as_deref());
            if let Some(v) = shown {
                by_question.entry(a.question_id).or_default().push(v);
            }
        }

        let mut row = vec![
            r.response.id.to_string(),
            r.response.submitted_at.to_rfc3339(),
            r.response.respondent_email.clone().unwrap_or_default(),
            r.response.respondent_name.clone().unwrap_or_default(),
        ];
        row.extend(questions.iter().map(|q| {
            by_question
                .get(&q.id)
                .map(|vs| vs.join("; "))
                .unwrap_or_default()
        }));
        out.push_str(&line(&row));
        out.push('\n');
    }
    out
}

/// One row per GM volunteer.
pub fn gm_interest_csv(rows: &[GmInterestRow]) -> String {
    let mut out = line(["Response ID", "First Name", "Last Name", "Email", "Submitted At"]);
    out.push('\n');
    for r in rows {
        out.push_str(&line([
            r.interest.response_id.to_string(),
            r.interest.first_name.clone(),
            r.interest.last_name.clone(),
            r.interest.email.clone(),
            r.submitted_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{Answer, SurveyResponse};
    use crate::gm_interest::GmInterest;
    use crate::identity::{AnswerId, GmInterestId, ResponseId, SurveyId};
    use crate::survey::default_survey;
    use chrono::{TimeZone, Utc};

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn quote_doubles_embedded_quotes() {
        assert_eq!(quote(r#"say "hi""#), r#""say ""hi""""#);
        assert_eq!(quote("a,b"), "\"a,b\"");
    }

    #[test]
    fn responses_pivot_one_column_per_question() {
        let def = default_survey();
        let questions = &def.questions[..2];
        let answer = |id, q: &Question, text: &str| Answer {
            id: AnswerId::new(id),
            response_id: ResponseId::new(7),
            question_id: q.id,
            answer_text: Some(text.into()),
            answer_value: None,
            created_at: at(),
        };
        let response = ResponseWithAnswers {
            response: SurveyResponse {
                id: ResponseId::new(7),
                survey_id: SurveyId::new(1),
                respondent_email: None,
                respondent_name: Some("Pat".into()),
                submitted_at: at(),
                ip_address: None,
                user_agent: None,
                metadata: serde_json::json!({}),
            },
            answers: vec![
                answer(1, &questions[0], "gen_con"),
                answer(2, &questions[1], "Ana"),
                answer(3, &questions[1], "Ben"),
            ],
        };

        let csv = responses_csv(questions, &[response]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            r#""Response ID","Submitted At","Email","Name","Which convention are you attending?","Who was your GM?""#
        );
        assert_eq!(
            lines[1],
            r#""7","2026-08-01T12:00:00+00:00","","Pat","gen_con","Ana; Ben""#
        );
    }

    #[test]
    fn gm_interest_rows_include_submission_time() {
        let rows = [GmInterestRow {
            interest: GmInterest {
                id: GmInterestId::new(1),
                response_id: ResponseId::new(3),
                first_name: "Ada".into(),
                last_name: "O\"Neil".into(),
                email: "ada@example.com".into(),
                created_at: at(),
            },
            submitted_at: Some(at()),
        }];
        let csv = gm_interest_csv(&rows);
        assert!(csv.starts_with("\"Response ID\",\"First Name\""));
        assert!(csv.contains(r#""3","Ada","O""Neil","ada@example.com","2026-08-01T12:00:00+00:00""#));
    }
}
