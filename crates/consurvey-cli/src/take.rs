//! # Take Subcommand
//!
//! Runs the questionnaire on the terminal. The [`SurveyFlow`] machine
//! decides what to ask and when to submit; this module renders questions,
//! parses typed answers and performs the API calls the flow asks for.
//!
//! Typing `back` returns to the previous question. An empty line leaves
//! the question unanswered, which the flow refuses for required questions.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::Args;

use consurvey_client::{SelectionParams, SurveyClient};
use consurvey_core::{
    AnswerInput, AnswerValue, CouponOutcome, FlowPhase, FlowStep, GmContact, MarkAction,
    OptionAvailability, Question, QuestionType, ResponseId, SurveyFlow, SurveyId,
};

/// Arguments for the `consurvey take` subcommand.
#[derive(Args, Debug)]
pub struct TakeArgs {
    /// Survey to take.
    #[arg(long, default_value_t = 1)]
    pub survey: i64,

    /// Pre-selected convention, as its value or display name.
    #[arg(long)]
    pub convention: Option<String>,
}

/// Execute the take subcommand on stdin/stdout.
pub async fn run_take(args: &TakeArgs, client: &SurveyClient) -> Result<u8> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    run_take_with(args, client, &mut input, &mut out).await
}

/// Execute the take subcommand against arbitrary input and output.
///
/// Returns 0 once the flow completes and 1 if input ends first.
pub async fn run_take_with<R: BufRead, W: Write>(
    args: &TakeArgs,
    client: &SurveyClient,
    input: &mut R,
    out: &mut W,
) -> Result<u8> {
    let survey_id = SurveyId::new(args.survey);
    let params = SelectionParams {
        convention: args.convention.clone(),
        ..Default::default()
    };
    let view = client
        .surveys()
        .definition(survey_id, &params)
        .await
        .context("failed to load survey")?;

    writeln!(out, "{}", view.survey.title)?;
    if let Some(description) = &view.survey.description {
        writeln!(out, "{description}")?;
    }
    let mut flow = SurveyFlow::new(view.into_definition(), args.convention.as_deref());
    if let Some(m) = flow.preselected() {
        writeln!(out, "Convention: {}", m.display)?;
    }
    let mut contact_stored = false;

    loop {
        match flow.phase().clone() {
            FlowPhase::Answering | FlowPhase::Volunteering => {
                let Some(question) = flow.current().cloned() else {
                    bail!("survey has no questions to answer");
                };
                let (pos, total) = flow.progress();
                render_question(out, &question, pos, total)?;

                let Some(line) = read_line(input)? else {
                    writeln!(out, "Input closed; survey abandoned.")?;
                    return Ok(1);
                };
                if line.eq_ignore_ascii_case("back") {
                    flow.previous()?;
                    continue;
                }
                if !line.is_empty() {
                    match flow.answer_current(parse_answer(&question, &line)) {
                        Ok(true) => refresh(client, survey_id, args, &mut flow).await?,
                        Ok(false) => {}
                        Err(e) => {
                            writeln!(out, "  {e}")?;
                            continue;
                        }
                    }
                }

                match flow.next() {
                    Ok(FlowStep::Advanced) => {}
                    Ok(FlowStep::SubmitResponse { answers, contact }) => {
                        contact_stored |=
                            submit(client, survey_id, &mut flow, out, &answers, contact.as_ref())
                                .await?;
                    }
                    Ok(FlowStep::AttachToResponse {
                        response_id,
                        answers,
                        contact,
                    }) => {
                        attach(client, survey_id, &mut flow, out, response_id, &answers, &contact)
                            .await?;
                    }
                    Err(e) => writeln!(out, "  {e}")?,
                }
            }
            FlowPhase::CouponOffer { outcome: None } => {
                let response_id = flow.response_id().context("no response recorded")?;
                let outcome = client
                    .coupons()
                    .assign(response_id)
                    .await
                    .context("coupon allocation failed")?;
                flow.coupon_resolved(outcome)?;
            }
            FlowPhase::CouponOffer {
                outcome: Some(outcome),
            } => {
                let response_id = flow.response_id().context("no response recorded")?;
                if !offer_coupon(client, response_id, &outcome, input, out).await? {
                    writeln!(out, "Input closed.")?;
                    return Ok(1);
                }

                let can_volunteer =
                    !contact_stored && !flow.definition().contact_question_ids().is_empty();
                if can_volunteer
                    && confirm(input, out, "Would you like to run games as a GM? [y/N]")?
                {
                    flow.volunteer()?;
                } else {
                    flow.finish()?;
                }
            }
            FlowPhase::Submitting | FlowPhase::SubmittingVolunteer => {
                bail!("submission left in flight")
            }
            FlowPhase::Completed => {
                writeln!(out, "Thank you for taking the survey!")?;
                return Ok(0);
            }
        }
    }
}

/// Create the response. Returns whether a GM contact was stored with it.
async fn submit<W: Write>(
    client: &SurveyClient,
    survey_id: SurveyId,
    flow: &mut SurveyFlow,
    out: &mut W,
    answers: &[AnswerInput],
    contact: Option<&GmContact>,
) -> Result<bool> {
    let response_id = match client
        .surveys()
        .submit_response(survey_id, answers, None)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("response submission failed: {e}");
            writeln!(out, "  Could not submit your answers ({e}). Press Enter to retry.")?;
            flow.submission_failed()?;
            return Ok(false);
        }
    };
    tracing::info!(response_id = %response_id, "response submitted");
    flow.response_created(response_id)?;

    let Some(contact) = contact else {
        return Ok(false);
    };
    match client.surveys().submit_gm_interest(response_id, contact).await {
        Ok(_) => Ok(true),
        Err(e) => {
            tracing::warn!(response_id = %response_id, "GM interest not stored: {e}");
            Ok(false)
        }
    }
}

async fn attach<W: Write>(
    client: &SurveyClient,
    survey_id: SurveyId,
    flow: &mut SurveyFlow,
    out: &mut W,
    response_id: ResponseId,
    answers: &[AnswerInput],
    contact: &GmContact,
) -> Result<()> {
    let result = async {
        if !answers.is_empty() {
            client
                .surveys()
                .attach_answers(survey_id, response_id, answers)
                .await?;
        }
        client
            .surveys()
            .submit_gm_interest(response_id, contact)
            .await
    }
    .await;

    match result {
        Ok(_) => {
            flow.attach_completed()?;
            writeln!(out, "Thanks for volunteering! We'll be in touch.")?;
        }
        Err(e) => {
            tracing::warn!(response_id = %response_id, "volunteer answers not attached: {e}");
            writeln!(out, "  Could not save your details ({e}). Press Enter to retry.")?;
            flow.submission_failed()?;
        }
    }
    Ok(())
}

/// Show the coupon and record how it was taken. Returns false if input ended.
async fn offer_coupon<R: BufRead, W: Write>(
    client: &SurveyClient,
    response_id: ResponseId,
    outcome: &CouponOutcome,
    input: &mut R,
    out: &mut W,
) -> Result<bool> {
    let code = match outcome {
        CouponOutcome::Assigned { code } => code,
        CouponOutcome::Unavailable => {
            writeln!(
                out,
                "All coupon codes have been claimed. Thank you for your feedback!"
            )?;
            return Ok(true);
        }
    };

    writeln!(out, "Your coupon code: {code}")?;
    loop {
        writeln!(out, "Email it to you? Enter an address, or leave blank to skip:")?;
        let Some(email) = read_line(input)? else {
            return Ok(false);
        };
        if email.is_empty() {
            client.coupons().mark_used(code, MarkAction::Copied).await?;
            client
                .coupons()
                .record_delivery(response_id, code, None, false)
                .await?;
            return Ok(true);
        }
        match client.coupons().email(Some(response_id), code, &email).await {
            Ok(_) => {
                writeln!(out, "Sent to {email}.")?;
                return Ok(true);
            }
            Err(e) if e.status() == Some(422) => writeln!(out, "  {email:?} is not a valid address.")?,
            Err(e) => return Err(e.into()),
        }
    }
}

async fn refresh(
    client: &SurveyClient,
    survey_id: SurveyId,
    args: &TakeArgs,
    flow: &mut SurveyFlow,
) -> Result<()> {
    let mut params = SelectionParams::from(flow.selection());
    params.convention = args.convention.clone();
    let view = client
        .surveys()
        .definition(survey_id, &params)
        .await
        .context("failed to narrow survey")?;
    flow.replace_definition(view.into_definition());
    Ok(())
}

fn render_question<W: Write>(out: &mut W, q: &Question, pos: usize, total: usize) -> Result<()> {
    let marker = if q.is_required { " *" } else { "" };
    writeln!(out)?;
    writeln!(out, "[{pos}/{total}] {}{marker}", q.question_text)?;
    match q.question_type {
        QuestionType::Dropdown | QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            if q.availability == OptionAvailability::Unassigned {
                writeln!(out, "  (nothing listed for your selection; press Enter to continue)")?;
            }
            for (i, option) in q.options.iter().enumerate() {
                writeln!(out, "  {}) {}", i + 1, option.option_text)?;
            }
            if q.question_type == QuestionType::MultipleChoice {
                writeln!(out, "  (separate several choices with commas)")?;
            }
        }
        QuestionType::Rating => {
            let (min, max) = q.rating_bounds();
            writeln!(out, "  ({min}-{max})")?;
        }
        QuestionType::YesNo => writeln!(out, "  [y/n]")?,
        QuestionType::Date => writeln!(out, "  (YYYY-MM-DD)")?,
        _ => {
            if let Some(placeholder) = &q.placeholder_text {
                writeln!(out, "  ({placeholder})")?;
            }
        }
    }
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

/// Turn a typed line into an answer for `question`.
///
/// Choice questions accept a one-based option number or the option's text.
pub fn parse_answer(question: &Question, line: &str) -> AnswerValue {
    let line = line.trim();
    match question.question_type {
        QuestionType::Dropdown | QuestionType::SingleChoice => {
            AnswerValue::Text(pick_option(question, line))
        }
        QuestionType::MultipleChoice => AnswerValue::Choices(
            line.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| pick_option(question, s))
                .collect(),
        ),
        QuestionType::Rating | QuestionType::Number => line
            .parse::<i64>()
            .map(AnswerValue::from)
            .unwrap_or_else(|_| AnswerValue::from(line)),
        QuestionType::YesNo => match line.to_ascii_lowercase().as_str() {
            "y" | "yes" => AnswerValue::from("yes"),
            "n" | "no" => AnswerValue::from("no"),
            _ => AnswerValue::from(line),
        },
        _ => AnswerValue::from(line),
    }
}

fn pick_option(question: &Question, raw: &str) -> String {
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| question.options.get(i))
        .or_else(|| question.option_matching(raw))
        .map(|o| o.option_value.clone())
        .unwrap_or_else(|| raw.to_string())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut buf = String::new();
    if input.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> Result<bool> {
    writeln!(out, "{prompt}")?;
    Ok(read_line(input)?.is_some_and(|l| matches!(l.to_ascii_lowercase().as_str(), "y" | "yes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use consurvey_core::survey::default_survey;
    use consurvey_core::QuestionRole;

    fn question(role: QuestionRole) -> Question {
        default_survey()
            .question_by_role(role)
            .cloned()
            .unwrap()
    }

    #[test]
    fn dropdown_accepts_option_number() {
        let q = question(QuestionRole::Convention);
        assert_eq!(parse_answer(&q, "2"), AnswerValue::from("origins_game_fair"));
    }

    #[test]
    fn dropdown_maps_option_text_to_its_value() {
        let q = question(QuestionRole::Convention);
        assert_eq!(parse_answer(&q, " Gen Con "), AnswerValue::from("gen_con"));
        assert_eq!(parse_answer(&q, "pax unplugged"), AnswerValue::from("pax_unplugged"));
    }

    #[test]
    fn dropdown_passes_unknown_text_through() {
        let q = question(QuestionRole::Convention);
        assert_eq!(parse_answer(&q, "99"), AnswerValue::from("99"));
        assert_eq!(parse_answer(&q, "Big Bad Con"), AnswerValue::from("Big Bad Con"));
    }

    #[test]
    fn rating_parses_whole_numbers() {
        let q = question(QuestionRole::GmRating);
        assert_eq!(parse_answer(&q, "4"), AnswerValue::from(4i64));
        assert_eq!(parse_answer(&q, "four"), AnswerValue::from("four"));
    }

    #[test]
    fn yes_no_accepts_short_forms() {
        let q = question(QuestionRole::GmInterest);
        assert_eq!(parse_answer(&q, "Y"), AnswerValue::from("yes"));
        assert_eq!(parse_answer(&q, "n"), AnswerValue::from("no"));
        assert_eq!(parse_answer(&q, "maybe"), AnswerValue::from("maybe"));
    }

    #[test]
    fn multiple_choice_splits_on_commas() {
        let mut q = question(QuestionRole::Convention);
        q.question_type = QuestionType::MultipleChoice;
        assert_eq!(
            parse_answer(&q, "1, 3,,Dragon Con"),
            AnswerValue::Choices(vec![
                "gen_con".into(),
                "pax_unplugged".into(),
                "dragon_con".into()
            ])
        );
    }

    #[test]
    fn read_line_signals_end_of_input() {
        let mut input = std::io::Cursor::new("first\n");
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("first"));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }

    #[test]
    fn render_lists_numbered_options() {
        let q = question(QuestionRole::Convention);
        let mut out = Vec::new();
        render_question(&mut out, &q, 1, 6).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[1/6]"));
        assert!(text.contains("1) Gen Con"));
        assert!(text.contains("4) Dragon Con"));
    }
}
