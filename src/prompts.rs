//! The prompts sent for coaching features, rendered from named templates so
//! deployments can override the wording with `*.hbs` files.

use serde::Serialize;

use crate::config::TemplateConfig;
use crate::records::{Member, OneOnOne, SessionRecord};
use crate::template::{Template, TemplateEngine, TemplateError};

pub const COACHING_ADVICE: &str = "coaching_advice";
pub const MANAGEMENT_STYLE: &str = "management_style";
pub const NEXT_SESSION_QUESTIONS: &str = "next_session_questions";
pub const OVERALL_MANAGEMENT_STYLE: &str = "overall_management_style";

const NO_NEXT_ACTIONS: &str = "None noted";
const SESSION_EXCERPT_CHARS: usize = 200;

const COACHING_ADVICE_TEMPLATE: &str = r#"
# One-on-one meeting analysis

## Member
- Name: {{memberName}}
- Role: {{jobTitle}}

## Meeting record
- Date: {{date}}
- Conversation:
{{content}}
- Next actions:
{{nextActions}}

## Instructions
Analyze the meeting record above and provide advice covering:

1. A summary of the key points (3-5 bullet points)
2. An analysis from a coaching perspective (the member's state, motivation and skill level)
3. Concrete advice for the manager (questions or approaches to try in the next one-on-one)
4. A leadership style recommendation based on Situational Leadership theory

Answer concisely in Markdown.
"#;

const MANAGEMENT_STYLE_TEMPLATE: &str = r#"
# Management style analysis

## Member
- Name: {{memberName}}
- Role: {{jobTitle}}
- One-on-one sessions: {{sessionCount}}

## Session summaries
{{#each sessions}}
Date: {{date}}
Content: {{excerpt content 200}}
{{/each}}

## Instructions
Analyze the one-on-one records above and evaluate this manager's style from these angles:

1. Communication (directive, inquiring or listening)
2. Balance of feedback (positive versus improvement points)
3. Leadership tendency (directive or supportive)
4. Strengths and opportunities for improvement
5. Three concrete pieces of advice for improving the management style

Answer concisely in Markdown.
"#;

const NEXT_SESSION_QUESTIONS_TEMPLATE: &str = r#"
# Questions for the next one-on-one

## Member
- Name: {{memberName}}
- Role: {{jobTitle}}

## Most recent meeting
- Date: {{date}}
- Conversation:
{{content}}
- Next actions:
{{nextActions}}

## Instructions
Based on the meeting record above, write effective questions for the next one-on-one.
Suggest 3-5 questions in each of these categories:

1. Follow-up on the previous meeting
2. Career development
3. Challenges and obstacles
4. Motivation and engagement
5. Future outlook

Favor open coaching questions that cannot be answered with yes or no and that invite self-reflection.
Answer concisely in Markdown.
"#;

const OVERALL_MANAGEMENT_STYLE_TEMPLATE: &str = r#"
You are a professional management coach. Analyze the one-on-one records below and give an overall assessment of the manager's style.
Base your feedback on Situational Leadership theory and coaching theory.

### Overview
- Total sessions: {{totalSessions}}
- Members: {{memberCount}}
- Period: {{earliestDate}} to {{latestDate}}

### Session records
{{#each sessions}}
---
Member: {{memberName}}
Role: {{jobTitle}}
{{#if skills}}Skills: {{skills}}
{{/if}}{{#if strengths}}Strengths: {{strengths}}
{{/if}}{{#if weaknesses}}Weaknesses: {{weaknesses}}
{{/if}}{{#if growthPlan}}Growth plan: {{growthPlan}}
{{/if}}Date: {{date}}
Conversation:
{{content}}
Next actions:
{{nextActions}}
{{/each}}

### Output format
Produce a Markdown analysis containing:

1. An overview of the management style (a short paragraph)
2. A Situational Leadership analysis
   - The style used with each member
   - Overall tendencies
   - How balanced the approach is
3. Communication patterns
   - Frequently used techniques and phrasing
   - Examples of effective communication
   - Room for improvement
4. Fit with each member's profile
   - Whether the approach suits their skills and experience
   - Whether communication accounts for their strengths and weaknesses
   - Alignment with their growth plans
5. Recommended next actions (3-5 items)
   - Improvements to the management style
   - Adjustments per member
   - Effective questioning techniques

Finish with a brief summary of the most important insights.
"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionContext<'a> {
    member_name: &'a str,
    job_title: &'a str,
    date: String,
    content: &'a str,
    next_actions: &'a str,
}

impl<'a> SessionContext<'a> {
    fn new(session: &'a OneOnOne, member: &'a Member) -> Self {
        Self {
            member_name: &member.name,
            job_title: &member.job_title,
            date: session.date.to_string(),
            content: &session.content,
            next_actions: session.next_actions().unwrap_or(NO_NEXT_ACTIONS),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSummary<'a> {
    date: String,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManagementStyleContext<'a> {
    member_name: &'a str,
    job_title: &'a str,
    session_count: usize,
    sessions: Vec<SessionSummary<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfiledSession<'a> {
    member_name: &'a str,
    job_title: &'a str,
    skills: Option<&'a str>,
    strengths: Option<&'a str>,
    weaknesses: Option<&'a str>,
    growth_plan: Option<&'a str>,
    date: String,
    content: &'a str,
    next_actions: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverallContext<'a> {
    total_sessions: usize,
    member_count: usize,
    earliest_date: String,
    latest_date: String,
    sessions: Vec<ProfiledSession<'a>>,
}

pub struct PromptBuilder {
    engine: TemplateEngine,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, TemplateError> {
        let mut engine = TemplateEngine::new();

        let session_vars = ["memberName", "jobTitle", "date", "content", "nextActions"];
        engine.register_template(
            Template::new(COACHING_ADVICE, COACHING_ADVICE_TEMPLATE)
                .with_description("Coaching advice for a single meeting")
                .require(&session_vars),
        )?;
        engine.register_template(
            Template::new(MANAGEMENT_STYLE, MANAGEMENT_STYLE_TEMPLATE)
                .with_description("Management style across one member's meetings")
                .require(&["memberName", "jobTitle", "sessionCount", "sessions"]),
        )?;
        engine.register_template(
            Template::new(NEXT_SESSION_QUESTIONS, NEXT_SESSION_QUESTIONS_TEMPLATE)
                .with_description("Questions for the next meeting")
                .require(&session_vars),
        )?;
        engine.register_template(
            Template::new(OVERALL_MANAGEMENT_STYLE, OVERALL_MANAGEMENT_STYLE_TEMPLATE)
                .with_description("Management style across all members")
                .require(&["totalSessions", "memberCount", "earliestDate", "latestDate", "sessions"]),
        )?;

        Ok(Self { engine })
    }

    /// Built-in prompts, with overrides from the configured template directory.
    pub fn from_config(config: &TemplateConfig) -> Result<Self, TemplateError> {
        let mut builder = Self::new()?;
        if let Some(dir) = &config.template_dir {
            let loaded = builder.engine.load_from_dir(dir)?;
            tracing::info!(dir = %dir.display(), loaded, "Prompt template overrides loaded");
        }
        Ok(builder)
    }

    pub fn coaching_advice(&self, one_on_one: &OneOnOne, member: &Member) -> Result<String, TemplateError> {
        self.engine
            .render(COACHING_ADVICE, &SessionContext::new(one_on_one, member))
    }

    pub fn next_session_questions(&self, one_on_one: &OneOnOne, member: &Member) -> Result<String, TemplateError> {
        self.engine
            .render(NEXT_SESSION_QUESTIONS, &SessionContext::new(one_on_one, member))
    }

    pub fn management_style(&self, sessions: &[OneOnOne], member: &Member) -> Result<String, TemplateError> {
        let context = ManagementStyleContext {
            member_name: &member.name,
            job_title: &member.job_title,
            session_count: sessions.len(),
            sessions: sessions
                .iter()
                .map(|s| SessionSummary {
                    date: s.date.to_string(),
                    content: &s.content,
                })
                .collect(),
        };
        self.engine.render(MANAGEMENT_STYLE, &context)
    }

    /// Sessions are grouped by member in the order members first appear.
    pub fn overall_management_style(&self, records: &[SessionRecord]) -> Result<String, TemplateError> {
        let mut groups: Vec<(&Member, Vec<&OneOnOne>)> = Vec::new();
        for record in records {
            match groups.iter_mut().find(|(member, _)| member.id == record.member.id) {
                Some((_, sessions)) => sessions.push(&record.session),
                None => groups.push((&record.member, vec![&record.session])),
            }
        }

        let sessions: Vec<ProfiledSession> = groups
            .iter()
            .flat_map(|(member, sessions)| {
                sessions.iter().map(move |session| ProfiledSession {
                    member_name: &member.name,
                    job_title: &member.job_title,
                    skills: non_empty(&member.skills),
                    strengths: non_empty(&member.strengths),
                    weaknesses: non_empty(&member.weaknesses),
                    growth_plan: non_empty(&member.growth_plan),
                    date: session.date.to_string(),
                    content: &session.content,
                    next_actions: session.next_actions().unwrap_or(NO_NEXT_ACTIONS),
                })
            })
            .collect();

        let earliest = records.iter().map(|r| r.session.date).min();
        let latest = records.iter().map(|r| r.session.date).max();

        let context = OverallContext {
            total_sessions: sessions.len(),
            member_count: groups.len(),
            earliest_date: earliest.map(|d| d.to_string()).unwrap_or_default(),
            latest_date: latest.map(|d| d.to_string()).unwrap_or_default(),
            sessions,
        };
        self.engine.render(OVERALL_MANAGEMENT_STYLE, &context)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}
