// All LLM prompt constants for the generation tasks.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for metadata extraction.
pub const METADATA_SYSTEM: &str = "You are a precise job posting analyst. \
    You extract the hiring company and the role title from a job description.";

/// Metadata prompt template. Replace `{json_only}` and `{job_description}`.
pub const METADATA_PROMPT_TEMPLATE: &str = r#"{json_only}

Read the job description below and return a JSON object with this EXACT schema:
{"company": "Acme", "title": "Backend_Engineer"}

Rules:
- "company": the hiring organisation's short name. Use "Unknown" if it is not stated.
- "title": the role title, words joined with underscores, no seniority prefixes added.

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for the CV rewrite.
pub const CV_SYSTEM: &str = "You are an expert CV tailor who writes LaTeX. \
    You adapt a CV template to a job description using only the facts in a master profile.";

/// CV prompt template.
/// Replace: {grounding_instruction}, {latex_instruction}, {job_description},
///          {master_profile}, {template}
pub const CV_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{latex_instruction}

Fill the LaTeX CV template below for this job. Rewrite the title and the profile/summary
section to match the role, order experience and skills by relevance, and select the
projects from the master profile that best fit the job description.

JOB DESCRIPTION:
{job_description}

MASTER PROFILE (source of truth):
{master_profile}

LATEX CV TEMPLATE:
{template}"#;

/// System prompt for the cover letter.
pub const COVER_LETTER_SYSTEM: &str = "You are an expert cover letter writer who writes LaTeX. \
    You write concise, specific letters grounded in a master profile.";

/// Cover letter prompt template.
/// Replace: {grounding_instruction}, {latex_instruction}, {job_description},
///          {master_profile}, {template}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{latex_instruction}

Fill the LaTeX cover letter template below for this job. Write in the language of the
job description. Three to four short paragraphs: why this company, the two or three most
relevant experiences from the master profile, and a closing line.

JOB DESCRIPTION:
{job_description}

MASTER PROFILE (source of truth):
{master_profile}

LATEX COVER LETTER TEMPLATE:
{template}"#;

/// System prompt for the short outreach message.
pub const MESSAGE_SYSTEM: &str = "You write short, plain-text outreach messages to recruiters.";

/// Message prompt template.
/// Replace: {grounding_instruction}, {job_description}, {master_profile}
pub const MESSAGE_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Write a message of at most 80 words that the candidate can send to the recruiter for the
job below. Plain text only: no markdown, no headings, no bold, no subject line. Write in the
language of the job description.

JOB DESCRIPTION:
{job_description}

MASTER PROFILE (source of truth):
{master_profile}"#;
