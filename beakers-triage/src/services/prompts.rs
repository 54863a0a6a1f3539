//! Prompt templates
//!
//! Prompt text is part of the cache key, so any change here invalidates
//! cached responses for the affected role.

use crate::models::{ArticleCandidate, ScoreVector};
use crate::utils::section_extractor::ExtractedSections;

const RUBRIC: &str = "\
**S - Scientific Significance (0-5)**
How much does this change what becomes feasible or believed?
- 0: trivial increment
- 3: removes a common bottleneck, or a strong new dataset/method
- 5: field-shifting (rare)

**E - Evidence Strength (0-5)**
How well is the central claim supported?
- 0: assertion-heavy, unclear methods
- 3: solid baseline comparisons and uncertainty reporting
- 5: multiple independent validations

**T - Teachability (0-5)**
Can an undergraduate learn something real from it?
- 0: requires specialist background
- 3: explainable with standard undergraduate prerequisites
- 5: multiple course hooks and a clean mental model

**M - Media Affordance (0-5)**
Can diagrams, audio or quizzes be produced cheaply?
- 0: no clean figure or object
- 3: one pivot figure and one concept diagram possible
- 5: a perfect story object

**H - Hype Risk (0-5)**
How likely is the headline to overstate what the evidence supports?
- 0: cautious, bounded claims
- 3: strong claims with partial support
- 5: viral-weak: big claim, low evidence";

const EVIDENCE_ANCHORS: &str = "\
**E - Evidence Strength (0-5)**
- 0: assertion-heavy, unclear methods
- 1: minimal baselines; weak controls
- 2: some baselines; limited uncertainty; plausible but fragile
- 3: solid baseline comparisons and uncertainty reporting
- 4: ablations, sensitivity analysis or replication across conditions
- 5: multiple independent validations

**H - Hype Risk (0-5)**
- 0: cautious, bounded claims; limitations explicit
- 1: minor PR tone, still grounded
- 2: some overreach; mostly defensible
- 3: strong claims with partial support
- 4: breakthrough language with thin controls
- 5: viral-weak: big claim, low evidence";

/// Builder scoring prompt
pub fn builder_prompt(article: &ArticleCandidate) -> String {
    format!(
        "You are a research paper evaluator for an undergraduate science education platform.

Given an article's headline and teaser, score it on these dimensions (integers 0-5):

{rubric}

Also provide:
- tldr: 1-2 sentence summary for students
- pivot_figure: description of one visual that could anchor understanding
- course_hooks: list of 1-3 relevant undergraduate courses

ARTICLE:
Headline: {headline}
Teaser: {teaser}
Source: {source}
Discipline: {discipline}

Return ONLY valid JSON:
{{
  \"S\": <int 0-5>,
  \"E\": <int 0-5>,
  \"T\": <int 0-5>,
  \"M\": <int 0-5>,
  \"H\": <int 0-5>,
  \"tldr\": \"<string>\",
  \"pivot_figure\": \"<string>\",
  \"course_hooks\": [\"<course1>\", \"<course2>\"]
}}
",
        rubric = RUBRIC,
        headline = article.headline.trim(),
        teaser = article.teaser.trim(),
        source = article.source.trim(),
        discipline = article.discipline.trim(),
    )
}

/// Adversarial re-scoring prompt
pub fn skeptic_prompt(article: &ArticleCandidate, builder_scores: &ScoreVector) -> String {
    let builder_json = serde_json::to_string_pretty(builder_scores).unwrap_or_default();
    format!(
        "You are a skeptical reviewer checking another model's evaluation of a research article.

Your job is to challenge the scores, especially:
- E (Evidence): is the evidence actually strong? Look for missing controls, weak baselines, overstated results.
- H (Hype): is the headline or teaser claiming more than is supported?

{rubric}

ORIGINAL ARTICLE:
Headline: {headline}
Teaser: {teaser}

BUILDER'S SCORES:
{builder_json}

Review critically and return your adjusted scores (or the same scores if you agree).
Any change to E or H must come with a justification.

Return ONLY valid JSON:
{{
  \"S\": <int 0-5>,
  \"E\": <int 0-5>,
  \"T\": <int 0-5>,
  \"M\": <int 0-5>,
  \"H\": <int 0-5>,
  \"adjustments\": {{
    \"E\": \"<why adjusted or 'agree'>\",
    \"H\": \"<why adjusted or 'agree'>\"
  }},
  \"confidence\": <float 0-1>
}}
",
        rubric = RUBRIC,
        headline = article.headline.trim(),
        teaser = article.teaser.trim(),
        builder_json = builder_json,
    )
}

/// Full-text evidence re-scoring prompt
pub fn evidence_prompt(sections: &ExtractedSections) -> String {
    format!(
        "You are a skeptical evidence reviewer for a science education platform.

Given the METHODS section and FIGURE CAPTIONS from a research paper, re-assess the evidence strength.

{anchors}

Look for:
- Controls and baselines mentioned?
- Error bars or uncertainty quantified?
- Multiple conditions tested?
- Limitations acknowledged?
- Claims proportional to evidence?

METHODS SECTION:
{methods}

FIGURE CAPTIONS:
{figures}

Return ONLY valid JSON:
{{
  \"E\": <int 0-5>,
  \"H\": <int 0-5>,
  \"evidence_notes\": \"<brief explanation of evidence assessment>\",
  \"concerns\": [\"<concern1>\", \"<concern2>\"],
  \"confidence\": <float 0-1>
}}
",
        anchors = EVIDENCE_ANCHORS,
        methods = sections.methods,
        figures = sections.captions,
    )
}
