//! Built-in review prompts, the reviewer persona, and payload schemas.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tuning a review (wording, temperature,
//!    default catalogs) happens in exactly one place.
//!
//! 2. **Testability** — catalog and engine tests inspect prompts directly
//!    without a live endpoint.
//!
//! Users extend these catalogs with JSON files named by the
//! `DOC2REVIEW_REQUESTS_*` environment variables; the built-ins below are
//! always loaded first.

use crate::catalog::{PostRequest, ReviewRequest};

/// Persona used when no reviewer-properties file is configured.
pub const DEFAULT_REVIEWER: &str =
    "an experienced management consultant and technical editor, rigorous about \
     clarity, structure and visual quality";

/// Reading notice placed in the report's `Introduction` section.
pub const REPORT_INTRODUCTION: &str =
    "Please ensure you are reading all this information while checking your document.";

/// Table format every review is asked to use for its findings, so the
/// report assembler can harvest and rank them.
pub const FINDINGS_TABLE_INSTRUCTION: &str = "\
- Summarize your findings in a table with this exact format:

| Finding | Number | Weight |
| --- | --- | --- |
| (finding type) | (number of findings of this type) | (weight of this finding type, 0 for cosmetic up to 10 for critical) |
";

/// Build the system persona block.
///
/// Slide decks add a notice that the payload is a JSON export, so the model
/// reviews the document and not the serialization.
pub fn persona_set(reviewer: &str, slide_deck: bool) -> String {
    let mut set = format!(
        "- You impersonate {reviewer}, for all prompts keeping the characteristics \
         leading to excellence as expected from {reviewer}\n"
    );
    if slide_deck {
        set.push_str(
            "- The data you will analyze is an export of a slide deck into JSON data.\n\
             - Do not comment on the JSON source itself.\n\
             - The JSON structure provides text content and the shapes' geometry and layout.\n\
             - In your analysis, refer exclusively to the document content the JSON represents.\n",
        );
    }
    set
}

/// Schema of the slide-shape payload, sent with the persona when a batch
/// requires a format description.
pub fn slide_format_description(graphical: bool) -> String {
    let mut desc = String::from(
        "The slide content is a JSON array of shape objects with these fields:\n\
         - slide_number: 1-based number of the slide the shape belongs to\n\
         - text: the shape text; '\\n' separates paragraphs inside the shape, and for \
         tables the text is a Markdown cell grid\n\
         - type: one of text-box, table, group, shape, picture, forced-title\n\
         - is_title: true for the shape holding the slide title\n",
    );
    if graphical {
        desc.push_str(
            "Shapes also carry layout and styling fields:\n\
             - rotation_degrees: clockwise rotation of the shape\n\
             - shape_fore_color: fill colour as #RRGGBB\n\
             - line: { line_color, is_dash_style, line_width_points }\n\
             - position: { from_left, from_top } as percentages of the slide size\n\
             - size: { width, height } as percentages of the slide size\n\
             - font_details: list of { font_name, text_color, font_size, text_impacted }\n\
             - table_size: { number_cols, number_rows } for tables\n",
        );
    }
    desc
}

/// Schema of the whole-deck payload.
pub fn deck_format_description() -> String {
    String::from(
        "The deck content is a JSON array of strings, one per slide, each formatted as \
         'Slide <number>, <title>:' followed by the JSON list of the slide's texts in \
         reading order. Skipped slides are absent from the array.",
    )
}

// ── Built-in catalogs ────────────────────────────────────────────────────

/// Artistic slide reviews. The allowed colour palette is configurable; the
/// catalog always appends `transparent`.
pub fn builtin_slide_artistic(palette: &[String]) -> Vec<ReviewRequest> {
    let mut colours: Vec<String> = palette.to_vec();
    colours.push("transparent".to_string());
    let palette_list = colours.join(", ");
    vec![
        ReviewRequest::new(
            "Color artistic review",
            format!(
                "- Review the colors used on the slide: harmony, contrast and readability.\n\
                 - The allowed palette is: {palette_list}.\n\
                 - Flag every shape, line or font color outside the allowed palette.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Size, position and shapes artistic review",
            format!(
                "- Review shape sizes and positions: alignment, overlaps, margins and \
                 consistent spacing.\n\
                 - Flag shapes that are rotated, clipped by the slide border, or visually \
                 unbalanced.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Fonts and size artistic review",
            format!(
                "- Review the fonts: number of font families, size hierarchy between title \
                 and body, and readability from a distance.\n\
                 - Flag font sizes below 12 points and more than two font families.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Global artistic check",
            format!(
                "- Give an overall artistic impression of the slide: balance, clutter, \
                 visual hierarchy and first-glance impact.\n\
                 - Propose at most three concrete layout improvements.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.7,
            0.6,
        ),
    ]
}

/// Per-slide text reviews.
pub fn builtin_slide_text() -> Vec<ReviewRequest> {
    vec![
        ReviewRequest::new(
            "Spell check and clarity checks",
            format!(
                "- Check the slide text for spelling, grammar and wording mistakes.\n\
                 - Flag jargon, undefined acronyms and ambiguous phrasing.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
        ReviewRequest::new(
            "Slide readability checks",
            format!(
                "- Check the slide readability: amount of text, bullet depth and sentence \
                 length.\n\
                 - Flag bullets longer than two lines and slides that need more than a \
                 minute to read.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
        ReviewRequest::new(
            "Slide take away checks",
            format!(
                "- State the main takeaway of the slide in one sentence.\n\
                 - Check that the title announces that takeaway; flag title and content \
                 mismatches.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
    ]
}

/// Whole-deck reviews.
pub fn builtin_deck() -> Vec<ReviewRequest> {
    vec![
        ReviewRequest::new(
            "Flow check",
            format!(
                "- Review the narrative flow across slides: logical order, transitions and \
                 missing steps in the storyline.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.4,
        ),
        ReviewRequest::new(
            "Consistency check",
            format!(
                "- Check consistency across slides: terminology, figures quoted in several \
                 places, and title wording.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.4,
        ),
        ReviewRequest::new(
            "Clarity checks",
            format!(
                "- Check the clarity of the overall message: is the purpose of the deck \
                 obvious after the first three slides?\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.4,
        ),
        ReviewRequest::new(
            "Deck readability checks",
            format!(
                "- Review the deck's reading effort: total text volume, slide density \
                 outliers and duplicated content.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Deck take away checks",
            format!(
                "- List the takeaways a reader retains after one pass through the deck.\n\
                 - Flag slides that add no takeaway.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Experts feedback checks",
            format!(
                "- Review the deck as a domain expert would: factual soundness, missing \
                 caveats and overclaims.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Deck memorability check",
            format!(
                "- Assess what makes the deck memorable: hooks, recurring motifs and \
                 quotable lines. Flag forgettable sections.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.4,
            0.4,
        ),
        ReviewRequest::new(
            "Deck audience check",
            format!(
                "- Identify the audience the deck is written for and flag slides that \
                 target a different audience or assume missing context.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.5,
            0.6,
        ),
        ReviewRequest::new(
            "Deck weakness and counter points checks",
            format!(
                "- List the weakest claims of the deck and the counterpoints a critical \
                 reader would raise.\n\
                 - Propose a mitigation for each counterpoint.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.5,
            0.6,
        ),
        ReviewRequest::new(
            "Roadmap",
            format!(
                "- Propose a roadmap of improvements for this deck: quick wins first, then \
                 structural changes, each with an effort estimate.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.6,
            0.6,
        ),
    ]
}

/// Chapter reviews for Word, Markdown and PDF documents.
pub fn builtin_paragraph() -> Vec<ReviewRequest> {
    vec![
        ReviewRequest::new(
            "Spell check and clarity checks",
            format!(
                "- Check the text for spelling, grammar and wording mistakes.\n\
                 - Flag jargon, undefined acronyms and ambiguous phrasing.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
        ReviewRequest::new(
            "Text readability checks",
            format!(
                "- Check readability: sentence length, paragraph length and heading \
                 structure.\n\
                 - Flag sections a first-time reader would need to re-read.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
        ReviewRequest::new(
            "Extract {DOC2REVIEW_DETAIL_TYPE,technical} details",
            format!(
                "- Extract every {{DOC2REVIEW_DETAIL_TYPE,technical}} detail stated in the \
                 text: figures, constraints, commitments and named components.\n\
                 - Present them as a bullet list grouped by chapter.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
        ReviewRequest::new(
            "Propose a team",
            format!(
                "- From the work described in the text, propose a delivery team as a \
                 resource-loading table:\n\n\
                 | Location | Role | Skills | Grade | Months |\n\
                 | --- | --- | --- | --- | --- |\n\n\
                 - One row per profile, months as a number.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.5,
            0.5,
        ),
        ReviewRequest::new(
            "Extract commercial details",
            format!(
                "- Extract every commercial detail stated in the text: prices, payment \
                 terms, deadlines, penalties and service levels.\n\
                 - Flag commercial statements that are vague or contradictory.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
        ReviewRequest::new(
            "Text take away checks",
            format!(
                "- State the takeaways of each chapter in one sentence per chapter.\n\
                 - Flag chapters whose takeaway does not support the document's purpose.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
            0.3,
            0.2,
        ),
    ]
}

/// Pre/post request templates. `pre` is baked into every primary prompt at
/// catalog construction; `post` runs as a chained request against the
/// primary response.
pub fn builtin_post() -> Vec<PostRequest> {
    vec![
        PostRequest {
            name: "None".into(),
            pre: String::new(),
            post: String::new(),
        },
        PostRequest {
            name: "Summary finding".into(),
            pre: "- For the request below, provide 5 to 7 detailed findings, each with a \
                  concrete improvement suggestion.\n"
                .into(),
            post: format!(
                "- Summarize the 3 most important finding types from the text below.\n\
                 {FINDINGS_TABLE_INSTRUCTION}"
            ),
        },
        PostRequest {
            name: "Formatted output without summary".into(),
            pre: "- Format your whole answer as Markdown: one '### ' heading per theme, \
                  findings as bullet lists, tables for anything enumerable.\n"
                .into(),
            post: String::new(),
        },
    ]
}
