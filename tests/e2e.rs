//! End-to-end tests for doc2review.
//!
//! Every run uses the simulated provider, so no endpoint is required and
//! the suite is safe for CI. Inputs are assembled on the fly under a
//! temporary directory and assertions read the finished report back from
//! disk.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use doc2review::{review_document, RequestSelection, ReviewConfig, ReviewConfigBuilder};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// One slide with a title placeholder and a prose body.
fn slide_xml(title: &str, body: &str) -> String {
    format!(
        r#"<p:sld><p:cSld><p:spTree>
        <p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
          <p:txBody><a:p><a:r><a:t>{title}</a:t></a:r></a:p></p:txBody></p:sp>
        <p:sp><p:txBody><a:p><a:r><a:t>{body}</a:t></a:r></a:p></p:txBody></p:sp>
        </p:spTree></p:cSld></p:sld>"#
    )
}

/// Zip the slides into a minimal .pptx archive at `path`.
fn write_deck(path: &Path, slides: &[String]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("ppt/presentation.xml", options).unwrap();
    zip.write_all(br#"<p:presentation><p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#)
        .unwrap();
    for (index, xml) in slides.iter().enumerate() {
        zip.start_file(format!("ppt/slides/slide{}.xml", index + 1), options)
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn three_slide_deck(path: &Path) {
    write_deck(
        path,
        &[
            slide_xml("Launch plan overview", "Ship the beta in March."),
            slide_xml("Budget breakdown", "Marketing takes half the budget."),
            slide_xml("Hiring roadmap", "Five engineers join before June."),
        ],
    );
}

/// Builder with the endpoint replaced by the echo provider.
fn simulated() -> ReviewConfigBuilder {
    ReviewConfig::builder().simulate(true).model("test-model")
}

// ── Slide decks ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn simulated_deck_review_covers_each_slide_and_the_whole_deck() {
    let dir = tempdir().unwrap();
    let deck = dir.path().join("deck.pptx");
    write_deck(
        &deck,
        &[
            slide_xml("Launch plan overview", "Ship the beta in March."),
            slide_xml("Hiring roadmap", "Five engineers join before June."),
        ],
    );
    let config = simulated().build().unwrap();

    let outcome = review_document(&deck, &config).await.unwrap();

    assert_eq!(outcome.report_path, dir.path().join("deck.md"));
    assert_eq!(
        outcome.stats.steps, 7,
        "heading, text and artistic step per slide, plus the deck batch"
    );
    assert!(outcome.stats.responses >= outcome.stats.batches);
    assert!(outcome.stats.aborted.is_none());
    assert!(
        !dir.path().join("deck.md.temporary").exists(),
        "the working file must be cleaned up"
    );

    let report = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.starts_with("# Review Of Filename "));
    assert!(report.contains("## Table of content"));
    assert!(report.contains("# Configuration"));
    assert!(report.contains("Model: test-model"));
    assert!(report.contains("Mode: combined (simulated)"));
    assert!(report.contains("# Analyzing slide 1 Launch plan overview"));
    assert!(report.contains("Check of text content for slide 1"));
    assert!(report.contains("Check of artistic content for slide 2"));
    assert!(report.contains("Check of text content and flow for the whole deck"));
    assert!(report.contains("No calls performed"));
}

#[tokio::test]
async fn skipped_slides_leave_a_marker_and_stay_out_of_the_deck_batch() {
    let dir = tempdir().unwrap();
    let deck = dir.path().join("deck.pptx");
    three_slide_deck(&deck);
    let config = simulated().skip_slides(vec![2]).build().unwrap();

    let outcome = review_document(&deck, &config).await.unwrap();
    let report = fs::read_to_string(&outcome.report_path).unwrap();

    assert!(report.contains("**Skipped slide 2 as per request.**"));
    assert!(report.contains("Skipping slides: 2"));
    assert!(report.contains("Check of text content for slide 1"));
    assert!(report.contains("Check of text content for slide 3"));
    assert!(!report.contains("Check of text content for slide 2"));

    // The deck batch payload is echoed by the simulated provider; surviving
    // slides keep their deck numbering and the skipped one is absent.
    assert!(report.contains("Slide 3, Hiring roadmap:"));
    assert!(!report.contains("Slide 2, Budget breakdown:"));
}

#[tokio::test]
async fn switching_every_check_off_still_writes_a_report_shell() {
    let dir = tempdir().unwrap();
    let deck = dir.path().join("deck.pptx");
    three_slide_deck(&deck);
    let config = simulated()
        .slide_text_requests(RequestSelection::Off)
        .slide_artistic_requests(RequestSelection::Off)
        .deck_requests(RequestSelection::Off)
        .build()
        .unwrap();

    let outcome = review_document(&deck, &config).await.unwrap();

    assert_eq!(outcome.stats.steps, 0);
    assert_eq!(outcome.stats.requests_sent, 0);

    let report = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.contains("# Configuration"));
    assert!(report.contains("Text requests applied on each slide: none"));
    assert!(report.contains("Requests applied on the whole deck: none"));
    assert!(!report.contains("Analyzing slide"));
}

#[tokio::test]
async fn detailed_mode_suffixes_the_report_and_labels_each_response() {
    let dir = tempdir().unwrap();
    let deck = dir.path().join("deck.pptx");
    write_deck(
        &deck,
        &[slide_xml("Launch plan overview", "Ship the beta in March.")],
    );
    let config = simulated().detailed(true).build().unwrap();

    let outcome = review_document(&deck, &config).await.unwrap();

    assert_eq!(outcome.report_path, dir.path().join("deck-detailed.md"));
    let report = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.starts_with("# Detailed Review Of Filename "));
    assert!(report.contains("Mode: detailed (simulated)"));
    assert!(report.contains("No calls performed (detailed)"));
    // One response per request, each tagged with the slide it covers.
    assert!(report.contains("(Slide 1)"));
    assert!(outcome.stats.responses > outcome.stats.batches);
}

#[tokio::test]
async fn post_templates_chain_one_follow_up_per_response() {
    let dir = tempdir().unwrap();
    let deck = dir.path().join("deck.pptx");
    write_deck(
        &deck,
        &[slide_xml("Launch plan overview", "Ship the beta in March.")],
    );
    let config = simulated().post_request_ids(vec![1]).build().unwrap();

    let outcome = review_document(&deck, &config).await.unwrap();

    assert_eq!(outcome.stats.post_responses, outcome.stats.responses);
    let report = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.contains("Summary finding"));
    assert!(report.contains("Post templates: 1"));
}

// ── Text documents ───────────────────────────────────────────────────────────

#[tokio::test]
async fn markdown_chapters_flow_through_to_the_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("notes.md");
    fs::write(
        &input,
        "# Guide\n\nThe introduction explains the product.\n\n\
         ## Setup\n\nInstall the binary and point it at an endpoint.\n",
    )
    .unwrap();
    let config = simulated().build().unwrap();

    let outcome = review_document(&input, &config).await.unwrap();

    // A Markdown input keeps its full name so the report never overwrites it.
    assert_eq!(outcome.report_path, dir.path().join("notes.md.md"));
    let report = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.contains("Check of content for chapters "));
    assert!(report.contains("Requests applied on each chapter batch:"));
    assert!(report.contains("Install the binary and point it at an endpoint."));
    assert!(!dir.path().join("notes.md.md.temporary").exists());
}

#[tokio::test]
async fn simulated_runs_are_reproducible() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("notes.md");
    fs::write(
        &input,
        "# Guide\n\nThe introduction explains the product.\n",
    )
    .unwrap();
    let config = simulated().build().unwrap();

    let first = review_document(&input, &config).await.unwrap();
    let first_bytes = fs::read(&first.report_path).unwrap();
    let second = review_document(&input, &config).await.unwrap();
    let second_bytes = fs::read(&second.report_path).unwrap();

    assert_eq!(first.report_path, second.report_path);
    assert_eq!(
        first_bytes, second_bytes,
        "a simulated review must be byte-for-byte reproducible"
    );
}
