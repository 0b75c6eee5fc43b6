//! Slide-deck source.
//!
//! Each slide plans up to three sections: an `Analyzing slide` heading, a
//! text check over the slide's units, and an artistic check over the same
//! units with geometry and styling attached. Every slide that survives the
//! skip, keep and hidden filters also contributes one line to the deck
//! batch, so the whole-deck check sees the flow even when per-slide checks
//! are off.

use crate::catalog::RequestCatalog;
use crate::checker::{ArtisticSlideChecker, DeckChecker, TextSlideChecker};
use crate::config::{RequestSelection, ReviewConfig};
use crate::error::ReviewError;
use crate::pipeline::report::ReportWriter;
use crate::prompts;
use crate::source::pptx::{Deck, ParsedShape, ParsedSlide};
use crate::source::{DocumentSource, ReviewStep};
use crate::unit::{BatchPayload, ContentUnit, GraphicalInfo, ReviewBatch, UnitKind};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Two or more words of three or more word characters each. Shorter text
/// boxes hold page numbers, logos and other furniture, not content.
static RE_PROSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w{3,}\b\s+)+\w{3,}\b").unwrap());

/// PowerPoint decks reviewed slide by slide, then as a whole.
pub struct SlideSource {
    path: PathBuf,
    skip: Vec<usize>,
    keep: Vec<usize>,
    text_selection: RequestSelection,
    artistic_selection: RequestSelection,
    deck_selection: RequestSelection,
}

impl SlideSource {
    pub fn new(path: &Path, config: &ReviewConfig) -> Self {
        SlideSource {
            path: path.to_path_buf(),
            skip: config.skip_slides.clone(),
            keep: config.keep_slides.clone(),
            text_selection: config.slide_text_requests.clone(),
            artistic_selection: config.slide_artistic_requests.clone(),
            deck_selection: config.deck_requests.clone(),
        }
    }

    fn plan(
        &self,
        deck: &Deck,
        catalog: &RequestCatalog,
        report: &mut ReportWriter,
    ) -> Result<Vec<ReviewStep>, ReviewError> {
        let mut steps = Vec::new();
        let mut deck_lines = Vec::new();
        let want_text = !self.text_selection.is_off();
        let want_artistic = !self.artistic_selection.is_off();

        for slide in &deck.slides {
            let n = slide.number;
            if self.skip.contains(&n) {
                info!("skipping slide {n} as per request");
                report.document(&format!("**Skipped slide {n} as per request.**"))?;
                continue;
            }
            if !self.keep.is_empty() {
                if !self.keep.contains(&n) {
                    debug!("dropping slide {n}: not in the keep list");
                    continue;
                }
                report.document(&format!("**Kept slide {n} as per request.**"))?;
            }
            if slide.hidden {
                info!("skipping hidden slide {n}");
                report.document(&format!("**Skipped hidden slide {n}.**"))?;
                continue;
            }

            let content = SlideContent::build(slide);
            let texts = serde_json::to_string(&content.texts)
                .map_err(|e| ReviewError::Internal(format!("deck line encoding failed: {e}")))?;
            deck_lines.push(format!("Slide {n}, {}:\n{texts}", content.title));

            if !want_text && !want_artistic {
                continue;
            }
            let label = if content.title.is_empty() {
                n.to_string()
            } else {
                format!("{n} {}", content.title)
            };
            steps.push(ReviewStep::heading(1, format!("Analyzing slide {label}")));
            if want_text {
                steps.push(ReviewStep::review(
                    2,
                    format!("Check of text content for slide {n}"),
                    Box::new(TextSlideChecker::new(
                        catalog,
                        self.text_selection.indices(),
                        n,
                    )?),
                    ReviewBatch {
                        scope_label: format!("Slide {label}"),
                        payload: content.text_payload()?,
                        format_description: Some(prompts::slide_format_description(false)),
                        numbered_response_titles: false,
                        response_title_rank: 2,
                        done_marker: Some(format!("Text slide request {label}")),
                    },
                ));
            }
            if want_artistic {
                steps.push(ReviewStep::review(
                    2,
                    format!("Check of artistic content for slide {n}"),
                    Box::new(ArtisticSlideChecker::new(
                        catalog,
                        self.artistic_selection.indices(),
                        n,
                    )?),
                    ReviewBatch {
                        scope_label: format!("Slide {label}"),
                        payload: content.artistic_payload()?,
                        format_description: Some(prompts::slide_format_description(true)),
                        numbered_response_titles: false,
                        response_title_rank: 2,
                        done_marker: Some(format!("Artistic slide request {label}")),
                    },
                ));
            }
        }

        if !self.deck_selection.is_off() {
            steps.push(ReviewStep::review(
                1,
                "Check of text content and flow for the whole deck",
                Box::new(DeckChecker::new(catalog, self.deck_selection.indices())?),
                ReviewBatch {
                    scope_label: "Whole deck".to_string(),
                    payload: BatchPayload::Lines(deck_lines),
                    format_description: Some(prompts::deck_format_description()),
                    numbered_response_titles: true,
                    response_title_rank: 2,
                    done_marker: Some("Full deck request".to_string()),
                },
            ));
        }
        Ok(steps)
    }
}

#[async_trait]
impl DocumentSource for SlideSource {
    async fn prepare(
        &mut self,
        catalog: &RequestCatalog,
        report: &mut ReportWriter,
    ) -> Result<Vec<ReviewStep>, ReviewError> {
        info!("opening file: {}", self.path.display());
        let path = self.path.clone();
        let deck = tokio::task::spawn_blocking(move || Deck::parse(&path))
            .await
            .map_err(|e| ReviewError::Internal(format!("deck parsing task panicked: {e}")))??;
        self.plan(&deck, catalog, report)
    }
}

/// A slide reduced to its reviewable units, in reading order.
struct SlideContent {
    title: String,
    units: Vec<ContentUnit>,
    texts: Vec<String>,
}

impl SlideContent {
    fn build(slide: &ParsedSlide) -> SlideContent {
        let placeholder_title = slide
            .shapes
            .iter()
            .filter(|s| s.is_title)
            .map(|s| clean_title(&s.text))
            .find(|t| !t.is_empty());

        // Text boxes and groups must read as prose; tables, pictures and
        // bare shapes are always kept for the artistic check.
        let mut retained: Vec<ParsedShape> = slide
            .shapes
            .iter()
            .filter(|s| match s.kind {
                UnitKind::TextBox | UnitKind::Group => is_prose(&s.text),
                _ => true,
            })
            .cloned()
            .collect();
        retained.sort_by_key(|s| s.from_top);

        let title = match placeholder_title {
            Some(title) => {
                // A short title fails the prose filter; reinstate it as a
                // leading unit so the checks still see it.
                if !retained.iter().any(|s| s.is_title) {
                    retained.insert(
                        0,
                        ParsedShape {
                            kind: UnitKind::ForcedTitle,
                            is_title: true,
                            text: title.clone(),
                            from_top: 0,
                            graphics: GraphicalInfo::default(),
                        },
                    );
                }
                title
            }
            None => {
                let promoted = retained.iter_mut().find(|s| {
                    matches!(s.kind, UnitKind::TextBox | UnitKind::Group)
                        && !s.text.trim().is_empty()
                });
                match promoted {
                    Some(shape) => {
                        shape.is_title = true;
                        clean_title(&shape.text)
                    }
                    None => {
                        warn!("no title found for slide {}", slide.number);
                        String::new()
                    }
                }
            }
        };

        let units = retained
            .iter()
            .map(|s| ContentUnit {
                slide_number: Some(slide.number),
                text: s.text.clone(),
                kind: s.kind,
                is_title: s.is_title,
                graphics: Some(s.graphics.clone()),
                depth: None,
                path: None,
            })
            .collect();
        let texts = retained.iter().map(|s| s.text.clone()).collect();
        SlideContent {
            title,
            units,
            texts,
        }
    }

    /// Units with the styling stripped, for the text checks.
    fn text_payload(&self) -> Result<BatchPayload, ReviewError> {
        let stripped: Vec<ContentUnit> = self
            .units
            .iter()
            .cloned()
            .map(|mut unit| {
                unit.graphics = None;
                unit
            })
            .collect();
        unit_payload(&stripped)
    }

    fn artistic_payload(&self) -> Result<BatchPayload, ReviewError> {
        unit_payload(&self.units)
    }
}

fn unit_payload(units: &[ContentUnit]) -> Result<BatchPayload, ReviewError> {
    let values = units
        .iter()
        .map(|unit| {
            serde_json::to_value(unit)
                .map_err(|e| ReviewError::Internal(format!("slide unit encoding failed: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BatchPayload::Units(values))
}

fn is_prose(text: &str) -> bool {
    RE_PROSE.is_match(&text.replace("**", ""))
}

/// Bold markers stripped, newlines removed, ends trimmed.
fn clean_title(text: &str) -> String {
    text.replace("**", "").replace('\n', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::PositionInfo;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn shape(kind: UnitKind, text: &str, from_top: i64) -> ParsedShape {
        ParsedShape {
            kind,
            is_title: false,
            text: text.to_string(),
            from_top,
            graphics: GraphicalInfo::default(),
        }
    }

    fn title_shape(text: &str, from_top: i64) -> ParsedShape {
        ParsedShape {
            is_title: true,
            ..shape(UnitKind::TextBox, text, from_top)
        }
    }

    fn slide(number: usize, shapes: Vec<ParsedShape>) -> ParsedSlide {
        ParsedSlide {
            number,
            hidden: false,
            shapes,
        }
    }

    fn catalog() -> RequestCatalog {
        RequestCatalog::load(&[], &[], None, None).unwrap()
    }

    fn plan_with(config: &ReviewConfig, deck: &Deck) -> (Vec<ReviewStep>, String) {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.md");
        let mut report = ReportWriter::new(out.clone(), "t", "d", 10).unwrap();
        let source = SlideSource::new(Path::new("deck.pptx"), config);
        let steps = source.plan(deck, &catalog(), &mut report).unwrap();
        report.flush_and_close().unwrap();
        (steps, std::fs::read_to_string(out).unwrap())
    }

    fn prose_slide(number: usize) -> ParsedSlide {
        slide(
            number,
            vec![
                title_shape("Launch plan overview", 100),
                shape(UnitKind::TextBox, "Ship the beta in March.\n", 2000),
            ],
        )
    }

    fn unit_values(step: &ReviewStep) -> Vec<serde_json::Value> {
        match &step.work.as_ref().unwrap().batch.payload {
            BatchPayload::Units(values) => values.clone(),
            other => panic!("expected a unit payload, got {other:?}"),
        }
    }

    #[test]
    fn plans_heading_text_and_artistic_steps_per_slide() {
        let deck = Deck {
            slides: vec![prose_slide(1), prose_slide(2)],
        };
        let (steps, _) = plan_with(&ReviewConfig::default(), &deck);

        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0].title, "Analyzing slide 1 Launch plan overview");
        assert!(steps[0].work.is_none());
        assert_eq!(steps[1].title, "Check of text content for slide 1");
        assert_eq!(steps[2].title, "Check of artistic content for slide 1");
        assert_eq!(steps[3].title, "Analyzing slide 2 Launch plan overview");

        let text_batch = &steps[1].work.as_ref().unwrap().batch;
        assert_eq!(text_batch.scope_label, "Slide 1 Launch plan overview");
        assert!(!text_batch.numbered_response_titles);
        assert_eq!(
            text_batch.done_marker.as_deref(),
            Some("Text slide request 1 Launch plan overview")
        );

        let deck_step = &steps[6];
        assert_eq!(
            deck_step.title,
            "Check of text content and flow for the whole deck"
        );
        let deck_batch = &deck_step.work.as_ref().unwrap().batch;
        assert_eq!(deck_batch.scope_label, "Whole deck");
        assert!(deck_batch.numbered_response_titles);
    }

    #[test]
    fn styling_reaches_the_artistic_payload_but_not_the_text_payload() {
        let mut styled = shape(UnitKind::TextBox, "Ship the beta in March.\n", 2000);
        styled.graphics.position = Some(PositionInfo {
            from_left: 10.0,
            from_top: 20.0,
        });
        let deck = Deck {
            slides: vec![slide(1, vec![title_shape("Launch plan overview", 100), styled])],
        };
        let (steps, _) = plan_with(&ReviewConfig::default(), &deck);

        let text_units = unit_values(&steps[1]);
        let artistic_units = unit_values(&steps[2]);
        assert_eq!(text_units.len(), 2);
        assert!(text_units[1].get("position").is_none());
        assert!(artistic_units[1].get("position").is_some());
        assert_eq!(artistic_units[1]["type"], "text-box");
        assert_eq!(artistic_units[1]["slide_number"], 1);
    }

    #[test]
    fn skipped_slides_leave_a_marker_and_keep_their_deck_numbers() {
        let deck = Deck {
            slides: vec![prose_slide(1), prose_slide(2), prose_slide(3)],
        };
        let config = ReviewConfig::builder()
            .skip_slides(vec![2])
            .build()
            .unwrap();
        let (steps, written) = plan_with(&config, &deck);

        let text_steps: Vec<&str> = steps
            .iter()
            .filter(|s| s.title.starts_with("Check of text content for slide"))
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(
            text_steps,
            vec![
                "Check of text content for slide 1",
                "Check of text content for slide 3"
            ]
        );
        assert!(written.contains("**Skipped slide 2 as per request.**"));

        let deck_batch = &steps.last().unwrap().work.as_ref().unwrap().batch;
        match &deck_batch.payload {
            BatchPayload::Lines(lines) => {
                assert_eq!(lines.len(), 2);
                assert!(lines[0].starts_with("Slide 1, Launch plan overview:\n"));
                assert!(lines[1].starts_with("Slide 3, Launch plan overview:\n"));
            }
            other => panic!("expected a line payload, got {other:?}"),
        }
    }

    #[test]
    fn keep_list_drops_other_slides_without_markers() {
        let deck = Deck {
            slides: vec![prose_slide(1), prose_slide(2), prose_slide(3)],
        };
        let config = ReviewConfig::builder()
            .keep_slides(vec![2])
            .build()
            .unwrap();
        let (steps, written) = plan_with(&config, &deck);

        assert!(written.contains("**Kept slide 2 as per request.**"));
        assert!(!written.contains("slide 1"));
        assert!(steps
            .iter()
            .any(|s| s.title == "Check of text content for slide 2"));
        assert!(!steps
            .iter()
            .any(|s| s.title == "Check of text content for slide 1"));
    }

    #[test]
    fn hidden_slides_are_dropped_with_a_marker() {
        let mut second = prose_slide(2);
        second.hidden = true;
        let deck = Deck {
            slides: vec![prose_slide(1), second],
        };
        let (steps, written) = plan_with(&ReviewConfig::default(), &deck);

        assert!(written.contains("**Skipped hidden slide 2.**"));
        assert!(!steps
            .iter()
            .any(|s| s.title == "Check of text content for slide 2"));
        let deck_batch = &steps.last().unwrap().work.as_ref().unwrap().batch;
        match &deck_batch.payload {
            BatchPayload::Lines(lines) => assert_eq!(lines.len(), 1),
            other => panic!("expected a line payload, got {other:?}"),
        }
    }

    #[test]
    fn per_slide_checks_off_still_plan_the_deck_batch() {
        let deck = Deck {
            slides: vec![prose_slide(1)],
        };
        let config = ReviewConfig::builder()
            .slide_text_requests(RequestSelection::Off)
            .slide_artistic_requests(RequestSelection::Off)
            .build()
            .unwrap();
        let (steps, _) = plan_with(&config, &deck);

        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].title,
            "Check of text content and flow for the whole deck"
        );

        let config = ReviewConfig::builder()
            .slide_text_requests(RequestSelection::Off)
            .slide_artistic_requests(RequestSelection::Off)
            .deck_requests(RequestSelection::Off)
            .build()
            .unwrap();
        let (steps, _) = plan_with(&config, &deck);
        assert!(steps.is_empty());
    }

    #[test]
    fn short_placeholder_titles_become_a_forced_leading_unit() {
        let content = SlideContent::build(&slide(
            4,
            vec![
                shape(UnitKind::TextBox, "Ship the beta in March.\n", 2000),
                title_shape("**Roadmap**\n", 100),
            ],
        ));

        assert_eq!(content.title, "Roadmap");
        assert_eq!(content.units.len(), 2);
        assert_eq!(content.units[0].kind, UnitKind::ForcedTitle);
        assert!(content.units[0].is_title);
        assert_eq!(content.units[0].text, "Roadmap");
        assert_eq!(content.texts[0], "Roadmap");
    }

    #[test]
    fn first_text_shape_is_promoted_when_no_placeholder_exists() {
        let content = SlideContent::build(&slide(
            5,
            vec![
                shape(UnitKind::TextBox, "Lower prose goes here.\n", 2000),
                shape(UnitKind::TextBox, "**Upper prose** goes here.\n", 100),
            ],
        ));

        assert_eq!(content.title, "Upper prose goes here.");
        assert!(content.units[0].is_title);
        assert_eq!(content.units[0].text, "**Upper prose** goes here.\n");
        assert!(!content.units[1].is_title);
    }

    #[test]
    fn prose_filter_applies_to_text_boxes_only() {
        let content = SlideContent::build(&slide(
            6,
            vec![
                title_shape("Quarterly sales figures", 100),
                shape(UnitKind::TextBox, "p. 6", 9000),
                shape(UnitKind::Table, "| Region | Sales |\n| --- | --- |", 2000),
                shape(UnitKind::Picture, "", 3000),
            ],
        ));

        let kinds: Vec<UnitKind> = content.units.iter().map(|u| u.kind).collect();
        assert_eq!(
            kinds,
            vec![UnitKind::TextBox, UnitKind::Table, UnitKind::Picture]
        );
    }

    #[test]
    fn untitled_slides_plan_with_a_bare_number_label() {
        let deck = Deck {
            slides: vec![slide(3, vec![shape(UnitKind::Picture, "", 100)])],
        };
        let (steps, _) = plan_with(&ReviewConfig::default(), &deck);

        assert_eq!(steps[0].title, "Analyzing slide 3");
        let batch = &steps[1].work.as_ref().unwrap().batch;
        assert_eq!(batch.scope_label, "Slide 3");
    }

    fn write_deck(path: &Path, slides: &[&str]) {
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

    #[tokio::test]
    async fn prepare_plans_a_real_archive() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("deck.pptx");
        write_deck(
            &doc,
            &[r#"<p:sld><p:cSld><p:spTree>
                <p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
                  <p:txBody><a:p><a:r><a:t>Launch plan overview</a:t></a:r></a:p></p:txBody></p:sp>
                <p:sp><p:txBody><a:p><a:r><a:t>Ship the beta in March.</a:t></a:r></a:p></p:txBody></p:sp>
                </p:spTree></p:cSld></p:sld>"#],
        );
        let mut report = ReportWriter::new(dir.path().join("out.md"), "t", "d", 10).unwrap();
        let catalog = catalog();

        let mut source = SlideSource::new(&doc, &ReviewConfig::default());
        let steps = source.prepare(&catalog, &mut report).await.unwrap();

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].title, "Analyzing slide 1 Launch plan overview");
        let units = unit_values(&steps[1]);
        assert_eq!(units[0]["is_title"], true);
        assert_eq!(units[1]["text"], "Ship the beta in March.\n");
    }
}
