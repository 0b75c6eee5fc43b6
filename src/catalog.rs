//! Request catalogs: built-in review requests, user extensions, selection.
//!
//! Four primary catalogs (slide text, slide artistic, deck, paragraph) plus
//! the pre/post templates. Construction order matters and is fixed:
//!
//! 1. built-ins ([`crate::prompts`]) + external JSON catalogs named by the
//!    `DOC2REVIEW_REQUESTS_*` environment variables,
//! 2. `{ENV_VAR}` / `{ENV_VAR,default}` token resolution over names and
//!    prompts (exactly once per token occurrence),
//! 3. selected pre/post templates baked into every primary prompt,
//! 4. forced temperature / top_p overrides.
//!
//! After construction the catalog is immutable; checkers select from it by
//! position.

use crate::error::ReviewError;
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Environment variables naming external catalog files, one per kind.
pub const ENV_SLIDE_TEXT: &str = "DOC2REVIEW_REQUESTS_SLIDE_TEXT";
pub const ENV_SLIDE_ARTISTIC: &str = "DOC2REVIEW_REQUESTS_SLIDE_ARTISTIC";
pub const ENV_DECK: &str = "DOC2REVIEW_REQUESTS_DECK";
pub const ENV_PARAGRAPH: &str = "DOC2REVIEW_REQUESTS_PARAGRAPH";
pub const ENV_POST: &str = "DOC2REVIEW_REQUESTS_POST";

static RE_ENV_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]*)\}").unwrap());

/// One review request: a named prompt with optional sampling parameters
/// and an optional chained post request.
///
/// The serde names match the external catalog file format, where `request`
/// may also be an array of strings joined with spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(rename = "request_name")]
    pub name: String,
    #[serde(rename = "request", deserialize_with = "string_or_seq")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_request_name: Option<String>,
}

impl ReviewRequest {
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f32,
        top_p: f32,
    ) -> Self {
        ReviewRequest {
            name: name.into(),
            prompt: prompt.into(),
            temperature: Some(temperature),
            top_p: Some(top_p),
            post_request_name: None,
        }
    }
}

/// A pre/post template: `pre` is prepended to every primary prompt when
/// selected, `post` runs as a chained request against primary responses.
#[derive(Debug, Clone, Deserialize)]
pub struct PostRequest {
    #[serde(rename = "request_name")]
    pub name: String,
    #[serde(rename = "pre_additional_request", default)]
    pub pre: String,
    #[serde(rename = "post_additional_request", default)]
    pub post: String,
}

/// Which primary catalog a selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    SlideText,
    SlideArtistic,
    Deck,
    Paragraph,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CatalogKind::SlideText => "slide text",
            CatalogKind::SlideArtistic => "slide artistic",
            CatalogKind::Deck => "deck",
            CatalogKind::Paragraph => "paragraph",
        };
        f.write_str(s)
    }
}

/// The resolved, immutable request catalogs for one run.
#[derive(Debug, Clone)]
pub struct RequestCatalog {
    slide_text: Vec<ReviewRequest>,
    slide_artistic: Vec<ReviewRequest>,
    deck: Vec<ReviewRequest>,
    paragraph: Vec<ReviewRequest>,
    post: Vec<PostRequest>,
    selected_post_ids: Vec<usize>,
}

impl RequestCatalog {
    /// Build the catalogs for one run.
    ///
    /// `post_ids` selects pre/post templates by ordinal; `force_*` rewrite
    /// the sampling parameters of every entry after loading.
    pub fn load(
        color_palette: &[String],
        post_ids: &[usize],
        force_temperature: Option<f32>,
        force_top_p: Option<f32>,
    ) -> Result<Self, ReviewError> {
        let mut slide_text = prompts::builtin_slide_text();
        let mut slide_artistic = prompts::builtin_slide_artistic(color_palette);
        let mut deck = prompts::builtin_deck();
        let mut paragraph = prompts::builtin_paragraph();
        let mut post = prompts::builtin_post();

        append_external(&mut slide_text, external_catalog_path(ENV_SLIDE_TEXT))?;
        append_external(&mut slide_artistic, external_catalog_path(ENV_SLIDE_ARTISTIC))?;
        append_external(&mut deck, external_catalog_path(ENV_DECK))?;
        append_external(&mut paragraph, external_catalog_path(ENV_PARAGRAPH))?;
        append_external(&mut post, external_catalog_path(ENV_POST))?;

        for list in [&mut slide_text, &mut slide_artistic, &mut deck, &mut paragraph] {
            for request in list.iter_mut() {
                request.name = resolve_env_tokens(&request.name);
                request.prompt = resolve_env_tokens(&request.prompt);
            }
        }
        for template in post.iter_mut() {
            template.pre = resolve_env_tokens(&template.pre);
            template.post = resolve_env_tokens(&template.post);
        }

        for &id in post_ids {
            if id >= post.len() {
                return Err(ReviewError::InvalidRequestIndex {
                    index: id,
                    kind: "post".into(),
                    len: post.len(),
                });
            }
        }
        let pre_text: String = post_ids.iter().map(|&id| post[id].pre.as_str()).collect();
        let post_text: String = post_ids.iter().map(|&id| post[id].post.as_str()).collect();
        if !pre_text.is_empty() || !post_text.is_empty() {
            debug!("wrapping primary prompts with {} post template(s)", post_ids.len());
            for list in [&mut slide_text, &mut slide_artistic, &mut deck, &mut paragraph] {
                for request in list.iter_mut() {
                    request.prompt = format!("{pre_text}{}{post_text}", request.prompt);
                }
            }
        }

        if force_temperature.is_some() || force_top_p.is_some() {
            for list in [&mut slide_text, &mut slide_artistic, &mut deck, &mut paragraph] {
                for request in list.iter_mut() {
                    if force_temperature.is_some() {
                        request.temperature = force_temperature;
                    }
                    if force_top_p.is_some() {
                        request.top_p = force_top_p;
                    }
                }
            }
        }

        Ok(RequestCatalog {
            slide_text,
            slide_artistic,
            deck,
            paragraph,
            post,
            selected_post_ids: post_ids.to_vec(),
        })
    }

    fn by_kind(&self, kind: CatalogKind) -> &[ReviewRequest] {
        match kind {
            CatalogKind::SlideText => &self.slide_text,
            CatalogKind::SlideArtistic => &self.slide_artistic,
            CatalogKind::Deck => &self.deck,
            CatalogKind::Paragraph => &self.paragraph,
        }
    }

    pub fn len(&self, kind: CatalogKind) -> usize {
        self.by_kind(kind).len()
    }

    pub fn is_empty(&self, kind: CatalogKind) -> bool {
        self.by_kind(kind).is_empty()
    }

    /// Select requests by zero-based position. `None` selects everything.
    /// The result is in catalog order; duplicate indices collapse.
    pub fn select(
        &self,
        kind: CatalogKind,
        indices: Option<&[usize]>,
    ) -> Result<Vec<ReviewRequest>, ReviewError> {
        let catalog = self.by_kind(kind);
        let Some(indices) = indices else {
            return Ok(catalog.to_vec());
        };
        for &idx in indices {
            if idx >= catalog.len() {
                return Err(ReviewError::InvalidRequestIndex {
                    index: idx,
                    kind: kind.to_string(),
                    len: catalog.len(),
                });
            }
        }
        Ok(catalog
            .iter()
            .enumerate()
            .filter(|(i, _)| indices.contains(i))
            .map(|(_, r)| r.clone())
            .collect())
    }

    /// The globally selected post templates, as runnable requests.
    /// Templates whose `post` text is empty chain nothing.
    pub fn post_selected(&self) -> Vec<ReviewRequest> {
        self.selected_post_ids
            .iter()
            .map(|&id| &self.post[id])
            .filter(|t| !t.post.is_empty())
            .map(post_as_request)
            .collect()
    }

    /// Post templates matching a response's `post_request_name`.
    pub fn post_by_name(&self, name: &str) -> Vec<ReviewRequest> {
        self.post
            .iter()
            .filter(|t| t.name == name && !t.post.is_empty())
            .map(post_as_request)
            .collect()
    }

    /// True when any selected template carries a chained request.
    pub fn has_post_stage(&self) -> bool {
        !self.post_selected().is_empty()
    }

    /// Human-readable catalog listing for the CLI.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (label, list) in [
            ("slide text", &self.slide_text),
            ("slide artistic", &self.slide_artistic),
            ("deck", &self.deck),
            ("paragraph", &self.paragraph),
        ] {
            out.push_str(&format!("{label} requests:\n"));
            for (i, r) in list.iter().enumerate() {
                out.push_str(&format!(
                    "  {i}: {} (temperature: {}, top_p: {})\n",
                    r.name,
                    r.temperature.unwrap_or(0.1),
                    r.top_p.unwrap_or(0.1),
                ));
            }
        }
        out.push_str("post templates:\n");
        for (i, t) in self.post.iter().enumerate() {
            out.push_str(&format!("  {i}: {}\n", t.name));
        }
        out
    }
}

fn post_as_request(template: &PostRequest) -> ReviewRequest {
    ReviewRequest {
        name: template.name.clone(),
        prompt: template.post.clone(),
        temperature: None,
        top_p: None,
        post_request_name: None,
    }
}

/// Resolve `{NAME}` / `{NAME,default}` tokens against the environment,
/// replacing each token occurrence exactly once. Unset variables without a
/// default resolve to the empty string.
pub fn resolve_env_tokens(text: &str) -> String {
    let mut resolved = text.to_string();
    for capture in RE_ENV_TOKEN.captures_iter(text) {
        let inner = &capture[1];
        let (name, default) = match inner.split_once(',') {
            Some((name, default)) => (name, default),
            None => (inner, ""),
        };
        let value = std::env::var(name).unwrap_or_else(|_| default.to_string());
        resolved = resolved.replacen(&capture[0], &value, 1);
    }
    resolved
}

/// Path of the external catalog file named by `var`, if any. An unset or
/// empty variable means no extension file.
fn external_catalog_path(var: &str) -> Option<PathBuf> {
    match std::env::var(var) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => None,
    }
}

/// Append the entries of an external JSON catalog file.
fn append_external<T: serde::de::DeserializeOwned>(
    list: &mut Vec<T>,
    source: Option<PathBuf>,
) -> Result<(), ReviewError> {
    let Some(path) = source else {
        return Ok(());
    };
    let raw = std::fs::read_to_string(&path).map_err(|e| ReviewError::CatalogFile {
        path: path.clone(),
        detail: e.to_string(),
    })?;
    let mut extra: Vec<T> =
        serde_json::from_str(&raw).map_err(|e| ReviewError::CatalogFile {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    debug!("loaded {} request(s) from {}", extra.len(), path.display());
    list.append(&mut extra);
    Ok(())
}

fn string_or_seq<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrSeq;

    impl<'de> Visitor<'de> for StringOrSeq {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an array of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<String, A::Error> {
            let mut parts: Vec<String> = Vec::new();
            while let Some(part) = seq.next_element::<String>()? {
                parts.push(part);
            }
            Ok(parts.join(" "))
        }
    }

    deserializer.deserialize_any(StringOrSeq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn plain_catalog() -> RequestCatalog {
        RequestCatalog::load(&["green".into()], &[], None, None).unwrap()
    }

    #[test]
    fn env_token_defaults_and_empty() {
        assert_eq!(
            resolve_env_tokens("Extract {DOC2REVIEW_TEST_UNSET_A,technical} details"),
            "Extract technical details"
        );
        assert_eq!(
            resolve_env_tokens("before {DOC2REVIEW_TEST_UNSET_B} after"),
            "before  after"
        );
    }

    #[test]
    fn env_token_reads_environment() {
        std::env::set_var("DOC2REVIEW_TEST_TOKEN_C", "financial");
        assert_eq!(
            resolve_env_tokens("{DOC2REVIEW_TEST_TOKEN_C} and {DOC2REVIEW_TEST_TOKEN_C}"),
            "financial and financial"
        );
    }

    #[test]
    fn select_none_returns_all() {
        let catalog = plain_catalog();
        let all = catalog.select(CatalogKind::Deck, None).unwrap();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn select_keeps_catalog_order_and_collapses_duplicates() {
        let catalog = plain_catalog();
        let picked = catalog
            .select(CatalogKind::Deck, Some(&[2, 0, 2]))
            .unwrap();
        assert_eq!(picked.len(), 2);
        let all = catalog.select(CatalogKind::Deck, None).unwrap();
        assert_eq!(picked[0].name, all[0].name);
        assert_eq!(picked[1].name, all[2].name);
    }

    #[test]
    fn select_full_range_round_trips() {
        let catalog = plain_catalog();
        let every: Vec<usize> = (0..catalog.len(CatalogKind::Paragraph)).collect();
        let by_range = catalog
            .select(CatalogKind::Paragraph, Some(&every))
            .unwrap();
        let by_none = catalog.select(CatalogKind::Paragraph, None).unwrap();
        assert_eq!(by_range.len(), by_none.len());
        for (a, b) in by_range.iter().zip(by_none.iter()) {
            assert_eq!(a.name, b.name);
        }
    }

    #[test]
    fn select_out_of_range_is_an_error() {
        let catalog = plain_catalog();
        let err = catalog
            .select(CatalogKind::SlideText, Some(&[7]))
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidRequestIndex { index: 7, .. }));
    }

    #[test]
    fn post_template_wraps_primary_prompts() {
        let wrapped = RequestCatalog::load(&[], &[1], None, None).unwrap();
        let request = &wrapped.select(CatalogKind::Deck, Some(&[0])).unwrap()[0];
        assert!(request.prompt.starts_with("- For the request below"));
        assert!(request.prompt.contains("Summarize the 3 most important"));
        assert!(wrapped.has_post_stage());
        assert_eq!(wrapped.post_selected().len(), 1);
    }

    #[test]
    fn none_template_chains_nothing() {
        let catalog = RequestCatalog::load(&[], &[0], None, None).unwrap();
        assert!(!catalog.has_post_stage());
        assert!(catalog.post_selected().is_empty());
    }

    #[test]
    fn post_by_name_matches_templates_with_chained_text() {
        let catalog = plain_catalog();
        assert_eq!(catalog.post_by_name("Summary finding").len(), 1);
        assert!(catalog.post_by_name("None").is_empty());
        assert!(catalog.post_by_name("missing").is_empty());
    }

    #[test]
    fn forced_overrides_rewrite_every_entry() {
        let catalog = RequestCatalog::load(&[], &[], Some(0.9), Some(0.8)).unwrap();
        for kind in [
            CatalogKind::SlideText,
            CatalogKind::SlideArtistic,
            CatalogKind::Deck,
            CatalogKind::Paragraph,
        ] {
            for request in catalog.select(kind, None).unwrap() {
                assert_eq!(request.temperature, Some(0.9));
                assert_eq!(request.top_p, Some(0.8));
            }
        }
    }

    #[test]
    fn external_catalog_appends_and_accepts_array_prompts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"request_name": "Custom check", "request": ["part one", "part two"], "temperature": 0.2}}]"#
        )
        .unwrap();

        let mut deck = prompts::builtin_deck();
        append_external(&mut deck, Some(file.path().to_path_buf())).unwrap();

        assert_eq!(deck.len(), 11);
        assert_eq!(deck[10].name, "Custom check");
        assert_eq!(deck[10].prompt, "part one part two");
        assert_eq!(deck[10].temperature, Some(0.2));
        assert_eq!(deck[10].top_p, None);
    }

    #[test]
    fn bad_external_catalog_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = append_external::<ReviewRequest>(
            &mut Vec::new(),
            Some(file.path().to_path_buf()),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::CatalogFile { .. }));
    }

    #[test]
    fn unset_or_empty_variable_means_no_extension_file() {
        assert!(external_catalog_path("DOC2REVIEW_TEST_UNSET_D").is_none());
        std::env::set_var("DOC2REVIEW_TEST_EMPTY_E", "");
        assert!(external_catalog_path("DOC2REVIEW_TEST_EMPTY_E").is_none());
    }
}
