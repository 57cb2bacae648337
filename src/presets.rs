//! Site presets
//!
//! A [`SitePreset`] bundles everything site-specific: the field schema, the
//! "see more" expansion, the apply click sequence, the job-card selectors
//! used by bulk apply and the root the content watcher observes. The LinkedIn
//! preset is built in; others can be loaded from JSON.

use crate::automation::{AwaitSpec, InteractionStep, RetryPolicy, StepSequence};
use crate::dom::{FieldSchema, FieldSpec, SelectorSet};
use crate::error::Result;
use crate::extract::ExtractionPipeline;
use crate::timing::Timings;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePreset {
    pub name: String,
    pub fields: FieldSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<InteractionStep>,
    pub apply: StepSequence,
    pub job_cards: SelectorSet,
    #[serde(default = "default_content_root")]
    pub content_root: String,
}

fn default_content_root() -> String {
    "body".to_string()
}

impl SitePreset {
    /// LinkedIn job pages, with retries and waits taken from `timings`
    pub fn linkedin(timings: &Timings) -> Result<Self> {
        let fields = FieldSchema::from_specs([
            FieldSpec::new(
                "title",
                SelectorSet::new([
                    ".jobs-unified-top-card__job-title",
                    ".job-details-jobs-unified-top-card__job-title",
                    ".t-24.t-bold",
                ]),
            ),
            FieldSpec::new(
                "company",
                SelectorSet::new([
                    ".jobs-unified-top-card__company-name",
                    ".job-details-jobs-unified-top-card__company-name",
                ]),
            ),
            FieldSpec::new(
                "location",
                SelectorSet::new([
                    ".jobs-unified-top-card__bullet",
                    ".job-details-jobs-unified-top-card__bullet",
                    ".jobs-unified-top-card__workplace-type",
                ]),
            ),
            FieldSpec::new(
                "description",
                SelectorSet::new([".jobs-description-content__text", ".jobs-description__content", "#job-details"]),
            ),
            FieldSpec::new(
                "postedDate",
                SelectorSet::new([
                    ".jobs-unified-top-card__posted-date",
                    ".job-details-jobs-unified-top-card__primary-description-container .tvm__text--positive",
                ]),
            ),
        ])?;

        let retry = RetryPolicy::from_timings(timings);
        let submit = SelectorSet::new([
            "button[aria-label='Submit application']",
            "button[aria-label*='Submit']",
            ".jobs-easy-apply-modal footer button.artdeco-button--primary",
        ]);

        let apply = StepSequence::new(vec![
            InteractionStep::new(
                "apply button",
                SelectorSet::new([".jobs-apply-button", "button[aria-label*='Easy Apply']"]),
            )
            .with_retry(retry)
            .awaiting(AwaitSpec::new("submit button", submit.clone(), timings.watcher_fallback)),
            InteractionStep::new("submit button", submit).with_retry(retry).with_settle(timings.click_delay),
        ])?;

        let expand = InteractionStep::new(
            "see more button",
            SelectorSet::new([
                "button.jobs-description__footer-button",
                "button[aria-label*='see more description']",
                ".jobs-description__footer-button",
            ]),
        )
        .with_retry(RetryPolicy::new(1, timings.element_wait))
        .with_settle(timings.click_delay);

        Ok(Self {
            name: "linkedin".to_string(),
            fields,
            expand: Some(expand),
            apply,
            job_cards: SelectorSet::new([
                ".jobs-search-results__list-item",
                ".job-card-container--clickable",
                ".scaffold-layout__list-item",
            ]),
            content_root: default_content_root(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a preset from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Extraction pipeline for this site
    pub fn pipeline(&self) -> ExtractionPipeline {
        let pipeline = ExtractionPipeline::new(self.fields.clone());
        match &self.expand {
            Some(step) => pipeline.with_expand(step.clone()),
            None => pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_linkedin_defaults() {
        let preset = SitePreset::linkedin(&Timings::default()).unwrap();

        let names: Vec<_> = preset.fields.names().collect();
        assert_eq!(names, vec!["title", "company", "location", "description", "postedDate"]);

        let steps = preset.apply.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].retry, RetryPolicy::new(3, Duration::from_millis(2000)));
        let awaits = steps[0].awaits.as_ref().unwrap();
        assert_eq!(awaits.label, "submit button");
        assert_eq!(awaits.fallback, Duration::from_secs(10));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let preset = SitePreset::linkedin(&Timings::default()).unwrap();
        let json = serde_json::to_string_pretty(&preset).unwrap();
        let loaded = SitePreset::from_json(&json).unwrap();
        assert_eq!(loaded, preset);
    }

    #[test]
    fn test_blank_field_name_rejected() {
        let json = r#"{
            "name": "blank",
            "fields": {"title": ["h1"], " ": ["h2"]},
            "apply": [{"label": "apply", "target": ["button"]}],
            "jobCards": ["li"]
        }"#;
        assert!(SitePreset::from_json(json).is_err());
    }

    #[test]
    fn test_minimal_json_preset() {
        let json = r#"{
            "name": "board",
            "fields": {"title": ["h1.job"], "company": [".org"]},
            "apply": [{"label": "apply button", "target": ["a.apply"]}],
            "jobCards": [".result"]
        }"#;
        let preset = SitePreset::from_json(json).unwrap();
        assert_eq!(preset.content_root, "body");
        assert!(preset.expand.is_none());
        assert_eq!(preset.pipeline().schema().len(), 2);
    }
}
