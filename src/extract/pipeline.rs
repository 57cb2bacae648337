use crate::automation::InteractionStep;
use crate::context::ExecutionContext;
use crate::dom::{Document, FieldSchema, locate, normalize_text};
use crate::error::Result;
use crate::extract::JobRecord;
use chrono::Utc;
use indexmap::IndexMap;

/// Field schema plus an optional best-effort "see more" expansion
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    schema: FieldSchema,
    expand: Option<InteractionStep>,
}

impl ExtractionPipeline {
    pub fn new(schema: FieldSchema) -> Self {
        Self { schema, expand: None }
    }

    /// Builder method: click `step` (if present and visible) before reading fields.
    /// The step's settle time is waited after the click.
    pub fn with_expand(mut self, step: InteractionStep) -> Self {
        self.expand = Some(step);
        self
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Extract one JobRecord from the current page.
    ///
    /// Expansion problems are logged and ignored. Only document backend
    /// failures (lost tab, evaluation error) fail the extraction.
    pub async fn extract(&self, doc: &dyn Document, ctx: &ExecutionContext, allow_expand: bool) -> Result<JobRecord> {
        if allow_expand {
            if let Some(step) = &self.expand {
                self.expand(doc, ctx, step).await;
            }
        }

        let mut fields = IndexMap::with_capacity(self.schema.len());
        for (name, selectors) in self.schema.iter() {
            let found = locate(doc, selectors).await?;
            fields.insert(name.to_string(), normalize_text(found.as_ref()));
        }

        let url = doc.url().await?;
        let record = JobRecord::new(fields, &url, Utc::now());
        log::debug!("Extracted '{}' from {}", record.title(), record.url());
        Ok(record)
    }

    async fn expand(&self, doc: &dyn Document, ctx: &ExecutionContext, step: &InteractionStep) {
        let target = match locate(doc, &step.target).await {
            Ok(Some(el)) if el.is_rendered() => el,
            Ok(Some(_)) => {
                log::debug!("{} present but hidden, skipping expansion", step.label);
                return;
            }
            Ok(None) => {
                log::debug!("No {} on page", step.label);
                return;
            }
            Err(e) => {
                log::warn!("Could not look for {}: {}", step.label, e);
                return;
            }
        };

        if let Err(e) = doc.click(&target).await {
            log::warn!("Failed to click {}: {}", step.label, e);
            return;
        }
        ctx.pause(step.settle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::ClickReaction;
    use crate::dom::{FieldSpec, HtmlDocument, SelectorSet};
    use std::time::Duration;

    fn pipeline() -> ExtractionPipeline {
        let schema = FieldSchema::from_specs([
            FieldSpec::new("title", SelectorSet::new([".top-card__title", "h1"])),
            FieldSpec::new("company", SelectorSet::new([".top-card__company"])),
            FieldSpec::new("description", SelectorSet::new([".description"])),
        ])
        .unwrap();
        ExtractionPipeline::new(schema).with_expand(
            InteractionStep::new("see more button", SelectorSet::new(["button.see-more"]))
                .with_settle(Duration::from_millis(1500)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_without_expand_affordance() {
        let doc = HtmlDocument::new(
            r#"<html><body><h1>  Data
                Engineer</h1><div class="description">Build pipelines</div></body></html>"#,
        )
        .with_url("https://jobs.example.com/view/9?ref=home");
        let ctx = ExecutionContext::default();

        let record = pipeline().extract(&doc, &ctx, true).await.unwrap();

        assert_eq!(record.title(), "Data Engineer");
        assert_eq!(record.get("company"), "");
        assert_eq!(record.get("description"), "Build pipelines");
        assert_eq!(record.url(), "https://jobs.example.com/view/9");
        assert!(doc.click_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_reveals_full_description() {
        let doc = HtmlDocument::new(
            r#"<html><body><h1>Staff Engineer</h1>
               <div id="desc"><div class="description">Short</div></div>
               <button class="see-more">See more</button></body></html>"#,
        );
        doc.on_click("button.see-more", ClickReaction::Remove(".description".into())).unwrap();
        doc.on_click(
            "button.see-more",
            ClickReaction::Append { parent: "#desc".into(), html: r#"<div class="description">Short and long</div>"#.into() },
        )
        .unwrap();
        let ctx = ExecutionContext::default();

        let record = pipeline().extract(&doc, &ctx, true).await.unwrap();
        assert_eq!(record.get("description"), "Short and long");
        assert_eq!(doc.click_log().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_skipped_when_not_allowed() {
        let doc = HtmlDocument::new(
            r#"<html><body><h1>Staff Engineer</h1><button class="see-more">See more</button></body></html>"#,
        );
        let ctx = ExecutionContext::default();

        let record = pipeline().extract(&doc, &ctx, false).await.unwrap();
        assert_eq!(record.title(), "Staff Engineer");
        assert!(doc.click_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_expand_is_ignored() {
        let doc = HtmlDocument::new(
            r#"<html><body><h1>Staff Engineer</h1><button class="see-more" hidden>See more</button></body></html>"#,
        );
        let ctx = ExecutionContext::default();

        let record = pipeline().extract(&doc, &ctx, true).await.unwrap();
        assert_eq!(record.title(), "Staff Engineer");
        assert!(doc.click_log().is_empty());
    }
}
