//! In-memory [`Document`] backend built on `scraper`
//!
//! Markup is kept as a string and re-parsed per operation. Structural edits
//! (append, remove, full replacement) publish a [`MutationBatch`] to every
//! subscriber whose root contains the change. Clicks can be scripted to
//! trigger such edits, which is enough to replay asynchronous page behavior
//! deterministically.

use crate::dom::{Document, ElementNode, MutationBatch};
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// DOM edit performed when a matching element is clicked
#[derive(Debug, Clone)]
pub enum ClickReaction {
    /// Append `html` as the last children of the first `parent` match
    Append { parent: String, html: String },
    /// Remove every element matching the selector
    Remove(String),
    /// Replace the whole document, as a navigation would
    Navigate { url: String, markup: String },
}

#[derive(Debug)]
struct Subscriber {
    root: String,
    tx: watch::Sender<MutationBatch>,
}

#[derive(Debug)]
struct State {
    markup: String,
    url: String,
    seq: u64,
    subscribers: Vec<Subscriber>,
    reactions: Vec<(String, ClickReaction)>,
    queries: Vec<String>,
    clicks: Vec<String>,
}

#[derive(Debug)]
pub struct HtmlDocument {
    state: Mutex<State>,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Whether an element's own markup hides it from rendering
fn hides(element: &scraper::node::Element) -> bool {
    if element.attr("hidden").is_some() {
        return true;
    }
    if element.name() == "input" && element.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
        return true;
    }
    element.attr("style").is_some_and(|style| {
        let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

fn snapshot(element: ElementRef<'_>, selector: &str, match_index: usize) -> ElementNode {
    let attributes: HashMap<String, String> = element
        .value()
        .attrs()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    let rendered = std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| !hides(el.value()));

    ElementNode::new(element.value().name())
        .with_attributes(attributes)
        .with_text(element.text().collect::<String>())
        .with_match(selector, match_index)
        .with_visibility(rendered)
}

fn count_elements(html: &Html) -> usize {
    html.root_element().descendants().filter(|n| n.value().is_element()).count()
}

impl HtmlDocument {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                markup: markup.into(),
                url: "about:blank".to_string(),
                seq: 0,
                subscribers: Vec::new(),
                reactions: Vec::new(),
                queries: Vec::new(),
                clicks: Vec::new(),
            }),
        }
    }

    /// Builder method: set the page URL
    pub fn with_url(self, url: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.url = url.into();
        }
        self
    }

    /// Script a DOM edit to run whenever an element matching `selector` is clicked
    pub fn on_click(&self, selector: impl Into<String>, reaction: ClickReaction) -> Result<()> {
        let selector = selector.into();
        parse_selector(&selector)?;
        self.state()?.reactions.push((selector, reaction));
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Document state poisoned: {}", e)))
    }

    /// Current serialized markup
    pub fn markup(&self) -> Result<String> {
        Ok(self.state()?.markup.clone())
    }

    /// Selectors queried so far, in order
    pub fn query_log(&self) -> Vec<String> {
        self.state().map(|s| s.queries.clone()).unwrap_or_default()
    }

    /// Clicked targets so far, as `selector[index]`
    pub fn click_log(&self) -> Vec<String> {
        self.state().map(|s| s.clicks.clone()).unwrap_or_default()
    }

    fn select(&self, selector: &str, limit: usize) -> Result<Vec<ElementNode>> {
        let parsed = parse_selector(selector)?;
        let mut state = self.state()?;
        state.queries.push(selector.to_string());

        let html = Html::parse_document(&state.markup);
        Ok(html
            .select(&parsed)
            .take(limit)
            .enumerate()
            .map(|(i, el)| snapshot(el, selector, i))
            .collect())
    }

    /// Append `fragment` as the last children of the first element matching `parent`
    pub fn append_html(&self, parent: &str, fragment: &str) -> Result<()> {
        let parent_sel = parse_selector(parent)?;
        let mut state = self.state()?;
        let mut html = Html::parse_document(&state.markup);

        let (parent_id, affected) = {
            let node = html
                .select(&parent_sel)
                .next()
                .ok_or_else(|| BrowserError::ElementNotFound(format!("No element matches '{}'", parent)))?;
            (node.id(), state.covering(&html, node, true))
        };

        let fragment = Html::parse_fragment(fragment);
        let mut added = 0;
        let mut pending = vec![(parent_id, *fragment.root_element())];
        while let Some((dst, src)) = pending.pop() {
            for child in src.children() {
                let Some(mut target) = html.tree.get_mut(dst) else {
                    continue;
                };
                let id = target.append(child.value().clone()).id();
                if dst == parent_id && child.value().is_element() {
                    added += 1;
                }
                pending.push((id, child));
            }
        }

        state.markup = html.html();
        state.publish(&affected, added, 0);
        Ok(())
    }

    /// Remove every element matching `selector`; returns how many were removed
    pub fn remove(&self, selector: &str) -> Result<usize> {
        let parsed = parse_selector(selector)?;
        let mut state = self.state()?;
        let mut html = Html::parse_document(&state.markup);

        let mut affected = Vec::new();
        let ids: Vec<_> = html
            .select(&parsed)
            .map(|node| {
                for idx in state.covering(&html, node, false) {
                    if !affected.contains(&idx) {
                        affected.push(idx);
                    }
                }
                node.id()
            })
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }
        for id in &ids {
            if let Some(mut node) = html.tree.get_mut(*id) {
                node.detach();
            }
        }

        state.markup = html.html();
        state.publish(&affected, 0, ids.len());
        Ok(ids.len())
    }

    /// Replace the whole document, as a navigation or SPA re-render would
    pub fn replace_markup(&self, markup: impl Into<String>) -> Result<()> {
        let markup = markup.into();
        let mut state = self.state()?;
        let removed = count_elements(&Html::parse_document(&state.markup));
        let added = count_elements(&Html::parse_document(&markup));
        state.markup = markup;
        let everyone: Vec<usize> = (0..state.subscribers.len()).collect();
        state.publish(&everyone, added, removed);
        Ok(())
    }

    pub fn set_url(&self, url: impl Into<String>) -> Result<()> {
        self.state()?.url = url.into();
        Ok(())
    }

    fn apply(&self, reaction: ClickReaction) -> Result<()> {
        match reaction {
            ClickReaction::Append { parent, html } => self.append_html(&parent, &html),
            ClickReaction::Remove(selector) => self.remove(&selector).map(|_| ()),
            ClickReaction::Navigate { url, markup } => {
                self.set_url(url)?;
                self.replace_markup(markup)
            }
        }
    }
}

impl State {
    /// Subscribers whose root contains `node` (or is `node`, when `include_self`)
    fn covering(&self, html: &Html, node: ElementRef<'_>, include_self: bool) -> Vec<usize> {
        self.subscribers
            .iter()
            .enumerate()
            .filter(|(_, sub)| {
                let Ok(root_sel) = Selector::parse(&sub.root) else {
                    return false;
                };
                html.select(&root_sel).next().is_some_and(|root| {
                    (include_self && root.id() == node.id()) || node.ancestors().any(|a| a.id() == root.id())
                })
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn publish(&mut self, targets: &[usize], added: usize, removed: usize) {
        self.seq += 1;
        let batch = MutationBatch { seq: self.seq, added, removed };
        for &idx in targets {
            if let Some(sub) = self.subscribers.get(idx) {
                sub.tx.send_replace(batch);
            }
        }
        self.subscribers.retain(|sub| !sub.tx.is_closed());
    }
}

#[async_trait]
impl Document for HtmlDocument {
    async fn query_first(&self, selector: &str) -> Result<Option<ElementNode>> {
        Ok(self.select(selector, 1)?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementNode>> {
        self.select(selector, usize::MAX)
    }

    async fn click(&self, element: &ElementNode) -> Result<()> {
        let selector = element
            .selector
            .as_deref()
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{} was not located by selector", element.describe())))?;
        let parsed = parse_selector(selector)?;

        let reactions = {
            let mut state = self.state()?;
            let html = Html::parse_document(&state.markup);
            let target = html.select(&parsed).nth(element.match_index).ok_or_else(|| {
                BrowserError::ElementNotFound(format!("'{}'[{}] is no longer attached", selector, element.match_index))
            })?;
            if !snapshot(target, selector, element.match_index).is_rendered() {
                return Err(BrowserError::ElementNotVisible(format!("'{}'[{}]", selector, element.match_index)));
            }
            state.clicks.push(format!("{}[{}]", selector, element.match_index));

            state
                .reactions
                .iter()
                .filter(|(trigger, _)| {
                    Selector::parse(trigger).is_ok_and(|sel| html.select(&sel).any(|el| el.id() == target.id()))
                })
                .map(|(_, reaction)| reaction.clone())
                .collect::<Vec<_>>()
        };

        for reaction in reactions {
            self.apply(reaction)?;
        }
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state()?.url.clone())
    }

    async fn subscribe(&self, root: &str) -> Result<watch::Receiver<MutationBatch>> {
        let parsed = parse_selector(root)?;
        let mut state = self.state()?;
        if Html::parse_document(&state.markup).select(&parsed).next().is_none() {
            return Err(BrowserError::ElementNotFound(format!("No element matches observer root '{}'", root)));
        }
        let (tx, rx) = watch::channel(MutationBatch { seq: state.seq, added: 0, removed: 0 });
        state.subscribers.push(Subscriber { root: root.to_string(), tx });
        Ok(rx)
    }
}
