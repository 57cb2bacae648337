use crate::dom::{Document, ElementNode, MutationBatch};
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use headless_chrome::Tab;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

const QUERY_JS: &str = include_str!("query_elements.js");
const CLICK_JS: &str = include_str!("click_element.js");
const OBSERVE_JS: &str = include_str!("observe_mutations.js");

/// How often installed mutation observers are read back
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    elements: Vec<RawElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElement {
    tag_name: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    text: Option<String>,
    visible: bool,
    #[serde(rename = "box")]
    bounds: Option<RawBox>,
}

#[derive(Debug, Deserialize)]
struct RawBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Counters kept by an injected MutationObserver
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
struct ObserverState {
    seq: u64,
    added: usize,
    removed: usize,
    /// `performance.timeOrigin` of the document the observer lives in
    #[serde(default)]
    origin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObserveMode {
    /// Install unless already present, then read the counters
    Install,
    Uninstall,
}

impl ObserveMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

/// Batch to publish for a fresh reading of the observer, if any.
///
/// A different document origin means the page navigated and the observer was
/// reinstalled, which always counts as a change.
fn next_batch(last: &mut ObserverState, now: Option<ObserverState>) -> Option<(usize, usize)> {
    let now = now?;
    if now.origin != last.origin {
        *last = now;
        return Some((0, 0));
    }
    if now.seq > last.seq {
        let delta = (now.added.saturating_sub(last.added), now.removed.saturating_sub(last.removed));
        *last = now;
        return Some(delta);
    }
    None
}

/// [`Document`] backed by a live Chrome tab.
///
/// Queries and clicks are evaluated in the page; mutation feeds come from an
/// injected `MutationObserver` whose counters are polled.
pub struct TabDocument {
    tab: Arc<Tab>,
    poll_interval: Duration,
    next_observer: AtomicU64,
}

impl TabDocument {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab, poll_interval: DEFAULT_POLL_INTERVAL, next_observer: AtomicU64::new(0) }
    }

    /// Builder method: set how often mutation counters are read
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    async fn query(&self, selector: &str, limit: Option<usize>) -> Result<Vec<ElementNode>> {
        let script = format!("({})({}, {})", QUERY_JS, serde_json::to_string(selector)?, serde_json::to_string(&limit)?);
        let result: QueryResult = evaluate_json(Arc::clone(&self.tab), script).await?;

        if let Some(reason) = result.error {
            return Err(BrowserError::InvalidSelector { selector: selector.to_string(), reason });
        }

        Ok(result
            .elements
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let mut node = ElementNode::new(raw.tag_name)
                    .with_attributes(raw.attributes)
                    .with_match(selector, index)
                    .with_visibility(raw.visible);
                if let Some(text) = raw.text {
                    node = node.with_text(text);
                }
                if let Some(b) = raw.bounds {
                    node = node.with_bounding_box(b.x, b.y, b.width, b.height);
                }
                node
            })
            .collect())
    }
}

/// Evaluate `script` (which returns a JSON string) off the async runtime
async fn evaluate_json<T: DeserializeOwned + Send + 'static>(tab: Arc<Tab>, script: String) -> Result<T> {
    tokio::task::spawn_blocking(move || {
        let result = tab.evaluate(&script, false).map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;
        let value = result
            .value
            .ok_or_else(|| BrowserError::EvaluationFailed("No value returned from script".to_string()))?;
        let json: String = serde_json::from_value(value)
            .map_err(|e| BrowserError::DomParseFailed(format!("Expected a JSON string: {}", e)))?;
        serde_json::from_str(&json).map_err(|e| BrowserError::DomParseFailed(format!("Failed to parse script result: {}", e)))
    })
    .await
    .map_err(|e| BrowserError::TabOperationFailed(format!("Evaluation task failed: {}", e)))?
}

fn observe_script(root: &str, key: &str, mode: ObserveMode) -> Result<String> {
    Ok(format!(
        "({})({}, {}, {})",
        OBSERVE_JS,
        serde_json::to_string(root)?,
        serde_json::to_string(key)?,
        serde_json::to_string(mode.as_str())?
    ))
}

#[async_trait]
impl Document for TabDocument {
    async fn query_first(&self, selector: &str) -> Result<Option<ElementNode>> {
        Ok(self.query(selector, Some(1)).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementNode>> {
        self.query(selector, None).await
    }

    async fn click(&self, element: &ElementNode) -> Result<()> {
        let selector = element
            .selector
            .as_deref()
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{} was not located by selector", element.describe())))?;
        let script = format!("JSON.stringify(({})({}, {}))", CLICK_JS, serde_json::to_string(selector)?, element.match_index);
        let status: String = evaluate_json(Arc::clone(&self.tab), script).await?;

        match status.as_str() {
            "clicked" => Ok(()),
            "hidden" => Err(BrowserError::ElementNotVisible(format!("'{}'[{}]", selector, element.match_index))),
            _ => Err(BrowserError::ElementNotFound(format!(
                "'{}'[{}] is no longer attached",
                selector, element.match_index
            ))),
        }
    }

    async fn url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn subscribe(&self, root: &str) -> Result<watch::Receiver<MutationBatch>> {
        let key = format!("observer-{}", self.next_observer.fetch_add(1, Ordering::SeqCst));
        let installed: Option<ObserverState> =
            evaluate_json(Arc::clone(&self.tab), observe_script(root, &key, ObserveMode::Install)?).await?;
        let mut last = installed
            .ok_or_else(|| BrowserError::ElementNotFound(format!("No element matches observer root '{}'", root)))?;

        let (tx, rx) = watch::channel(MutationBatch::default());
        let tab = Arc::clone(&self.tab);
        let interval = self.poll_interval;
        let root = root.to_string();

        tokio::spawn(async move {
            let mut seq = 0;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let script = match observe_script(&root, &key, ObserveMode::Install) {
                    Ok(script) => script,
                    Err(_) => break,
                };
                let state: Option<ObserverState> = match evaluate_json(Arc::clone(&tab), script).await {
                    Ok(state) => state,
                    Err(e) => {
                        log::debug!("Stopping observer on '{}': {}", root, e);
                        break;
                    }
                };

                if state.is_none() {
                    log::trace!("Observer root '{}' not present yet", root);
                }
                if let Some((added, removed)) = next_batch(&mut last, state) {
                    seq += 1;
                    tx.send_replace(MutationBatch { seq, added, removed });
                }
            }

            // the page keeps the observer alive until told otherwise
            match observe_script(&root, &key, ObserveMode::Uninstall) {
                Ok(script) => {
                    if let Err(e) = evaluate_json::<Option<ObserverState>>(tab, script).await {
                        log::debug!("Failed to uninstall observer on '{}': {}", root, e);
                    }
                }
                Err(e) => log::debug!("Failed to build uninstall script: {}", e),
            }
        });

        Ok(rx)
    }
}
