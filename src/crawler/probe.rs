//! Script-driven navigation discovery
//!
//! Each engagement is wrapped in a [`Probe`]: acquiring it records what the
//! page looked like, releasing it puts the page back. A probe must always be
//! released before the next one is acquired.

use crate::browser::{BrowserError, BrowsingContext, NavigationOutcome};
use crate::crawler::triggers::Trigger;
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

fn digest(dom: &str) -> String {
    hex::encode(Sha256::digest(dom.as_bytes()))
}

/// A scoped engagement of one control on the page at `origin`
pub struct Probe<'a, C: BrowsingContext> {
    context: &'a mut C,
    origin: &'a Url,
    settle: Duration,
    baseline: String,
    disturbed: bool,
}

impl<'a, C: BrowsingContext> Probe<'a, C> {
    /// Records the page state so it can be verified on release
    pub async fn acquire(
        context: &'a mut C,
        origin: &'a Url,
        settle: Duration,
    ) -> Result<Probe<'a, C>, BrowserError> {
        let baseline = digest(&context.read_dom().await?);
        Ok(Self {
            context,
            origin,
            settle,
            baseline,
            disturbed: false,
        })
    }

    /// Clicks the control and reports its effect on the URL
    pub async fn engage(&mut self, selector: &str) -> Result<NavigationOutcome, BrowserError> {
        let result = self.context.engage(selector).await;
        match &result {
            Ok(NavigationOutcome::Unchanged) => {}
            // A failed click may still have run handlers
            _ => self.disturbed = true,
        }
        result
    }

    /// Restores the page to the state it had when the probe was acquired
    ///
    /// Re-navigates to the origin when the engagement moved the page or
    /// changed the DOM.
    pub async fn release(self) -> Result<(), BrowserError> {
        let dirty = self.disturbed || digest(&self.context.read_dom().await?) != self.baseline;
        if !dirty {
            return Ok(());
        }

        self.context.navigate(self.origin).await?;
        self.context.wait_stable(self.settle).await?;
        Ok(())
    }
}

/// Engages each trigger in turn and collects the URLs they lead to
///
/// A failed engagement is logged and skipped. A failed restore stops
/// discovery for this page, since later probes would start from the wrong
/// state.
pub async fn discover_script_targets<C: BrowsingContext>(
    context: &mut C,
    origin: &Url,
    triggers: &[Trigger],
    settle: Duration,
) -> Vec<Url> {
    let mut found: Vec<Url> = Vec::new();

    for trigger in triggers {
        let mut probe = match Probe::acquire(context, origin, settle).await {
            Ok(probe) => probe,
            Err(e) => {
                tracing::warn!("Cannot probe {} on {}: {}", trigger.selector, origin, e);
                break;
            }
        };

        match probe.engage(&trigger.selector).await {
            Ok(outcome) => {
                if let Some(target) = outcome.target() {
                    tracing::debug!("'{}' on {} leads to {}", trigger.label, origin, target);
                    if !found.contains(target) {
                        found.push(target.clone());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Engaging '{}' ({}) on {} failed: {}",
                    trigger.label,
                    trigger.selector,
                    origin,
                    e
                );
            }
        }

        if let Err(e) = probe.release().await {
            tracing::warn!("Failed to restore {} after probing: {}", origin, e);
            break;
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::NavigationResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Context whose engagements are scripted per selector
    struct ScriptedContext {
        current: Url,
        dom: String,
        outcomes: HashMap<String, Result<NavigationOutcome, ()>>,
        navigations: Vec<Url>,
        fail_navigation: bool,
    }

    impl ScriptedContext {
        fn new(origin: &Url) -> Self {
            Self {
                current: origin.clone(),
                dom: "<p>origin</p>".to_string(),
                outcomes: HashMap::new(),
                navigations: Vec::new(),
                fail_navigation: false,
            }
        }
    }

    #[async_trait]
    impl BrowsingContext for ScriptedContext {
        async fn navigate(&mut self, url: &Url) -> Result<NavigationResponse, BrowserError> {
            if self.fail_navigation {
                return Err(BrowserError::Navigation("gone".to_string()));
            }
            self.navigations.push(url.clone());
            self.current = url.clone();
            self.dom = "<p>origin</p>".to_string();
            Ok(NavigationResponse {
                final_url: url.clone(),
                status: 200,
            })
        }

        async fn wait_stable(&mut self, _budget: Duration) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn current_url(&mut self) -> Result<Url, BrowserError> {
            Ok(self.current.clone())
        }

        async fn read_dom(&mut self) -> Result<String, BrowserError> {
            Ok(self.dom.clone())
        }

        async fn engage(&mut self, selector: &str) -> Result<NavigationOutcome, BrowserError> {
            match self.outcomes.get(selector).cloned() {
                Some(Ok(outcome)) => {
                    if let Some(target) = outcome.target() {
                        self.current = target.clone();
                        self.dom = format!("<p>{}</p>", target);
                    }
                    Ok(outcome)
                }
                Some(Err(())) => {
                    self.dom = "<p>half-open menu</p>".to_string();
                    Err(BrowserError::Script("handler threw".to_string()))
                }
                None => Ok(NavigationOutcome::Unchanged),
            }
        }

        async fn capture(&mut self) -> Result<Vec<u8>, BrowserError> {
            Ok(Vec::new())
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            Ok(())
        }
    }

    fn trigger(selector: &str) -> Trigger {
        Trigger {
            selector: selector.to_string(),
            label: selector.to_string(),
        }
    }

    #[tokio::test]
    async fn test_targets_collected_and_page_restored() {
        let origin = Url::parse("https://app.example.com/app").unwrap();
        let settings = Url::parse("https://app.example.com/app#/settings").unwrap();
        let mut ctx = ScriptedContext::new(&origin);
        ctx.outcomes.insert(
            "#settings".to_string(),
            Ok(NavigationOutcome::HistoryChanged(settings.clone())),
        );

        let found = discover_script_targets(
            &mut ctx,
            &origin,
            &[trigger("#noop"), trigger("#settings")],
            Duration::ZERO,
        )
        .await;

        assert_eq!(found, vec![settings]);
        // Only the engagement that moved the page needed a restore
        assert_eq!(ctx.navigations, vec![origin.clone()]);
        assert_eq!(ctx.current, origin);
    }

    #[tokio::test]
    async fn test_failed_engagement_is_swallowed_and_restored() {
        let origin = Url::parse("https://app.example.com/").unwrap();
        let team = Url::parse("https://app.example.com/team").unwrap();
        let mut ctx = ScriptedContext::new(&origin);
        ctx.outcomes.insert("#broken".to_string(), Err(()));
        ctx.outcomes.insert(
            "#team".to_string(),
            Ok(NavigationOutcome::Navigated(team.clone())),
        );

        let found = discover_script_targets(
            &mut ctx,
            &origin,
            &[trigger("#broken"), trigger("#team")],
            Duration::ZERO,
        )
        .await;

        assert_eq!(found, vec![team]);
        assert_eq!(ctx.navigations.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_restore_stops_discovery() {
        let origin = Url::parse("https://app.example.com/").unwrap();
        let a = Url::parse("https://app.example.com/a").unwrap();
        let b = Url::parse("https://app.example.com/b").unwrap();
        let mut ctx = ScriptedContext::new(&origin);
        ctx.fail_navigation = true;
        ctx.outcomes
            .insert("#a".to_string(), Ok(NavigationOutcome::Navigated(a.clone())));
        ctx.outcomes
            .insert("#b".to_string(), Ok(NavigationOutcome::Navigated(b)));

        let found =
            discover_script_targets(&mut ctx, &origin, &[trigger("#a"), trigger("#b")], Duration::ZERO)
                .await;

        assert_eq!(found, vec![a]);
    }
}
