//! Listing advancement: "next" controls and infinite scroll

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::infrastructure::page::{Locator, Page, SCROLL_TO_BOTTOM};

pub const ANCHOR_COUNT_SCRIPT: &str = "document.querySelectorAll('a[href]').length";

/// Click the first present "next" control.
///
/// A control marked `aria-disabled="true"` ends pagination. Returns whether
/// a click happened.
pub async fn click_next(page: &dyn Page, controls: &[String], settle: Duration) -> bool {
    for control in controls {
        let locator = Locator::css(control.as_str());
        let element = match page.query(&locator).await {
            Ok(Some(element)) => element,
            Ok(None) => continue,
            Err(e) => {
                debug!(control = %control, error = %e, "Next control lookup failed");
                continue;
            }
        };

        if let Ok(Some(disabled)) = page.attribute(&element, "aria-disabled").await
            && disabled.trim().eq_ignore_ascii_case("true")
        {
            info!(control = %control, "Next control is disabled; last page reached");
            return false;
        }

        match page.click(&element).await {
            Ok(()) => {
                debug!(control = %control, "Clicked next control");
                sleep(settle).await;
                return true;
            }
            Err(e) => debug!(control = %control, error = %e, "Next control click failed"),
        }
    }
    false
}

/// Scroll to the bottom, wait, and report whether the page grew.
///
/// Growth is measured by the number of anchors before and after. Pages that
/// cannot run scripts never grow.
pub async fn scroll_and_settle(page: &dyn Page, settle: Duration) -> bool {
    let Some(before) = anchor_count(page).await else {
        return false;
    };
    if let Err(e) = page.evaluate(SCROLL_TO_BOTTOM).await {
        debug!(error = %e, "Scroll failed");
        return false;
    }
    sleep(settle).await;
    let after = anchor_count(page).await.unwrap_or(before);
    debug!(before, after, "Scrolled listing");
    after > before
}

async fn anchor_count(page: &dyn Page) -> Option<u64> {
    match page.evaluate(ANCHOR_COUNT_SCRIPT).await {
        Ok(value) => value.as_u64(),
        Err(e) => {
            debug!(error = %e, "Cannot count anchors");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedPage, ScriptedSite, Transition};
    use std::sync::Arc;

    const LIST_1: &str = r#"<a href="/p/1">1</a><a class="next" href="/list?page=2">Next</a>"#;
    const LIST_2: &str = r#"<a href="/p/2">2</a><a class="next" aria-disabled="true">Next</a>"#;

    async fn open(site: ScriptedSite, url: &str) -> ScriptedPage {
        let page = ScriptedPage::new(Arc::new(site));
        page.navigate(url, Duration::ZERO).await.unwrap();
        page
    }

    #[tokio::test]
    async fn test_click_next_follows_first_present_control() {
        let site = ScriptedSite::new()
            .page("https://shop.example/list", LIST_1)
            .page("https://shop.example/list?page=2", LIST_2);
        let page = open(site, "https://shop.example/list").await;
        let controls = vec!["button.missing".to_string(), "a.next".to_string()];

        assert!(click_next(&page, &controls, Duration::ZERO).await);
        assert_eq!(page.current_url().await.unwrap(), "https://shop.example/list?page=2");
        // The second page marks its control disabled
        assert!(!click_next(&page, &controls, Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_click_next_without_controls_is_false() {
        let page = open(
            ScriptedSite::new().page("https://shop.example/list", "<p>only</p>"),
            "https://shop.example/list",
        )
        .await;
        assert!(!click_next(&page, &["a.next".to_string()], Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_click_next_honours_scripted_transition() {
        let site = ScriptedSite::new()
            .page("https://shop.example/list", r#"<button id="more">More</button>"#)
            .on_click("#more", Transition::render("<p>page two</p>"));
        let page = open(site, "https://shop.example/list").await;
        assert!(click_next(&page, &["#more".to_string()], Duration::ZERO).await);
        assert!(page.query(&Locator::css("#more")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scroll_reports_growth_until_feed_ends() {
        let site = ScriptedSite::new()
            .page("https://shop.example/feed", r#"<a href="/p/1">1</a>"#)
            .scroll_states(
                "https://shop.example/feed",
                vec![r#"<a href="/p/1">1</a><a href="/p/2">2</a>"#.to_string()],
            );
        let page = open(site, "https://shop.example/feed").await;

        assert!(scroll_and_settle(&page, Duration::ZERO).await);
        assert!(!scroll_and_settle(&page, Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_scroll_on_static_snapshot_never_grows() {
        let page = crate::infrastructure::html_page::HtmlPage::from_html(
            "https://shop.example/feed",
            r#"<a href="/p/1">1</a>"#,
        );
        assert!(!scroll_and_settle(&page, Duration::ZERO).await);
    }
}
