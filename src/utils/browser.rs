use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use log::debug;
use tokio::task::JoinHandle;
use crate::utils::config::Config;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const WINDOW_SIZE: (u32, u32) = (1400, 900);

// The single Chromium window and tab used for a whole run.
pub struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    nav_timeout: Duration,
    wait_timeout: Duration,
}

impl Session {
    pub async fn launch(config: &Config) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch Chromium")?;

        // The handler stream must be polled for the browser connection to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open a browser tab")?;

        Ok(Session {
            browser,
            handler,
            page,
            nav_timeout: config.nav_timeout,
            wait_timeout: config.wait_timeout,
        })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await {
            Ok(result) => {
                result.with_context(|| format!("Navigation to {} failed", url))?;
            }
            Err(_) => bail!("Navigation to {} timed out after {:?}", url, self.nav_timeout),
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Polls for `selector` until it is present in the page or `bound` elapses.
    pub async fn wait_for(&self, selector: &str, bound: Duration) -> Result<Element> {
        let deadline = Instant::now() + bound;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                bail!("Timed out after {:?} waiting for {}", bound, selector);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Polls until `selector` is rendered with a non-empty box, then returns it.
    ///
    /// Sign-in pages keep the fields of later steps in the DOM but hidden, so
    /// presence alone says nothing about which step is on screen.
    pub async fn wait_visible(&self, selector: &str, bound: Duration) -> Result<Element> {
        let deadline = Instant::now() + bound;
        loop {
            if self.is_visible(selector).await.unwrap_or(false) {
                if let Ok(element) = self.page.find_element(selector).await {
                    return Ok(element);
                }
            }
            if Instant::now() >= deadline {
                bail!("Timed out after {:?} waiting for {} to be visible", bound, selector);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Polls until `selector` is gone or no longer rendered.
    ///
    /// A page that cannot be evaluated is in the middle of navigating away, which counts as gone.
    pub async fn wait_hidden(&self, selector: &str, bound: Duration) -> Result<()> {
        let deadline = Instant::now() + bound;
        loop {
            if !self.is_visible(selector).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("Timed out after {:?} waiting for {} to go away", bound, selector);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Polls until the page URL differs from `previous`.
    pub async fn wait_url_change(&self, previous: &str, bound: Duration) -> Result<String> {
        let deadline = Instant::now() + bound;
        loop {
            if let Ok(url) = self.url().await {
                if url != previous {
                    return Ok(url);
                }
            }
            if Instant::now() >= deadline {
                bail!("Timed out after {:?} waiting to leave {}", bound, previous);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn is_visible(&self, selector: &str) -> Result<bool> {
        let script = visibility_script(selector)?;
        let result = self
            .page
            .evaluate(script.as_str())
            .await
            .with_context(|| format!("Failed to check visibility of {}", selector))?;
        result
            .into_value()
            .map_err(|e| anyhow!("Failed to convert visibility of {}: {:?}", selector, e))
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.wait_visible(selector, self.wait_timeout).await?;
        element
            .click()
            .await
            .with_context(|| format!("Failed to focus {}", selector))?
            .type_str(value)
            .await
            .with_context(|| format!("Failed to type into {}", selector))?;
        Ok(())
    }

    pub async fn click(&self, selector: &str, bound: Duration) -> Result<()> {
        let element = self.wait_visible(selector, bound).await?;
        element
            .click()
            .await
            .with_context(|| format!("Failed to click {}", selector))?;
        Ok(())
    }

    // Clicks the first anchor whose visible text contains `text`, ignoring case.
    pub async fn click_link_with_text(&self, text: &str) -> Result<()> {
        let links = self.page.find_elements("a").await.context("Failed to list links")?;
        for link in links {
            let label = link.inner_text().await.ok().flatten().unwrap_or_default();
            if link_text_matches(&label, text) {
                link.click()
                    .await
                    .with_context(|| format!("Failed to click the {} link", text))?;
                return Ok(());
            }
        }
        bail!("No link with text {}", text)
    }

    /// Waits for the page to settle after an interaction that navigates.
    pub async fn settle(&self) -> Result<()> {
        match tokio::time::timeout(self.nav_timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Waiting for navigation failed: {}", e),
            Err(_) => debug!("No navigation finished within {:?}", self.nav_timeout),
        }
        self.wait_for("body", self.wait_timeout).await?;
        Ok(())
    }

    pub async fn url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("Failed to read page URL")?
            .unwrap_or_default())
    }

    pub async fn content(&self) -> Result<String> {
        self.page.content().await.context("Failed to read page markup")
    }

    pub async fn body_text(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .context("Failed to read page text")?;
        result
            .into_value()
            .map_err(|e| anyhow!("Failed to convert page text: {:?}", e))
    }

    pub async fn screenshot(&self, path: &Path, full_page: bool) -> Result<PathBuf> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
        Ok(path.to_path_buf())
    }

    // Consumes the session so the browser can only be closed once.
    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await.context("Failed to close Chromium");
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed.map(|_| ())
    }
}

// Evaluates to true when the first element matching `selector` has a rendered, non-empty box
// that is not pushed off the top or left edge of the page.
pub fn visibility_script(selector: &str) -> Result<String> {
    let selector = serde_json::to_string(selector).context("Failed to encode selector")?;
    Ok(format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         const r = el.getBoundingClientRect(); \
         return r.width > 0 && r.height > 0 && r.right > 0 && r.bottom > 0 \
         && el.offsetParent !== null; }})()",
        selector
    ))
}

pub fn link_text_matches(label: &str, text: &str) -> bool {
    label.to_lowercase().contains(&text.to_lowercase())
}
