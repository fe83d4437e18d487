// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::settings::BrowserSettings;
use crate::engines::traits::{ItemHandle, RenderError, RenderSession, Renderer, SessionOptions};

/// 条目容器选择器
const ITEM_SELECTOR: &str = "article";

/// 等待条目容器时的轮询间隔
const ITEM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 打开新页面的超时时间
const NEW_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// 关闭会话时每一步的超时时间，超时后强制结束浏览器进程
const CLOSE_STEP_TIMEOUT: Duration = Duration::from_secs(3);

const TIMESTAMP_JS: &str = r#"function() {
    const t = this.querySelector('time');
    return t ? t.getAttribute('datetime') : null;
}"#;

const PERMALINK_JS: &str = r#"function() {
    const t = this.querySelector('time');
    if (!t) return null;
    const a = t.closest('a');
    return a ? a.href : null;
}"#;

const PINNED_JS: &str = r#"function() {
    const ctx = this.querySelector('[data-testid="socialContext"]');
    if (ctx && ctx.innerText.trim() === 'Pinned') return true;
    return Array.from(this.querySelectorAll('span'))
        .some(s => s.innerText && s.innerText.trim() === 'Pinned');
}"#;

/// Chromium渲染引擎
///
/// 基于chromiumoxide实现，每个会话对应一个独立的浏览器进程
pub struct ChromiumRenderer {
    settings: BrowserSettings,
}

impl ChromiumRenderer {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self, options: &SessionOptions) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.settings.window_width, self.settings.window_height)
            .request_timeout(Duration::from_secs(30))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &self.settings.executable {
            builder = builder.chrome_executable(exe);
        }

        builder.build().map_err(RenderError::Other)
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Arc<dyn RenderSession>, RenderError> {
        let (browser, mut handler, owns_browser) =
            if let Some(url) = &self.settings.remote_debugging_url {
                tracing::info!("Connecting to remote Chrome instance at: {}", url);
                let (browser, handler) = Browser::connect(url).await.map_err(|e| {
                    RenderError::Other(format!("Failed to connect to remote Chrome: {}", e))
                })?;
                (browser, handler, false)
            } else {
                let (browser, handler) = Browser::launch(self.browser_config(options)?)
                    .await
                    .map_err(|e| RenderError::Other(format!("Failed to launch Chrome: {}", e)))?;
                (browser, handler, true)
            };

        // Drive CDP events until the connection drops
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match tokio::time::timeout(NEW_PAGE_TIMEOUT, browser.new_page("about:blank")).await
        {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                handler_task.abort();
                return Err(RenderError::Other(format!("Failed to open page: {}", e)));
            }
            Err(_) => {
                handler_task.abort();
                return Err(RenderError::Timeout);
            }
        };

        let session = ChromiumSession {
            id: Uuid::new_v4(),
            browser: tokio::sync::Mutex::new(Some(browser)),
            page: tokio::sync::Mutex::new(Some(page)),
            handler_task: parking_lot::Mutex::new(Some(handler_task)),
            closed: AtomicBool::new(false),
            owns_browser,
        };
        tracing::debug!(session = %session.id, "Chromium session opened");

        Ok(Arc::new(session))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// 单个浏览器会话
pub struct ChromiumSession {
    id: Uuid,
    browser: tokio::sync::Mutex<Option<Browser>>,
    page: tokio::sync::Mutex<Option<Page>>,
    handler_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    owns_browser: bool,
}

impl ChromiumSession {
    async fn current_page(&self) -> Result<Page, RenderError> {
        if self.is_closed() {
            return Err(RenderError::SessionClosed);
        }
        self.page
            .lock()
            .await
            .clone()
            .ok_or(RenderError::SessionClosed)
    }

    /// 会话已关闭时所有CDP错误都归为 `SessionClosed`
    fn map_cdp(&self, error: CdpError) -> RenderError {
        if self.is_closed() {
            return RenderError::SessionClosed;
        }
        match error {
            CdpError::Timeout => RenderError::Timeout,
            other => RenderError::Other(other.to_string()),
        }
    }

    async fn open_fresh_page(&self) -> Result<(), RenderError> {
        let browser = self.browser.lock().await;
        let browser = browser.as_ref().ok_or(RenderError::SessionClosed)?;
        let page = tokio::time::timeout(NEW_PAGE_TIMEOUT, browser.new_page("about:blank"))
            .await
            .map_err(|_| RenderError::Timeout)?
            .map_err(|e| self.map_cdp(e))?;

        let previous = self.page.lock().await.replace(page);
        if let Some(previous) = previous {
            let _ = previous.close().await;
        }
        Ok(())
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        let page = self.current_page().await?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(match self.map_cdp(e) {
                RenderError::Other(msg) => RenderError::Navigation(msg),
                other => other,
            }),
            Err(_) => Err(RenderError::Timeout),
        }
    }

    async fn recover_page(&self, timeout: Duration) -> Result<(), RenderError> {
        let page = self.current_page().await?;
        match tokio::time::timeout(timeout, page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            _ if self.is_closed() => Err(RenderError::SessionClosed),
            _ => {
                tracing::debug!(session = %self.id, "Reload failed, opening a fresh page");
                self.open_fresh_page().await
            }
        }
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), RenderError> {
        let page = self.current_page().await?;
        let script = format!("window.scrollBy(0, {});", delta_y);
        page.evaluate(script.as_str())
            .await
            .map_err(|e| self.map_cdp(e))?;
        Ok(())
    }

    async fn wait_for_items(&self, timeout: Duration) -> Result<(), RenderError> {
        let page = self.current_page().await?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.is_closed() {
                return Err(RenderError::SessionClosed);
            }
            if let Ok(found) = page.find_elements(ITEM_SELECTOR).await {
                if !found.is_empty() {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RenderError::NotFound);
            }
            tokio::time::sleep(ITEM_POLL_INTERVAL).await;
        }
    }

    async fn list_items(&self) -> Result<Vec<Box<dyn ItemHandle>>, RenderError> {
        let page = self.current_page().await?;
        let elements = page
            .find_elements(ITEM_SELECTOR)
            .await
            .map_err(|e| self.map_cdp(e))?;

        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumItem { element }) as Box<dyn ItemHandle>)
            .collect())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Lock holders may be stuck on an unresponsive browser
        let page = match tokio::time::timeout(CLOSE_STEP_TIMEOUT, self.page.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(page) = page {
            if tokio::time::timeout(CLOSE_STEP_TIMEOUT, page.close()).await.is_err() {
                tracing::debug!(session = %self.id, "Page close timed out");
            }
        }

        let browser = match tokio::time::timeout(CLOSE_STEP_TIMEOUT, self.browser.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(mut browser) = browser {
            if self.owns_browser {
                let graceful = tokio::time::timeout(CLOSE_STEP_TIMEOUT, async {
                    let _ = browser.close().await;
                    browser.wait().await
                })
                .await;
                if graceful.is_err() {
                    tracing::warn!(session = %self.id, "Browser did not exit in time, killing it");
                    let _ = browser.kill().await;
                }
            }
        }
        if let Some(task) = self.handler_task.lock().take() {
            task.abort();
        }
        tracing::debug!(session = %self.id, "Chromium session closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// 页面上的单个条目元素
struct ChromiumItem {
    element: Element,
}

impl ChromiumItem {
    async fn call_js(&self, function: &str) -> Result<Option<serde_json::Value>, RenderError> {
        let returns = self
            .element
            .call_js_fn(function, false)
            .await
            .map_err(|e| RenderError::Other(e.to_string()))?;
        Ok(returns.result.value)
    }

    async fn call_js_string(&self, function: &str) -> Result<Option<String>, RenderError> {
        Ok(self
            .call_js(function)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }
}

#[async_trait]
impl ItemHandle for ChromiumItem {
    async fn is_pinned(&self) -> Result<bool, RenderError> {
        Ok(self
            .call_js(PINNED_JS)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn timestamp(&self) -> Result<Option<String>, RenderError> {
        self.call_js_string(TIMESTAMP_JS).await
    }

    async fn permalink(&self) -> Result<Option<String>, RenderError> {
        self.call_js_string(PERMALINK_JS).await
    }

    async fn capture_artifact(&self, destination: &Path) -> Result<(), RenderError> {
        self.element
            .save_screenshot(CaptureScreenshotFormat::Png, destination)
            .await
            .map_err(|e| match e {
                CdpError::Io(io) => RenderError::Io(io),
                other => RenderError::Other(format!("Element screenshot failed: {}", other)),
            })?;
        Ok(())
    }
}
