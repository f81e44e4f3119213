//! Browser automation against the shift-management website.
//!
//! Grounded in the browser-session lifecycle used elsewhere in the stack
//! (launch once, reuse the page, timeout every navigation, drive forms
//! with CDP-level click/type_str/press_key rather than raw JS injection)
//! but generalized from "one session per conversation, tool-dispatched"
//! to "one session per workflow lookup, script-dispatched": the Shift
//! Workflow is a fixed sequence of steps, not an LLM-chosen tool call.

use super::totp;
use super::types::{strip_title_prefix, DateInterval, ShiftRecord, StaffRecord};
use crate::config::Config;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use fs2::FileExt;
use futures::StreamExt;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

const NAV_TIMEOUT: Duration = Duration::from_secs(10);
const GRID_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),
    #[error("navigation timed out")]
    Timeout,
    #[error("browser operation failed: {0}")]
    OperationFailed(String),
    #[error("login redirected back to the login page")]
    LoginRejected,
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        BrowserError::OperationFailed(e.to_string())
    }
}

/// Interface onto the site-driving browser automation library.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn ensure_authenticated(&self) -> Result<(), BrowserError>;
    async fn find_staff_by_phone(&self, phone: &str) -> Result<StaffRecord, BrowserError>;
    async fn search_shifts(
        &self,
        staff_full_name: &str,
        interval: &DateInterval,
    ) -> Result<Vec<ShiftRecord>, BrowserError>;
}

/// One launched Chrome instance, reused across the steps of a single
/// `lookup`/`submit_cancellation` call. The cookie jar persists to disk
/// so a subsequent session can skip login if the cached cookies are
/// still valid.
pub struct ChromiumBrowserSession {
    base_url: String,
    credentials: crate::config::SiteCredentials,
    cookie_store: CookieStore,
    page: Mutex<Option<Page>>,
    browser: Mutex<Option<Browser>>,
}

impl ChromiumBrowserSession {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.site_base_url.clone(),
            credentials: config.site_credentials.clone(),
            cookie_store: CookieStore::new(&config.cookie_store_dir, &config.site_base_url),
            page: Mutex::new(None),
            browser: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Page, BrowserError> {
        let config = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .arg("--disable-gpu")
            .build()
            .map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        if let Some(cookie_header) = self.cookie_store.load() {
            let script = format!(
                "document.cookie = {}",
                serde_json::to_string(&cookie_header).unwrap_or_default()
            );
            if let Err(e) = page.evaluate(script).await {
                tracing::warn!(error = %e, "failed to restore cached cookies");
            }
        }

        *self.browser.lock().await = Some(browser);
        Ok(page)
    }

    async fn current_url(page: &Page) -> Result<String, BrowserError> {
        let result = page
            .evaluate("window.location.href")
            .await
            .map_err(BrowserError::from)?;
        result
            .into_value::<String>()
            .map_err(|e| BrowserError::OperationFailed(e.to_string()))
    }

    async fn save_cookies(&self, page: &Page) {
        let Ok(result) = page.evaluate("document.cookie").await else {
            return;
        };
        if let Ok(cookie_header) = result.into_value::<String>() {
            self.cookie_store.save(&cookie_header);
        }
    }

    async fn fill(&self, page: &Page, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = page.find_element(selector).await.map_err(BrowserError::from)?;
        element.click().await.map_err(BrowserError::from)?;
        element.type_str(value).await.map_err(BrowserError::from)?;
        Ok(())
    }

    async fn perform_login(&self, page: &Page) -> Result<(), BrowserError> {
        let login_url = format!("{}/login", self.base_url.trim_end_matches('/'));
        tokio::time::timeout(NAV_TIMEOUT, page.goto(&login_url))
            .await
            .map_err(|_| BrowserError::Timeout)??;

        self.fill(page, "input[name='username']", &self.credentials.username)
            .await?;
        self.fill(page, "input[name='password']", &self.credentials.password)
            .await?;

        let submit = page
            .find_element("button[type='submit']")
            .await
            .map_err(BrowserError::from)?;
        submit.click().await.map_err(BrowserError::from)?;

        tokio::time::sleep(Duration::from_millis(300)).await;

        if let Ok(totp_input) = page.find_element("input[name='totp']").await {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let code = totp::generate(&self.credentials.totp_secret, now)
                .map_err(|e| BrowserError::OperationFailed(e.to_string()))?;

            totp_input.click().await.map_err(BrowserError::from)?;
            totp_input.type_str(&code).await.map_err(BrowserError::from)?;

            if let Ok(totp_submit) = page.find_element("button[name='totp-submit']").await {
                totp_submit.click().await.map_err(BrowserError::from)?;
            }
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        self.save_cookies(page).await;

        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumBrowserSession {
    /// A cached session must be probed with a navigation to the
    /// post-login landing URL and discarded on redirect to a login page.
    async fn ensure_authenticated(&self) -> Result<(), BrowserError> {
        let mut guard = self.page.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let page = guard.as_ref().expect("just populated");

        let landing_url = format!("{}/dashboard", self.base_url.trim_end_matches('/'));
        tokio::time::timeout(NAV_TIMEOUT, page.goto(&landing_url))
            .await
            .map_err(|_| BrowserError::Timeout)??;

        let current = Self::current_url(page).await?;
        if current.contains("/login") {
            self.perform_login(page).await?;

            let current = Self::current_url(page).await?;
            if current.contains("/login") {
                return Err(BrowserError::LoginRejected);
            }
        }

        Ok(())
    }

    async fn find_staff_by_phone(&self, phone: &str) -> Result<StaffRecord, BrowserError> {
        let guard = self.page.lock().await;
        let page = guard.as_ref().ok_or_else(|| {
            BrowserError::OperationFailed("browser session not authenticated".to_string())
        })?;

        let search_url = format!("{}/staff/search", self.base_url.trim_end_matches('/'));
        tokio::time::timeout(NAV_TIMEOUT, page.goto(&search_url))
            .await
            .map_err(|_| BrowserError::Timeout)??;

        self.fill(page, "input[name='phone']", phone).await?;
        let search_box = page
            .find_element("input[name='phone']")
            .await
            .map_err(BrowserError::from)?;
        search_box.press_key("Enter").await.map_err(BrowserError::from)?;

        tokio::time::sleep(Duration::from_millis(300)).await;

        tokio::time::timeout(GRID_RENDER_TIMEOUT, async {
            loop {
                let result = page.evaluate(STAFF_ROW_PRESENT_JS).await?;
                if result.into_value::<bool>().unwrap_or(false) {
                    return Ok::<_, chromiumoxide::error::CdpError>(());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .map_err(|_| BrowserError::Timeout)?
        .map_err(BrowserError::from)?;

        let result = page.evaluate(STAFF_ROW_JS).await.map_err(BrowserError::from)?;
        let row: StaffRow = result
            .into_value()
            .map_err(|e| BrowserError::OperationFailed(e.to_string()))?;

        Ok(StaffRecord {
            id: row.id,
            full_name: strip_title_prefix(&row.name),
            email: row.email,
            team: row.team,
            mobile: row.mobile,
        })
    }

    async fn search_shifts(
        &self,
        staff_full_name: &str,
        interval: &DateInterval,
    ) -> Result<Vec<ShiftRecord>, BrowserError> {
        let guard = self.page.lock().await;
        let page = guard.as_ref().ok_or_else(|| {
            BrowserError::OperationFailed("browser session not authenticated".to_string())
        })?;

        let shifts_url = format!(
            "{}/shifts/search?staff={}",
            self.base_url.trim_end_matches('/'),
            urlencode(staff_full_name)
        );

        tokio::time::timeout(NAV_TIMEOUT, page.goto(&shifts_url))
            .await
            .map_err(|_| BrowserError::Timeout)??;

        // Display format differs from the internal YYYY-MM-DD representation.
        let filter_value = format!(
            "{} to {}",
            interval.start.format("%d-%m-%Y"),
            interval.end.format("%d-%m-%Y")
        );

        self.fill(page, "input[name='date-range']", &filter_value).await?;
        let date_filter = page
            .find_element("input[name='date-range']")
            .await
            .map_err(BrowserError::from)?;
        date_filter.press_key("Enter").await.map_err(BrowserError::from)?;

        tokio::time::sleep(Duration::from_millis(300)).await;

        let result = page.evaluate(SHIFT_ROWS_JS).await.map_err(BrowserError::from)?;
        let rows: Vec<ShiftRow> = result
            .into_value()
            .map_err(|e| BrowserError::OperationFailed(e.to_string()))?;

        let shifts = rows
            .into_iter()
            .map(|row| ShiftRecord {
                shift_id: row.shift_id,
                client_name: row.client_name,
                date: chrono::NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").ok(),
                time: row.time,
                shift_type: row.shift_type,
            })
            .collect();

        Ok(shifts)
    }
}

/// Row readers route every DOM access through `page.evaluate`, since the
/// CDP session only exposes element handles for input/click targets, not
/// for bulk text extraction.
const STAFF_ROW_PRESENT_JS: &str =
    "!!document.querySelector('table.results-grid tbody tr')";

const STAFF_ROW_JS: &str = r#"
(() => {
    const row = document.querySelector('table.results-grid tbody tr');
    const cell = (sel) => (row.querySelector(sel)?.textContent || '').trim();
    return {
        name: cell('td.name'),
        id: cell('td.id'),
        email: cell('td.email'),
        team: cell('td.team'),
        mobile: cell('td.mobile'),
    };
})()
"#;

const SHIFT_ROWS_JS: &str = r#"
(() => {
    const rows = Array.from(document.querySelectorAll('table.shifts-grid tbody tr'));
    const cell = (row, sel) => (row.querySelector(sel)?.textContent || '').trim();
    return rows.map((row) => ({
        shift_id: cell(row, 'td.shift-id'),
        client_name: cell(row, 'td.client'),
        date: cell(row, 'td.date'),
        time: cell(row, 'td.time'),
        shift_type: cell(row, 'td.type'),
    }));
})()
"#;

#[derive(Debug, Deserialize)]
struct StaffRow {
    name: String,
    id: String,
    email: String,
    team: String,
    mobile: String,
}

#[derive(Debug, Deserialize)]
struct ShiftRow {
    shift_id: String,
    client_name: String,
    date: String,
    time: String,
    shift_type: String,
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}

/// On-disk cookie jar, shared between sessions for one service and
/// therefore guarded with an advisory file lock to prevent concurrent
/// writers from corrupting it.
struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    fn new(dir: &str, base_url: &str) -> Self {
        let digest = base_url
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        let path = PathBuf::from(dir).join(format!("{digest:x}.json"));
        Self { path }
    }

    /// Returns the raw `document.cookie`-style header string, if any
    /// cookies were previously cached.
    fn load(&self) -> Option<String> {
        let mut file = OpenOptions::new().read(true).open(&self.path).ok()?;
        file.lock_shared().ok()?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).ok()?;
        let _ = file.unlock();
        if contents.trim().is_empty() {
            None
        } else {
            Some(contents)
        }
    }

    fn save(&self, cookie_header: &str) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            if file.lock_exclusive().is_ok() {
                let _ = file.write_all(cookie_header.as_bytes());
                let _ = file.unlock();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_store_path_is_stable_for_a_given_base_url() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = CookieStore::new(tmp.path().to_str().unwrap(), "https://shifts.example.com");
        let b = CookieStore::new(tmp.path().to_str().unwrap(), "https://shifts.example.com");
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn cookie_store_round_trips_through_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = CookieStore::new(tmp.path().to_str().unwrap(), "https://shifts.example.com");
        assert!(store.load().is_none());
        store.save("session=abc123");
        assert_eq!(store.load().as_deref(), Some("session=abc123"));
    }

    #[test]
    fn urlencode_escapes_spaces() {
        assert_eq!(urlencode("Alannah Courtnay"), "Alannah%20Courtnay");
    }
}
