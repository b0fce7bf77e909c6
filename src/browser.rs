use crate::config::{login_url, BrowserPrefs, Credentials};
use crate::errors::{ExtractError, Result};
use crate::selectors;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Chromium-family backends the session manager can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Edge,
    Chromium,
}

impl BrowserKind {
    /// Probes well-known install locations and returns the first backend
    /// found, defaulting to Chrome when nothing is detected.
    pub fn detect() -> Self {
        for (kind, candidates) in [
            (BrowserKind::Chrome, CHROME_PATHS),
            (BrowserKind::Edge, EDGE_PATHS),
            (BrowserKind::Chromium, CHROMIUM_PATHS),
        ] {
            if candidates.iter().any(|p| Path::new(p).exists()) {
                info!("Detected browser backend: {:?}", kind);
                return kind;
            }
        }
        debug!("No browser binary detected, defaulting to Chrome");
        BrowserKind::Chrome
    }

    fn binary_path(self) -> Option<PathBuf> {
        let candidates = match self {
            BrowserKind::Chrome => CHROME_PATHS,
            BrowserKind::Edge => EDGE_PATHS,
            BrowserKind::Chromium => CHROMIUM_PATHS,
        };
        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    fn user_agent(self) -> &'static str {
        match self {
            BrowserKind::Edge => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0"
            }
            _ => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36"
            }
        }
    }
}

const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

const EDGE_PATHS: &[&str] = &[
    "/usr/bin/microsoft-edge",
    "/usr/bin/microsoft-edge-stable",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

const CHROMIUM_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

/// One live, visible browser session plus its open tabs. The primary tab is
/// index 0 and survives for the whole run; extra tabs come and go per batch.
pub struct BrowserSession {
    browser: Browser,
    tabs: Vec<Arc<Tab>>,
    current: usize,
    page_load_timeout: Duration,
}

impl BrowserSession {
    /// Launches the chosen backend with interactive-mode options. On a
    /// backend-specific failure, falls back to a minimal default launch;
    /// only a failing fallback is fatal.
    pub async fn launch(kind: BrowserKind, prefs: &BrowserPrefs) -> Result<Self> {
        match Self::launch_backend(kind, prefs) {
            Ok(session) => Ok(session),
            Err(err) => {
                warn!("{:?} setup failed ({}), falling back to default launch", kind, err);
                Self::launch_default(prefs)
            }
        }
    }

    fn launch_backend(kind: BrowserKind, prefs: &BrowserPrefs) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            prefs.viewport.width, prefs.viewport.height
        );
        let user_agent = prefs
            .user_agent
            .clone()
            .unwrap_or_else(|| kind.user_agent().to_string());
        let user_agent_arg = format!("--user-agent={user_agent}");

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-notifications"),
            OsStr::new("--disable-popup-blocking"),
            OsStr::new("--lang=es-ES"),
            OsStr::new(&window_size_arg),
            OsStr::new(&user_agent_arg),
        ];
        if prefs.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        // The extraction flow is interactive by design: always a visible window.
        let launch_options = LaunchOptions::default_builder()
            .headless(false)
            .path(kind.binary_path())
            .args(args)
            .build()
            .map_err(|e| ExtractError::LaunchFailed(e.to_string()))?;

        Self::from_options(launch_options, prefs)
    }

    fn launch_default(prefs: &BrowserPrefs) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(false)
            .build()
            .map_err(|e| ExtractError::LaunchFailed(e.to_string()))?;
        Self::from_options(launch_options, prefs)
    }

    fn from_options(launch_options: LaunchOptions, prefs: &BrowserPrefs) -> Result<Self> {
        let browser =
            Browser::new(launch_options).map_err(|e| ExtractError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ExtractError::LaunchFailed(e.to_string()))?;

        let session = Self {
            browser,
            tabs: vec![tab],
            current: 0,
            page_load_timeout: Duration::from_secs(prefs.page_load_timeout_secs),
        };
        session.apply_stealth()?;
        Ok(session)
    }

    // Fingerprinting scripts read navigator.webdriver to spot automation.
    fn apply_stealth(&self) -> Result<()> {
        self.tab()
            .evaluate(
                "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})",
                false,
            )
            .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;
        Ok(())
    }

    fn tab(&self) -> &Arc<Tab> {
        &self.tabs[self.current]
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.tab()
            .navigate_to(url)
            .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;
        self.tab()
            .wait_until_navigated()
            .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    /// Polls `document.readyState` on the focused tab until the page is
    /// fully loaded or the configured page-load timeout elapses.
    pub async fn wait_for_page_load(&self) -> Result<()> {
        let js_code = "document.readyState === 'complete'";
        let start_time = std::time::Instant::now();

        while start_time.elapsed() < self.page_load_timeout {
            let result = self
                .tab()
                .evaluate(js_code, false)
                .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;
            if let Some(value) = result.value {
                if value.as_bool() == Some(true) {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(ExtractError::NavigationFailed("Page load timeout".to_string()))
    }

    pub async fn page_source(&self) -> Result<String> {
        let js_result = self
            .tab()
            .evaluate("document.documentElement.outerHTML", false)
            .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;

        js_result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| ExtractError::JavaScriptFailed("Failed to get page source".to_string()))
    }

    pub fn current_url(&self) -> String {
        self.tab().get_url()
    }

    pub async fn click(&self, css_selector: &str) -> Result<()> {
        self.tab()
            .find_element(css_selector)
            .map_err(|e| ExtractError::ElementNotFound(e.to_string()))?
            .click()
            .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn type_text(&self, css_selector: &str, text: &str) -> Result<()> {
        let element = self
            .tab()
            .find_element(css_selector)
            .map_err(|e| ExtractError::ElementNotFound(e.to_string()))?;
        element
            .click()
            .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;
        element
            .type_into(text)
            .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;
        Ok(())
    }

    /// Clicks the first element whose text contains any of the given
    /// fragments. Used where stable CSS selectors do not exist (login
    /// buttons, popup dismissal).
    pub async fn click_by_text(&self, tag: &str, fragments: &[&str]) -> Result<()> {
        let needles = serde_json::to_string(fragments)?;
        let js_code = format!(
            r#"
            (function() {{
                const needles = {needles};
                const elements = document.querySelectorAll('{tag}');
                for (const element of elements) {{
                    const text = (element.innerText || '').trim();
                    if (needles.some(n => text.includes(n))) {{
                        element.click();
                        return true;
                    }}
                }}
                return false;
            }})()
        "#
        );

        let result = self
            .tab()
            .evaluate(&js_code, false)
            .map_err(|e| ExtractError::JavaScriptFailed(e.to_string()))?;

        if result.value.and_then(|v| v.as_bool()) == Some(true) {
            Ok(())
        } else {
            Err(ExtractError::ElementNotFound(format!(
                "No {} matching {:?}",
                tag, fragments
            )))
        }
    }

    /// Opens a new tab and navigates it, leaving the current focus alone.
    pub async fn open_tab(&mut self, url: &str) -> Result<()> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;
        tab.navigate_to(url)
            .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;
        self.tabs.push(tab);
        Ok(())
    }

    /// Switches the session focus to the tab at `index` and brings it to the
    /// front of the visible window.
    pub async fn activate_tab(&mut self, index: usize) -> Result<()> {
        if index >= self.tabs.len() {
            return Err(ExtractError::NavigationFailed(format!(
                "No tab at index {}",
                index
            )));
        }
        self.current = index;
        self.tabs[index]
            .activate()
            .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    /// Closes every tab except the primary one and returns focus to it.
    pub async fn close_extra_tabs(&mut self) -> Result<()> {
        while self.tabs.len() > 1 {
            if let Some(tab) = self.tabs.pop() {
                if let Err(e) = tab.close(true) {
                    debug!("Failed to close tab: {}", e);
                }
            }
        }
        self.activate_tab(0).await
    }

    /// Attempts interactive login; on an inconclusive result, leaves time for
    /// a human to finish it in the visible window before re-checking.
    /// Returns whether the session ended up authenticated.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<bool> {
        self.navigate(&login_url()).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let username_field = self.first_present(selectors::LOGIN_USERNAME_FIELDS).await;
        let password_field = self.first_present(selectors::LOGIN_PASSWORD_FIELDS).await;

        let (Some(username_field), Some(password_field)) = (username_field, password_field) else {
            warn!("Login form fields not found, waiting for manual login");
            tokio::time::sleep(Duration::from_secs(60)).await;
            return Ok(self.logged_in());
        };

        self.type_text(&username_field, &credentials.username).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.type_text(&password_field, &credentials.password).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut submitted = false;
        for selector in selectors::LOGIN_SUBMIT_BUTTONS {
            if self.click(selector).await.is_ok() {
                submitted = true;
                break;
            }
        }
        if !submitted {
            self.click_by_text("button", &["Entrar", "Log in", "Iniciar"])
                .await
                .map_err(|_| ExtractError::LoginFailed("Submit control not found".to_string()))?;
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        if self.logged_in() {
            return Ok(true);
        }

        info!("Login not confirmed, waiting 30s for manual completion");
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(self.logged_in())
    }

    fn logged_in(&self) -> bool {
        let url = self.current_url();
        url.contains("instagram.com") && !url.contains("login")
    }

    async fn first_present(&self, selectors: &[&str]) -> Option<String> {
        for selector in selectors {
            if self.tab().find_element(selector).is_ok() {
                return Some(selector.to_string());
            }
        }
        None
    }

    /// Dismisses common post-login popups ("Ahora no" / "Not Now") best-effort.
    pub async fn dismiss_popups(&self) {
        if self
            .click_by_text("button", &["Ahora no", "Not Now", "Dismiss"])
            .await
            .is_ok()
        {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }

    /// Releases the session. Tolerates an already-gone browser.
    pub async fn close(&mut self) {
        while let Some(tab) = self.tabs.pop() {
            let _ = tab.close(true);
        }
    }
}
