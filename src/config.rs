use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder substituted with a page number in pagination selectors.
const PAGE_PLACEHOLDER: &str = "{page}";

/// Everything a `scrape` run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchCriteria,
    /// Prefix for listing URLs; the listing id is appended.
    pub listing_base_url: String,
    pub blocked_terms: Vec<String>,
    pub browser: BrowserConfig,
    pub pacing: Pacing,
    pub pagination: PaginationTimeouts,
    pub selectors: Selectors,
}

#[derive(Debug, Clone)]
pub struct SearchCriteria {
    pub base_url: String,
    pub keywords: String,
    pub region: String,
    /// Region stored with new employers.
    pub employer_region: String,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    /// Remote debugging endpoint of an already-running browser, `http://host:port`.
    pub debugger_url: String,
    pub profile_path: Option<PathBuf>,
    pub profile_name: String,
    pub binary_path: Option<PathBuf>,
}

/// Inclusive bounds for a randomized pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn from_millis(min: u64, max: u64) -> Result<Self> {
        if min > max {
            bail!("delay minimum ({}ms) exceeds maximum ({}ms)", min, max);
        }
        if max == 0 {
            return Ok(Self::none());
        }
        Ok(Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        })
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Uniformly distributed duration within the bounds.
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// After fill, click and scroll.
    pub action: DelayRange,
    /// After page loads.
    pub navigation: DelayRange,
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationTimeouts {
    /// How long to wait for a numbered page control.
    pub page_control: Duration,
    /// How long to wait for the expansion control once the numbered one is absent.
    pub expansion_control: Duration,
}

impl Default for PaginationTimeouts {
    fn default() -> Self {
        Self {
            page_control: Duration::from_millis(6000),
            expansion_control: Duration::from_millis(2000),
        }
    }
}

/// CSS selectors for the job-search site. Loaded from JSON when overridden;
/// omitted keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub job_cards: String,
    pub job_id_attribute: String,
    pub job_title: String,
    pub company: String,
    pub job_location: String,
    pub keyword_input: String,
    pub location_input: String,
    pub search_button: String,
    pub pagination_list: String,
    /// Numbered page control, with `{page}` placeholder.
    ///
    /// The default also matches the element `more_pages_button` targets, so
    /// against the stock markup the first wait usually finds either control
    /// and the expansion lookup only runs when this one is narrowed.
    pub page_button: String,
    /// Control revealing hidden page numbers, with `{page}` placeholder.
    pub more_pages_button: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            job_cards: "[data-view-name='job-card']".to_string(),
            job_id_attribute: "data-job-id".to_string(),
            job_title: ".artdeco-entity-lockup__title a span[aria-hidden='true']".to_string(),
            company: ".artdeco-entity-lockup__subtitle span".to_string(),
            job_location: ".artdeco-entity-lockup__caption span".to_string(),
            keyword_input: "input.basic-input.jobs-search-box__text-input.jobs-search-box__keyboard-text-input".to_string(),
            location_input: "input[aria-label='City, state, or zip code']".to_string(),
            search_button: ".jobs-search-box__submit-button".to_string(),
            pagination_list: ".artdeco-pagination__pages".to_string(),
            page_button: r#"[aria-label="Page {page}"]"#.to_string(),
            more_pages_button: r#"button[aria-label="Page {page}"]"#.to_string(),
        }
    }
}

impl Selectors {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selectors file: {}", path.display()))?;
        let selectors: Selectors = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid selectors file: {}", path.display()))?;
        selectors.check_templates()?;
        Ok(selectors)
    }

    pub fn page_button(&self, page: u32) -> String {
        self.page_button.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    pub fn more_pages_button(&self, page: u32) -> String {
        self.more_pages_button
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    fn check_templates(&self) -> Result<()> {
        for (name, template) in [
            ("page_button", &self.page_button),
            ("more_pages_button", &self.more_pages_button),
        ] {
            if !template.contains(PAGE_PLACEHOLDER) {
                bail!("selector `{}` must contain {}", name, PAGE_PLACEHOLDER);
            }
        }
        Ok(())
    }
}

/// Split a comma-delimited block list. Blank entries are dropped since an
/// empty term would match every title.
pub fn parse_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(String::from)
        .collect()
}

/// Command-line and environment options for `scrape`.
#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Search by title, skill, or company
    #[arg(short = 's', long = "job-search", env = "JOB_SEARCH_KEYWORDS")]
    pub keywords: String,

    /// City, state, or zip code
    #[arg(short, long, env = "JOB_SEARCH_LOCATION")]
    pub location: String,

    /// Region recorded with new employers (defaults to --location)
    #[arg(long, env = "STATE")]
    pub employer_region: Option<String>,

    /// Job search page to start from
    #[arg(long, env = "JOB_SEARCH_BASE_URL")]
    pub search_url: String,

    /// Listing URL prefix; the listing id is appended
    #[arg(long, env = "JOBS_PAGE_BASE_URL")]
    pub listing_url: String,

    /// Comma-separated title terms to skip
    #[arg(long, env = "TERMS_BLOCKLIST", default_value = "")]
    pub blocklist: String,

    /// Remote debugging endpoint of the browser
    #[arg(long, env = "CDP_URL", default_value = "http://127.0.0.1:9222")]
    pub cdp_url: String,

    /// WebDriver server (chromedriver)
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Browser user data directory
    #[arg(long, env = "CHROME_PROFILE_PATH")]
    pub profile_path: Option<PathBuf>,

    /// Profile directory inside the user data directory
    #[arg(long, env = "CHROME_PROFILE_NAME", default_value = "Default")]
    pub profile_name: String,

    /// Browser executable
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// JSON file overriding page selectors
    #[arg(long, env = "SELECTORS_PATH")]
    pub selectors: Option<PathBuf>,

    #[arg(long, env = "DELAY_MIN_MS", default_value_t = 2000)]
    pub delay_min_ms: u64,

    #[arg(long, env = "DELAY_MAX_MS", default_value_t = 4000)]
    pub delay_max_ms: u64,

    #[arg(long, env = "NAV_DELAY_MIN_MS", default_value_t = 3000)]
    pub nav_delay_min_ms: u64,

    #[arg(long, env = "NAV_DELAY_MAX_MS", default_value_t = 5000)]
    pub nav_delay_max_ms: u64,

    /// How long to wait for the next numbered page control
    #[arg(long, env = "PAGINATION_TIMEOUT_MS", default_value_t = 6000)]
    pub pagination_timeout_ms: u64,

    /// How long to wait for the "more pages" control
    #[arg(long, env = "EXPANSION_TIMEOUT_MS", default_value_t = 2000)]
    pub expansion_timeout_ms: u64,
}

impl Config {
    pub fn from_args(args: ScrapeArgs) -> Result<Self> {
        let keywords = required("job search keywords", args.keywords)?;
        let region = required("location", args.location)?;
        let employer_region = match args.employer_region {
            Some(r) if !r.trim().is_empty() => r.trim().to_string(),
            _ => region.clone(),
        };

        let selectors = match &args.selectors {
            Some(path) => Selectors::from_file(path)?,
            None => Selectors::default(),
        };

        let profile_path = match args.profile_path {
            Some(path) => Some(path),
            None => default_profile_path(),
        };

        Ok(Self {
            search: SearchCriteria {
                base_url: required("JOB_SEARCH_BASE_URL", args.search_url)?,
                keywords,
                region,
                employer_region,
            },
            listing_base_url: required("JOBS_PAGE_BASE_URL", args.listing_url)?,
            blocked_terms: parse_terms(&args.blocklist),
            browser: BrowserConfig {
                webdriver_url: args.webdriver_url,
                debugger_url: args.cdp_url,
                profile_path,
                profile_name: args.profile_name,
                binary_path: args.chrome_path,
            },
            pacing: Pacing {
                action: DelayRange::from_millis(args.delay_min_ms, args.delay_max_ms)
                    .context("Invalid action delay")?,
                navigation: DelayRange::from_millis(args.nav_delay_min_ms, args.nav_delay_max_ms)
                    .context("Invalid navigation delay")?,
            },
            pagination: PaginationTimeouts {
                page_control: Duration::from_millis(args.pagination_timeout_ms),
                expansion_control: Duration::from_millis(args.expansion_timeout_ms),
            },
            selectors,
        })
    }
}

fn required(name: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("{} must not be empty", name));
    }
    Ok(value)
}

/// Default browser user data directory for this platform.
fn default_profile_path() -> Option<PathBuf> {
    let dirs = directories::BaseDirs::new()?;
    if cfg!(target_os = "windows") {
        Some(dirs.data_local_dir().join("Google").join("Chrome").join("User Data"))
    } else if cfg!(target_os = "macos") {
        Some(dirs.config_dir().join("Google").join("Chrome"))
    } else {
        Some(dirs.config_dir().join("google-chrome"))
    }
}
