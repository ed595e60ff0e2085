use std::path::PathBuf;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use simplelog::LevelFilter;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://langleysd35.onlinelearningbc.com";

// Runtime settings, read once from the environment (and `.env` via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub course_ou: Option<String>,
    pub headless: bool,
    pub output_dir: PathBuf,
    pub nav_timeout: Duration,
    pub wait_timeout: Duration,
    pub log_level: LevelFilter,
    pub chrome_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Builds the config from any key lookup so tests don't have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get("D2L_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base_url).with_context(|| format!("D2L_BASE_URL is not a valid URL: {}", base_url))?;

        let headless = match get("D2L_HEADLESS") {
            Some(v) => parse_bool(&v).with_context(|| "D2L_HEADLESS must be true or false")?,
            None => true,
        };

        let log_level = match get("D2L_LOG_LEVEL") {
            Some(v) => v.parse::<LevelFilter>().map_err(|_| anyhow!("D2L_LOG_LEVEL is not a log level: {}", v))?,
            None => LevelFilter::Info,
        };

        Ok(Config {
            base_url,
            // Credentials are deliberately not checked here; an empty value fails at the login form.
            username: lookup("D2L_USERNAME").unwrap_or_default(),
            password: lookup("D2L_PASSWORD").unwrap_or_default(),
            course_ou: get("D2L_COURSE_OU"),
            headless,
            output_dir: get("D2L_OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            nav_timeout: millis(get("D2L_TIMEOUT_MS"), "D2L_TIMEOUT_MS", 30_000)?,
            wait_timeout: millis(get("D2L_WAIT_MS"), "D2L_WAIT_MS", 10_000)?,
            log_level,
            chrome_path: get("CHROME_PATH").map(PathBuf::from),
        })
    }

    pub fn login_url(&self) -> Result<Url> {
        self.endpoint("/d2l/login")
    }

    pub fn home_url(&self) -> Result<Url> {
        self.endpoint("/d2l/home")
    }

    pub fn course_home_url(&self, ou: &str) -> Result<Url> {
        self.endpoint(&format!("/d2l/home/{}", ou))
    }

    pub fn grades_url(&self, ou: &str) -> Result<Url> {
        let mut url = self.endpoint("/d2l/lms/grades/my_grades/main.d2l")?;
        url.query_pairs_mut().append_pair("ou", ou);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("unrecognised boolean: {}", other)),
    }
}

fn millis(value: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let ms = match value {
        Some(v) => v.parse::<u64>().with_context(|| format!("{} must be a number of milliseconds", key))?,
        None => default,
    };
    Ok(Duration::from_millis(ms))
}
