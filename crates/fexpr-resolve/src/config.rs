use std::borrow::Cow;
use std::env;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// What a lookup of a key whose fetch is already in flight returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingPolicy {
    /// Wait for the fetch that is already in flight.
    #[default]
    Attach,
    /// Report no value and no pending work, so the caller may settle on `None`.
    Detach,
}

/// How newlines in expression text are rewritten before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewlineMode {
    /// Only the first `\n` is replaced by a space.
    #[default]
    FirstOnly,
    /// Every `\n` is replaced by a space.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value '{value}' for {name}")]
pub struct InvalidValue {
    pub name: &'static str,
    pub value: String,
}

impl NewlineMode {
    pub fn normalize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains('\n') {
            return Cow::Borrowed(text);
        }

        match self {
            NewlineMode::FirstOnly => Cow::Owned(text.replacen('\n', " ", 1)),
            NewlineMode::All => Cow::Owned(text.replace('\n', " ")),
        }
    }
}

impl FromStr for PendingPolicy {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "attach" => Ok(PendingPolicy::Attach),
            "detach" => Ok(PendingPolicy::Detach),
            _ => Err(InvalidValue {
                name: "pending policy",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for NewlineMode {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-only" | "first" => Ok(NewlineMode::FirstOnly),
            "all" => Ok(NewlineMode::All),
            _ => Err(InvalidValue {
                name: "newline mode",
                value: s.to_string(),
            }),
        }
    }
}

impl Display for PendingPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PendingPolicy::Attach => write!(f, "attach"),
            PendingPolicy::Detach => write!(f, "detach"),
        }
    }
}

impl Display for NewlineMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NewlineMode::FirstOnly => write!(f, "first-only"),
            NewlineMode::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Coordinate reference system passed with every feature request.
    pub crs: String,
    pub page_size: Option<usize>,
    pub pending_policy: PendingPolicy,
    pub newline_mode: NewlineMode,
    /// Upper bound on evaluation rounds for one expression or batch.
    pub max_rounds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crs: "EPSG:4326".to_string(),
            page_size: None,
            pending_policy: PendingPolicy::default(),
            newline_mode: NewlineMode::default(),
            max_rounds: 64,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds a config from `FEXPR_*` variables; invalid values are reported and ignored.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(crs) = var("FEXPR_CRS") {
            config.crs = crs;
        }

        if let Some(page_size_str) = var("FEXPR_PAGE_SIZE") {
            if let Ok(page_size) = page_size_str.parse::<usize>() {
                config.page_size = Some(page_size);
            } else {
                tracing::warn!(
                    "Invalid FEXPR_PAGE_SIZE value '{}', using default {:?}",
                    page_size_str,
                    config.page_size
                );
            }
        }

        if let Some(policy) = var("FEXPR_PENDING_POLICY") {
            match policy.parse() {
                Ok(policy) => config.pending_policy = policy,
                Err(e) => tracing::warn!("{}, using default {}", e, config.pending_policy),
            }
        }

        if let Some(mode) = var("FEXPR_NEWLINES") {
            match mode.parse() {
                Ok(mode) => config.newline_mode = mode,
                Err(e) => tracing::warn!("{}, using default {}", e, config.newline_mode),
            }
        }

        if let Some(max_rounds_str) = var("FEXPR_MAX_ROUNDS") {
            match max_rounds_str.parse::<usize>() {
                Ok(max_rounds) if max_rounds > 0 => config.max_rounds = max_rounds,
                _ => tracing::warn!(
                    "Invalid FEXPR_MAX_ROUNDS value '{}', using default {}",
                    max_rounds_str,
                    config.max_rounds
                ),
            }
        }

        config
    }
}
