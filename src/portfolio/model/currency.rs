use std::{fmt::Display, hash::Hash};

pub const DEFAULT_HOME_CURRENCY: &str = "INR";

#[derive(Clone, Debug)]
enum CurrImpl {
    Static(&'static str),
    Dyn(String),
}

/// An ISO-4217-style currency code, always upper case.
#[derive(Clone, Debug)]
pub struct Currency(CurrImpl);

impl Currency {
    pub fn new(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "INR" => Currency::inr(),
            "USD" => Currency::usd(),
            other => Currency(CurrImpl::Dyn(other.to_string())),
        }
    }

    /// Like new, but rejects anything that is not three ASCII letters.
    pub fn parse(s: &str) -> Result<Self, String> {
        let t = s.trim();
        if t.len() == 3 && t.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Currency::new(t))
        } else {
            Err(format!("Invalid currency code '{}'", s))
        }
    }

    pub fn inr() -> Self {
        Currency(CurrImpl::Static("INR"))
    }

    pub fn usd() -> Self {
        Currency(CurrImpl::Static("USD"))
    }

    pub fn default_home() -> Self {
        Currency::new(DEFAULT_HOME_CURRENCY)
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            CurrImpl::Static(s) => s,
            CurrImpl::Dyn(s) => s.as_str(),
        }
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl PartialOrd for Currency {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Currency {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

// Auto-implements to_string()
impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
