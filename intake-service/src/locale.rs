use care_flow::{Catalog, FlowError, Result};
use std::fmt;
use std::str::FromStr;

const EN: &str = include_str!("../locales/en.yaml");
const ES: &str = include_str!("../locales/es.yaml");

/// Display languages shipped with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }

    pub fn catalog(&self) -> Result<Catalog> {
        let source = match self {
            Locale::En => EN,
            Locale::Es => ES,
        };
        Catalog::from_yaml(source)
    }
}

impl FromStr for Locale {
    type Err = FlowError;

    fn from_str(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "es" => Ok(Locale::Es),
            other => Err(FlowError::Locale(format!("unsupported locale '{other}'"))),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
