use std::fmt::Display;

use crate::models::tagger;

/// The unique string token that identifies CRF heads predicting every transition score
pub static LARGE: &str = "large";

/// The unique string token that identifies CRF heads with a shared transition matrix
pub static SMALL: &str = "small";

/// Available CRF heads
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum Crf {
    /// `n_tags * n_tags` scores per word
    #[default]
    Large,

    /// `n_tags` emission scores per word plus a learned transition matrix
    Small,
}

impl Crf {
    /// Select this CRF variant in a model configuration
    pub fn apply(&self, config: tagger::Config) -> tagger::Config {
        config.with_large_crf(*self == Crf::Large)
    }
}

impl TryFrom<&str> for Crf {
    type Error = CrfError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase() {
            v if v == LARGE => Ok(Crf::Large),
            v if v == SMALL => Ok(Crf::Small),
            _ => Err(CrfError::Unknown(value.to_string())),
        }
    }
}

impl Display for Crf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Crf::Large => LARGE,
            Crf::Small => SMALL,
        };

        write!(f, "{}", name)
    }
}

/// CRF Error
#[derive(thiserror::Error, Debug)]
pub enum CrfError {
    /// No CRF variant found for the given string
    #[error("no CRF variant found for {0}, expected 'large' or 'small'")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_and_apply() {
        let crf = Crf::try_from("small").unwrap();

        assert_eq!(crf, Crf::Small);
        assert_eq!(crf.to_string(), "small");
        assert!(!crf.apply(tagger::Config::new()).large_crf);
        assert!(matches!(Crf::try_from("xl"), Err(CrfError::Unknown(_))));
    }
}
