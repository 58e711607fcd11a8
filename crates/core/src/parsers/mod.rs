pub mod collapsed;
pub mod json;

use thiserror::Error;

use crate::model::{CallSiteData, Symbol, WeightedTreeSet};

pub use collapsed::{CollapsedOptions, CollapsedParseError, parse_collapsed};
pub use json::{JsonParseError, parse_json_forest};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("collapsed: {0}")]
    Collapsed(#[from] CollapsedParseError),
    #[error("json: {0}")]
    Json(#[from] JsonParseError),
}

/// Auto-detect the input format and parse it.
///
/// A top-level JSON array is a serialised tree set; anything else is read
/// as collapsed stacks.
pub fn parse_auto(
    data: &[u8],
    options: &CollapsedOptions,
) -> Result<WeightedTreeSet<Symbol, CallSiteData>, ParseError> {
    if data.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[') {
        return Ok(parse_json_forest(data, options)?);
    }
    Ok(parse_collapsed(data, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_collapsed() {
        let set = parse_auto(b"main;foo 2\n", &CollapsedOptions::default()).unwrap();
        assert_eq!(set.total_weight(), 2);
    }

    #[test]
    fn detects_json() {
        let json = b"  [{\"name\": \"t\", \"trees\": [{\"object\": \"main\", \"weight\": 4}]}]";
        let set = parse_auto(json, &CollapsedOptions::default()).unwrap();
        assert_eq!(set.total_weight(), 4);
    }

    #[test]
    fn errors_keep_their_format() {
        assert!(matches!(
            parse_auto(b"", &CollapsedOptions::default()),
            Err(ParseError::Collapsed(CollapsedParseError::Empty))
        ));
        assert!(matches!(
            parse_auto(b"[1, 2", &CollapsedOptions::default()),
            Err(ParseError::Json(_))
        ));
    }
}
