//! Références de sources

use crate::error::SourceError;
use pmometadata::SourceKind;
use std::fmt;
use std::str::FromStr;

/// Référence typée vers un média distant
///
/// Forme textuelle : `{kind}:{id}` (ex : `service_a:dQw4w9`). Les URL sont
/// résolues par le [`crate::SourceRegistry`], qui interroge chaque backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: String,
}

impl SourceRef {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for SourceRef {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SourceError::Unrecognized(s.to_string()))?;
        let kind = kind
            .parse::<SourceKind>()
            .map_err(|_| SourceError::Unrecognized(s.to_string()))?;
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(SourceError::Unrecognized(s.to_string()));
        }
        Ok(Self::new(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed_reference() {
        let r: SourceRef = "service_b:urn-42".parse().unwrap();
        assert_eq!(r, SourceRef::new(SourceKind::ServiceB, "urn-42"));
        assert_eq!(r.to_string(), "service_b:urn-42");
    }

    #[test]
    fn test_reject_free_form() {
        assert!("hello".parse::<SourceRef>().is_err());
        assert!("radio:abc".parse::<SourceRef>().is_err());
        assert!("service_a:".parse::<SourceRef>().is_err());
        // Une URL n'est pas une référence préfixée
        assert!("https://a.example/watch/x".parse::<SourceRef>().is_err());
    }
}
