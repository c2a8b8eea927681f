//! Variants

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// A sellable `(size, color)` combination of a product.
///
/// A line only refers to a variant when both parts are present; a size without a color (or the
/// reverse) is treated as no variant at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variant {
    size: String,
    color: String,
}

impl Variant {
    /// Create a variant from a size and a color.
    pub fn new(size: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            size: size.into(),
            color: color.into(),
        }
    }

    /// Build a variant from optional parts, returning `None` unless both are present and non-blank.
    pub fn from_parts(size: Option<&str>, color: Option<&str>) -> Option<Self> {
        match (size.map(str::trim), color.map(str::trim)) {
            (Some(size), Some(color)) if !size.is_empty() && !color.is_empty() => {
                Some(Self::new(size, color))
            }
            _ => None,
        }
    }

    /// Variant size
    pub fn size(&self) -> &str {
        &self.size
    }

    /// Variant color
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Consume the variant, returning `(size, color)`.
    pub fn into_parts(self) -> (String, String) {
        (self.size, self.color)
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.size, self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_requires_both_size_and_color() {
        assert_eq!(
            Variant::from_parts(Some("M"), Some("Red")),
            Some(Variant::new("M", "Red"))
        );
        assert_eq!(Variant::from_parts(Some("M"), None), None);
        assert_eq!(Variant::from_parts(None, Some("Red")), None);
        assert_eq!(Variant::from_parts(Some("  "), Some("Red")), None);
    }

    #[test]
    fn from_parts_trims_whitespace() {
        let variant = Variant::from_parts(Some(" L "), Some("Blue "));

        assert_eq!(variant, Some(Variant::new("L", "Blue")));
    }

    #[test]
    fn display_joins_size_and_color() {
        assert_eq!(Variant::new("M", "Red").to_string(), "M/Red");
    }
}
