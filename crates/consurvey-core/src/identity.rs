//! # Identity Newtypes
//!
//! Row identifiers for every table in the survey stack. Each identifier is a
//! distinct type, so an [`OptionId`] cannot be passed where a
//! [`QuestionId`] is expected even though both wrap an `i64`.

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database id.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw database id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

row_id!(
    /// Identifier of a survey.
    SurveyId
);
row_id!(
    /// Identifier of a question.
    QuestionId
);
row_id!(
    /// Identifier of a dropdown/choice option.
    ///
    /// GMs, conventions, and adventures are all options of their role
    /// questions, so association rows are keyed by option ids.
    OptionId
);
row_id!(
    /// Identifier of a submitted response.
    ResponseId
);
row_id!(
    /// Identifier of a single answer row.
    AnswerId
);
row_id!(
    /// Identifier of a GM interest record.
    GmInterestId
);
row_id!(
    /// Identifier of a gm_conventions or gm_adventures row.
    AssignmentId
);
row_id!(
    /// Identifier of a coupon code row.
    CouponId
);
row_id!(
    /// Identifier of a coupon delivery record.
    DeliveryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_integer() {
        let id = ResponseId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: ResponseId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parses_from_str_with_whitespace() {
        let id: OptionId = " 7 ".parse().unwrap();
        assert_eq!(id.get(), 7);
        assert!("seven".parse::<OptionId>().is_err());
    }

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(QuestionId::new(3).to_string(), "3");
    }
}
