//! Lookup suffixes (`created__date__gte`) split into transforms and an operator.

/// Comparison applied by a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Exact,
    /// Case-insensitive `=`.
    IExact,
    /// `LIKE %value%`
    Contains,
    /// `ILIKE %value%`
    IContains,
    /// `IN (...)`
    In,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `LIKE value%`
    StartsWith,
    /// `ILIKE value%`
    IStartsWith,
    /// `LIKE %value`
    EndsWith,
    /// `ILIKE %value`
    IEndsWith,
    /// `IS NULL` / `IS NOT NULL` depending on the value.
    IsNull,
    /// `BETWEEN a AND b`
    Range,
}

impl Operator {
    /// Parse a lookup segment into an operator.
    pub fn from_segment(segment: &str) -> Option<Self> {
        let op = match segment {
            "exact" => Self::Exact,
            "iexact" => Self::IExact,
            "contains" => Self::Contains,
            "icontains" => Self::IContains,
            "in" => Self::In,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "startswith" => Self::StartsWith,
            "istartswith" => Self::IStartsWith,
            "endswith" => Self::EndsWith,
            "iendswith" => Self::IEndsWith,
            "isnull" => Self::IsNull,
            "range" => Self::Range,
            _ => return None,
        };
        Some(op)
    }
}

/// Column transform applied before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Truncate a timestamp to its date.
    Date,
    /// Extract the year.
    Year,
    /// Extract the month.
    Month,
    /// Extract the day of month.
    Day,
    /// Lowercase a string.
    Lower,
    /// Uppercase a string.
    Upper,
    /// String length.
    Length,
}

impl Transform {
    /// Parse a lookup segment into a transform.
    pub fn from_segment(segment: &str) -> Option<Self> {
        let transform = match segment {
            "date" => Self::Date,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "length" => Self::Length,
            _ => return None,
        };
        Some(transform)
    }

    /// Wrap a column expression with this transform.
    pub fn apply(&self, column: &str) -> String {
        match self {
            Self::Date => format!("CAST({} AS DATE)", column),
            Self::Year => format!("EXTRACT(YEAR FROM {})", column),
            Self::Month => format!("EXTRACT(MONTH FROM {})", column),
            Self::Day => format!("EXTRACT(DAY FROM {})", column),
            Self::Lower => format!("LOWER({})", column),
            Self::Upper => format!("UPPER({})", column),
            Self::Length => format!("LENGTH({})", column),
        }
    }
}

/// A fully parsed `field__transform__operator` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPath {
    /// Field path segments (relations included).
    pub path: Vec<String>,
    /// Transforms in application order.
    pub transforms: Vec<Transform>,
    /// Final comparison.
    pub operator: Operator,
}

impl LookupPath {
    /// Split a field and its lookup suffix.
    ///
    /// Segments before the first transform belong to the field path; an
    /// unrecognised trailing segment is treated as a relation hop compared
    /// with `exact`.
    pub fn parse(field: &str, lookup: &str) -> Self {
        let mut segments: Vec<&str> = field.split("__").filter(|s| !s.is_empty()).collect();
        segments.extend(lookup.split("__").filter(|s| !s.is_empty()));

        let operator = match segments.last().and_then(|s| Operator::from_segment(s)) {
            Some(op) => {
                segments.pop();
                op
            }
            None => Operator::Exact,
        };

        let mut path = Vec::new();
        let mut transforms = Vec::new();
        for segment in segments {
            match Transform::from_segment(segment) {
                // The first segment is always a column, even if it shares a transform name.
                Some(t) if !path.is_empty() => transforms.push(t),
                _ => path.push(segment.to_string()),
            }
        }

        Self {
            path,
            transforms,
            operator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_field() {
        let parsed = LookupPath::parse("username", "");
        assert_eq!(parsed.path, vec!["username"]);
        assert!(parsed.transforms.is_empty());
        assert_eq!(parsed.operator, Operator::Exact);
    }

    #[test]
    fn test_parse_transform_and_operator() {
        let parsed = LookupPath::parse("created", "date__gte");
        assert_eq!(parsed.path, vec!["created"]);
        assert_eq!(parsed.transforms, vec![Transform::Date]);
        assert_eq!(parsed.operator, Operator::Gte);
    }

    #[test]
    fn test_parse_relation() {
        let parsed = LookupPath::parse("following_companies__name", "icontains");
        assert_eq!(parsed.path, vec!["following_companies", "name"]);
        assert_eq!(parsed.operator, Operator::IContains);
    }
}
