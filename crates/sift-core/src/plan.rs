//! Plan model.
//!
//! A [`RawPlan`] is what the natural-language planner proposes: loosely typed,
//! unqualified and untrusted. A [`NormalizedPlan`] is what validation emits:
//! every column qualified to an entity, operators and aggregations parsed into
//! closed enumerations, the limit clamped, and sensitivity computed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::FilterValue;

// =============================================================================
// Raw (untrusted) plan
// =============================================================================

/// Candidate plan as proposed by the planner. Never trusted as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlan {
    /// Base entity name.
    #[serde(alias = "entity")]
    pub view: String,

    /// Requested output columns, possibly including aggregation expressions.
    #[serde(default)]
    pub select: Vec<String>,

    #[serde(default)]
    pub filters: Vec<RawFilter>,

    /// Join shorthands, e.g. `"policies->customers"`.
    #[serde(default)]
    pub joins: Vec<String>,

    #[serde(default)]
    pub group_by: Vec<String>,

    /// Aggregation expressions, e.g. `"sum(gross_premium) as premium"`.
    #[serde(default)]
    pub aggregations: Vec<String>,

    #[serde(default)]
    pub order_by: Vec<RawOrder>,

    /// Requested row limit. Kept as JSON because planners emit numbers,
    /// numeric strings and garbage alike.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<serde_json::Value>,
}

impl RawPlan {
    /// Parse a plan from JSON text.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFilter {
    pub col: String,
    pub op: String,
    #[serde(default)]
    pub val: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOrder {
    pub col: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// =============================================================================
// Operators
// =============================================================================

/// Comparison and membership operators a filter may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "ILIKE")]
    ILike,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "IN")]
    In,
}

/// Value shape an operator demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Scalar,
    Range,
    List,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
        Operator::ILike,
        Operator::Between,
        Operator::In,
    ];

    /// Parse operator text. Keyword operators are case-insensitive.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_sql().eq_ignore_ascii_case(text))
    }

    /// Operator keyword as emitted in query text.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::ILike => "ILIKE",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
        }
    }

    pub fn shape(&self) -> ValueShape {
        match self {
            Operator::Between => ValueShape::Range,
            Operator::In => ValueShape::List,
            _ => ValueShape::Scalar,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

// =============================================================================
// Aggregations
// =============================================================================

/// Supported aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Count,
        AggregateFunction::Sum,
        AggregateFunction::Avg,
        AggregateFunction::Min,
        AggregateFunction::Max,
    ];

    /// Case-insensitive lookup by function name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_sql().eq_ignore_ascii_case(name.trim()))
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }

    /// Whether the function's output carries values of its input column.
    pub fn passes_values_through(&self) -> bool {
        matches!(self, AggregateFunction::Min | AggregateFunction::Max)
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateArg {
    /// `*`, only valid inside `COUNT`.
    Star,
    Column(ColumnRef),
}

/// A validated aggregation expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub argument: AggregateArg,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Aggregation {
    /// Render as query text, e.g. `SUM(policies.gross_premium) AS premium`.
    pub fn to_sql(&self) -> String {
        let arg = match &self.argument {
            AggregateArg::Star => "*".to_string(),
            AggregateArg::Column(c) => c.to_string(),
        };
        match &self.alias {
            Some(alias) => format!("{}({}) AS {}", self.function, arg, alias),
            None => format!("{}({})", self.function, arg),
        }
    }

    /// Name of the output column this aggregation produces.
    ///
    /// Postgres names an unaliased aggregate after its function.
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.function.as_sql().to_lowercase(),
        }
    }

    pub fn column(&self) -> Option<&ColumnRef> {
        match &self.argument {
            AggregateArg::Star => None,
            AggregateArg::Column(c) => Some(c),
        }
    }
}

// =============================================================================
// Normalized plan
// =============================================================================

/// A fully-qualified `entity.column` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub entity: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(entity: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            column: column.into(),
        }
    }

    /// Split `"entity.column"` on the first dot. Returns `None` for bare names.
    pub fn split_qualified(reference: &str) -> Option<(&str, &str)> {
        reference.split_once('.')
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Asc),
            "desc" | "descending" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// What an ORDER BY entry sorts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderTarget {
    Column(ColumnRef),
    /// Output alias of an aggregation in the same plan.
    Alias(String),
}

impl fmt::Display for OrderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderTarget::Column(c) => write!(f, "{}", c),
            OrderTarget::Alias(a) => f.write_str(a),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub target: OrderTarget,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: ColumnRef,
    pub op: Operator,
    pub value: FilterValue,
}

/// One validated join: the registry edge (by shorthand) and the entity it
/// brings into scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStep {
    pub edge: String,
    pub entity: String,
}

/// Output of validation. Built once per request and consumed by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPlan {
    pub base: String,
    pub select: Vec<ColumnRef>,
    pub filters: Vec<Filter>,
    /// In join order; each step's `entity` is new to the query.
    pub joins: Vec<JoinStep>,
    pub group_by: Vec<ColumnRef>,
    pub aggregations: Vec<Aggregation>,
    pub order_by: Vec<OrderSpec>,
    pub limit: u32,
    pub contains_sensitive: bool,
    /// Output names (aggregation aliases) that carry sensitive values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive_outputs: Vec<String>,
}

impl NormalizedPlan {
    /// Base entity followed by every joined entity.
    pub fn entities(&self) -> Vec<&str> {
        std::iter::once(self.base.as_str())
            .chain(self.joins.iter().map(|j| j.entity.as_str()))
            .collect()
    }

    /// Every qualified column the plan references, in clause order.
    pub fn referenced_columns(&self) -> Vec<&ColumnRef> {
        let mut out: Vec<&ColumnRef> = Vec::new();
        out.extend(self.select.iter());
        out.extend(self.group_by.iter());
        out.extend(self.order_by.iter().filter_map(|o| match &o.target {
            OrderTarget::Column(c) => Some(c),
            OrderTarget::Alias(_) => None,
        }));
        out.extend(self.filters.iter().map(|f| &f.column));
        out.extend(self.aggregations.iter().filter_map(|a| a.column()));
        out
    }
}
