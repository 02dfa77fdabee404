use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Clause {
    Match(MatchClause),
    Where(WhereClause),
    Create(CreateClause),
    Delete(DeleteClause),
    With(WithClause),
    Return(ReturnClause),
    OrderBy(OrderByClause),
    Skip(u64),
    Limit(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchClause {
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateClause {
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteClause {
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WhereClause {
    pub expression: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WithClause {
    pub distinct: bool,
    pub items: Vec<Projection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnClause {
    pub distinct: bool,
    pub items: Vec<Projection>,
}

/// One column of a RETURN or WITH clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Projection {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl Projection {
    /// Column name: the alias if given, otherwise the expression's text.
    pub fn column_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expression.text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderByClause {
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub expression: Expression,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub elements: Vec<PathElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PathElement {
    Node(NodePattern),
    Relationship(RelPattern),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Option<PropertyMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub direction: RelDirection,
    pub range: Option<HopRange>,
    pub properties: Option<PropertyMap>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum RelDirection {
    Outgoing,
    Incoming,
    Undirected,
}

/// Hop range of a variable-length relationship: `*`, `*n`, `*n..m`, `*..m`,
/// `*n..`. `None` bounds fall back to the executor's defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HopRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyMap {
    pub entries: Vec<PropertyPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyPair {
    pub key: String,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(String),
    Parameter(String),
    PropertyAccess(PropertyAccess),
    FunctionCall(FunctionCall),
    /// Aggregates are recognised at parse time so the executor can detect
    /// grouping without re-scanning call names.
    Aggregate(AggregateCall),
    Unary(Box<UnaryExpression>),
    Binary(Box<BinaryExpression>),
    List(Vec<Expression>),
    Map(PropertyMap),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyAccess {
    pub variable: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    /// `None` encodes `COUNT(*)`.
    pub argument: Option<Box<Expression>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Expression,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinaryExpression {
    pub left: Expression,
    pub operator: BinaryOperator,
    pub right: Expression,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Contains,
    StartsWith,
    EndsWith,
    RegexMatch,
}

impl BinaryOperator {
    fn text(&self) -> &'static str {
        match self {
            BinaryOperator::Equals => "=",
            BinaryOperator::NotEquals => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Contains => "CONTAINS",
            BinaryOperator::StartsWith => "STARTS WITH",
            BinaryOperator::EndsWith => "ENDS WITH",
            BinaryOperator::RegexMatch => "=~",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Expression {
    /// Source-shaped rendering, used for unaliased column names.
    pub fn text(&self) -> String {
        match self {
            Expression::Literal(lit) => match lit {
                Literal::Null => "null".to_string(),
                Literal::Bool(b) => b.to_string(),
                Literal::Integer(i) => i.to_string(),
                Literal::Float(f) => f.to_string(),
                Literal::String(s) => format!("\"{s}\""),
            },
            Expression::Variable(name) => name.clone(),
            Expression::Parameter(name) => format!("${name}"),
            Expression::PropertyAccess(pa) => format!("{}.{}", pa.variable, pa.key),
            Expression::FunctionCall(call) => {
                let args: Vec<String> = call.args.iter().map(Expression::text).collect();
                format!("{}({})", call.name, args.join(", "))
            }
            Expression::Aggregate(agg) => match &agg.argument {
                Some(arg) => format!("{}({})", agg.function.name(), arg.text()),
                None => format!("{}(*)", agg.function.name()),
            },
            Expression::Unary(u) => match u.operator {
                UnaryOperator::Not => format!("NOT {}", u.operand.text()),
                UnaryOperator::Negate => format!("-{}", u.operand.text()),
            },
            Expression::Binary(b) => {
                format!("{} {} {}", b.left.text(), b.operator.text(), b.right.text())
            }
            Expression::List(items) => {
                let parts: Vec<String> = items.iter().map(Expression::text).collect();
                format!("[{}]", parts.join(", "))
            }
            Expression::Map(map) => {
                let parts: Vec<String> = map
                    .entries
                    .iter()
                    .map(|pair| format!("{}: {}", pair.key, pair.value.text()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Whether this expression contains an aggregate call anywhere.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate(_) => true,
            Expression::Unary(u) => u.operand.contains_aggregate(),
            Expression::Binary(b) => {
                b.left.contains_aggregate() || b.right.contains_aggregate()
            }
            Expression::FunctionCall(call) => call.args.iter().any(Expression::contains_aggregate),
            Expression::List(items) => items.iter().any(Expression::contains_aggregate),
            Expression::Map(map) => map
                .entries
                .iter()
                .any(|pair| pair.value.contains_aggregate()),
            _ => false,
        }
    }
}
