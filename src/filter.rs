use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::descriptor::EntityDescriptor;
use crate::errors::GraphStoreError;

/// A literal compared against a stored column. Every literal is bound as a
/// statement parameter; no value ever reaches the SQL text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Null,
}

impl FilterValue {
    pub fn text<T: Into<String>>(value: T) -> Self {
        FilterValue::Text(value.into())
    }

    fn bind(&self) -> Value {
        match self {
            FilterValue::Text(v) => Value::Text(v.clone()),
            FilterValue::Integer(v) => Value::Integer(*v),
            FilterValue::Real(v) => Value::Real(*v),
            FilterValue::Boolean(v) => Value::Integer(i64::from(*v)),
            FilterValue::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Contains,
    StartsWith,
    EndsWith,
}

impl FilterOp {
    fn comparison(self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => Some("="),
            FilterOp::NotEq => Some("<>"),
            FilterOp::Gt => Some(">"),
            FilterOp::GtEq => Some(">="),
            FilterOp::Lt => Some("<"),
            FilterOp::LtEq => Some("<="),
            _ => None,
        }
    }
}

/// Boolean expression over one entity's stored columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Compare {
        field: String,
        op: FilterOp,
        value: FilterValue,
    },
    InSet {
        field: String,
        values: Vec<FilterValue>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn compare<F: Into<String>>(field: F, op: FilterOp, value: FilterValue) -> Self {
        Expr::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq<F: Into<String>>(field: F, value: FilterValue) -> Self {
        Expr::compare(field, FilterOp::Eq, value)
    }

    pub fn in_set<F: Into<String>>(field: F, values: Vec<FilterValue>) -> Self {
        Expr::InSet {
            field: field.into(),
            values,
        }
    }
}

/// Compiles an optional expression into a parenthesized predicate scoped to
/// `alias`, plus its bound parameters. An absent expression compiles to the
/// empty string, never a vacuous TRUE literal.
pub fn compile(
    expr: Option<&Expr>,
    alias: &str,
    descriptor: &EntityDescriptor,
) -> Result<(String, Vec<Value>), GraphStoreError> {
    let Some(expr) = expr else {
        return Ok((String::new(), Vec::new()));
    };
    let mut sql = String::new();
    let mut params = Vec::new();
    compile_node(expr, alias, descriptor, &mut sql, &mut params)?;
    Ok((sql, params))
}

fn compile_node(
    expr: &Expr,
    alias: &str,
    descriptor: &EntityDescriptor,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<(), GraphStoreError> {
    match expr {
        Expr::Compare { field, op, value } => compile_compare(field, *op, value, alias, descriptor, sql, params),
        Expr::InSet { field, values } => compile_in_set(field, values, alias, descriptor, sql, params),
        Expr::And(children) => compile_group(children, "AND", alias, descriptor, sql, params),
        Expr::Or(children) => compile_group(children, "OR", alias, descriptor, sql, params),
        Expr::Not(inner) => {
            sql.push_str("(NOT ");
            compile_node(inner, alias, descriptor, sql, params)?;
            sql.push(')');
            Ok(())
        }
    }
}

fn compile_group(
    children: &[Expr],
    joiner: &str,
    alias: &str,
    descriptor: &EntityDescriptor,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<(), GraphStoreError> {
    if children.is_empty() {
        return Err(GraphStoreError::validation(
            descriptor.entity,
            format!("{joiner} expression requires at least one operand"),
        ));
    }
    sql.push('(');
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            sql.push(' ');
            sql.push_str(joiner);
            sql.push(' ');
        }
        compile_node(child, alias, descriptor, sql, params)?;
    }
    sql.push(')');
    Ok(())
}

fn compile_compare(
    field: &str,
    op: FilterOp,
    value: &FilterValue,
    alias: &str,
    descriptor: &EntityDescriptor,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<(), GraphStoreError> {
    let column = require_column(field, descriptor)?;
    match op {
        FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
            let FilterValue::Text(text) = value else {
                return Err(GraphStoreError::unsupported(
                    descriptor.entity,
                    format!("{op:?} requires a text literal on column {column}"),
                ));
            };
            let escaped = escape_like(text);
            let pattern = match op {
                FilterOp::Contains => format!("%{escaped}%"),
                FilterOp::StartsWith => format!("{escaped}%"),
                FilterOp::EndsWith => format!("%{escaped}"),
                _ => unreachable!(),
            };
            sql.push_str(&format!("({alias}.{column} LIKE ? ESCAPE '\\')"));
            params.push(Value::Text(pattern));
            Ok(())
        }
        _ => {
            if matches!(value, FilterValue::Null) {
                return match op {
                    FilterOp::Eq => {
                        sql.push_str(&format!("({alias}.{column} IS NULL)"));
                        Ok(())
                    }
                    FilterOp::NotEq => {
                        sql.push_str(&format!("({alias}.{column} IS NOT NULL)"));
                        Ok(())
                    }
                    _ => Err(GraphStoreError::unsupported(
                        descriptor.entity,
                        format!("{op:?} is not defined against NULL on column {column}"),
                    )),
                };
            }
            let symbol = op.comparison().ok_or_else(|| {
                GraphStoreError::unsupported(
                    descriptor.entity,
                    format!("operator {op:?} has no comparison form"),
                )
            })?;
            sql.push_str(&format!("({alias}.{column} {symbol} ?)"));
            params.push(value.bind());
            Ok(())
        }
    }
}

fn compile_in_set(
    field: &str,
    values: &[FilterValue],
    alias: &str,
    descriptor: &EntityDescriptor,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<(), GraphStoreError> {
    let column = require_column(field, descriptor)?;
    if values.is_empty() {
        return Err(GraphStoreError::validation(
            descriptor.entity,
            format!("IN set for column {column} requires at least one value"),
        ));
    }
    sql.push_str(&format!("({alias}.{column} IN ("));
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        if matches!(value, FilterValue::Null) {
            return Err(GraphStoreError::unsupported(
                descriptor.entity,
                format!("NULL is not a member candidate for column {column}"),
            ));
        }
        params.push(value.bind());
    }
    sql.push_str("))");
    Ok(())
}

fn require_column<'a>(
    field: &'a str,
    descriptor: &EntityDescriptor,
) -> Result<&'a str, GraphStoreError> {
    if descriptor.has_column(field) {
        Ok(field)
    } else {
        Err(GraphStoreError::validation(
            descriptor.entity,
            format!("unknown filter field {field}"),
        ))
    }
}

/// Escapes LIKE metacharacters so user text matches literally. Idempotence is
/// not assumed anywhere; this runs exactly once per literal, and the literal
/// itself still travels as a bound parameter.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
