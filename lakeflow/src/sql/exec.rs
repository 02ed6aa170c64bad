//! Query evaluation.

use super::parse::table_name;
use super::SqlError;
use crate::context::Parameters;
use crate::table::ops::reduce;
use crate::table::{infer_type, parse_timestamp, AggregateOp, Column, DataType, Schema, Table, TimeUnit, Value};
use sqlparser::ast::{
    BinaryOperator, DuplicateTreatment, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Join,
    JoinConstraint, JoinOperator, Query, Select, SelectItem, SetExpr, TableFactor, UnaryOperator, Value as SqlValue,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluates a parsed query; `lookup` supplies the tables it reads.
///
/// # Errors
///
/// Returns [`SqlError`] for unknown tables or columns, type errors, and
/// anything outside the supported subset.
pub fn execute(query: &Query, lookup: &dyn Fn(&str) -> Option<Arc<Table>>) -> Result<Table, SqlError> {
    execute_with(query, lookup, &Parameters::new())
}

/// Evaluates a parsed query whose `$name` placeholders read `parameters`.
///
/// # Errors
///
/// As [`execute`], plus [`SqlError::UnknownParameter`] for a placeholder
/// with no matching parameter.
pub fn execute_with(
    query: &Query,
    lookup: &dyn Fn(&str) -> Option<Arc<Table>>,
    parameters: &Parameters,
) -> Result<Table, SqlError> {
    if query.with.is_some() {
        return Err(SqlError::Unsupported("WITH clauses".to_string()));
    }
    if query.fetch.is_some() {
        return Err(SqlError::Unsupported("FETCH".to_string()));
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(SqlError::Unsupported(format!("query body: {}", query.body)));
    };
    check_select(select)?;

    let mut scope = Scope::from_clause(select, lookup, parameters)?;
    if let Some(selection) = &select.selection {
        scope.filter(selection)?;
    }

    let projection = Projection::plan(select, &scope)?;
    let mut rows = if projection.aggregated {
        projection.grouped_rows(&scope, select)?
    } else {
        projection.plain_rows(&scope)?
    };

    if let Some(order_by) = &query.order_by {
        let mut keys = Vec::with_capacity(order_by.exprs.len());
        for item in &order_by.exprs {
            keys.push((projection.output_index(&item.expr)?, item.asc.unwrap_or(true)));
        }
        rows.sort_by(|a, b| {
            keys.iter()
                .map(|&(idx, asc)| order_values(&a[idx], &b[idx], asc))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }

    let offset = match &query.offset {
        Some(offset) => count_literal(&offset.value, "OFFSET")?,
        None => 0,
    };
    let limit = match &query.limit {
        Some(limit) => Some(count_literal(limit, "LIMIT")?),
        None => None,
    };
    let rows: Vec<Vec<Value>> = rows
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    projection.build(rows)
}

fn check_select(select: &Select) -> Result<(), SqlError> {
    if select.distinct.is_some() {
        return Err(SqlError::Unsupported("SELECT DISTINCT".to_string()));
    }
    if select.from.len() > 1 {
        return Err(SqlError::Unsupported("comma joins; use JOIN ... ON".to_string()));
    }
    if matches!(select.group_by, GroupByExpr::All(_)) {
        return Err(SqlError::Unsupported("GROUP BY ALL".to_string()));
    }
    Ok(())
}

/// Nulls last in both directions.
fn order_values(a: &Value, b: &Value, asc: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if asc => a.sort_cmp(b),
        (false, false) => b.sort_cmp(a),
    }
}

fn count_literal(expr: &Expr, clause: &str) -> Result<usize, SqlError> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse()
            .map_err(|_| SqlError::Unsupported(format!("{clause} {n}"))),
        other => Err(SqlError::Unsupported(format!("{clause} {other}"))),
    }
}

#[derive(Debug, Clone)]
struct ScopeColumn {
    qualifier: String,
    column: Column,
}

/// The joined, filtered rows a `SELECT` works on.
#[derive(Debug)]
struct Scope<'p> {
    columns: Vec<ScopeColumn>,
    rows: Vec<Vec<Value>>,
    parameters: &'p Parameters,
}

impl<'p> Scope<'p> {
    fn from_clause(
        select: &Select,
        lookup: &dyn Fn(&str) -> Option<Arc<Table>>,
        parameters: &'p Parameters,
    ) -> Result<Self, SqlError> {
        let Some(from) = select.from.first() else {
            // SELECT without FROM evaluates once.
            return Ok(Self {
                columns: Vec::new(),
                rows: vec![Vec::new()],
                parameters,
            });
        };
        let mut scope = Self::relation(&from.relation, lookup, parameters)?;
        for join in &from.joins {
            scope = scope.join(join, lookup)?;
        }
        Ok(scope)
    }

    fn relation(
        factor: &TableFactor,
        lookup: &dyn Fn(&str) -> Option<Arc<Table>>,
        parameters: &'p Parameters,
    ) -> Result<Self, SqlError> {
        let name = table_name(factor)?;
        let qualifier = match factor {
            TableFactor::Table { alias: Some(alias), .. } => alias.name.value.clone(),
            _ => name.clone(),
        };
        let table = lookup(&name).ok_or_else(|| SqlError::UnknownTable(name.clone()))?;
        Ok(Self {
            columns: table
                .schema()
                .columns()
                .iter()
                .map(|column| ScopeColumn {
                    qualifier: qualifier.clone(),
                    column: column.clone(),
                })
                .collect(),
            rows: table.rows().map(<[Value]>::to_vec).collect(),
            parameters,
        })
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.columns, self.parameters)
    }

    /// Nested-loop inner join.
    fn join(self, join: &Join, lookup: &dyn Fn(&str) -> Option<Arc<Table>>) -> Result<Self, SqlError> {
        let JoinOperator::Inner(JoinConstraint::On(on)) = &join.join_operator else {
            return Err(SqlError::Unsupported(format!("join: {join}")));
        };
        let right = Self::relation(&join.relation, lookup, self.parameters)?;
        let mut columns = self.columns;
        columns.extend(right.columns);
        let mut joined = Self {
            columns,
            rows: Vec::new(),
            parameters: self.parameters,
        };

        let eval = joined.evaluator();
        let mut rows = Vec::new();
        for left_row in &self.rows {
            for right_row in &right.rows {
                let mut row = left_row.clone();
                row.extend(right_row.iter().cloned());
                if eval.predicate(on, &Frame::Row(&row))? {
                    rows.push(row);
                }
            }
        }
        joined.rows = rows;
        Ok(joined)
    }

    fn filter(&mut self, predicate: &Expr) -> Result<(), SqlError> {
        let rows = std::mem::take(&mut self.rows);
        let eval = self.evaluator();
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if eval.predicate(predicate, &Frame::Row(&row))? {
                kept.push(row);
            }
        }
        self.rows = kept;
        Ok(())
    }
}

/// One output column: its name, the expression computing it, and its type
/// when known before evaluation.
#[derive(Debug)]
struct OutputColumn {
    name: String,
    expr: Expr,
    static_type: Option<Column>,
}

#[derive(Debug)]
struct Projection {
    columns: Vec<OutputColumn>,
    aggregated: bool,
}

impl Projection {
    fn plan(select: &Select, scope: &Scope<'_>) -> Result<Self, SqlError> {
        let group_by = group_by_exprs(select);
        let mut columns = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) => {
                    columns.extend(scope.columns.iter().map(column_ref));
                }
                SelectItem::QualifiedWildcard(name, _) => {
                    let qualifier = name.0.last().map(|i| i.value.as_str()).unwrap_or_default();
                    let before = columns.len();
                    columns.extend(
                        scope
                            .columns
                            .iter()
                            .filter(|c| c.qualifier == qualifier)
                            .map(column_ref),
                    );
                    if columns.len() == before {
                        return Err(SqlError::UnknownTable(qualifier.to_string()));
                    }
                }
                SelectItem::UnnamedExpr(expr) => columns.push(OutputColumn {
                    name: default_name(expr),
                    expr: expr.clone(),
                    static_type: static_type(expr, scope),
                }),
                SelectItem::ExprWithAlias { expr, alias } => columns.push(OutputColumn {
                    name: alias.value.clone(),
                    expr: expr.clone(),
                    static_type: static_type(expr, scope),
                }),
            }
        }
        let aggregated = !group_by.is_empty()
            || select.having.is_some()
            || columns.iter().any(|c| contains_aggregate(&c.expr));
        Ok(Self { columns, aggregated })
    }

    fn plain_rows(&self, scope: &Scope<'_>) -> Result<Vec<Vec<Value>>, SqlError> {
        let eval = scope.evaluator();
        scope
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| eval.eval(&c.expr, &Frame::Row(row)))
                    .collect()
            })
            .collect()
    }

    fn grouped_rows(&self, scope: &Scope<'_>, select: &Select) -> Result<Vec<Vec<Value>>, SqlError> {
        let eval = scope.evaluator();
        let keys: Vec<Expr> = group_by_exprs(select)
            .iter()
            .map(|expr| self.resolve_group_key(expr, scope))
            .collect::<Result<_, _>>()?;

        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<Vec<&[Value]>> = Vec::new();
        for row in &scope.rows {
            let key = keys
                .iter()
                .map(|k| eval.eval(k, &Frame::Row(row)))
                .collect::<Result<Vec<_>, _>>()?;
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row.as_slice());
        }
        // A global aggregate over no rows still yields one row.
        if keys.is_empty() && groups.is_empty() {
            groups.push(Vec::new());
        }

        let mut rows = Vec::with_capacity(groups.len());
        for group in &groups {
            let frame = Frame::Group(group);
            if let Some(having) = &select.having {
                if !eval.predicate(having, &frame)? {
                    continue;
                }
            }
            rows.push(
                self.columns
                    .iter()
                    .map(|c| eval.eval(&c.expr, &frame))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        Ok(rows)
    }

    /// A `GROUP BY` item may name an output ordinal or alias.
    fn resolve_group_key(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Expr, SqlError> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => {
                let ordinal: usize = n
                    .parse()
                    .map_err(|_| SqlError::Unsupported(format!("GROUP BY {n}")))?;
                ordinal
                    .checked_sub(1)
                    .and_then(|i| self.columns.get(i))
                    .map(|c| c.expr.clone())
                    .ok_or_else(|| SqlError::Unsupported(format!("GROUP BY ordinal {n} out of range")))
            }
            Expr::Identifier(ident) if scope.evaluator().find(None, &ident.value).is_err() => self
                .columns
                .iter()
                .find(|c| c.name == ident.value)
                .map(|c| c.expr.clone())
                .ok_or_else(|| SqlError::UnknownColumn(ident.value.clone())),
            other => Ok(other.clone()),
        }
    }

    fn output_index(&self, expr: &Expr) -> Result<usize, SqlError> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => n
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .filter(|&i| i < self.columns.len())
                .ok_or_else(|| SqlError::Unsupported(format!("ORDER BY ordinal {n} out of range"))),
            Expr::Identifier(ident) => self.position(&ident.value),
            Expr::CompoundIdentifier(parts) => match parts.last() {
                Some(last) => self.position(&last.value),
                None => Err(SqlError::Unsupported("empty identifier".to_string())),
            },
            other => self
                .columns
                .iter()
                .position(|c| c.expr == *other)
                .ok_or_else(|| SqlError::Unsupported(format!("ORDER BY {other}: order by an output column"))),
        }
    }

    fn position(&self, name: &str) -> Result<usize, SqlError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SqlError::UnknownColumn(name.to_string()))
    }

    fn build(&self, rows: Vec<Vec<Value>>) -> Result<Table, SqlError> {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, out)| {
                let inferred = infer_type(rows.iter().map(|r| &r[idx]));
                let has_null = rows.iter().any(|r| r[idx].is_null());
                let data_type = inferred
                    .or_else(|| out.static_type.as_ref().map(|c| c.data_type))
                    .unwrap_or(DataType::Str);
                let mut column = Column::new(&out.name, data_type);
                if has_null || out.static_type.as_ref().is_some_and(|c| c.nullable) {
                    column = column.nullable();
                }
                column
            })
            .collect();
        Ok(Table::new(Schema::new(columns)?, rows)?)
    }
}

fn column_ref(column: &ScopeColumn) -> OutputColumn {
    OutputColumn {
        name: column.column.name.clone(),
        expr: Expr::CompoundIdentifier(vec![
            column.qualifier.as_str().into(),
            column.column.name.as_str().into(),
        ]),
        static_type: Some(column.column.clone()),
    }
}

fn default_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts.last().map(|p| p.value.clone()).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// The column an expression yields, worked out from the input schema so
/// that an empty result still has the right types.
fn static_type(expr: &Expr, scope: &Scope<'_>) -> Option<Column> {
    let eval = scope.evaluator();
    let derived = |data_type: DataType| Some(Column::new("expr", data_type));
    match expr {
        Expr::Identifier(ident) => eval.find(None, &ident.value).ok().map(|i| scope.columns[i].column.clone()),
        Expr::CompoundIdentifier(parts) if parts.len() == 2 => eval
            .find(Some(&parts[0].value), &parts[1].value)
            .ok()
            .map(|i| scope.columns[i].column.clone()),
        Expr::Value(SqlValue::Placeholder(p)) => eval.placeholder(p).ok()?.data_type().and_then(derived),
        Expr::Value(value) => literal(value).ok()?.data_type().and_then(derived),
        Expr::Nested(inner) => static_type(inner, scope),
        Expr::IsNull(_) | Expr::IsNotNull(_) | Expr::InList { .. } | Expr::Between { .. } => derived(DataType::Bool),
        Expr::UnaryOp { op: UnaryOperator::Not, .. } => derived(DataType::Bool),
        Expr::UnaryOp { expr: inner, .. } => static_type(inner, scope),
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Multiply | BinaryOperator::Modulo => {
                let l = static_type(left, scope)?.data_type;
                let r = static_type(right, scope)?.data_type;
                match (l, r) {
                    (DataType::Int, DataType::Int) => derived(DataType::Int),
                    (l, r) if l.is_numeric() && r.is_numeric() => derived(DataType::Float),
                    _ => None,
                }
            }
            BinaryOperator::Divide => derived(DataType::Float),
            _ => derived(DataType::Bool),
        },
        Expr::Function(func) => {
            let name = func.name.to_string().to_ascii_lowercase();
            let arg_type = || match function_args(func) {
                [FunctionArg::Unnamed(FunctionArgExpr::Expr(arg))] => static_type(arg, scope).map(|c| c.data_type),
                _ => None,
            };
            let column = match (name.as_str(), aggregate_op(&name)) {
                ("date_trunc", _) => Column::new("date_trunc", DataType::Timestamp),
                (_, Some(AggregateOp::Count)) => return derived(DataType::Int),
                (_, Some(AggregateOp::Mean)) => Column::new("expr", DataType::Float),
                (_, Some(AggregateOp::Sum | AggregateOp::Min | AggregateOp::Max)) => Column::new("expr", arg_type()?),
                _ => return None,
            };
            Some(column.nullable())
        }
        _ => None,
    }
}

fn group_by_exprs(select: &Select) -> &[Expr] {
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => exprs,
        GroupByExpr::All(_) => &[],
    }
}

fn aggregate_op(name: &str) -> Option<AggregateOp> {
    match name.to_ascii_lowercase().as_str() {
        "count" => Some(AggregateOp::Count),
        "sum" => Some(AggregateOp::Sum),
        "avg" | "mean" => Some(AggregateOp::Mean),
        "min" => Some(AggregateOp::Min),
        "max" => Some(AggregateOp::Max),
        _ => None,
    }
}

fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function(func) => {
            aggregate_op(&func.name.to_string()).is_some() || function_args(func).iter().any(|a| match a {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => contains_aggregate(e),
                _ => false,
            })
        }
        Expr::BinaryOp { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::IsNull(expr) | Expr::IsNotNull(expr) => {
            contains_aggregate(expr)
        }
        _ => false,
    }
}

fn function_args(func: &sqlparser::ast::Function) -> &[FunctionArg] {
    match &func.args {
        FunctionArguments::List(list) => &list.args,
        _ => &[],
    }
}

/// What an expression is evaluated against: one row, or one group of rows
/// (where aggregates are allowed and plain columns read the first row).
enum Frame<'a> {
    Row(&'a [Value]),
    Group(&'a [&'a [Value]]),
}

struct Evaluator<'a> {
    columns: &'a [ScopeColumn],
    parameters: &'a Parameters,
}

impl<'a> Evaluator<'a> {
    fn new(columns: &'a [ScopeColumn], parameters: &'a Parameters) -> Self {
        Self { columns, parameters }
    }

    fn find(&self, qualifier: Option<&str>, name: &str) -> Result<usize, SqlError> {
        let matches = |exact: bool| {
            self.columns
                .iter()
                .enumerate()
                .filter(|(_, c)| qualifier.map_or(true, |q| c.qualifier == q))
                .filter(|(_, c)| {
                    if exact {
                        c.column.name == name
                    } else {
                        c.column.name.eq_ignore_ascii_case(name)
                    }
                })
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        };
        let mut found = matches(true);
        if found.is_empty() {
            found = matches(false);
        }
        let display = || match qualifier {
            Some(q) => format!("{q}.{name}"),
            None => name.to_string(),
        };
        match found.as_slice() {
            [idx] => Ok(*idx),
            [] => Err(SqlError::UnknownColumn(display())),
            _ => Err(SqlError::AmbiguousColumn(display())),
        }
    }

    fn column(&self, idx: usize, frame: &Frame<'_>) -> Value {
        match frame {
            Frame::Row(row) => row[idx].clone(),
            Frame::Group(rows) => rows.first().map_or(Value::Null, |row| row[idx].clone()),
        }
    }

    fn predicate(&self, expr: &Expr, frame: &Frame<'_>) -> Result<bool, SqlError> {
        match self.eval(expr, frame)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(SqlError::Type(format!("predicate '{expr}' evaluated to {other}"))),
        }
    }

    fn eval(&self, expr: &Expr, frame: &Frame<'_>) -> Result<Value, SqlError> {
        match expr {
            Expr::Identifier(ident) => Ok(self.column(self.find(None, &ident.value)?, frame)),
            Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                [column] => Ok(self.column(self.find(None, &column.value)?, frame)),
                [table, column] => Ok(self.column(self.find(Some(&table.value), &column.value)?, frame)),
                _ => Err(SqlError::Unsupported(format!("identifier {expr}"))),
            },
            Expr::Value(SqlValue::Placeholder(placeholder)) => self.placeholder(placeholder),
            Expr::Value(value) => literal(value),
            Expr::Nested(inner) => self.eval(inner, frame),
            Expr::IsNull(inner) => Ok(Value::Bool(self.eval(inner, frame)?.is_null())),
            Expr::IsNotNull(inner) => Ok(Value::Bool(!self.eval(inner, frame)?.is_null())),
            Expr::UnaryOp { op, expr: inner } => unary(op, self.eval(inner, frame)?),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And | BinaryOperator::Or => {
                    let l = truth(&self.eval(left, frame)?, left)?;
                    let r = truth(&self.eval(right, frame)?, right)?;
                    Ok(logic(op == &BinaryOperator::And, l, r))
                }
                _ => binary(op, &self.eval(left, frame)?, &self.eval(right, frame)?),
            },
            Expr::InList { expr: inner, list, negated } => {
                let value = self.eval(inner, frame)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut found = false;
                for item in list {
                    if compare(&value, &self.eval(item, frame)?)? == Some(Ordering::Equal) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(found != *negated))
            }
            Expr::Between { expr: inner, negated, low, high } => {
                let value = self.eval(inner, frame)?;
                let low = compare(&value, &self.eval(low, frame)?)?;
                let high = compare(&value, &self.eval(high, frame)?)?;
                Ok(match (low, high) {
                    (Some(l), Some(h)) => Value::Bool((l.is_ge() && h.is_le()) != *negated),
                    _ => Value::Null,
                })
            }
            Expr::Function(func) => self.function(func, frame),
            other => Err(SqlError::Unsupported(format!("expression {other}"))),
        }
    }

    fn function(&self, func: &sqlparser::ast::Function, frame: &Frame<'_>) -> Result<Value, SqlError> {
        let name = func.name.to_string().to_ascii_lowercase();
        if let FunctionArguments::List(list) = &func.args {
            if matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)) {
                return Err(SqlError::Unsupported(format!("{func}")));
            }
        }
        let args = function_args(func);

        if let Some(op) = aggregate_op(&name) {
            let Frame::Group(rows) = frame else {
                return Err(SqlError::Unsupported(format!("aggregate {func} outside SELECT or HAVING")));
            };
            return self.aggregate(op, func, args, rows);
        }

        match name.as_str() {
            "date_trunc" => {
                let [unit, value] = args else {
                    return Err(SqlError::Unsupported(format!("{func}: expected DATE_TRUNC('unit', expr)")));
                };
                let unit = self.arg(unit, frame)?;
                let unit = unit
                    .as_str()
                    .and_then(TimeUnit::parse)
                    .ok_or_else(|| SqlError::Unsupported(format!("time unit {unit}")))?;
                let value = match self.arg(value, frame)? {
                    Value::Str(s) => parse_timestamp(&s)
                        .map(Value::Timestamp)
                        .ok_or_else(|| SqlError::Type(format!("'{s}' is not a timestamp")))?,
                    other => other,
                };
                unit.truncate(&value).map_err(|e| SqlError::Type(e.to_string()))
            }
            _ => Err(SqlError::Unsupported(format!("function {func}"))),
        }
    }

    /// `$name` reads run parameter `name`.
    fn placeholder(&self, placeholder: &str) -> Result<Value, SqlError> {
        let name = placeholder.strip_prefix('$').unwrap_or(placeholder);
        let param = self
            .parameters
            .get(name)
            .ok_or_else(|| SqlError::UnknownParameter(name.to_string()))?;
        param
            .to_value()
            .ok_or_else(|| SqlError::Type(format!("parameter '{name}' is a secret")))
    }

    fn arg(&self, arg: &FunctionArg, frame: &Frame<'_>) -> Result<Value, SqlError> {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => self.eval(expr, frame),
            other => Err(SqlError::Unsupported(format!("argument {other}"))),
        }
    }

    fn aggregate(
        &self,
        op: AggregateOp,
        func: &sqlparser::ast::Function,
        args: &[FunctionArg],
        rows: &[&[Value]],
    ) -> Result<Value, SqlError> {
        let expr = match args {
            [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] if op == AggregateOp::Count => {
                return reduce(AggregateOp::Count, &[], Some(rows.len())).map_err(SqlError::from);
            }
            [FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))] => expr,
            _ => return Err(SqlError::Unsupported(format!("aggregate {func}"))),
        };
        let values = rows
            .iter()
            .map(|row| self.eval(expr, &Frame::Row(row)))
            .collect::<Result<Vec<_>, _>>()?;
        let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
        if matches!(op, AggregateOp::Sum | AggregateOp::Mean) {
            if let Some(bad) = present.iter().find(|v| v.as_f64().is_none()) {
                return Err(SqlError::Type(format!("{func} over non-numeric value {bad}")));
            }
            if present.is_empty() {
                return Ok(Value::Null);
            }
        }
        reduce(op, &present, None).map_err(SqlError::from)
    }
}

fn literal(value: &SqlValue) -> Result<Value, SqlError> {
    match value {
        SqlValue::Number(n, _) => n
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| {
                n.parse::<f64>()
                    .map_err(|_| SqlError::Type(format!("invalid number {n}")))
                    .and_then(finite_float)
            }),
        SqlValue::SingleQuotedString(s) => Ok(Value::Str(s.clone())),
        SqlValue::Boolean(b) => Ok(Value::Bool(*b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(SqlError::Unsupported(format!("literal {other}"))),
    }
}

fn truth(value: &Value, expr: &Expr) -> Result<Option<bool>, SqlError> {
    match value {
        Value::Bool(b) => Ok(Some(*b)),
        Value::Null => Ok(None),
        other => Err(SqlError::Type(format!("'{expr}' is {other}, not a boolean"))),
    }
}

/// Three-valued AND / OR.
fn logic(and: bool, l: Option<bool>, r: Option<bool>) -> Value {
    let out = if and {
        match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }
    } else {
        match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        }
    };
    out.map_or(Value::Null, Value::Bool)
}

fn unary(op: &UnaryOperator, value: Value) -> Result<Value, SqlError> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Minus, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| SqlError::Type("integer overflow".to_string())),
        (UnaryOperator::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (op, v) => Err(SqlError::Type(format!("cannot apply {op} to {v}"))),
    }
}

/// Compares two values, reading a string as a timestamp when the other side
/// is one.
fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, SqlError> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    let coerced = match (a, b) {
        (Value::Timestamp(_), Value::Str(s)) => Some((a.clone(), timestamp_literal(s)?)),
        (Value::Str(s), Value::Timestamp(_)) => Some((timestamp_literal(s)?, b.clone())),
        _ => None,
    };
    let ordering = match &coerced {
        Some((a, b)) => a.compare(b),
        None => a.compare(b),
    };
    ordering
        .map(Some)
        .ok_or_else(|| SqlError::Type(format!("cannot compare {a} with {b}")))
}

fn timestamp_literal(s: &str) -> Result<Value, SqlError> {
    parse_timestamp(s)
        .map(Value::Timestamp)
        .ok_or_else(|| SqlError::Type(format!("'{s}' is not a timestamp")))
}

#[allow(clippy::cast_precision_loss)]
fn binary(op: &BinaryOperator, l: &Value, r: &Value) -> Result<Value, SqlError> {
    let comparison = match op {
        BinaryOperator::Eq => Some(Ordering::is_eq as fn(Ordering) -> bool),
        BinaryOperator::NotEq => Some(Ordering::is_ne as fn(Ordering) -> bool),
        BinaryOperator::Lt => Some(Ordering::is_lt as fn(Ordering) -> bool),
        BinaryOperator::LtEq => Some(Ordering::is_le as fn(Ordering) -> bool),
        BinaryOperator::Gt => Some(Ordering::is_gt as fn(Ordering) -> bool),
        BinaryOperator::GtEq => Some(Ordering::is_ge as fn(Ordering) -> bool),
        _ => None,
    };
    if let Some(test) = comparison {
        return Ok(compare(l, r)?.map_or(Value::Null, |o| Value::Bool(test(o))));
    }
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let overflow = || SqlError::Type("integer overflow".to_string());
    match (op, l, r) {
        (BinaryOperator::Plus, Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOperator::Minus, Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOperator::Multiply, Value::Int(a), Value::Int(b)) => {
            a.checked_mul(*b).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOperator::Divide | BinaryOperator::Modulo, Value::Int(_), Value::Int(0)) => Ok(Value::Null),
        (BinaryOperator::Divide, Value::Int(a), Value::Int(b)) => Ok(Value::Float(*a as f64 / *b as f64)),
        (BinaryOperator::Modulo, Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int).ok_or_else(overflow),
        (_, a, b) => {
            let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                return Err(SqlError::Type(format!("cannot apply {op} to {a} and {b}")));
            };
            let out = match op {
                BinaryOperator::Plus => x + y,
                BinaryOperator::Minus => x - y,
                BinaryOperator::Multiply => x * y,
                BinaryOperator::Divide | BinaryOperator::Modulo if y == 0.0 => return Ok(Value::Null),
                BinaryOperator::Divide => x / y,
                BinaryOperator::Modulo => x % y,
                other => return Err(SqlError::Unsupported(format!("operator {other}"))),
            };
            finite_float(out)
        }
    }
}

fn finite_float(x: f64) -> Result<Value, SqlError> {
    if x.is_finite() {
        Ok(Value::Float(x))
    } else {
        Err(SqlError::Type(format!("float overflow ({x})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parse_query;
    use crate::table::TableError;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> Value {
        Value::Timestamp(parse_timestamp(s).unwrap())
    }

    fn tables() -> HashMap<String, Arc<Table>> {
        let trips = Table::from_columns(vec![
            ("trip_id", vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]),
            ("zone_id", vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(9)]),
            ("fare", vec![Value::Float(10.0), Value::Float(5.0), Value::Null, Value::Float(8.0)]),
            ("pickup", vec![
                ts("2023-01-01T10:15:00Z"),
                ts("2023-01-01T10:45:00Z"),
                ts("2023-01-01T11:05:00Z"),
                ts("2023-01-01T11:59:59Z"),
            ]),
        ])
        .unwrap();
        let zones = Table::from_columns(vec![
            ("id", vec![Value::Int(1), Value::Int(2)]),
            ("borough", vec![Value::from("Queens"), Value::from("Bronx")]),
        ])
        .unwrap();
        HashMap::from([
            ("trips".to_string(), Arc::new(trips)),
            ("zones".to_string(), Arc::new(zones)),
        ])
    }

    fn run(sql: &str) -> Result<Table, SqlError> {
        let tables = tables();
        execute(&parse_query(sql).unwrap(), &|name| tables.get(name).cloned())
    }

    fn column(table: &Table, name: &str) -> Vec<Value> {
        table.column_values(name).unwrap().cloned().collect()
    }

    #[test]
    fn test_select_where_order_limit() {
        let out = run("SELECT trip_id, fare * 2 AS double_fare FROM trips WHERE fare IS NOT NULL ORDER BY double_fare DESC LIMIT 2").unwrap();
        assert_eq!(out.schema().names(), vec!["trip_id", "double_fare"]);
        assert_eq!(column(&out, "trip_id"), vec![Value::Int(1), Value::Int(4)]);
        assert_eq!(column(&out, "double_fare"), vec![Value::Float(20.0), Value::Float(16.0)]);
    }

    #[test]
    fn test_wildcard_keeps_schema_on_empty_result() {
        let out = run("SELECT * FROM trips WHERE trip_id > 100").unwrap();
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.schema().column("pickup").unwrap().data_type, DataType::Timestamp);
        assert_eq!(out.schema().column("trip_id").unwrap().data_type, DataType::Int);
    }

    #[test]
    fn test_empty_results_keep_expression_types() {
        let grouped = "SELECT zone_id, SUM(trip_id) AS total, AVG(fare) AS mean, COUNT(*) AS n \
                       FROM trips WHERE trip_id > {min} GROUP BY zone_id";
        let empty = run(&grouped.replace("{min}", "100")).unwrap();
        assert_eq!(empty.num_rows(), 0);
        let types: Vec<DataType> = empty.schema().columns().iter().map(|c| c.data_type).collect();
        assert_eq!(types, vec![DataType::Int, DataType::Int, DataType::Float, DataType::Int]);

        // an empty run appends cleanly onto an earlier, non-empty one
        let full = run(&grouped.replace("{min}", "0")).unwrap();
        assert_eq!(full.append(&empty).unwrap().num_rows(), full.num_rows());

        let derived = run("SELECT fare * 2 AS f, trip_id + 1 AS t, trip_id > 1 AS b, 'x' AS s FROM trips WHERE trip_id > 100")
            .unwrap();
        let types: Vec<DataType> = derived.schema().columns().iter().map(|c| c.data_type).collect();
        assert_eq!(types, vec![DataType::Float, DataType::Int, DataType::Bool, DataType::Str]);
    }

    #[test]
    fn test_inner_join_with_aliases() {
        let out = run(
            "SELECT t.trip_id, z.borough FROM trips AS t JOIN zones AS z ON t.zone_id = z.id ORDER BY 1",
        )
        .unwrap();
        assert_eq!(column(&out, "trip_id"), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(
            column(&out, "borough"),
            vec![Value::from("Queens"), Value::from("Bronx"), Value::from("Queens")]
        );
    }

    #[test]
    fn test_group_by_date_trunc() {
        let out = run(
            "SELECT DATE_TRUNC('hour', pickup) AS bucket, COUNT(*) AS trips, SUM(fare) AS total \
             FROM trips GROUP BY bucket ORDER BY bucket",
        )
        .unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(column(&out, "trips"), vec![Value::Int(2), Value::Int(2)]);
        assert_eq!(column(&out, "total"), vec![Value::Float(15.0), Value::Float(8.0)]);
        assert_eq!(out.schema().column("bucket").unwrap().data_type, DataType::Timestamp);
    }

    #[test]
    fn test_global_aggregate_over_no_rows() {
        let out = run("SELECT COUNT(*) AS n, AVG(fare) AS mean FROM trips WHERE trip_id < 0").unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.value(0, "n"), Some(&Value::Int(0)));
        assert_eq!(out.value(0, "mean"), Some(&Value::Null));
    }

    #[test]
    fn test_having_and_in_list() {
        let out = run(
            "SELECT zone_id, COUNT(fare) AS priced FROM trips WHERE zone_id IN (1, 2) \
             GROUP BY zone_id HAVING COUNT(*) > 1",
        )
        .unwrap();
        assert_eq!(column(&out, "zone_id"), vec![Value::Int(1)]);
        assert_eq!(column(&out, "priced"), vec![Value::Int(1)]);
    }

    #[test]
    fn test_timestamp_comparison_with_string_literal() {
        let out = run("SELECT trip_id FROM trips WHERE pickup >= '2023-01-01T11:00:00Z'").unwrap();
        assert_eq!(column(&out, "trip_id"), vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn test_three_valued_logic() {
        let out = run("SELECT trip_id FROM trips WHERE fare > 6 OR trip_id = 3").unwrap();
        assert_eq!(column(&out, "trip_id"), vec![Value::Int(1), Value::Int(3), Value::Int(4)]);
        let out = run("SELECT trip_id FROM trips WHERE NOT (fare > 6)").unwrap();
        assert_eq!(column(&out, "trip_id"), vec![Value::Int(2)]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(run("SELECT nope FROM trips").unwrap_err(), SqlError::UnknownColumn("nope".to_string()));
        assert_eq!(run("SELECT * FROM missing").unwrap_err(), SqlError::UnknownTable("missing".to_string()));
        assert_eq!(
            run("SELECT id FROM trips JOIN zones ON trips.zone_id = zones.id JOIN zones z2 ON z2.id = zones.id")
                .unwrap_err(),
            SqlError::AmbiguousColumn("id".to_string())
        );
        assert!(matches!(run("SELECT DISTINCT zone_id FROM trips"), Err(SqlError::Unsupported(_))));
        assert!(matches!(run("SELECT trip_id FROM trips WHERE COUNT(*) > 1"), Err(SqlError::Unsupported(_))));
        assert!(matches!(run("SELECT SUM(pickup) FROM trips"), Err(SqlError::Type(_))));
    }

    fn run_on(sql: &str, n: Vec<Value>) -> Result<Table, SqlError> {
        let t = Arc::new(Table::from_columns(vec![("n", n)]).unwrap());
        execute(&parse_query(sql).unwrap(), &|name| (name == "t").then(|| t.clone()))
    }

    #[test]
    fn test_integer_overflow_is_a_query_error() {
        let sum = run_on("SELECT SUM(n) AS s FROM t", vec![Value::Int(i64::MAX), Value::Int(1)]);
        assert!(matches!(sum, Err(SqlError::Table(TableError::Overflow(_)))));

        let rem = run_on("SELECT n % -1 AS r FROM t", vec![Value::Int(i64::MIN)]);
        assert_eq!(rem.unwrap_err(), SqlError::Type("integer overflow".to_string()));
        let div = run_on("SELECT n / -1 AS r FROM t", vec![Value::Int(i64::MIN)]).unwrap();
        assert!(div.value(0, "r").and_then(Value::as_f64).is_some_and(f64::is_finite));

        let ok = run_on("SELECT n % 3 AS r FROM t", vec![Value::Int(-7)]).unwrap();
        assert_eq!(ok.value(0, "r"), Some(&Value::Int(-1)));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let product = run_on("SELECT n * n AS sq FROM t", vec![Value::Float(1e300)]);
        assert!(matches!(product, Err(SqlError::Type(_))));
        let sum = run_on("SELECT SUM(n) AS s FROM t", vec![Value::Float(f64::MAX), Value::Float(f64::MAX)]);
        assert!(matches!(sum, Err(SqlError::Table(TableError::Overflow(_)))));
    }

    #[test]
    fn test_select_without_from() {
        let out = run("SELECT 1 + 2 AS three").unwrap();
        assert_eq!(out.value(0, "three"), Some(&Value::Int(3)));
    }
}
