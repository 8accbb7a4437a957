// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Semantic checks on a resolved logical plan, run before any execution.
//!
//! Unresolved plans are reported first and alone: once a column or function is
//! unknown, type checks on the expressions above it only add noise. A resolved plan
//! goes through every structural rule and all failures are reported together.

use std::fmt;

use thiserror::Error;

use super::data_type::DataType;
use super::expression::Expression;
use super::plan::LogicalPlan;
use crate::exec::expr::ComparisonOp;
use crate::novacompute_logging::debug;

const ORDERED_TYPES: &str =
    "date_nanos, datetime, double, integer, ip, keyword, long, text, unsigned_long or version";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// Source text of the offending node.
    pub node: String,
    pub message: String,
}

impl Failure {
    fn new(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", render(.failures))]
pub struct VerificationError {
    pub failures: Vec<Failure>,
}

fn render(failures: &[Failure]) -> String {
    let plural = if failures.len() == 1 { "" } else { "s" };
    let mut out = format!("Found {} problem{plural}", failures.len());
    for failure in failures {
        out.push('\n');
        out.push_str(&failure.message);
    }
    out
}

#[derive(Default)]
struct Failures {
    items: Vec<Failure>,
}

impl Failures {
    fn add(&mut self, failure: Failure) {
        if !self.items.contains(&failure) {
            self.items.push(failure);
        }
    }

    fn into_result(self) -> Result<(), VerificationError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(VerificationError {
                failures: self.items,
            })
        }
    }
}

pub struct Verifier;

impl Verifier {
    pub fn verify(plan: &LogicalPlan) -> Result<(), VerificationError> {
        let mut failures = Failures::default();
        if !plan.resolved() {
            collect_unresolved(plan, &mut failures);
            debug!(
                target: "novacompute::analysis",
                failures = failures.items.len(),
                "plan unresolved, skipping structural checks"
            );
            return failures.into_result();
        }
        plan.for_each_up(&mut |node| {
            check_node(node, &mut failures);
            for expression in node.expressions() {
                expression.for_each_down(&mut |e| check_operator_types(e, &mut failures));
            }
        });
        failures.into_result()
    }
}

fn collect_unresolved(plan: &LogicalPlan, failures: &mut Failures) {
    plan.for_each_up(&mut |node| {
        if let LogicalPlan::UnresolvedRelation { index } = node {
            failures.add(Failure::new(index.as_str(), format!("Unknown index [{index}]")));
        }
        for expression in node.expressions() {
            expression.for_each_down(&mut |e| match e {
                Expression::UnresolvedAttribute { name, message } => {
                    let message = message
                        .clone()
                        .unwrap_or_else(|| format!("Unknown column [{name}]"));
                    failures.add(Failure::new(name.as_str(), message));
                }
                Expression::UnresolvedFunction { name, source, .. } => {
                    failures.add(Failure::new(source.as_str(), format!("Unknown function [{name}]")));
                }
                _ => {}
            });
        }
    });
}

fn check_node(node: &LogicalPlan, failures: &mut Failures) {
    match node {
        LogicalPlan::Row { fields } => check_representable("ROW", fields, failures),
        LogicalPlan::Eval { fields, .. } => {
            check_representable("EVAL", fields, failures);
            for field in fields {
                check_no_aggregate(field, failures);
            }
        }
        LogicalPlan::Filter { condition, .. } => check_no_aggregate(condition, failures),
        LogicalPlan::Aggregate {
            groupings,
            aggregates,
            ..
        } => check_aggregate(groupings, aggregates, failures),
        LogicalPlan::RegexExtract { kind, input, .. } => {
            if let Some(data_type) = input.data_type() {
                if !data_type.is_string() {
                    failures.add(Failure::new(
                        input.source(),
                        format!(
                            "{} only supports KEYWORD or TEXT values, found expression [{}] type [{}]",
                            kind.command(),
                            input.source(),
                            data_type
                        ),
                    ));
                }
            }
        }
        LogicalPlan::Relation { .. }
        | LogicalPlan::UnresolvedRelation { .. }
        | LogicalPlan::Project { .. }
        | LogicalPlan::Limit { .. } => {}
    }
}

fn check_representable(command: &str, fields: &[Expression], failures: &mut Failures) {
    for field in fields {
        let Some(data_type) = field.data_type() else {
            continue;
        };
        if !data_type.is_representable() {
            failures.add(Failure::new(
                field.source(),
                format!(
                    "{command} does not support type [{data_type}] in expression [{}]",
                    field.source()
                ),
            ));
        }
    }
}

fn check_no_aggregate(expression: &Expression, failures: &mut Failures) {
    expression.for_each_down(&mut |e| {
        if e.is_aggregate() {
            failures.add(Failure::new(
                e.source(),
                format!("aggregate function [{}] not allowed outside STATS command", e.source()),
            ));
        }
    });
}

fn matches_grouping(expression: &Expression, groupings: &[Expression]) -> bool {
    let expression = expression.unaliased();
    groupings.iter().any(|g| {
        g.unaliased() == expression
            || matches!(
                (expression, g.output_name()),
                (Expression::Field { name, .. } | Expression::Reference { name, .. }, Some(key))
                    if name == key
            )
    })
}

fn check_aggregate(groupings: &[Expression], aggregates: &[Expression], failures: &mut Failures) {
    for grouping in groupings {
        grouping.for_each_down(&mut |e| {
            if e.is_aggregate() {
                failures.add(Failure::new(
                    e.source(),
                    format!("cannot use an aggregate [{}] for grouping", e.source()),
                ));
            }
        });
    }
    for aggregate in aggregates {
        if matches_grouping(aggregate, groupings) {
            continue;
        }
        check_aggregate_output(aggregate.unaliased(), groupings, failures);
    }
}

fn check_aggregate_output(e: &Expression, groupings: &[Expression], failures: &mut Failures) {
    if matches_grouping(e, groupings) {
        return;
    }
    match e {
        Expression::Aggregate { args, .. } => {
            for arg in args {
                arg.for_each_down(&mut |inner| {
                    if inner.is_aggregate() {
                        failures.add(Failure::new(
                            inner.source(),
                            format!(
                                "nested aggregations [{}] not allowed inside other aggregations [{}]",
                                inner.source(),
                                e.source()
                            ),
                        ));
                    }
                });
            }
        }
        Expression::Literal { .. } => {}
        Expression::Field { name, .. } | Expression::Reference { name, .. } => {
            failures.add(Failure::new(
                name.as_str(),
                format!(
                    "column [{name}] must appear in the STATS BY clause or be used in an aggregate function"
                ),
            ));
        }
        other => {
            for child in other.children() {
                check_aggregate_output(child.unaliased(), groupings, failures);
            }
        }
    }
}

fn check_operator_types(e: &Expression, failures: &mut Failures) {
    let (left, right, source, comparison) = match e {
        Expression::Comparison {
            op,
            left,
            right,
            source,
        } => (left, right, source, Some(*op)),
        Expression::Arithmetic {
            left,
            right,
            source,
            ..
        } => (left, right, source, None),
        _ => return,
    };
    let (Some(lt), Some(rt)) = (left.data_type(), right.data_type()) else {
        return;
    };
    if lt == DataType::Null || rt == DataType::Null {
        return;
    }
    if (lt == DataType::UnsignedLong) != (rt == DataType::UnsignedLong) {
        failures.add(Failure::new(
            source.as_str(),
            format!(
                "first argument of [{source}] is [{lt}] and second is [{rt}]. [unsigned_long] can only be operated on together with another [unsigned_long]"
            ),
        ));
        return;
    }
    if let Some(op) = comparison {
        if let Some(message) = comparison_mismatch(op, left, lt, rt, source) {
            failures.add(Failure::new(source.as_str(), message));
        }
    }
}

fn comparison_mismatch(
    op: ComparisonOp,
    left: &Expression,
    lt: DataType,
    rt: DataType,
    source: &str,
) -> Option<String> {
    let equality = matches!(op, ComparisonOp::Eq | ComparisonOp::Ne);
    if lt.is_numeric() {
        return (!rt.is_numeric()).then(|| {
            format!(
                "first argument of [{source}] is [numeric] so second argument must also be [numeric] but was [{rt}]"
            )
        });
    }
    if lt == DataType::Boolean && equality {
        return (rt != DataType::Boolean).then(|| {
            format!(
                "first argument of [{source}] is [boolean] so second argument must also be [boolean] but was [{rt}]"
            )
        });
    }
    if lt.is_ordered_non_numeric() {
        return (!lt.is_compatible_with(rt)).then(|| {
            format!(
                "first argument of [{source}] is [{lt}] so second argument must also be [{lt}] but was [{rt}]"
            )
        });
    }
    Some(format!(
        "first argument of [{source}] must be [{ORDERED_TYPES}], found value [{}] type [{lt}]",
        left.source()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::expr::ArithmeticOp;

    fn from() -> LogicalPlan {
        LogicalPlan::relation(
            "metrics",
            vec![
                Expression::field("x", DataType::UnsignedLong),
                Expression::field("host", DataType::Keyword),
                Expression::field("n", DataType::Long),
            ],
        )
    }

    fn messages(plan: &LogicalPlan) -> Vec<String> {
        match Verifier::verify(plan) {
            Ok(()) => Vec::new(),
            Err(e) => e.failures.into_iter().map(|f| f.message).collect(),
        }
    }

    #[test]
    fn unsigned_long_against_long() {
        let plan = from().filter(Expression::comparison(
            ComparisonOp::Gt,
            Expression::field("x", DataType::UnsignedLong),
            Expression::literal("1", DataType::Long),
        ));
        assert_eq!(
            messages(&plan),
            vec![
                "first argument of [x > 1] is [unsigned_long] and second is [long]. [unsigned_long] can only be operated on together with another [unsigned_long]"
            ]
        );
    }

    #[test]
    fn unresolved_short_circuits_structural_checks() {
        let plan = from()
            .eval(vec![Expression::alias(
                "y",
                Expression::arithmetic(
                    ArithmeticOp::Add,
                    Expression::unresolved("missing"),
                    Expression::field("x", DataType::UnsignedLong),
                    DataType::UnsignedLong,
                ),
            )])
            .filter(Expression::comparison(
                ComparisonOp::Gt,
                Expression::field("x", DataType::UnsignedLong),
                Expression::literal("1", DataType::Long),
            ));
        let err = Verifier::verify(&plan).expect_err("unresolved");
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].node, "missing");
        assert_eq!(err.failures[0].message, "Unknown column [missing]");
    }

    #[test]
    fn stats_rules() {
        let count = Expression::aggregate("count", vec![], DataType::Long);
        let plan = from().aggregate(
            vec![
                Expression::field("host", DataType::Keyword),
                Expression::aggregate("max", vec![Expression::field("n", DataType::Long)], DataType::Long),
            ],
            vec![
                Expression::alias(
                    "m",
                    Expression::aggregate("max", vec![count.clone()], DataType::Long),
                ),
                Expression::field("n", DataType::Long),
                Expression::field("host", DataType::Keyword),
                Expression::alias(
                    "c",
                    Expression::arithmetic(
                        ArithmeticOp::Add,
                        count,
                        Expression::literal("1", DataType::Integer),
                        DataType::Long,
                    ),
                ),
            ],
        );
        assert_eq!(
            messages(&plan),
            vec![
                "cannot use an aggregate [max(n)] for grouping",
                "nested aggregations [count()] not allowed inside other aggregations [max(count())]",
                "column [n] must appear in the STATS BY clause or be used in an aggregate function",
            ]
        );
    }

    #[test]
    fn eval_rules() {
        let plan = from().eval(vec![
            Expression::alias("p", Expression::literal("1 day", DataType::DatePeriod)),
            Expression::alias(
                "a",
                Expression::aggregate("avg", vec![Expression::field("n", DataType::Long)], DataType::Double),
            ),
        ]);
        assert_eq!(
            messages(&plan),
            vec![
                "EVAL does not support type [date_period] in expression [1 day]",
                "aggregate function [avg(n)] not allowed outside STATS command",
            ]
        );
    }

    #[test]
    fn grok_needs_text_input() {
        let plan = from().regex_extract(
            crate::analysis::RegexExtractKind::Grok,
            Expression::field("n", DataType::Long),
            vec![],
        );
        assert_eq!(
            messages(&plan),
            vec!["GROK only supports KEYWORD or TEXT values, found expression [n] type [long]"]
        );
    }

    #[test]
    fn comparison_families() {
        let keyword_vs_int = Expression::comparison(
            ComparisonOp::Eq,
            Expression::field("host", DataType::Keyword),
            Expression::literal("1", DataType::Integer),
        );
        let text_vs_keyword = Expression::comparison(
            ComparisonOp::Lt,
            Expression::field("msg", DataType::Text),
            Expression::field("host", DataType::Keyword),
        );
        let bools = Expression::comparison(
            ComparisonOp::Ne,
            Expression::literal("true", DataType::Boolean),
            Expression::literal("false", DataType::Boolean),
        );
        let ordered_bools = Expression::comparison(
            ComparisonOp::Gt,
            Expression::literal("true", DataType::Boolean),
            Expression::literal("false", DataType::Boolean),
        );
        let plan = from()
            .filter(keyword_vs_int)
            .filter(text_vs_keyword)
            .filter(bools)
            .filter(ordered_bools);
        assert_eq!(
            messages(&plan),
            vec![
                "first argument of [host == 1] is [keyword] so second argument must also be [keyword] but was [integer]",
                format!(
                    "first argument of [true > false] must be [{ORDERED_TYPES}], found value [true] type [boolean]"
                )
                .as_str(),
            ]
        );
    }
}
