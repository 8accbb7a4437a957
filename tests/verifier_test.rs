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
//! Plan verification as seen by a caller holding an analyzed plan.

mod common;

use novacompute::analysis::{DataType, Expression, LogicalPlan, Verifier};
use novacompute::exec::expr::ComparisonOp;

fn metrics() -> LogicalPlan {
    LogicalPlan::relation(
        "metrics",
        vec![
            Expression::field("x", DataType::UnsignedLong),
            Expression::field("host", DataType::Keyword),
        ],
    )
}

fn x_gt_one() -> Expression {
    Expression::comparison(
        ComparisonOp::Gt,
        Expression::field("x", DataType::UnsignedLong),
        Expression::literal("1", DataType::Long),
    )
}

#[test]
fn unsigned_long_mixing_is_reported_verbatim() {
    let err = Verifier::verify(&metrics().filter(x_gt_one())).expect_err("invalid plan");
    assert_eq!(
        err.to_string(),
        "Found 1 problem\nfirst argument of [x > 1] is [unsigned_long] and second is [long]. \
         [unsigned_long] can only be operated on together with another [unsigned_long]"
    );
}

#[test]
fn unknown_names_hide_type_errors() {
    let plan = LogicalPlan::UnresolvedRelation {
        index: "nope".to_string(),
    }
    .filter(x_gt_one())
    .eval(vec![Expression::alias(
        "y",
        Expression::unresolved_function("frobnicate", vec![Expression::unresolved("z")]),
    )]);
    let err = Verifier::verify(&plan).expect_err("unresolved plan");
    let messages = err
        .failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        messages,
        vec!["Unknown index [nope]", "Unknown function [frobnicate]", "Unknown column [z]"]
    );
}

#[test]
fn every_structural_failure_is_collected() {
    let plan = metrics()
        .filter(x_gt_one())
        .filter(x_gt_one())
        .aggregate(
            vec![Expression::field("host", DataType::Keyword)],
            vec![
                Expression::field("x", DataType::UnsignedLong),
                Expression::alias("c", Expression::aggregate("count", vec![], DataType::Long)),
            ],
        );
    let err = Verifier::verify(&plan).expect_err("invalid plan");
    assert_eq!(err.failures.len(), 2, "{err}");
    assert!(err.to_string().starts_with("Found 2 problems\n"));
    assert_eq!(err.failures[1].node, "x");
}

#[test]
fn valid_plan_passes() {
    let plan = metrics()
        .filter(Expression::comparison(
            ComparisonOp::Eq,
            Expression::field("host", DataType::Keyword),
            Expression::literal("\"a\"", DataType::Text),
        ))
        .aggregate(
            vec![Expression::field("host", DataType::Keyword)],
            vec![
                Expression::alias(
                    "m",
                    Expression::aggregate(
                        "max",
                        vec![Expression::field("x", DataType::UnsignedLong)],
                        DataType::UnsignedLong,
                    ),
                ),
                Expression::field("host", DataType::Keyword),
            ],
        )
        .limit(Expression::literal("10", DataType::Integer));
    assert!(Verifier::verify(&plan).is_ok());
}
