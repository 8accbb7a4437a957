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
//! Logical plan tree handed to the verifier.

use super::expression::Expression;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegexExtractKind {
    Grok,
    Dissect,
}

impl RegexExtractKind {
    pub fn command(&self) -> &'static str {
        match self {
            RegexExtractKind::Grok => "GROK",
            RegexExtractKind::Dissect => "DISSECT",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogicalPlan {
    Relation {
        index: String,
        output: Vec<Expression>,
    },
    UnresolvedRelation {
        index: String,
    },
    Row {
        fields: Vec<Expression>,
    },
    Eval {
        child: Box<LogicalPlan>,
        fields: Vec<Expression>,
    },
    Filter {
        child: Box<LogicalPlan>,
        condition: Expression,
    },
    Aggregate {
        child: Box<LogicalPlan>,
        groupings: Vec<Expression>,
        aggregates: Vec<Expression>,
    },
    RegexExtract {
        child: Box<LogicalPlan>,
        kind: RegexExtractKind,
        input: Expression,
        extracted: Vec<Expression>,
    },
    Project {
        child: Box<LogicalPlan>,
        projections: Vec<Expression>,
    },
    Limit {
        child: Box<LogicalPlan>,
        limit: Expression,
    },
}

impl LogicalPlan {
    pub fn relation(index: impl Into<String>, output: Vec<Expression>) -> Self {
        LogicalPlan::Relation {
            index: index.into(),
            output,
        }
    }

    pub fn eval(self, fields: Vec<Expression>) -> Self {
        LogicalPlan::Eval {
            child: Box::new(self),
            fields,
        }
    }

    pub fn filter(self, condition: Expression) -> Self {
        LogicalPlan::Filter {
            child: Box::new(self),
            condition,
        }
    }

    pub fn aggregate(self, groupings: Vec<Expression>, aggregates: Vec<Expression>) -> Self {
        LogicalPlan::Aggregate {
            child: Box::new(self),
            groupings,
            aggregates,
        }
    }

    pub fn regex_extract(
        self,
        kind: RegexExtractKind,
        input: Expression,
        extracted: Vec<Expression>,
    ) -> Self {
        LogicalPlan::RegexExtract {
            child: Box::new(self),
            kind,
            input,
            extracted,
        }
    }

    pub fn project(self, projections: Vec<Expression>) -> Self {
        LogicalPlan::Project {
            child: Box::new(self),
            projections,
        }
    }

    pub fn limit(self, limit: Expression) -> Self {
        LogicalPlan::Limit {
            child: Box::new(self),
            limit,
        }
    }

    /// Command name used in diagnostics.
    pub fn node_name(&self) -> &'static str {
        match self {
            LogicalPlan::Relation { .. } | LogicalPlan::UnresolvedRelation { .. } => "FROM",
            LogicalPlan::Row { .. } => "ROW",
            LogicalPlan::Eval { .. } => "EVAL",
            LogicalPlan::Filter { .. } => "WHERE",
            LogicalPlan::Aggregate { .. } => "STATS",
            LogicalPlan::RegexExtract { kind, .. } => kind.command(),
            LogicalPlan::Project { .. } => "KEEP",
            LogicalPlan::Limit { .. } => "LIMIT",
        }
    }

    pub fn child(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::Relation { .. }
            | LogicalPlan::UnresolvedRelation { .. }
            | LogicalPlan::Row { .. } => None,
            LogicalPlan::Eval { child, .. }
            | LogicalPlan::Filter { child, .. }
            | LogicalPlan::Aggregate { child, .. }
            | LogicalPlan::RegexExtract { child, .. }
            | LogicalPlan::Project { child, .. }
            | LogicalPlan::Limit { child, .. } => Some(child.as_ref()),
        }
    }

    /// Expressions owned by this node, not its child.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            LogicalPlan::Relation { output, .. } => output.iter().collect(),
            LogicalPlan::UnresolvedRelation { .. } => Vec::new(),
            LogicalPlan::Row { fields } | LogicalPlan::Eval { fields, .. } => {
                fields.iter().collect()
            }
            LogicalPlan::Filter { condition, .. } => vec![condition],
            LogicalPlan::Aggregate {
                groupings,
                aggregates,
                ..
            } => groupings.iter().chain(aggregates).collect(),
            LogicalPlan::RegexExtract {
                input, extracted, ..
            } => std::iter::once(input).chain(extracted).collect(),
            LogicalPlan::Project { projections, .. } => projections.iter().collect(),
            LogicalPlan::Limit { limit, .. } => vec![limit],
        }
    }

    /// Post-order traversal: children before parents.
    pub fn for_each_up<'a>(&'a self, visit: &mut impl FnMut(&'a LogicalPlan)) {
        if let Some(child) = self.child() {
            child.for_each_up(visit);
        }
        visit(self);
    }

    pub fn resolved(&self) -> bool {
        !matches!(self, LogicalPlan::UnresolvedRelation { .. })
            && self.expressions().iter().all(|e| e.resolved())
            && self.child().is_none_or(LogicalPlan::resolved)
    }
}
