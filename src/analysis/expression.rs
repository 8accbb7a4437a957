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
//! Resolved (or partially resolved) expressions as produced by the analyzer.
//!
//! Every node keeps the source text it was parsed from so that diagnostics can
//! quote the user's query verbatim.

use super::data_type::DataType;
use crate::exec::expr::{ArithmeticOp, ComparisonOp, LogicOp};

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal {
        source: String,
        data_type: DataType,
    },
    /// A column read from the source relation.
    Field { name: String, data_type: DataType },
    /// A column computed by an earlier plan node.
    Reference { name: String, data_type: DataType },
    UnresolvedAttribute {
        name: String,
        /// Overrides the default "Unknown column" message.
        message: Option<String>,
    },
    Alias {
        name: String,
        child: Box<Expression>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
        source: String,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
        data_type: DataType,
        source: String,
    },
    Logic {
        op: LogicOp,
        left: Box<Expression>,
        right: Box<Expression>,
        source: String,
    },
    Not {
        child: Box<Expression>,
        source: String,
    },
    /// A scalar function.
    Function {
        name: String,
        args: Vec<Expression>,
        data_type: DataType,
        source: String,
    },
    /// An aggregate function such as `max(x)` or `count(*)`.
    Aggregate {
        name: String,
        args: Vec<Expression>,
        data_type: DataType,
        source: String,
    },
    UnresolvedFunction {
        name: String,
        args: Vec<Expression>,
        source: String,
    },
}

fn call_source(name: &str, args: &[Expression]) -> String {
    let args = args.iter().map(Expression::source).collect::<Vec<_>>();
    format!("{}({})", name, args.join(", "))
}

impl Expression {
    pub fn literal(source: impl Into<String>, data_type: DataType) -> Self {
        Expression::Literal {
            source: source.into(),
            data_type,
        }
    }

    pub fn field(name: impl Into<String>, data_type: DataType) -> Self {
        Expression::Field {
            name: name.into(),
            data_type,
        }
    }

    pub fn reference(name: impl Into<String>, data_type: DataType) -> Self {
        Expression::Reference {
            name: name.into(),
            data_type,
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Expression::UnresolvedAttribute {
            name: name.into(),
            message: None,
        }
    }

    pub fn alias(name: impl Into<String>, child: Expression) -> Self {
        Expression::Alias {
            name: name.into(),
            child: Box::new(child),
        }
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        let source = format!("{} {} {}", left.source(), op.symbol(), right.source());
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
            source,
        }
    }

    pub fn arithmetic(
        op: ArithmeticOp,
        left: Expression,
        right: Expression,
        data_type: DataType,
    ) -> Self {
        let source = format!("{} {} {}", left.source(), op.symbol(), right.source());
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            data_type,
            source,
        }
    }

    pub fn logic(op: LogicOp, left: Expression, right: Expression) -> Self {
        let keyword = match op {
            LogicOp::And => "and",
            LogicOp::Or => "or",
        };
        let source = format!("{} {} {}", left.source(), keyword, right.source());
        Expression::Logic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            source,
        }
    }

    pub fn not(child: Expression) -> Self {
        let source = format!("not {}", child.source());
        Expression::Not {
            child: Box::new(child),
            source,
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>, data_type: DataType) -> Self {
        let name = name.into();
        let source = call_source(&name, &args);
        Expression::Function {
            name,
            args,
            data_type,
            source,
        }
    }

    pub fn aggregate(name: impl Into<String>, args: Vec<Expression>, data_type: DataType) -> Self {
        let name = name.into();
        let source = call_source(&name, &args);
        Expression::Aggregate {
            name,
            args,
            data_type,
            source,
        }
    }

    pub fn unresolved_function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        let name = name.into();
        let source = call_source(&name, &args);
        Expression::UnresolvedFunction { name, args, source }
    }

    pub fn source(&self) -> String {
        match self {
            Expression::Literal { source, .. }
            | Expression::Comparison { source, .. }
            | Expression::Arithmetic { source, .. }
            | Expression::Logic { source, .. }
            | Expression::Not { source, .. }
            | Expression::Function { source, .. }
            | Expression::Aggregate { source, .. }
            | Expression::UnresolvedFunction { source, .. } => source.clone(),
            Expression::Field { name, .. }
            | Expression::Reference { name, .. }
            | Expression::UnresolvedAttribute { name, .. } => name.clone(),
            Expression::Alias { child, .. } => child.source(),
        }
    }

    /// `None` while unresolved.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Expression::Literal { data_type, .. }
            | Expression::Field { data_type, .. }
            | Expression::Reference { data_type, .. }
            | Expression::Arithmetic { data_type, .. }
            | Expression::Function { data_type, .. }
            | Expression::Aggregate { data_type, .. } => Some(*data_type),
            Expression::Comparison { .. } | Expression::Logic { .. } | Expression::Not { .. } => {
                Some(DataType::Boolean)
            }
            Expression::Alias { child, .. } => child.data_type(),
            Expression::UnresolvedAttribute { .. } | Expression::UnresolvedFunction { .. } => None,
        }
    }

    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal { .. }
            | Expression::Field { .. }
            | Expression::Reference { .. }
            | Expression::UnresolvedAttribute { .. } => Vec::new(),
            Expression::Alias { child, .. } | Expression::Not { child, .. } => vec![child.as_ref()],
            Expression::Comparison { left, right, .. }
            | Expression::Arithmetic { left, right, .. }
            | Expression::Logic { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Function { args, .. }
            | Expression::Aggregate { args, .. }
            | Expression::UnresolvedFunction { args, .. } => args.iter().collect(),
        }
    }

    /// Nodes that cannot be resolved on their own, as opposed to nodes that are
    /// unresolved only because a child is.
    pub fn is_unresolvable(&self) -> bool {
        matches!(
            self,
            Expression::UnresolvedAttribute { .. } | Expression::UnresolvedFunction { .. }
        )
    }

    pub fn resolved(&self) -> bool {
        !self.is_unresolvable() && self.children().iter().all(|c| c.resolved())
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expression::Aggregate { .. })
    }

    pub fn contains_aggregate(&self) -> bool {
        self.is_aggregate() || self.children().iter().any(|c| c.contains_aggregate())
    }

    /// Pre-order traversal.
    pub fn for_each_down<'a>(&'a self, visit: &mut impl FnMut(&'a Expression)) {
        visit(self);
        for child in self.children() {
            child.for_each_down(visit);
        }
    }

    /// The expression under any aliases.
    pub fn unaliased(&self) -> &Expression {
        match self {
            Expression::Alias { child, .. } => child.unaliased(),
            other => other,
        }
    }

    /// Name this expression is referenced by downstream, if any.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Expression::Alias { name, .. }
            | Expression::Field { name, .. }
            | Expression::Reference { name, .. } => Some(name),
            _ => None,
        }
    }
}
