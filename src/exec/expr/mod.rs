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
//! Expression trees and their lowering to specialized evaluators.
//!
//! An [`ExprArena`] holds typed expression nodes. [`ExprArena::factory`] lowers a
//! node into an [`EvaluatorFactory`] graph, picking one monomorphic kernel per
//! operator and operand type and inserting widening casts where operand types
//! differ. Factories are shareable across drivers; each driver asks for its own
//! [`Evaluator`] bound to its [`DriverContext`].

mod arithmetic;
mod cast;
mod comparison;
pub mod function;
mod kernel;

use std::fmt;
use std::sync::Arc;

use arrow::array::{BinaryArray, BooleanArray, Float64Array, Int32Array, Int64Array};

use self::cast::{cast_factory, widest_numeric};
use self::comparison::{LogicEvaluatorFactory, NotKernel, NullTestEvaluatorFactory};
use self::kernel::UnaryEvaluatorFactory;
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::{Block, ElementType, vector_block};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

pub use self::function::{FunctionDescriptor, bucket_start, resolve_function};

/// Produces per-driver evaluators. Lowered once per plan, shared by every driver.
pub trait EvaluatorFactory: Send + Sync + fmt::Debug {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>>;
}

/// Evaluates one expression against a page, returning a block with the page's
/// position count. Per-row problems become nulls plus warnings, never errors.
pub trait Evaluator: Send {
    fn eval(&mut self, page: &Page) -> ExecResult<Block>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExprId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Bytes(Vec<u8>),
}

impl LiteralValue {
    pub fn element_type(&self) -> ElementType {
        match self {
            LiteralValue::Null => ElementType::Null,
            LiteralValue::Boolean(_) => ElementType::Boolean,
            LiteralValue::Int(_) => ElementType::Int,
            LiteralValue::Long(_) => ElementType::Long,
            LiteralValue::Double(_) => ElementType::Double,
            LiteralValue::Bytes(_) => ElementType::BytesRef,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => f.write_str("null"),
            LiteralValue::Boolean(v) => write!(f, "{v}"),
            LiteralValue::Int(v) => write!(f, "{v}"),
            LiteralValue::Long(v) => write!(f, "{v}"),
            LiteralValue::Double(v) => write!(f, "{v}"),
            LiteralValue::Bytes(v) => write!(f, "\"{}\"", String::from_utf8_lossy(v)),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Clone, Debug)]
pub enum ExprNode {
    Literal(LiteralValue),
    /// Input channel of the page being evaluated.
    Column { channel: usize, name: String },
    Arithmetic {
        op: ArithmeticOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Comparison {
        op: ComparisonOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Logic {
        op: LogicOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Not(ExprId),
    IsNull(ExprId),
    IsNotNull(ExprId),
    /// Converts the child to this node's element type.
    Cast(ExprId),
    FunctionCall { name: String, args: Vec<ExprId> },
}

#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
    types: Vec<ElementType>,
}

impl ExprArena {
    pub fn push_typed(&mut self, node: ExprNode, element_type: ElementType) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(node);
        self.types.push(element_type);
        id
    }

    pub fn node(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.0)
    }

    pub fn element_type(&self, id: ExprId) -> ExecResult<ElementType> {
        self.types
            .get(id.0)
            .copied()
            .ok_or_else(|| ExecError::Internal(format!("invalid ExprId {}", id.0)))
    }

    pub fn literal(&mut self, value: LiteralValue) -> ExprId {
        let element_type = value.element_type();
        self.push_typed(ExprNode::Literal(value), element_type)
    }

    pub fn column(
        &mut self,
        channel: usize,
        name: impl Into<String>,
        element_type: ElementType,
    ) -> ExprId {
        self.push_typed(
            ExprNode::Column {
                channel,
                name: name.into(),
            },
            element_type,
        )
    }

    pub fn arithmetic(&mut self, op: ArithmeticOp, lhs: ExprId, rhs: ExprId) -> ExecResult<ExprId> {
        let (lt, rt) = (self.element_type(lhs)?, self.element_type(rhs)?);
        let result = common_type(lt, rt)
            .filter(|t| t.is_numeric() || *t == ElementType::Null)
            .ok_or_else(|| {
                ExecError::invalid_input(format!(
                    "[{}] cannot be applied to {} and {}",
                    op.symbol(),
                    lt,
                    rt
                ))
            })?;
        Ok(self.push_typed(ExprNode::Arithmetic { op, lhs, rhs }, result))
    }

    pub fn comparison(&mut self, op: ComparisonOp, lhs: ExprId, rhs: ExprId) -> ExecResult<ExprId> {
        let (lt, rt) = (self.element_type(lhs)?, self.element_type(rhs)?);
        if common_type(lt, rt).is_none() {
            return Err(ExecError::invalid_input(format!(
                "[{}] cannot compare {} with {}",
                op.symbol(),
                lt,
                rt
            )));
        }
        Ok(self.push_typed(ExprNode::Comparison { op, lhs, rhs }, ElementType::Boolean))
    }

    pub fn logic(&mut self, op: LogicOp, lhs: ExprId, rhs: ExprId) -> ExecResult<ExprId> {
        for id in [lhs, rhs] {
            let t = self.element_type(id)?;
            if !matches!(t, ElementType::Boolean | ElementType::Null) {
                return Err(ExecError::invalid_input(format!(
                    "boolean operator expects BOOLEAN operands, got {t}"
                )));
            }
        }
        Ok(self.push_typed(ExprNode::Logic { op, lhs, rhs }, ElementType::Boolean))
    }

    pub fn not(&mut self, child: ExprId) -> ExecResult<ExprId> {
        let t = self.element_type(child)?;
        if !matches!(t, ElementType::Boolean | ElementType::Null) {
            return Err(ExecError::invalid_input(format!(
                "NOT expects a BOOLEAN operand, got {t}"
            )));
        }
        Ok(self.push_typed(ExprNode::Not(child), ElementType::Boolean))
    }

    pub fn is_null(&mut self, child: ExprId) -> ExprId {
        self.push_typed(ExprNode::IsNull(child), ElementType::Boolean)
    }

    pub fn is_not_null(&mut self, child: ExprId) -> ExprId {
        self.push_typed(ExprNode::IsNotNull(child), ElementType::Boolean)
    }

    pub fn cast(&mut self, child: ExprId, to: ElementType) -> ExprId {
        self.push_typed(ExprNode::Cast(child), to)
    }

    pub fn function(&mut self, name: &str, args: Vec<ExprId>) -> ExecResult<ExprId> {
        let arg_types = args
            .iter()
            .map(|a| self.element_type(*a))
            .collect::<ExecResult<Vec<_>>>()?;
        let descriptor = resolve_function(name, &arg_types).ok_or_else(|| {
            ExecError::invalid_input(format!(
                "no function {name}({})",
                arg_types
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
        Ok(self.push_typed(
            ExprNode::FunctionCall {
                name: descriptor.name.to_string(),
                args,
            },
            descriptor.return_type,
        ))
    }

    /// `bucket(timestamp, interval)` with a constant interval in milliseconds.
    pub fn bucket(&mut self, timestamp: ExprId, interval_millis: i64) -> ExecResult<ExprId> {
        let interval = self.literal(LiteralValue::Long(interval_millis));
        self.function("bucket", vec![timestamp, interval])
    }

    /// Source text used to attribute warnings.
    pub fn source(&self, id: ExprId) -> String {
        let Some(node) = self.node(id) else {
            return format!("<invalid expr {}>", id.0);
        };
        match node {
            ExprNode::Literal(v) => v.to_string(),
            ExprNode::Column { name, .. } => name.clone(),
            ExprNode::Arithmetic { op, lhs, rhs } => {
                format!("{} {} {}", self.source(*lhs), op.symbol(), self.source(*rhs))
            }
            ExprNode::Comparison { op, lhs, rhs } => {
                format!("{} {} {}", self.source(*lhs), op.symbol(), self.source(*rhs))
            }
            ExprNode::Logic { op, lhs, rhs } => {
                let word = match op {
                    LogicOp::And => "AND",
                    LogicOp::Or => "OR",
                };
                format!("{} {} {}", self.source(*lhs), word, self.source(*rhs))
            }
            ExprNode::Not(c) => format!("NOT {}", self.source(*c)),
            ExprNode::IsNull(c) => format!("{} IS NULL", self.source(*c)),
            ExprNode::IsNotNull(c) => format!("{} IS NOT NULL", self.source(*c)),
            ExprNode::Cast(c) => format!(
                "{}::{}",
                self.source(*c),
                self.types.get(id.0).copied().unwrap_or(ElementType::Null)
            ),
            ExprNode::FunctionCall { name, args } => format!(
                "{}({})",
                name,
                args.iter()
                    .map(|a| self.source(*a))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Lower `id` into an evaluator factory graph.
    pub fn factory(&self, id: ExprId) -> ExecResult<Arc<dyn EvaluatorFactory>> {
        let node = self
            .node(id)
            .ok_or_else(|| ExecError::Internal(format!("invalid ExprId {}", id.0)))?;
        let element_type = self.element_type(id)?;
        let source = self.source(id);
        match node {
            ExprNode::Literal(value) => Ok(Arc::new(LiteralEvaluatorFactory {
                value: value.clone(),
            })),
            ExprNode::Column { channel, .. } => Ok(Arc::new(ColumnEvaluatorFactory {
                channel: *channel,
                element_type,
            })),
            ExprNode::Arithmetic { op, lhs, rhs } => {
                if element_type == ElementType::Null {
                    return Ok(null_factory(ElementType::Null));
                }
                let lhs = self.widened(*lhs, element_type)?;
                let rhs = self.widened(*rhs, element_type)?;
                arithmetic::arithmetic_factory(*op, element_type, lhs, rhs, source)
            }
            ExprNode::Comparison { op, lhs, rhs } => {
                let (lt, rt) = (self.element_type(*lhs)?, self.element_type(*rhs)?);
                let operand = common_type(lt, rt).ok_or_else(|| {
                    ExecError::invalid_input(format!("cannot compare {lt} with {rt}"))
                })?;
                if operand == ElementType::Null {
                    return Ok(null_factory(ElementType::Boolean));
                }
                let lhs = self.widened(*lhs, operand)?;
                let rhs = self.widened(*rhs, operand)?;
                comparison::comparison_factory(*op, operand, lhs, rhs, source)
            }
            ExprNode::Logic { op, lhs, rhs } => Ok(Arc::new(LogicEvaluatorFactory::new(
                *op,
                self.factory(*lhs)?,
                self.factory(*rhs)?,
                source,
            ))),
            ExprNode::Not(child) => Ok(Arc::new(UnaryEvaluatorFactory::<NotKernel>::new(
                self.factory(*child)?,
                source,
            ))),
            ExprNode::IsNull(child) => Ok(Arc::new(NullTestEvaluatorFactory::new(
                self.factory(*child)?,
                false,
            ))),
            ExprNode::IsNotNull(child) => Ok(Arc::new(NullTestEvaluatorFactory::new(
                self.factory(*child)?,
                true,
            ))),
            ExprNode::Cast(child) => cast_factory(
                self.element_type(*child)?,
                element_type,
                self.factory(*child)?,
                source,
            ),
            ExprNode::FunctionCall { name, args } => {
                let arg_types = args
                    .iter()
                    .map(|a| self.element_type(*a))
                    .collect::<ExecResult<Vec<_>>>()?;
                let descriptor = resolve_function(name, &arg_types)
                    .ok_or_else(|| ExecError::invalid_input(format!("no function {source}")))?;
                let children = args
                    .iter()
                    .map(|a| self.factory(*a))
                    .collect::<ExecResult<Vec<_>>>()?;
                descriptor.build(children, source)
            }
        }
    }

    fn widened(&self, id: ExprId, to: ElementType) -> ExecResult<Arc<dyn EvaluatorFactory>> {
        let from = self.element_type(id)?;
        cast_factory(from, to, self.factory(id)?, self.source(id))
    }
}

/// Common operand type: equal types, the wider numeric, or the non-null side.
fn common_type(a: ElementType, b: ElementType) -> Option<ElementType> {
    match (a, b) {
        (a, b) if a == b => Some(a),
        (ElementType::Null, other) | (other, ElementType::Null) => Some(other),
        (a, b) => widest_numeric(a, b),
    }
}

fn null_factory(element_type: ElementType) -> Arc<dyn EvaluatorFactory> {
    Arc::new(NullEvaluatorFactory { element_type })
}

#[derive(Debug)]
struct NullEvaluatorFactory {
    element_type: ElementType,
}

impl EvaluatorFactory for NullEvaluatorFactory {
    fn get(&self, _ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(NullEvaluator {
            element_type: self.element_type,
        }))
    }
}

struct NullEvaluator {
    element_type: ElementType,
}

impl Evaluator for NullEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        Ok(Block::constant_null(self.element_type, page.position_count()))
    }
}

#[derive(Debug)]
struct LiteralEvaluatorFactory {
    value: LiteralValue,
}

impl EvaluatorFactory for LiteralEvaluatorFactory {
    fn get(&self, _ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(LiteralEvaluator {
            value: self.value.clone(),
        }))
    }
}

struct LiteralEvaluator {
    value: LiteralValue,
}

impl Evaluator for LiteralEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let n = page.position_count();
        match &self.value {
            LiteralValue::Null => Ok(Block::constant_null(ElementType::Null, n)),
            LiteralValue::Boolean(v) => vector_block(BooleanArray::from(vec![*v; n])),
            LiteralValue::Int(v) => vector_block(Int32Array::from(vec![*v; n])),
            LiteralValue::Long(v) => vector_block(Int64Array::from(vec![*v; n])),
            LiteralValue::Double(v) => vector_block(Float64Array::from(vec![*v; n])),
            LiteralValue::Bytes(v) => vector_block(BinaryArray::from_iter_values(
                std::iter::repeat_n(v.as_slice(), n),
            )),
        }
    }
}

#[derive(Debug)]
struct ColumnEvaluatorFactory {
    channel: usize,
    element_type: ElementType,
}

impl EvaluatorFactory for ColumnEvaluatorFactory {
    fn get(&self, _ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(ColumnEvaluator {
            channel: self.channel,
            element_type: self.element_type,
        }))
    }
}

struct ColumnEvaluator {
    channel: usize,
    element_type: ElementType,
}

impl Evaluator for ColumnEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let block = page.block(self.channel)?;
        if block.element_type() != self.element_type && block.element_type() != ElementType::Null {
            return Err(ExecError::Internal(format!(
                "channel {} holds {}, expected {}",
                self.channel,
                block.element_type(),
                self.element_type
            )));
        }
        Ok(block.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{IntBlockBuilder, LongBlockBuilder};
    use crate::runtime::mem_tracker::MemTracker;

    fn ctx() -> DriverContext {
        DriverContext::with_mem_tracker(MemTracker::new_root("expr-test"))
    }

    fn int_long_page() -> Page {
        let mut ints = IntBlockBuilder::with_capacity(3);
        ints.append_value(1).append_value(i32::MAX).append_null();
        let mut longs = LongBlockBuilder::with_capacity(3);
        longs.append_value(10).append_value(1).append_value(5);
        Page::new(vec![
            ints.build().expect("ints"),
            longs.build().expect("longs"),
        ])
        .expect("page")
    }

    #[test]
    fn mixed_operands_are_widened() {
        let mut arena = ExprArena::default();
        let a = arena.column(0, "a", ElementType::Int);
        let b = arena.column(1, "b", ElementType::Long);
        let sum = arena.arithmetic(ArithmeticOp::Add, a, b).expect("a + b");
        assert_eq!(arena.element_type(sum).expect("type"), ElementType::Long);

        let ctx = ctx();
        let mut eval = arena.factory(sum).expect("lower").get(&ctx).expect("bind");
        let out = eval.eval(&int_long_page()).expect("eval");
        let longs = out.as_longs().expect("longs");
        assert_eq!(longs.get(0), 11);
        assert_eq!(longs.get(1), i64::from(i32::MAX) + 1);
        assert!(out.is_null(2));
        assert!(ctx.warning_sink().is_empty());
    }

    #[test]
    fn overflow_becomes_null_with_warning() {
        let mut arena = ExprArena::default();
        let a = arena.column(0, "a", ElementType::Int);
        let one = arena.literal(LiteralValue::Int(1));
        let sum = arena.arithmetic(ArithmeticOp::Add, a, one).expect("a + 1");

        let ctx = ctx();
        let mut eval = arena.factory(sum).expect("lower").get(&ctx).expect("bind");
        let out = eval.eval(&int_long_page()).expect("eval");
        assert_eq!(out.as_ints().expect("ints").get(0), 2);
        assert!(out.is_null(1));
        let warnings = ctx.warning_sink().warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].position, 1);
        assert_eq!(warnings[0].source, "a + 1");
    }

    #[test]
    fn vector_inputs_take_the_vector_path() {
        let mut arena = ExprArena::default();
        let b = arena.column(1, "b", ElementType::Long);
        let half = arena.literal(LiteralValue::Double(0.5));
        let prod = arena.arithmetic(ArithmeticOp::Mul, b, half).expect("b * 0.5");
        let ctx = ctx();
        let mut eval = arena.factory(prod).expect("lower").get(&ctx).expect("bind");
        let out = eval.eval(&int_long_page()).expect("eval");
        assert!(out.as_vector().is_some());
        assert_eq!(out.as_doubles().expect("doubles").position_values(0), vec![5.0]);
    }

    #[test]
    fn three_valued_logic_and_null_tests() {
        let mut arena = ExprArena::default();
        let a = arena.column(0, "a", ElementType::Int);
        let zero = arena.literal(LiteralValue::Int(0));
        let positive = arena.comparison(ComparisonOp::Gt, a, zero).expect("a > 0");
        let unknown = arena.literal(LiteralValue::Null);
        let and = arena.logic(LogicOp::And, positive, unknown).expect("and");
        let or = arena.logic(LogicOp::Or, positive, unknown).expect("or");
        let missing = arena.is_null(a);

        let ctx = ctx();
        let page = int_long_page();
        let and = arena.factory(and).expect("lower").get(&ctx).expect("bind").eval(&page).expect("eval");
        let or = arena.factory(or).expect("lower").get(&ctx).expect("bind").eval(&page).expect("eval");
        let missing = arena
            .factory(missing)
            .expect("lower")
            .get(&ctx)
            .expect("bind")
            .eval(&page)
            .expect("eval");
        assert!(and.is_null(0));
        assert_eq!(or.as_booleans().expect("bools").get(0), true);
        assert!(or.is_null(2));
        assert_eq!(
            missing.as_booleans().expect("bools").position_values(2),
            vec![true]
        );
    }

    #[test]
    fn incompatible_operands_are_rejected_at_build_time() {
        let mut arena = ExprArena::default();
        let s = arena.literal(LiteralValue::Bytes(b"x".to_vec()));
        let one = arena.literal(LiteralValue::Int(1));
        assert!(arena.arithmetic(ArithmeticOp::Add, s, one).is_err());
        assert!(arena.comparison(ComparisonOp::Eq, s, one).is_err());
        assert!(arena.function("abs", vec![s]).is_err());
    }
}
