//! Quantity registry: the named stocks, flows and constants of one run and the
//! equations relating them.
//!
//! The registry only records declarations. `compile` resolves every name,
//! validates the topology and produces an immutable [`CompiledModel`].

use crate::equation_engine::{parse, Bytecode, Compiler, Expr, OpCode, Operand, VM};
use crate::error::ModelError;
use crate::evaluator::Evaluator;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Definition of a per-run constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantDef {
    Literal(f64),
    /// Equation over other constants and initial stock values.
    Equation(String),
}

impl From<f64> for ConstantDef {
    fn from(value: f64) -> Self {
        ConstantDef::Literal(value)
    }
}

impl From<&str> for ConstantDef {
    fn from(equation: &str) -> Self {
        ConstantDef::Equation(equation.to_string())
    }
}

impl From<String> for ConstantDef {
    fn from(equation: String) -> Self {
        ConstantDef::Equation(equation)
    }
}

#[derive(Debug, Clone)]
struct StockDecl {
    name: String,
    equation: String,
    initial_value: f64,
}

#[derive(Debug, Clone)]
struct FlowDecl {
    name: String,
    equation: String,
}

#[derive(Debug, Clone)]
struct ConstantDecl {
    name: String,
    def: ConstantDef,
}

#[derive(Debug, Clone, Default)]
pub struct QuantityRegistry {
    stocks: Vec<StockDecl>,
    flows: Vec<FlowDecl>,
    constants: Vec<ConstantDecl>,
    names: HashSet<String>,
}

impl QuantityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a stock whose equation is a signed sum of flow names.
    pub fn declare_stock(
        &mut self,
        name: &str,
        equation: &str,
        initial_value: f64,
    ) -> Result<(), ModelError> {
        self.claim(name)?;
        self.stocks.push(StockDecl {
            name: name.to_string(),
            equation: equation.to_string(),
            initial_value,
        });
        Ok(())
    }

    pub fn declare_flow(&mut self, name: &str, equation: &str) -> Result<(), ModelError> {
        self.claim(name)?;
        self.flows.push(FlowDecl {
            name: name.to_string(),
            equation: equation.to_string(),
        });
        Ok(())
    }

    pub fn declare_constant(
        &mut self,
        name: &str,
        def: impl Into<ConstantDef>,
    ) -> Result<(), ModelError> {
        self.claim(name)?;
        self.constants.push(ConstantDecl {
            name: name.to_string(),
            def: def.into(),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn claim(&mut self, name: &str) -> Result<(), ModelError> {
        if !self.names.insert(name.to_string()) {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Resolves all names and freezes the registry into a runnable model.
    pub fn compile(&self) -> Result<CompiledModel, ModelError> {
        let mut symbols = HashMap::new();
        for (i, s) in self.stocks.iter().enumerate() {
            symbols.insert(s.name.clone(), Operand::Stock(i));
        }
        for (i, f) in self.flows.iter().enumerate() {
            symbols.insert(f.name.clone(), Operand::Flow(i));
        }
        for (i, c) in self.constants.iter().enumerate() {
            symbols.insert(c.name.clone(), Operand::Constant(i));
        }
        let compiler = Compiler::new(&symbols);

        let initial_values: Vec<f64> = self.stocks.iter().map(|s| s.initial_value).collect();
        let constant_names: Vec<String> = self.constants.iter().map(|c| c.name.clone()).collect();
        let flow_names: Vec<String> = self.flows.iter().map(|f| f.name.clone()).collect();

        // Constants: compiled, ordered by dependency and evaluated once.
        let mut constant_code = Vec::with_capacity(self.constants.len());
        for decl in &self.constants {
            let code = match &decl.def {
                ConstantDef::Literal(value) => Bytecode::literal(*value),
                ConstantDef::Equation(text) => {
                    let code = compile_equation(&compiler, &decl.name, text)?;
                    if let Some(idx) = code.flow_dependencies().first() {
                        return Err(ModelError::FlowInConstant {
                            constant: decl.name.clone(),
                            flow: flow_names[*idx].clone(),
                        });
                    }
                    code
                }
            };
            constant_code.push(code);
        }
        let constant_deps: Vec<Vec<usize>> =
            constant_code.iter().map(constant_dependencies).collect();
        let order = dependency_order(&constant_deps, &constant_names)?;
        let mut constants = vec![0.0; self.constants.len()];
        let mut stack = Vec::new();
        for idx in order {
            constants[idx] =
                VM::execute(&constant_code[idx], &initial_values, &[], &constants, &mut stack);
        }

        let mut flow_code = Vec::with_capacity(self.flows.len());
        for decl in &self.flows {
            flow_code.push(compile_equation(&compiler, &decl.name, &decl.equation)?);
        }
        let flow_deps: Vec<Vec<usize>> = flow_code.iter().map(Bytecode::flow_dependencies).collect();
        dependency_order(&flow_deps, &flow_names)?;

        let mut net_flows = Vec::with_capacity(self.stocks.len());
        for decl in &self.stocks {
            net_flows.push(net_flow(&symbols, decl)?);
        }

        let flow_count = flow_names.len();
        Ok(CompiledModel {
            stock_names: self.stocks.iter().map(|s| s.name.clone()).collect(),
            flow_names,
            constant_names,
            initial_values,
            constants,
            flow_code,
            flow_deps,
            net_flows,
            scratch: RefCell::new(Evaluator::new(flow_count)),
        })
    }
}

fn compile_equation(
    compiler: &Compiler<'_>,
    quantity: &str,
    text: &str,
) -> Result<Bytecode, ModelError> {
    let expr = parse(text).map_err(|source| ModelError::Parse {
        quantity: quantity.to_string(),
        source,
    })?;
    compiler
        .compile(&expr)
        .map_err(|reference| ModelError::UnknownReference {
            quantity: quantity.to_string(),
            reference,
        })
}

fn constant_dependencies(code: &Bytecode) -> Vec<usize> {
    let mut deps = Vec::new();
    for op in code.ops() {
        if let OpCode::LoadConstant(idx) = op {
            if !deps.contains(idx) {
                deps.push(*idx);
            }
        }
    }
    deps
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Post-order over a dependency graph; fails on the first cycle found.
fn dependency_order(deps: &[Vec<usize>], names: &[String]) -> Result<Vec<usize>, ModelError> {
    fn visit(
        node: usize,
        deps: &[Vec<usize>],
        names: &[String],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), ModelError> {
        match marks[node] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|&n| n == node).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|&n| names[n].clone()).collect();
                cycle.push(names[node].clone());
                return Err(ModelError::CyclicDependency(cycle));
            }
            Mark::Unvisited => {}
        }
        marks[node] = Mark::InProgress;
        path.push(node);
        for &dep in &deps[node] {
            visit(dep, deps, names, marks, path, order)?;
        }
        path.pop();
        marks[node] = Mark::Done;
        order.push(node);
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut order = Vec::with_capacity(deps.len());
    let mut path = Vec::new();
    for node in 0..deps.len() {
        visit(node, deps, names, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

/// A stock's net flow: flow indices with their sign.
#[derive(Debug, Clone, PartialEq)]
pub struct NetFlow {
    pub terms: Vec<(usize, f64)>,
}

fn net_flow(symbols: &HashMap<String, Operand>, decl: &StockDecl) -> Result<NetFlow, ModelError> {
    let expr = parse(&decl.equation).map_err(|source| ModelError::Parse {
        quantity: decl.name.clone(),
        source,
    })?;
    let mut terms = Vec::new();
    signed_terms(symbols, &decl.name, &expr, 1.0, &mut terms)?;
    Ok(NetFlow { terms })
}

fn signed_terms(
    symbols: &HashMap<String, Operand>,
    stock: &str,
    expr: &Expr,
    sign: f64,
    terms: &mut Vec<(usize, f64)>,
) -> Result<(), ModelError> {
    use crate::equation_engine::BinaryOp;

    let invalid = |reason: String| ModelError::InvalidNetFlow {
        stock: stock.to_string(),
        reason,
    };
    match expr {
        Expr::Variable(name) => match symbols.get(name) {
            Some(Operand::Flow(idx)) => {
                terms.push((*idx, sign));
                Ok(())
            }
            Some(_) => Err(invalid(format!("'{name}' is not a flow"))),
            None => Err(ModelError::UnknownReference {
                quantity: stock.to_string(),
                reference: name.clone(),
            }),
        },
        Expr::Binary(left, BinaryOp::Add, right) => {
            signed_terms(symbols, stock, left, sign, terms)?;
            signed_terms(symbols, stock, right, sign, terms)
        }
        Expr::Binary(left, BinaryOp::Sub, right) => {
            signed_terms(symbols, stock, left, sign, terms)?;
            signed_terms(symbols, stock, right, -sign, terms)
        }
        Expr::Neg(inner) => signed_terms(symbols, stock, inner, -sign, terms),
        Expr::Number(n) => Err(invalid(format!("literal {n}"))),
        Expr::Binary(..) | Expr::Call(..) => {
            Err(invalid("only '+', '-' and flow names are allowed".to_string()))
        }
    }
}

/// An immutable, fully resolved model.
pub struct CompiledModel {
    pub(crate) stock_names: Vec<String>,
    pub(crate) flow_names: Vec<String>,
    pub(crate) constant_names: Vec<String>,
    pub(crate) initial_values: Vec<f64>,
    pub(crate) constants: Vec<f64>,
    pub(crate) flow_code: Vec<Bytecode>,
    pub(crate) flow_deps: Vec<Vec<usize>>,
    pub(crate) net_flows: Vec<NetFlow>,
    // Evaluator memo and VM stack, reused across steps. Makes the model !Sync.
    pub(crate) scratch: RefCell<Evaluator>,
}

impl CompiledModel {
    pub fn stock_names(&self) -> &[String] {
        &self.stock_names
    }

    pub fn flow_names(&self) -> &[String] {
        &self.flow_names
    }

    pub fn initial_values(&self) -> &[f64] {
        &self.initial_values
    }

    /// Value of a constant as fixed for this run.
    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constant_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.constants[idx])
    }

    pub fn stock_index(&self, name: &str) -> Option<usize> {
        self.stock_names.iter().position(|n| n == name)
    }

    pub fn flow_index(&self, name: &str) -> Option<usize> {
        self.flow_names.iter().position(|n| n == name)
    }

    /// Signed flow terms of a stock's net-flow equation.
    pub fn net_flow(&self, stock: &str) -> Option<&NetFlow> {
        self.stock_index(stock).map(|idx| &self.net_flows[idx])
    }
}
