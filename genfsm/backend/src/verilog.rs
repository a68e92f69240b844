//! Verilog backend for genfsm.
//!
//! Renders the hardware AST into Verilog-2005 text with two-space
//! indentation.
use crate::ast::{Instantiation, Item, Module, Procedural};
use crate::codegen;
use crate::traits::{Backend, Design};
use genfsm_ir::{
    Case, DeclKind, Declaration, Expr, IfElse, Statement, Subsitution,
    SubsitutionKind,
};
use genfsm_utils::{FsmResult, Lines};
use itertools::Itertools;
use std::mem::discriminant;

#[derive(Default)]
pub struct VerilogBackend;

impl Backend for VerilogBackend {
    fn name(&self) -> &'static str {
        "verilog"
    }

    fn validate(design: &Design) -> FsmResult<()> {
        design.config.validate()?;
        design.graph.validate()
    }

    fn render(design: &Design) -> FsmResult<String> {
        let module =
            codegen::generate(&design.ctx, &design.graph, &design.config)?;
        Ok(module_lines(&module).to_string())
    }
}

/// Render a complete module.
pub fn module_lines(module: &Module) -> Lines {
    let mut out = Lines::new();
    if module.ports.is_empty() {
        out.push(format!("module {};", module.name));
    } else {
        out.push(format!("module {}(", module.name));
        out.indent();
        let ports = module.ports.iter().map(declaration).join(",\n");
        out.push(ports);
        out.dedent();
        out.push(");");
    }

    out.indent();
    let mut prev: Option<&Item> = None;
    for item in &module.items {
        if prev.is_some_and(|p| discriminant(p) != discriminant(item)) {
            out.push("");
        }
        self::item(item, &mut out);
        prev = Some(item);
    }
    out.dedent();
    out.push("endmodule");
    out
}

fn range(width: u64, signed: bool) -> String {
    let sign = if signed { "signed " } else { "" };
    if width > 1 {
        format!("{sign}[{}:0] ", width - 1)
    } else {
        sign.to_string()
    }
}

/// A declaration without the trailing semicolon.
fn declaration(d: &Declaration) -> String {
    let range = range(d.width, d.signed);
    match d.kind {
        DeclKind::Input => format!("input wire {range}{}", d.name),
        DeclKind::Output => format!("output reg {range}{}", d.name),
        DeclKind::Reg => format!("reg {range}{}", d.name),
        DeclKind::Wire => format!("wire {range}{}", d.name),
        DeclKind::LocalParam(v) => format!("localparam {} = {v}", d.name),
    }
}

/// A condition wrapped in exactly one pair of parentheses.
fn condition(e: &Expr) -> String {
    let c = e.verilog_cond();
    if c.starts_with('(') { c } else { format!("({c})") }
}

fn item(item: &Item, out: &mut Lines) {
    match item {
        Item::Declaration(d) => out.push(format!("{};", declaration(d))),
        Item::Always { clock, body } => {
            out.push(format!("always @(posedge {clock}) begin"));
            block(body, out);
            out.push("end");
        }
        Item::Clock {
            signal,
            half_period,
        } => out.push(format!("always #{half_period} {signal} = !{signal};")),
        Item::Instantiation(inst) => instantiation(inst, out),
        Item::Initial(body) => {
            out.push("initial begin");
            out.indent();
            body.iter().for_each(|p| procedural(p, out));
            out.dedent();
            out.push("end");
        }
    }
}

fn instantiation(inst: &Instantiation, out: &mut Lines) {
    out.push(format!("{} {}(", inst.module, inst.name));
    out.indent();
    out.push(
        inst.connections
            .iter()
            .map(|(port, signal)| format!(".{port}({signal})"))
            .join(",\n"),
    );
    out.dedent();
    out.push(");");
}

fn block(stmts: &[Statement], out: &mut Lines) {
    out.indent();
    stmts.iter().for_each(|s| statement(s, out));
    out.dedent();
}

pub fn statement(stmt: &Statement, out: &mut Lines) {
    match stmt {
        Statement::Subsitution(s) => out.push(subsitution(s)),
        Statement::IfElse(IfElse {
            condition: cond,
            then_body,
            else_body,
        }) => {
            out.push(format!("if {} begin", condition(cond)));
            block(then_body, out);
            if else_body.is_empty() {
                out.push("end");
            } else {
                out.push("end else begin");
                block(else_body, out);
                out.push("end");
            }
        }
        Statement::Case(Case { expr, items }) => {
            out.push(format!("case ({})", expr.verilog()));
            out.indent();
            for item in items {
                out.push(format!("{}: begin", item.label.verilog()));
                block(&item.statements, out);
                out.push("end");
            }
            out.dedent();
            out.push("endcase");
        }
    }
}

fn subsitution(s: &Subsitution) -> String {
    let op = match s.kind {
        SubsitutionKind::Blocking => "=",
        SubsitutionKind::NonBlocking
        | SubsitutionKind::State
        | SubsitutionKind::Valid => "<=",
    };
    format!("{} {op} {};", s.lvalue.verilog(), s.rvalue.verilog())
}

fn procedural(p: &Procedural, out: &mut Lines) {
    let nested = |head: String, body: &[Procedural], out: &mut Lines| {
        out.push(head);
        out.indent();
        body.iter().for_each(|p| procedural(p, out));
        out.dedent();
        out.push("end");
    };
    match p {
        Procedural::Assign(s) => out.push(subsitution(s)),
        Procedural::NegEdge(signal) => {
            out.push(format!("@(negedge {signal});"))
        }
        Procedural::While { condition, body } => {
            nested(format!("while ({condition}) begin"), body, out)
        }
        Procedural::If { condition, body } => {
            nested(format!("if ({condition}) begin"), body, out)
        }
        Procedural::Display { format, args } => {
            let args: String =
                args.iter().map(|a| format!(", {a}")).collect();
            out.push(format!("$display(\"{format}\"{args});"))
        }
        Procedural::Finish => out.push("$finish;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_frontend::{FunctionDef, lower};
    use genfsm_ir::{BinOp, Config, IdCounter};

    fn render(src: &str, level: u32) -> String {
        let func = FunctionDef::construct_from_str(src).unwrap();
        let mut ids = IdCounter::default();
        let (ctx, graph) = lower(&func, &mut ids).unwrap();
        let graph = genfsm_opt::optimize(graph, level, &mut ids).unwrap();
        let design = Design {
            ctx,
            graph,
            config: Config::default(),
        };
        VerilogBackend::validate(&design).unwrap();
        VerilogBackend::render(&design).unwrap()
    }

    #[test]
    fn counter_module() {
        let src = "\
def count(n):
    i = 0
    while i < n:
        yield i
        i = i + 1
";
        let text = render(src, 0);
        assert!(text.starts_with(
            "module count(
  input wire _clock,
  input wire _reset,
  input wire _start,
  input wire signed [31:0] n,
  input wire _ready,
  output reg _valid,
  output reg _done,
  output reg signed [31:0] _out0
);
"
        ));
        assert!(text.ends_with("endmodule\n"));
        assert!(text.contains("  reg signed [31:0] _n;\n"));
        assert!(text.contains(
            "  always @(posedge _clock) begin
    if (_ready) begin
      _valid <= 0;
    end
    if (_start) begin
      _valid <= 0;
      _done <= 0;
"
        ));
        assert!(text.contains("      _n <= n;\n      _i <= 0;\n"));
        assert!(text.contains(
            "    end else begin
      if (_reset) begin
        _valid <= 0;
        _done <= 1;
"
        ));
        assert!(text.contains(
            "      end else begin
        if (_ready || (_valid == 0)) begin
          case (_state)
"
        ));
        assert!(text.contains("if (_i < _n) begin"));
        assert!(text.contains("_out0 <= _i;\n"));
        assert!(text.contains("_valid <= 1;\n"));
        assert!(text.contains("_done <= 1;\n"));
        assert!(!text.contains("default"));
        assert!(text.lines().all(|l| l == l.trim_end()));
        assert!(
            text.lines()
                .all(|l| (l.len() - l.trim_start().len()) % 2 == 0)
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let src = "\
def f(a, b):
    for i in range(a):
        if i % 2 == 0:
            yield i, b
";
        assert_eq!(render(src, 2), render(src, 2));
    }

    #[test]
    fn statements() {
        let mut out = Lines::new();
        statement(
            &IfElse {
                condition: Expr::var("x"),
                then_body: vec![
                    Subsitution::blocking(Expr::var("a"), Expr::int(-1)).into(),
                ],
                else_body: vec![
                    IfElse {
                        condition: Expr::binop(
                            BinOp::Equal,
                            Expr::var("y"),
                            Expr::int(0),
                        ),
                        then_body: vec![],
                        else_body: vec![],
                    }
                    .into(),
                ],
            }
            .into(),
            &mut out,
        );
        assert_eq!(
            out.to_string(),
            "\
if (_x) begin
  _a = (-1);
end else begin
  if (_y == 0) begin
  end
end
"
        );
    }

    #[test]
    fn testbench_items() {
        let mut m = Module::new("t_tb");
        m.add_item(Declaration::new(DeclKind::Reg, "_clock", 1, false));
        m.add_item(Item::Clock {
            signal: "_clock".into(),
            half_period: 5,
        });
        m.add_item(Item::Initial(vec![
            Procedural::assign("_clock", Expr::int(0)),
            Procedural::While {
                condition: "_done == 0".into(),
                body: vec![Procedural::NegEdge("_clock".into())],
            },
            Procedural::Display {
                format: "%0d".into(),
                args: vec!["_out0".into()],
            },
            Procedural::Finish,
        ]));
        assert_eq!(
            module_lines(&m).to_string(),
            "\
module t_tb;
  reg _clock;

  always #5 _clock = !_clock;

  initial begin
    _clock = 0;
    while (_done == 0) begin
      @(negedge _clock);
    end
    $display(\"%0d\", _out0);
    $finish;
  end
endmodule
"
        );
    }
}
