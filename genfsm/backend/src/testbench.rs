//! Testbench generation. The testbench drives the design with a table of
//! input tuples and prints every accepted output tuple as a comma separated
//! line.
use crate::ast::{Instantiation, Item, Module, Procedural};
use crate::codegen::register;
use genfsm_ir::{Config, Context, DeclKind, Declaration, Expr};
use genfsm_utils::{FsmResult, structure};
use itertools::Itertools;

/// Half of the clock period in simulation time units.
const HALF_PERIOD: u32 = 5;

/// Name of the testbench module for the design `module`.
pub fn testbench_name(module: &str) -> String {
    format!("{module}_tb")
}

/// Build a testbench running the design once for every row of `rows`.
///
/// `_ready` is held high unless `config.random_ready` is set, in which case
/// it is redrawn before every rising edge. A tuple is printed when the edge
/// following it accepts it.
pub fn generate(
    ctx: &Context,
    config: &Config,
    rows: &[Vec<i64>],
) -> FsmResult<Module> {
    config.validate()?;
    let inputs = ctx.inputs().collect_vec();
    for row in rows {
        structure::check_arity("testbench input row", inputs.len(), row.len())?;
    }
    let outputs = ctx.outputs().map(register).collect_vec();
    let width = config.register_size;
    let design = config.module_name_for(ctx);
    let mut tb = Module::new(testbench_name(&design));

    for control in ["_clock", "_reset", "_start"] {
        tb.add_item(Declaration::new(DeclKind::Reg, control, 1, false));
    }
    for input in &inputs {
        tb.add_item(Declaration::new(DeclKind::Reg, input, width, true));
    }
    tb.add_item(Declaration::new(DeclKind::Reg, "_ready", 1, false));
    tb.add_item(Declaration::new(DeclKind::Wire, "_valid", 1, false));
    tb.add_item(Declaration::new(DeclKind::Wire, "_done", 1, false));
    for output in &outputs {
        tb.add_item(Declaration::new(DeclKind::Wire, output, width, true));
    }

    let connections = ["_clock", "_reset", "_start"]
        .into_iter()
        .map(String::from)
        .chain(inputs.iter().map(|i| i.to_string()))
        .chain(["_ready", "_valid", "_done"].into_iter().map(String::from))
        .chain(outputs.iter().cloned())
        .map(|port| (port.clone(), port))
        .collect();
    tb.add_item(Instantiation {
        module: design,
        name: "dut".to_string(),
        connections,
    });

    tb.add_item(Item::Clock {
        signal: "_clock".to_string(),
        half_period: HALF_PERIOD,
    });

    let mut body = vec![
        Procedural::assign("_clock", Expr::int(0)),
        Procedural::assign("_reset", Expr::int(0)),
        Procedural::assign("_start", Expr::int(0)),
        Procedural::assign("_ready", Expr::int(1)),
    ];
    for row in rows {
        for (input, value) in inputs.iter().zip(row) {
            body.push(Procedural::assign(*input, Expr::int(*value)));
        }
        body.push(Procedural::assign("_start", Expr::int(1)));
        body.push(Procedural::NegEdge("_clock".to_string()));
        body.push(Procedural::assign("_start", Expr::int(0)));
        let mut wait = vec![Procedural::NegEdge("_clock".to_string())];
        if config.random_ready {
            wait.push(Procedural::assign("_ready", Expr::port("$random")));
        }
        if !outputs.is_empty() {
            wait.push(Procedural::If {
                condition: "_valid && _ready".to_string(),
                body: vec![Procedural::Display {
                    format: vec!["%0d"; outputs.len()].join(","),
                    args: outputs.clone(),
                }],
            });
        }
        body.push(Procedural::While {
            condition: "_done == 0".to_string(),
            body: wait,
        });
    }
    body.push(Procedural::Finish);
    tb.add_item(Item::Initial(body));
    Ok(tb)
}

/// Parse input rows written as comma separated integers, e.g. `3,-1`.
/// An empty string is a row without values.
pub fn parse_row(row: &str) -> FsmResult<Vec<i64>> {
    let row = row.trim();
    if row.is_empty() {
        return Ok(vec![]);
    }
    row.split(',')
        .map(|v| {
            v.trim().parse::<i64>().map_err(|err| {
                genfsm_utils::Error::misc(format!(
                    "invalid input value `{}`: {err}",
                    v.trim()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verilog::module_lines;
    use genfsm_ir::Scope;
    use genfsm_utils::ErrorKind;

    fn ctx() -> Context {
        let mut ctx = Context::new("fib");
        ctx.declare("n".into(), Scope::Input).unwrap();
        ctx.declare("a".into(), Scope::State).unwrap();
        ctx.declare_outputs(1).unwrap();
        ctx
    }

    #[test]
    fn drives_every_row() {
        let rows = [vec![5], vec![-2]];
        let tb = generate(&ctx(), &Config::default(), &rows).unwrap();
        let text = module_lines(&tb).to_string();
        let expected = "\
module fib_tb;
  reg _clock;
  reg _reset;
  reg _start;
  reg signed [31:0] n;
  reg _ready;
  wire _valid;
  wire _done;
  wire signed [31:0] _out0;

  fib dut(
    ._clock(_clock),
    ._reset(_reset),
    ._start(_start),
    .n(n),
    ._ready(_ready),
    ._valid(_valid),
    ._done(_done),
    ._out0(_out0)
  );

  always #5 _clock = !_clock;

  initial begin
    _clock = 0;
    _reset = 0;
    _start = 0;
    _ready = 1;
    n = 5;
    _start = 1;
    @(negedge _clock);
    _start = 0;
    while (_done == 0) begin
      @(negedge _clock);
      if (_valid && _ready) begin
        $display(\"%0d\", _out0);
      end
    end
    n = (-2);
    _start = 1;
    @(negedge _clock);
    _start = 0;
    while (_done == 0) begin
      @(negedge _clock);
      if (_valid && _ready) begin
        $display(\"%0d\", _out0);
      end
    end
    $finish;
  end
endmodule
";
        assert_eq!(text, expected);
    }

    #[test]
    fn random_ready_is_redrawn_every_cycle() {
        let config = Config {
            random_ready: true,
            ..Config::default()
        };
        let tb = generate(&ctx(), &config, &[vec![3]]).unwrap();
        let text = module_lines(&tb).to_string();
        assert!(text.contains(
            "      @(negedge _clock);\n      _ready = $random;\n      \
             if (_valid && _ready) begin\n"
        ));
        assert_eq!(text.matches("_ready = $random;").count(), 1);
    }

    #[test]
    fn row_arity_is_checked() {
        let err =
            generate(&ctx(), &Config::default(), &[vec![1, 2]]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StructuralType(_)));
    }

    #[test]
    fn rows() {
        assert_eq!(parse_row(" 3, -1 ").unwrap(), vec![3, -1]);
        assert_eq!(parse_row("").unwrap(), Vec::<i64>::new());
        assert!(parse_row("1,x").is_err());
    }
}
