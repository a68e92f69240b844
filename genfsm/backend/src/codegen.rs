//! Generation of the hardware module for a compiled generator.
use crate::ast::{Item, Module};
use crate::fsm::FsmBuilder;
use genfsm_ir::{
    BinOp, Config, Context, DeclKind, Declaration, Expr, Graph, IfElse,
    NodeId, Statement, Subsitution, UnaryOp,
};
use genfsm_utils::{Error, FsmResult, Id, bits_needed_for};
use std::collections::BTreeSet;
use std::time::Instant;

/// Name of the register that holds the variable `name`.
pub fn register(name: Id) -> String {
    Expr::Var(name).verilog()
}

/// Build the module implementing `graph`.
///
/// Interface:
/// - `_clock`, `_reset`, `_start`, one signed port per parameter and `_ready`,
/// - `_valid`, `_done` and one signed `_out<i>` per yielded value.
///
/// Asserting `_start` at a rising edge restarts the machine: the parameters
/// are captured into their registers and every other register is cleared.
/// `_reset` moves it to its done state. `_start` wins when both are high.
///
/// A yielded tuple stays on the outputs with `_valid` high until a rising
/// edge sees `_ready`. The machine only advances while `_ready` is high or
/// no value is pending, so `_done` never rises before the last value has
/// been accepted.
pub fn generate(
    ctx: &Context,
    graph: &Graph,
    config: &Config,
) -> FsmResult<Module> {
    let time = Instant::now();
    config.validate()?;
    let width = config.register_size;
    let mut module = Module::new(config.module_name_for(ctx));

    module.add_port(Declaration::new(DeclKind::Input, "_clock", 1, false));
    module.add_port(Declaration::new(DeclKind::Input, "_reset", 1, false));
    module.add_port(Declaration::new(DeclKind::Input, "_start", 1, false));
    for input in ctx.inputs() {
        module.add_port(Declaration::new(DeclKind::Input, input, width, true));
    }
    module.add_port(Declaration::new(DeclKind::Input, "_ready", 1, false));
    module.add_port(Declaration::new(DeclKind::Output, "_valid", 1, false));
    module.add_port(Declaration::new(DeclKind::Output, "_done", 1, false));
    for output in ctx.outputs() {
        module.add_port(Declaration::new(
            DeclKind::Output,
            register(output),
            width,
            true,
        ));
    }

    let states = graph.states();
    for state in &states {
        module.add_item(Declaration::localparam(
            state.state_name(),
            u64::from(state.index()),
        ));
    }
    let max_id =
        states.iter().map(|s| u64::from(s.index())).max().unwrap_or(0);
    module.add_item(Declaration::new(
        DeclKind::Reg,
        "_state",
        bits_needed_for(max_id + 1),
        false,
    ));
    for reg in ctx.registers() {
        module.add_item(Declaration::new(
            DeclKind::Reg,
            register(reg),
            width,
            true,
        ));
    }

    let case = FsmBuilder::new(ctx, graph).build()?;
    let advance = Expr::binop(
        BinOp::Or,
        Expr::port("_ready"),
        Expr::UnaryOp(UnaryOp::Not, Box::new(Expr::var("valid"))),
    );
    let body: Vec<Statement> = vec![
        IfElse {
            condition: Expr::port("_ready"),
            then_body: vec![clear_valid()],
            else_body: vec![],
        }
        .into(),
        IfElse {
            condition: Expr::port("_start"),
            then_body: start(ctx, graph),
            else_body: vec![
                IfElse {
                    condition: Expr::port("_reset"),
                    then_body: reset(done_state(graph, &states)?),
                    else_body: vec![
                        IfElse {
                            condition: advance,
                            then_body: vec![case.into()],
                            else_body: vec![],
                        }
                        .into(),
                    ],
                }
                .into(),
            ],
        }
        .into(),
    ];
    module.add_item(Item::Always {
        clock: "_clock".to_string(),
        body,
    });

    log::info!("Generated `{}` in {:?}", module.name, time.elapsed());
    Ok(module)
}

fn clear_valid() -> Statement {
    Subsitution::non_blocking(Expr::var("valid"), Expr::int(0)).into()
}

/// The state `_reset` moves to.
fn done_state(graph: &Graph, states: &BTreeSet<NodeId>) -> FsmResult<NodeId> {
    states
        .iter()
        .copied()
        .find(|&state| graph.get(state).is_ok_and(|node| node.is_done()))
        .ok_or_else(|| Error::malformed_graph("graph has no done state"))
}

/// Statements executed when `_reset` is asserted.
fn reset(done: NodeId) -> Vec<Statement> {
    vec![
        clear_valid(),
        Subsitution::non_blocking(Expr::var("done"), Expr::int(1)).into(),
        Subsitution::state(done).into(),
    ]
}

/// Statements executed when `_start` is asserted.
fn start(ctx: &Context, graph: &Graph) -> Vec<Statement> {
    let mut stmts: Vec<Statement> = vec![
        clear_valid(),
        Subsitution::non_blocking(Expr::var("done"), Expr::int(0)).into(),
        Subsitution::state(graph.root()).into(),
    ];
    stmts.extend(ctx.inputs().map(|input| {
        Subsitution::non_blocking(Expr::Var(input), Expr::Port(input)).into()
    }));
    stmts.extend(ctx.states().chain(ctx.globals()).map(|reg| {
        Subsitution::non_blocking(Expr::Var(reg), Expr::int(0)).into()
    }));
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;
    use genfsm_frontend::{FunctionDef, lower};
    use genfsm_ir::IdCounter;

    fn module(src: &str, config: &Config) -> FsmResult<Module> {
        let func = FunctionDef::construct_from_str(src)?;
        let (ctx, g) = lower(&func, &mut IdCounter::default())?;
        generate(&ctx, &g, config)
    }

    #[test]
    fn interface() {
        let src = "def pair(n, m):\n    x = n + m\n    yield x, n\n";
        let config = Config {
            register_size: 16,
            ..Config::default()
        };
        let m = module(src, &config).unwrap();
        assert_eq!(m.name, "pair");
        let ports: Vec<_> = m
            .ports
            .iter()
            .map(|p| (p.name.as_str(), p.kind, p.width, p.signed))
            .collect();
        assert_eq!(
            ports,
            vec![
                ("_clock", DeclKind::Input, 1, false),
                ("_reset", DeclKind::Input, 1, false),
                ("_start", DeclKind::Input, 1, false),
                ("n", DeclKind::Input, 16, true),
                ("m", DeclKind::Input, 16, true),
                ("_ready", DeclKind::Input, 1, false),
                ("_valid", DeclKind::Output, 1, false),
                ("_done", DeclKind::Output, 1, false),
                ("_out0", DeclKind::Output, 16, true),
                ("_out1", DeclKind::Output, 16, true),
            ]
        );
        let regs: Vec<_> = m
            .declarations()
            .filter(|d| d.kind == DeclKind::Reg)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(regs, vec!["_state", "_n", "_m", "_x"]);
    }

    #[test]
    fn state_register_width() {
        let src =
            "def f():\n    yield 1\n    yield 2\n    yield 3\n    yield 4\n";
        let m = module(src, &Config::default()).unwrap();
        let state = m.declarations().find(|d| d.name == "_state").unwrap();
        // Ids 0..=4 need three bits.
        assert_eq!(state.width, 3);
        assert_eq!(
            m.declarations()
                .filter(|d| matches!(d.kind, DeclKind::LocalParam(_)))
                .count(),
            5
        );
    }

    #[test]
    fn module_name_override() {
        let config = Config {
            module_name: Some("top".to_string()),
            ..Config::default()
        };
        let m = module("def f():\n    yield 1\n", &config).unwrap();
        assert_eq!(m.name, "top");
        let bad = Config {
            register_size: 65,
            ..Config::default()
        };
        assert!(module("def f():\n    yield 1\n", &bad).is_err());
    }

    #[test]
    fn handshake() {
        let m = module("def f(n):\n    yield n\n", &Config::default()).unwrap();
        let Some(Item::Always { body, .. }) =
            m.items.iter().find(|i| matches!(i, Item::Always { .. }))
        else {
            panic!("no always block");
        };
        let [Statement::IfElse(accept), Statement::IfElse(start)] = &body[..]
        else {
            panic!("unexpected always block {body:?}");
        };
        // A pending value is dropped only once it is accepted.
        assert_eq!(accept.condition, Expr::port("_ready"));
        assert_eq!(accept.then_body, vec![clear_valid()]);
        assert!(accept.else_body.is_empty());

        assert_eq!(start.condition, Expr::port("_start"));
        assert!(start.then_body.contains(&clear_valid()));
        let [Statement::IfElse(reset)] = &start.else_body[..] else {
            panic!("unexpected start branch {:?}", start.else_body);
        };
        assert_eq!(reset.condition, Expr::port("_reset"));
        let done = Subsitution::non_blocking(Expr::var("done"), Expr::int(1));
        assert!(reset.then_body.contains(&done.into()));
        let [Statement::IfElse(advance)] = &reset.else_body[..] else {
            panic!("unexpected reset branch {:?}", reset.else_body);
        };
        assert_eq!(
            advance.condition.verilog_cond(),
            "(_ready || (_valid == 0))"
        );
        assert!(matches!(advance.then_body[..], [Statement::Case(_)]));
    }
}
