//! Rules for names that end up in generated Verilog.

/// Verilog-2005 keywords that may not be used as port or module names.
const KEYWORDS: &[&str] = &[
    "always", "and", "assign", "automatic", "begin", "buf", "case", "casex",
    "casez", "cell", "config", "deassign", "default", "defparam", "design",
    "disable", "edge", "else", "end", "endcase", "endconfig",
    "endfunction", "endgenerate", "endmodule", "endprimitive",
    "endspecify", "endtable", "endtask", "event", "for", "force", "forever",
    "fork", "function", "generate", "genvar", "if", "ifnone", "initial",
    "inout", "input", "instance", "integer", "join", "library",
    "localparam", "macromodule", "module", "nand", "negedge", "nor", "not",
    "or", "output", "parameter", "posedge", "primitive", "real", "realtime",
    "reg", "release", "repeat", "scalared", "signed", "specify",
    "specparam", "supply0", "supply1", "table", "task", "time", "tri",
    "tri0", "tri1", "triand", "trior", "trireg", "unsigned", "use",
    "vectored", "wait", "wand", "while", "wire", "wor", "xnor", "xor",
];

/// Names of the control signals of a generated module, without the leading
/// underscore that every register carries.
pub const SIGNALS: &[&str] = &["clock", "start", "valid", "done", "state"];

pub fn is_verilog_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Is `name` a legal, non-keyword Verilog identifier?
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !is_verilog_keyword(name)
}

/// Would the register for variable `name` collide with a generated signal?
/// Variables are rendered as `_<name>`, so `state`, `out0` and `state_3`
/// are taken.
pub fn collides_with_signal(name: &str) -> bool {
    let numbered = |prefix: &str| {
        name.strip_prefix(prefix).is_some_and(|rest| {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
        })
    };
    SIGNALS.contains(&name) || numbered("out") || numbered("state_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_valid_identifier("fib"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1x"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("module"));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn signal_collisions() {
        assert!(collides_with_signal("state"));
        assert!(collides_with_signal("out12"));
        assert!(collides_with_signal("state_3"));
        assert!(!collides_with_signal("out"));
        assert!(!collides_with_signal("outer"));
        assert!(!collides_with_signal("state_x"));
    }
}
