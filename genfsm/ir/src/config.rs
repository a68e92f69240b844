use crate::{Context, names};
use genfsm_utils::{Error, FsmResult};

/// Options recognized by the compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Config {
    /// Upper bound on the number of clock boundaries folded into one state.
    pub optimization_level: u32,
    /// Width of every register and data port.
    pub register_size: u64,
    /// Name of the generated module. Defaults to the generator's name.
    pub module_name: Option<String>,
    /// Drive `_ready` randomly in generated testbenches.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub random_ready: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            optimization_level: 0,
            register_size: 32,
            module_name: None,
            random_ready: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> FsmResult<()> {
        if !(1..=64).contains(&self.register_size) {
            return Err(Error::misc(format!(
                "register size must be between 1 and 64, got {}",
                self.register_size
            )));
        }
        if let Some(name) = &self.module_name {
            if !names::is_valid_identifier(name) {
                return Err(Error::misc(format!(
                    "`{name}` is not a valid module name"
                )));
            }
        }
        Ok(())
    }

    /// Name of the module generated for `ctx`.
    pub fn module_name_for(&self, ctx: &Context) -> String {
        self.module_name
            .clone()
            .unwrap_or_else(|| ctx.name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let conf = Config::default();
        conf.validate().unwrap();
        assert_eq!(conf.register_size, 32);
        assert!(!conf.random_ready);
        assert_eq!(conf.module_name_for(&Context::new("fib")), "fib");
    }

    #[test]
    fn invalid_options() {
        let conf = Config {
            register_size: 0,
            ..Config::default()
        };
        assert!(conf.validate().is_err());
        let conf = Config {
            module_name: Some("endmodule".to_string()),
            ..Config::default()
        };
        assert!(conf.validate().is_err());
    }
}
