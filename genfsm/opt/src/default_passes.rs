//! Defines the default passes available to [PassManager].
use crate::passes::{CombineCases, OptimizeIf, RemoveUnreferencedStates};
use crate::traversal::Named;
use crate::{pass_manager::PassManager, register_alias};
use genfsm_utils::FsmResult;

impl PassManager {
    pub fn default_passes() -> FsmResult<Self> {
        let mut pm = PassManager::default();

        pm.register_pass::<OptimizeIf>()?;
        pm.register_pass::<RemoveUnreferencedStates>()?;
        pm.register_pass::<CombineCases>()?;

        register_alias!(pm, "simplify", [OptimizeIf, RemoveUnreferencedStates]);
        register_alias!(
            pm,
            "all",
            ["simplify", CombineCases, RemoveUnreferencedStates]
        );

        Ok(pm)
    }

    /// The pipeline run at an optimization level. Nothing is merged across
    /// clock edges at level 0.
    pub fn plan(level: u32) -> Vec<String> {
        if level == 0 {
            vec!["simplify".to_string()]
        } else {
            vec!["all".to_string()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_expand() {
        let pm = PassManager::default_passes().unwrap();
        let help = pm.specific_help("all").unwrap();
        assert_eq!(
            help,
            "`all' is an alias for pass pipeline:\n\
             - optimize-if\n\
             - remove-unreferenced-states\n\
             - combine-cases\n\
             - remove-unreferenced-states"
        );
        assert!(pm.complete_help().contains(
            "- simplify: optimize-if, remove-unreferenced-states"
        ));
        assert!(pm.specific_help("unknown").is_none());
    }

    #[test]
    fn duplicate_registration() {
        let mut pm = PassManager::default_passes().unwrap();
        assert!(pm.register_pass::<OptimizeIf>().is_err());
        assert!(pm.add_alias("all".into(), vec![]).is_err());
        assert!(pm.add_alias("x".into(), vec!["nope".into()]).is_err());
    }
}
