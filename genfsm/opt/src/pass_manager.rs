//! Define the PassManager structure that is used to construct and run
//! passes.
use crate::traversal;
use genfsm_ir::{Graph, IdCounter};
use genfsm_utils::{Error, FsmResult};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::time::Instant;

/// Top-level type for all passes that transform a [Graph]. The last
/// argument is the optimization level.
pub type PassClosure =
    Box<dyn Fn(Graph, &mut IdCounter, u32) -> FsmResult<Graph>>;

/// Structure that tracks all registered passes.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes
    passes: HashMap<String, PassClosure>,
    /// Tracks alias for groups of passes that run together.
    aliases: HashMap<String, Vec<String>>,
    // Track the help information for passes
    help: HashMap<String, String>,
}

impl PassManager {
    /// Register a new pass and return an error if another pass with the
    /// same name has already been registered.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut pm = PassManager::default();
    /// pm.register_pass::<OptimizeIf>()?;
    /// ```
    pub fn register_pass<P>(&mut self) -> FsmResult<()>
    where
        P: traversal::Pass + traversal::ConstructPass + traversal::Named,
    {
        let name = P::name().to_string();
        if self.passes.contains_key(&name) {
            return Err(Error::misc(format!(
                "Pass with name '{name}' is already registered."
            )));
        }
        self.passes.insert(
            name.clone(),
            Box::new(|graph, ids, level| P::do_pass(graph, ids, level)),
        );
        self.help
            .insert(name.clone(), format!("- {}: {}", name, P::description()));
        Ok(())
    }

    /// Adds a new alias for groups of passes. An alias is a list of strings
    /// that represent valid pass names OR an alias.
    /// The passes and aliases are executed in the order of specification.
    pub fn add_alias(
        &mut self,
        name: String,
        passes: Vec<String>,
    ) -> FsmResult<()> {
        if self.aliases.contains_key(&name) {
            return Err(Error::misc(format!(
                "Alias with name '{name}' already registered."
            )));
        }
        // Expand any aliases used in defining this alias.
        let mut all_passes = Vec::with_capacity(passes.len());
        for pass in passes {
            if let Some(expanded) = self.aliases.get(&pass) {
                all_passes.extend(expanded.iter().cloned());
            } else if self.passes.contains_key(&pass) {
                all_passes.push(pass);
            } else {
                return Err(Error::misc(format!(
                    "No pass or alias named: {pass}"
                )));
            }
        }
        self.aliases.insert(name, all_passes);
        Ok(())
    }

    /// Return the help string for a specific pass.
    pub fn specific_help(&self, pass: &str) -> Option<String> {
        self.help.get(pass).cloned().or_else(|| {
            self.aliases.get(pass).map(|passes| {
                let pass_str = passes
                    .iter()
                    .map(|p| format!("- {p}"))
                    .collect::<Vec<String>>()
                    .join("\n");
                format!("`{pass}' is an alias for pass pipeline:\n{pass_str}")
            })
        })
    }

    /// Return a string representation to show all available passes and
    /// aliases. Appropriate for help text.
    pub fn complete_help(&self) -> String {
        let mut ret = String::with_capacity(1000);

        let mut pass_names = self.passes.keys().collect::<Vec<_>>();
        pass_names.sort();
        ret.push_str("Passes:\n");
        for pass in pass_names {
            let _ = writeln!(ret, "{}", self.help[pass]);
        }

        let mut aliases = self.aliases.iter().collect::<Vec<_>>();
        aliases.sort_by(|kv1, kv2| kv1.0.cmp(kv2.0));
        ret.push_str("\nAliases:\n");
        for (alias, passes) in aliases {
            let _ = writeln!(ret, "- {}: {}", alias, passes.join(", "));
        }
        ret
    }

    /// Attempts to resolve the alias name. If there is no alias with this
    /// name, assumes that this is a pass instead.
    fn resolve_alias(&self, maybe_alias: &str) -> Vec<String> {
        self.aliases
            .get(maybe_alias)
            .cloned()
            .unwrap_or_else(|| vec![maybe_alias.to_string()])
    }

    /// Creates a plan using an inclusion and exclusion list which might
    /// contain aliases.
    fn create_plan(
        &self,
        incls: &[String],
        excls: &[String],
    ) -> FsmResult<(Vec<String>, HashSet<String>)> {
        let passes = incls
            .iter()
            .flat_map(|maybe_alias| self.resolve_alias(maybe_alias))
            .collect::<Vec<_>>();

        let excl_set = excls
            .iter()
            .flat_map(|maybe_alias| self.resolve_alias(maybe_alias))
            .collect::<HashSet<String>>();

        // Validate that names of passes in incl and excl sets are known
        passes.iter().chain(excl_set.iter()).try_for_each(|pass| {
            if !self.passes.contains_key(pass) {
                Err(Error::misc(format!(
                    "Unknown pass: {pass}. Run with --list-passes to view \
                     registered passes."
                )))
            } else {
                Ok(())
            }
        })?;

        Ok((passes, excl_set))
    }

    /// Executes a given "plan" constructed using the incl and excl lists.
    /// Every pass validates the graph it returns.
    pub fn execute_plan(
        &self,
        mut graph: Graph,
        ids: &mut IdCounter,
        level: u32,
        incl: &[String],
        excl: &[String],
    ) -> FsmResult<Graph> {
        let (passes, excl_set) = self.create_plan(incl, excl)?;

        for name in passes {
            if excl_set.contains(&name) {
                log::info!("{name}: Ignored");
                continue;
            }
            // Pass is known to exist because create_plan validates the
            // names of passes.
            let pass = &self.passes[&name];
            let start = Instant::now();
            graph = pass(graph, ids, level)?;
            let elapsed = start.elapsed();
            // Warn if pass takes more than 5 seconds.
            if elapsed.as_secs() > 5 {
                log::warn!("{name}: {}ms", elapsed.as_millis());
            } else {
                log::info!("{name}: {}ms", elapsed.as_millis());
            }
        }

        Ok(graph)
    }
}

/// Simple macro to register an alias with a pass manager.
///
/// ## Example
/// ```rust,ignore
/// let mut pm = PassManager::default();
/// register_alias!(pm, "simplify", [OptimizeIf, RemoveUnreferencedStates]);
/// ```
#[macro_export]
macro_rules! register_alias {
    (@unwrap_name $pass:ident) => {
        $pass::name().to_string()
    };

    (@unwrap_name $pass:literal) => {
        $pass.to_string()
    };

    ($manager:expr, $alias:literal, [ $($pass:tt),* $(,)? ]) => {
        $manager.add_alias($alias.to_string(), vec![
            $(register_alias!(@unwrap_name $pass)),*
        ])?;
    };
}
