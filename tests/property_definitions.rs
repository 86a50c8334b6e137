// tests/property_definitions.rs

use std::path::Path;

use cozy::command::{CommandDefinition, Invocation};
use cozy::config::CommandConfig;
use proptest::prelude::*;

fn field() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        "[a-z][a-z0-9-]{0,8}".prop_map(Some),
    ]
}

fn command_config() -> impl Strategy<Value = CommandConfig> {
    (
        field(),
        field(),
        field(),
        proptest::collection::vec("[a-z0-9-]{1,6}", 0..3),
    )
        .prop_map(|(exec, npm, script, args)| CommandConfig {
            exec,
            npm,
            script,
            args,
            ..CommandConfig::default()
        })
}

proptest! {
    /// A definition is accepted exactly when one of exec / npm / script is
    /// set, and script commands carry no args.
    #[test]
    fn definitions_need_exactly_one_thing_to_run(cfg in command_config()) {
        let set = [cfg.exec.is_some(), cfg.npm.is_some(), cfg.script.is_some()]
            .into_iter()
            .filter(|s| *s)
            .count();
        let script_with_args = cfg.script.is_some() && !cfg.args.is_empty();

        let result = CommandDefinition::from_config("cmd", &cfg, Path::new("/root"));

        if set == 1 && !script_with_args {
            let def = result.unwrap();
            prop_assert_eq!(def.invocation().is_script(), cfg.script.is_some());
            if let Some(npm) = &cfg.npm {
                match def.invocation() {
                    Invocation::Program { program, args } => {
                        prop_assert_eq!(program.as_str(), "yarn");
                        prop_assert_eq!(&args[0], npm);
                        prop_assert_eq!(&args[1..], &cfg.args[..]);
                    }
                    Invocation::Script(_) => prop_assert!(false, "npm resolved to a script"),
                }
            }
        } else {
            let err = result.unwrap_err();
            prop_assert!(err.is_config_error());
            prop_assert!(err.to_string().contains("\"cmd\""));
        }
    }
}
