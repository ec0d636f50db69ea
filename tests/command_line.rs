// tests/command_line.rs

use std::path::{Path, PathBuf};

use proptest::prelude::*;

use hookdeploy::errors::HookdeployError;
use hookdeploy::exec::{CommandLine, merge_output};

#[test]
fn single_token_is_relative_to_workdir() {
    let line = CommandLine::parse_script("deploy.sh", Path::new("/srv/app")).unwrap();
    assert_eq!(line.program, PathBuf::from("/srv/app/deploy.sh"));
    assert!(line.args.is_empty());
}

#[test]
fn single_absolute_token_is_kept() {
    let line = CommandLine::parse_script("/usr/local/bin/deploy", Path::new("/srv/app")).unwrap();
    assert_eq!(line.program, PathBuf::from("/usr/local/bin/deploy"));
}

#[test]
fn several_tokens_are_program_and_verbatim_args() {
    let line =
        CommandLine::parse_script("make  build   RELEASE=1", Path::new("/srv/app")).unwrap();
    assert_eq!(line.program, PathBuf::from("make"));
    assert_eq!(line.args, vec!["build".to_string(), "RELEASE=1".to_string()]);
}

#[test]
fn blank_command_line_is_rejected() {
    assert!(matches!(
        CommandLine::parse_script("  \t ", Path::new("/srv/app")),
        Err(HookdeployError::EmptyCommand)
    ));
    assert!(matches!(
        CommandLine::parse_program(""),
        Err(HookdeployError::EmptyCommand)
    ));
}

#[test]
fn sync_program_is_never_made_relative() {
    let line = CommandLine::parse_program("git").unwrap();
    assert_eq!(line.program, PathBuf::from("git"));
    assert!(line.args.is_empty());
}

#[test]
fn merged_output_keeps_stream_order() {
    assert_eq!(merge_output("out\n", "err\n"), "out\nerr");
    assert_eq!(merge_output("", "err\n"), "err");
    assert_eq!(merge_output("out\n", ""), "out");
    assert_eq!(merge_output("", ""), "");
}

fn token() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./=-]{1,12}"
}

proptest! {
    #[test]
    fn multi_token_lines_split_on_whitespace(
        program in token(),
        args in proptest::collection::vec(token(), 1..6),
        sep in "[ \t]{1,3}",
    ) {
        let line = std::iter::once(program.clone())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(&sep);

        let parsed = CommandLine::parse_script(&line, Path::new("/work")).unwrap();
        prop_assert_eq!(parsed.program, PathBuf::from(&program));
        prop_assert_eq!(parsed.args, args);
    }

    #[test]
    fn single_tokens_always_resolve_inside_workdir(name in "[a-zA-Z0-9_.-]{1,16}") {
        let parsed = CommandLine::parse_script(&format!("  {name} "), Path::new("/work")).unwrap();
        prop_assert_eq!(parsed.program, Path::new("/work").join(&name));
        prop_assert!(parsed.args.is_empty());
    }
}
