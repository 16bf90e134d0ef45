use crate::prelude::*;

#[test]
fn top_level_help_mentions_consume() {
    cli().args(&["--help"]).passes().stdout_has("consume");
}

#[test]
fn consume_help_lists_flags() {
    cli()
        .args(&["consume", "--help"])
        .passes()
        .stdout_has("--interval")
        .stdout_has("--max-concurrent-per-agent")
        .stdout_has("--once")
        .stdout_has("--json");
}

#[test]
fn unknown_subcommand_is_a_bad_flags_exit() {
    let run = cli().args(&["bogus"]).fails();
    assert_eq!(run.code(), Some(2));
}
