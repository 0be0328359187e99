mod common;

use common::{run_command, run_script, run_script_bytes, run_script_in};
use std::fs;

#[test]
fn test_echo_collapses_blanks() {
    let run = run_script("echo hello   world\t!\n");
    assert_eq!(run.stdout, "hello world !\n");
    assert!(run.stderr.is_empty(), "stderr was: {}", run.stderr);
    assert_eq!(run.code(), Some(0));
}

#[test]
fn test_echo_substitutes_variables() {
    let home = std::env::var("HOME").unwrap_or_default();
    let run = run_script("echo $HOME\necho $SHSH_SURELY_UNSET_VAR\necho done\n");
    assert_eq!(run.stdout, format!("{home}\n\ndone\n"));
}

#[test]
fn test_shell_identity_is_exported() {
    let run = run_script("echo $SHELL\necho $0\nprintenv SHELL\n");
    assert_eq!(run.stdout_lines(), vec!["- SHSH", "- SHSH", "- SHSH"]);
}

#[test]
fn test_cd_changes_directory_for_later_commands() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("inner")).unwrap();
    fs::write(dir.path().join("inner").join("marker"), "").unwrap();
    let expected = dir.path().canonicalize().unwrap().join("inner");

    let run = run_script_in(dir.path(), "cd inner\npwd\nls\n");
    let expected = expected.to_string_lossy().to_string();
    assert_eq!(run.stdout_lines(), vec![expected.as_str(), "marker"]);
}

#[test]
fn test_cd_errors_keep_the_shell_running() {
    let run = run_script("cd\ncd /definitely/not/here\necho still here\n");
    assert!(run.stderr.contains("shsh: expected argument to \"cd\""));
    assert!(run.stderr.contains("/definitely/not/here"));
    assert_eq!(run.stdout, "still here\n");
    assert_eq!(run.code(), Some(0));
}

#[test]
fn test_cat_prints_files_and_stops_at_missing_one() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
    fs::write(dir.path().join("b.txt"), "beta\n").unwrap();

    let run = run_script_in(dir.path(), "cat a.txt b.txt\ncat a.txt missing.txt b.txt\ncat\n");
    assert_eq!(run.stdout, "alpha\nbeta\nalpha\n");
    assert!(run.stderr.contains("shsh: cat: missing.txt: file not found"));
    assert!(run.stderr.contains("shsh: usage: cat filename"));
}

#[test]
fn test_help_lists_builtins() {
    let run = run_script("help\n");
    for name in ["cd", "cat", "echo", "help", "exit", "pwd", "sort"] {
        assert!(
            run.stdout.lines().any(|l| l.trim() == name),
            "{name} missing from: {}",
            run.stdout
        );
    }
}

#[test]
fn test_exit_stops_reading() {
    let run = run_script("echo one\nexit\necho two\n");
    assert_eq!(run.stdout, "one\n");
    assert_eq!(run.code(), Some(0));
}

#[test]
fn test_end_of_input_exits_zero() {
    let run = run_script("false\n");
    assert_eq!(run.code(), Some(0));

    let run = run_script("");
    assert_eq!(run.code(), Some(0));
    assert!(run.stdout.is_empty());
}

#[test]
fn test_sort_arguments() {
    let run = run_script("sort pear apple fig\n");
    assert_eq!(run.stdout, "[1]: apple\n[2]: fig\n[3]: pear\n");
}

#[test]
fn test_sort_reads_rest_of_input() {
    let run = run_script("echo before\nsort\nzeta alpha\nmid\n");
    assert_eq!(run.stdout, "before\n[1]: alpha\n[2]: mid\n[3]: zeta\n");
}

#[test]
fn test_blank_lines_are_ignored() {
    let run = run_script("\n   \n\t\necho ok\n\n");
    assert_eq!(run.stdout, "ok\n");
    assert!(run.stderr.is_empty(), "stderr was: {}", run.stderr);
}

#[test]
fn test_dashed_words_are_operands() {
    let run = run_command("echo -x hello");
    assert_eq!(run.stdout, "-x hello\n");
    assert!(run.stderr.is_empty(), "stderr was: {}", run.stderr);

    let run = run_command("echo --help");
    assert_eq!(run.stdout, "--help\n");

    let run = run_command("sort -3 1 2");
    assert_eq!(run.stdout, "[1]: -3\n[2]: 1\n[3]: 2\n");
}

#[test]
fn test_unknown_program() {
    let run = run_script("surely-no-such-program-xyz arg\necho next\n");
    assert!(run
        .stderr
        .contains("shsh: surely-no-such-program-xyz: command not found"));
    assert_eq!(run.stdout, "next\n");
}

#[test]
fn test_invalid_utf8_line_does_not_end_the_shell() {
    let run = run_script_bytes(b"echo caf\xe9\necho after\n");
    assert_eq!(run.stdout, "caf\u{FFFD}\nafter\n");
    assert_eq!(run.code(), Some(0));
}

#[test]
fn test_sort_accepts_invalid_utf8_input() {
    let run = run_script_bytes(b"sort\nb\n\xff\na\n");
    assert_eq!(run.stdout, "[1]: a\n[2]: b\n[3]: \u{FFFD}\n");
    assert!(run.stderr.is_empty(), "stderr was: {}", run.stderr);
}
