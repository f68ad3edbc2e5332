//! Integration tests for CLI argument handling
//!
//! Tests flag parsing and configuration resolution from the command line.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_coinscout"))
        .args(args)
        .output()
        .expect("Failed to execute coinscout")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("coinscout"), "Help should mention coinscout");
    assert!(stdout.contains("--port"), "Help should mention --port flag");
    assert!(stdout.contains("--ttl-secs"), "Help should mention --ttl-secs flag");
}

#[test]
fn test_version_flag_exits_successfully() {
    let output = run_cli(&["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("coinscout"));
}

#[test]
fn test_invalid_port_prints_error_and_exits() {
    let output = run_cli(&["--port", "notaport"]);
    assert!(!output.status.success(), "Expected invalid port to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid") || stderr.contains("Invalid"),
        "Should print error message about the invalid port: {}",
        stderr
    );
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for configuration that don't require running the binary

    use clap::Parser;
    use coinscout::cli::{Cli, Config};

    #[test]
    fn test_cli_defaults_match_reference_service() {
        let cli = Cli::parse_from(["coinscout"]);
        assert_eq!(cli.port, 5000);
        assert_eq!(cli.ttl_secs, 300);
    }

    #[test]
    fn test_config_resolution_with_explicit_paths() {
        let cli = Cli::parse_from([
            "coinscout",
            "--cache-file",
            "/tmp/cache.json",
            "--history-db",
            "/tmp/history.db",
        ]);
        let config = Config::from_cli(&cli).expect("Explicit paths should always resolve");
        assert_eq!(config.cache_file.to_string_lossy(), "/tmp/cache.json");
        assert_eq!(config.history_db.to_string_lossy(), "/tmp/history.db");
    }
}
