use std::{env, env::VarError};

/// The server has no real CLI. Any argument at all prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "ZPG_HOST",
        "ZPG_PORT",
        "ZPG_DATABASE_URL",
        "ZPG_MAILBOX_PATH",
        "ZPG_POLL_INTERVAL",
        "ZPG_POLL_LOOKBACK_DAYS",
        "ZPG_MANUAL_SCAN_DAYS",
        "ZPG_POLLER_AUTOSTART",
        "ZPG_POLLER_INITIAL_DELAY",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
