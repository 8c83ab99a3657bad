use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "SF_HOST",
        "SF_PORT",
        "SF_RUN_MIGRATIONS",
        "SF_POLL_INTERVAL",
        "SF_REDIRECT_DELAY_MS",
        "SF_MAX_SYNC_FAILURES",
        "SF_PAYMENT_SESSION_TIMEOUT",
        "SF_EXPIRY_SWEEP_INTERVAL",
        "SF_SESSION_RETENTION",
        "SF_TAX_RATE_BPS",
        "SF_FREE_SHIPPING_THRESHOLD",
        "SF_FLAT_SHIPPING_COST",
        "SF_CURRENCY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
