use clap::Parser;

/// Command-line surface for the demo binary (spec.md Non-goals: "CLI/config
/// loading" belongs to the excluded shell; this only configures the thin
/// binary standing in for it, per SPEC_FULL.md §B "Configuration").
#[derive(Parser, Debug)]
#[command(name = "llmrelay")]
pub struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Path to a JSON file holding the demo `Group` set (an array of
    /// `llmrelay_protocol::Group`). Reloaded on every request in the demo
    /// store, so editing it exercises `IsConfigStale`/rebuild without
    /// restarting the process.
    #[arg(long, default_value = "groups.json")]
    pub groups_file: String,
}
