use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ai-etl")]
#[command(about = "ETL runner with LLM-backed enrichment steps")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "ai-etl.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Extract and transform, print the result, skip the load step
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["ai-etl"]);

        assert_eq!(args.config, "ai-etl.toml");
        assert!(!args.verbose);
        assert!(!args.json_logs);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_flags() {
        let args = CliArgs::parse_from(["ai-etl", "-c", "pipeline.toml", "-v", "--json-logs", "--dry-run"]);

        assert_eq!(args.config, "pipeline.toml");
        assert!(args.verbose && args.json_logs && args.dry_run);
    }
}
