use clap::ValueEnum;

/// Application-level constants
pub const APP_NAME: &str = "hadroplan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// OpenAI-compatible inference endpoint of a local serving stack.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// Local serving stacks accept any key; this is the conventional stand-in.
pub const DEFAULT_API_KEY: &str = "sk-local";

pub const DEFAULT_MODEL: &str = "gpt-oss-120b";

/// Per-request timeout. Elicitation calls can carry a long transcript.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_CHECKPOINT_FILE: &str = "state.json";

pub const DEFAULT_OUTPUT_FILE: &str = "hadrons.xml";

pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

/// Whether to reload a prior run's checkpoint before starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResumeMode {
    /// Start fresh; an existing checkpoint is overwritten at first commit.
    #[default]
    Never,
    /// Reload the checkpoint; its absence is a fatal error.
    Always,
    /// Reload the checkpoint when present, start fresh otherwise.
    IfExists,
}

/// Which extraction strategy stages use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StrategyChoice {
    /// Each stage's own default: tool-driven where the stage asks the
    /// user questions mid-extraction, structured otherwise.
    #[default]
    Auto,
    /// Force single-shot structured output for every stage.
    Structured,
    /// Force the tool-call loop for every stage.
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_mode_defaults_to_never() {
        assert_eq!(ResumeMode::default(), ResumeMode::Never);
    }

    #[test]
    fn resume_mode_parses_cli_spellings() {
        assert_eq!(
            ResumeMode::from_str("if-exists", true).unwrap(),
            ResumeMode::IfExists
        );
        assert_eq!(ResumeMode::from_str("always", true).unwrap(), ResumeMode::Always);
        assert!(ResumeMode::from_str("maybe", true).is_err());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
