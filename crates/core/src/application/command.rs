// Subordinate Command Builder
// Deterministic argv construction from the declared launch options

use crate::application::constants::{DEFAULT_PROGRAM, DEFAULT_PROGRAM_ARGS};
use crate::domain::{SortOptions, ValidationOptions};
use crate::port::CommandSpec;
use std::path::PathBuf;

/// Flags every invocation carries: machine-readable result + progress events
const OUTPUT_FLAGS: [&str; 2] = ["--json", "--progress"];

/// Base invocation of the data tool (`python3 -m ofd` by default)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub base_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            base_args: DEFAULT_PROGRAM_ARGS.iter().map(|s| s.to_string()).collect(),
            working_dir: None,
        }
    }
}

impl ToolCommand {
    pub fn new(
        program: impl Into<String>,
        base_args: Vec<String>,
        working_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            base_args,
            working_dir,
        }
    }

    /// `validate --json --progress [--<scope>]`
    pub fn validation(&self, opts: &ValidationOptions) -> CommandSpec {
        let mut args = vec!["validate".to_string()];
        args.extend(OUTPUT_FLAGS.iter().map(|s| s.to_string()));
        if let Some(flag) = opts.validation_type.flag() {
            args.push(flag.to_string());
        }
        self.spec(args)
    }

    /// `script style_data --json --progress [--dry-run] [--validate] [--fix-indent-only]`
    pub fn sort(&self, opts: &SortOptions) -> CommandSpec {
        let mut args = vec!["script".to_string(), "style_data".to_string()];
        args.extend(OUTPUT_FLAGS.iter().map(|s| s.to_string()));
        if opts.dry_run {
            args.push("--dry-run".to_string());
        }
        if opts.validate {
            args.push("--validate".to_string());
        }
        if opts.fix_indent_only {
            args.push("--fix-indent-only".to_string());
        }
        self.spec(args)
    }

    fn spec(&self, tail: Vec<String>) -> CommandSpec {
        let mut args = self.base_args.clone();
        args.extend(tail);
        CommandSpec {
            program: self.program.clone(),
            args,
            working_dir: self.working_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationType;

    #[test]
    fn test_validation_all() {
        let spec = ToolCommand::default().validation(&ValidationOptions::default());

        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["-m", "ofd", "validate", "--json", "--progress"]);
    }

    #[test]
    fn test_validation_scoped() {
        let opts = ValidationOptions {
            validation_type: ValidationType::Logos,
        };
        let spec = ToolCommand::default().validation(&opts);

        assert_eq!(spec.args.last().map(String::as_str), Some("--logos"));
    }

    #[test]
    fn test_sort_flags() {
        let cmd = ToolCommand::new("ofd", vec![], Some(PathBuf::from("/data")));
        let spec = cmd.sort(&SortOptions {
            dry_run: true,
            validate: true,
            fix_indent_only: false,
        });

        assert_eq!(
            spec.args,
            vec!["script", "style_data", "--json", "--progress", "--dry-run", "--validate"]
        );
        assert_eq!(spec.working_dir, Some(PathBuf::from("/data")));
    }
}
