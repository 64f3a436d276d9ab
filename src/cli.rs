//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Participation Checker - Canvas participation and delivery reports
///
/// Fetches student enrollments (and optionally assignment submissions) for
/// one or more Canvas courses and exports one sheet per course plus a
/// cross-course summary.
///
/// Examples:
///   participation --course 12345
///   participation --course 12345,67890 --assignments
///   participation -c 12345 -c 67890 -a --format markdown -o reporte.md
///   participation --course 12345 --non-participants-only
///   participation --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Canvas course ids to report on
    ///
    /// Repeat the flag or separate ids with commas. Order is preserved in
    /// the workbook and in the summary columns.
    #[arg(
        short = 'c',
        long = "course",
        value_name = "ID",
        value_delimiter = ',',
        required_unless_present = "init_config"
    )]
    pub courses: Vec<String>,

    /// Add one delivery column per assignment
    ///
    /// Self-assessments are left out.
    #[arg(short, long)]
    pub assignments: bool,

    /// Add the "Resumen" sheet even for a single course
    #[arg(short, long)]
    pub summary: bool,

    /// Only list students without any activity on course sheets
    #[arg(long)]
    pub non_participants_only: bool,

    /// Canvas API root URL
    #[arg(long, value_name = "URL", env = "CANVAS_BASE_URL")]
    pub base_url: Option<String>,

    /// Canvas API access token
    #[arg(long, value_name = "TOKEN", env = "CANVAS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Records requested per page
    #[arg(long, value_name = "COUNT")]
    pub per_page: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of courses (and submission lists) fetched concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Output file path for the report
    ///
    /// Defaults to participacion_curso_id_<ids>.<ext>
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (xlsx, json, markdown)
    #[arg(long, default_value = "xlsx", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .participation.toml in the current directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .participation.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Excel workbook (default)
    #[default]
    Xlsx,
    /// JSON dump of the report layout
    Json,
    /// Markdown tables
    Markdown,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.course_ids().is_empty() {
            return Err("At least one course id is required".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.per_page == Some(0) {
            return Err("Per-page count must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Trimmed, non-empty course ids in the order given.
    pub fn course_ids(&self) -> Vec<String> {
        self.courses
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }

    /// Default report file name for the requested courses.
    pub fn default_output(&self) -> PathBuf {
        PathBuf::from(format!(
            "participacion_curso_id_{}.{}",
            self.course_ids().join("_"),
            self.format.extension()
        ))
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            courses: vec!["12345".to_string()],
            assignments: false,
            summary: false,
            non_participants_only: false,
            base_url: None,
            token: None,
            per_page: None,
            timeout: None,
            concurrency: None,
            output: None,
            format: OutputFormat::Xlsx,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_comma_separated_courses() {
        let args = Args::try_parse_from(["participation", "-c", "1,2", "--course", "3", "-a"])
            .unwrap();
        assert_eq!(args.courses, vec!["1", "2", "3"]);
        assert!(args.assignments);
        assert_eq!(args.format, OutputFormat::Xlsx);
    }

    #[test]
    fn test_course_required_unless_init_config() {
        assert!(Args::try_parse_from(["participation"]).is_err());
        assert!(Args::try_parse_from(["participation", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.base_url = Some("canvas.example.edu".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_blank_courses() {
        let mut args = make_args();
        args.courses = vec![" ".to_string()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_default_output_name() {
        let mut args = make_args();
        args.courses = vec!["1".to_string(), " 2".to_string()];
        assert_eq!(
            args.default_output(),
            PathBuf::from("participacion_curso_id_1_2.xlsx")
        );

        args.format = OutputFormat::Markdown;
        assert_eq!(
            args.default_output(),
            PathBuf::from("participacion_curso_id_1_2.md")
        );
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
