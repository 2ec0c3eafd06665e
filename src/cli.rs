use crate::backend::Profile;
use crate::compiler::{translate_file, CompilerConfig, Translation};
use crate::error::{TranslateError, TranslateResult};
use crate::logging;
use clap::{ArgAction, Parser, ValueEnum};
use colored::*;
use std::fs;
use std::path::PathBuf;

/// canasm - CA source to NASM assembly translator
#[derive(Parser, Debug)]
#[command(name = "canasm")]
#[command(version)]
#[command(about = "Translate CA source into NASM assembly")]
#[command(long_about = r#"
Translate CA source into NASM assembly for one of three runtime targets.

Examples:
  Hosted Linux program linked against libc:
    canasm hello.ca hello.nasm

  BIOS boot-sector program:
    canasm hello.ca hello.nasm --target bare-metal

  Extra library directory and warnings as errors:
    canasm main.ca main.nasm -L vendor/libs --strict
"#)]
pub struct Cli {
    /// CA source file
    pub source: PathBuf,

    /// Assembly file to write
    pub output: PathBuf,

    /// Runtime environment to generate code for
    #[arg(short, long, value_enum)]
    pub target: Option<CliTarget>,

    /// Additional library directory searched by `import` (repeatable)
    #[arg(short = 'L', long = "lib-path", value_name = "DIR")]
    pub lib_paths: Vec<PathBuf>,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More diagnostics (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTarget {
    /// Linux x86-64 linked against libc
    Hosted,
    /// 16-bit BIOS boot sector
    BareMetal,
    /// Linux x86-64 with raw syscalls
    RawSyscall,
}

impl From<CliTarget> for Profile {
    fn from(val: CliTarget) -> Self {
        match val {
            CliTarget::Hosted => Profile::Hosted,
            CliTarget::BareMetal => Profile::BareMetal,
            CliTarget::RawSyscall => Profile::RawSyscall,
        }
    }
}

fn log_status(stage: &str, detail: &str) {
    println!("{:>12} {}", stage.bright_blue().bold(), detail);
}

impl Cli {
    /// Configuration file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> TranslateResult<CompilerConfig> {
        let mut config = match &self.config {
            Some(path) => CompilerConfig::from_json_file(path)?,
            None => CompilerConfig::default(),
        };
        if let Some(target) = self.target {
            config.profile = target.into();
        }
        config.library_paths.extend(self.lib_paths.iter().cloned());
        if self.strict {
            config.strict = true;
        }
        Ok(config)
    }

    pub fn execute(&self) -> Result<(), TranslateError> {
        let config = self.resolve_config()?;
        let chatty = self.verbose > 0 && !self.quiet;

        if chatty {
            log_status("Translating", &format!("{} [{}]", self.source.display(), config.profile));
        }

        let translation = translate_file(&self.source, &config)?;

        for warning in &translation.warnings {
            eprintln!("{}", warning.render());
        }

        // Only a complete translation reaches the disk.
        fs::write(&self.output, &translation.assembly).map_err(|e| TranslateError::io(&self.output, e))?;

        if chatty {
            self.report_stats(&translation, &config);
        }
        if !self.quiet {
            println!("Converted {} to {}", self.source.display(), self.output.display());
        }
        Ok(())
    }

    fn report_stats(&self, translation: &Translation, config: &CompilerConfig) {
        let stats = &translation.stats;
        log_status(
            "Translated",
            &format!(
                "{} source lines -> {} assembly lines ({} variables, {} functions, {} labels, {} imports)",
                stats.source_lines, stats.assembly_lines, stats.variables, stats.functions, stats.labels, stats.imports
            ),
        );
        if !translation.warnings.is_empty() {
            log_status("Warnings", &translation.warnings.len().to_string().yellow().to_string());
        }
        let format = config.profile.backend(config.input_buffer_size).format();
        log_status("Assemble", &format!("nasm -f {} {}", format, self.output.display()));
    }
}

/// Parse CLI arguments and run
pub fn run() -> Result<(), TranslateError> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    cli.execute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn two_positionals_are_required() {
        assert!(Cli::try_parse_from(["canasm", "in.ca"]).is_err());
        assert!(Cli::try_parse_from(["canasm", "in.ca", "out.nasm", "extra"]).is_err());
        let cli = Cli::try_parse_from(["canasm", "in.ca", "out.nasm"]).unwrap();
        assert_eq!(cli.source, Path::new("in.ca"));
        assert_eq!(cli.output, Path::new("out.nasm"));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "canasm",
            "in.ca",
            "out.nasm",
            "--target",
            "bare-metal",
            "-L",
            "vendor",
            "--lib-path",
            "more",
            "--strict",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.profile, Profile::BareMetal);
        assert!(config.strict);
        assert_eq!(
            config.library_paths,
            [PathBuf::from("libs"), PathBuf::from("vendor"), PathBuf::from("more")]
        );
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["canasm", "a", "b", "-q", "-v"]).is_err());
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!(Cli::try_parse_from(["canasm", "a", "b", "--target", "dos"]).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["canasm", "a", "b", "--config", "/nonexistent/canasm.json"]).unwrap();
        assert_eq!(cli.resolve_config().unwrap_err().kind, crate::error::ErrorKind::Io);
    }
}
