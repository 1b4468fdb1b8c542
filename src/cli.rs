//! Command-line interface definition.
//!
//! Lives in the library so `xtask` can render man pages from it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::driver::{parse_npt, LiveSource, Loop};
use crate::recording::{Format, SourceSpec};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("CASTPLAY_BUILD_DATE"), ")");

/// Git revision the binary was built from, if known.
pub fn git_sha() -> &'static str {
    option_env!("VERGEN_GIT_SHA").unwrap_or("release")
}

#[derive(Parser, Debug)]
#[command(
    name = "castplay",
    version,
    long_version = LONG_VERSION,
    about = "Replay terminal session recordings",
    long_about = "Replays asciicast (v1, v2, v3), ttyrec and script(1) typescript recordings \
                  in the terminal, or follows a live asciicast stream.\n\n\
                  Set CASTPLAY_LOG (e.g. CASTPLAY_LOG=debug) for diagnostics on stderr."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a recording or a live stream
    #[command(long_about = "Play a recording in the terminal.\n\n\
                            Keys: space pause/resume, . step, ←/→ seek 5s, \
                            shift+←/→ seek 10%, [/] previous/next marker, 0-9 jump to 0-90%, q quit.\n\n\
                            Without a TTY on stdout the recording is played headless and the \
                            final screen is printed.")]
    Play(PlayArgs),

    /// Show recording metadata
    Info {
        /// Recording file
        file: PathBuf,

        /// Recording format (detected from the file name by default)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Timing file for typescript recordings
        #[arg(long)]
        timing: Option<PathBuf>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Recording file; with --live also `-` for stdin or `tcp://HOST:PORT`
    pub file: String,

    /// Playback speed multiplier
    #[arg(short, long)]
    pub speed: Option<f64>,

    /// Cap pauses between events at this many seconds
    #[arg(short, long)]
    pub idle_time_limit: Option<f64>,

    /// Loop playback; forever without a value, else N passes
    #[arg(short = 'l', long = "loop", value_name = "N", num_args = 0..=1)]
    pub looping: Option<Option<u32>>,

    /// Start at this time (ss, mm:ss or hh:mm:ss)
    #[arg(long, value_parser = parse_time_arg)]
    pub start_at: Option<f64>,

    /// Pause when a marker is reached
    #[arg(long)]
    pub pause_on_markers: bool,

    /// Use these marker times instead of the recording's own (repeatable)
    #[arg(long = "marker", value_name = "TIME", value_parser = parse_time_arg)]
    pub markers: Vec<f64>,

    /// Recording format (detected from the file name by default)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Timing file for typescript recordings (implies --format typescript)
    #[arg(long)]
    pub timing: Option<PathBuf>,

    /// Separate input log for typescript recordings
    #[arg(long)]
    pub input_log: Option<PathBuf>,

    /// Follow a live asciicast stream instead of a finished recording
    #[arg(long)]
    pub live: bool,

    /// Poster shown before playback: `npt:TIME` or `data:text/plain,TEXT`
    #[arg(long)]
    pub poster: Option<String>,

    /// Don't start playing until a key is pressed
    #[arg(long)]
    pub paused: bool,
}

impl PlayArgs {
    pub fn source_spec(&self) -> SourceSpec {
        SourceSpec {
            path: PathBuf::from(&self.file),
            format: self.format.map(Format::from),
            timing: self.timing.clone(),
            input: self.input_log.clone(),
        }
    }

    pub fn live_source(&self) -> LiveSource {
        if self.file == "-" {
            LiveSource::Stdin
        } else if let Some(addr) = self.file.strip_prefix("tcp://") {
            LiveSource::Tcp(addr.to_string())
        } else {
            LiveSource::File(PathBuf::from(&self.file))
        }
    }

    /// `None` when the flag was not given.
    pub fn looping(&self) -> Option<Loop> {
        self.looping.map(|times| match times {
            None => Loop::Forever,
            Some(0) => Loop::Off,
            Some(n) => Loop::Times(n),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Asciicast,
    Ttyrec,
    Typescript,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Asciicast => Format::Asciicast,
            FormatArg::Ttyrec => Format::Ttyrec,
            FormatArg::Typescript => Format::Typescript,
        }
    }
}

fn parse_time_arg(s: &str) -> Result<f64, String> {
    parse_npt(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn play(args: &[&str]) -> PlayArgs {
        let cli = Cli::try_parse_from(["castplay", "play"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Play(args) => args,
            other => panic!("expected play, got {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn loop_flag_forms() {
        assert_eq!(play(&["demo.cast"]).looping(), None);
        assert_eq!(play(&["demo.cast", "--loop"]).looping(), Some(Loop::Forever));
        assert_eq!(play(&["demo.cast", "--loop=3"]).looping(), Some(Loop::Times(3)));
    }

    #[test]
    fn times_accept_npt() {
        let args = play(&["demo.cast", "--start-at", "1:30", "--marker", "5", "--marker", "0:10"]);
        assert_eq!(args.start_at, Some(90.0));
        assert_eq!(args.markers, vec![5.0, 10.0]);
        assert!(Cli::try_parse_from(["castplay", "play", "x.cast", "--start-at", "soon"]).is_err());
    }

    #[test]
    fn live_sources() {
        assert!(matches!(play(&["-", "--live"]).live_source(), LiveSource::Stdin));
        assert!(matches!(
            play(&["tcp://localhost:9000", "--live"]).live_source(),
            LiveSource::Tcp(addr) if addr == "localhost:9000"
        ));
        assert!(matches!(play(&["stream.cast"]).live_source(), LiveSource::File(_)));
    }

    #[test]
    fn timing_flag_implies_typescript() {
        let args = play(&["typescript", "--timing", "timing.log"]);
        assert_eq!(args.source_spec().format(), Format::Typescript);
    }
}
