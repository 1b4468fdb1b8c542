//! Play subcommand handler

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, warn};

use castplay::cli::PlayArgs;
use castplay::player::{play_headless, play_interactive};
use castplay::{
    Config, LiveOptions, Loop, Marker, PlayerEvent, PlayerState, Poster, RecordingOptions,
    RecordingSource, Session, SessionOptions,
};

/// Play a recording or live stream.
///
/// Interactive when both stdin and stdout are terminals, headless otherwise.
#[cfg(not(tarpaulin_include))]
pub async fn handle(args: PlayArgs) -> Result<()> {
    let config = Config::load()?;
    let interactive = atty::is(atty::Stream::Stdout) && atty::is(atty::Stream::Stdin);

    let speed = args.speed.unwrap_or(config.playback.speed);
    if !(speed > 0.0 && speed.is_finite()) {
        bail!("Speed must be a positive number, got {}", speed);
    }

    let poster = args
        .poster
        .as_deref()
        .map(str::parse::<Poster>)
        .transpose()
        .context("Invalid --poster")?;

    let options = SessionOptions {
        speed,
        preload: !args.live,
        poster,
        ..SessionOptions::default()
    };

    let (session, mut events) = if args.live {
        let live = live_options(&args, &config);
        info!(source = %args.live_source(), "following live stream");
        Session::live(args.live_source(), options, live)
    } else {
        let mut recording = recording_options(&args, &config);
        if !interactive && recording.looping != Loop::Off {
            warn!("Looping is ignored without a terminal");
            recording.looping = Loop::Off;
        }
        Session::recording(RecordingSource::File(args.source_spec()), options, recording)
    };

    if !args.live && session.state().await? == PlayerState::Errored {
        let message = startup_error(&mut events);
        session.shutdown().await?;
        bail!("Failed to load {}: {}", args.file, message);
    }

    if interactive {
        let outcome = play_interactive(&session, events, speed, args.paused).await?;
        info!(?outcome, "playback finished");
        session.shutdown().await?;
    } else {
        let lines = tokio::select! {
            lines = play_headless(&session, events) => lines?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                session.lines().await?
            }
        };
        session.shutdown().await?;
        for line in lines {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Command-line flags win over the `[playback]` section.
fn recording_options(args: &PlayArgs, config: &Config) -> RecordingOptions {
    let mut options = config.recording_options();

    if let Some(limit) = args.idle_time_limit {
        options.idle_time_limit = Some(limit);
    }
    if let Some(looping) = args.looping() {
        options.looping = looping;
    }
    options.start_at = args.start_at;
    options.pause_on_markers |= args.pause_on_markers;
    if !args.markers.is_empty() {
        options.markers = Some(args.markers.iter().map(|&time| Marker::at(time)).collect());
    }

    options
}

fn live_options(args: &PlayArgs, config: &Config) -> LiveOptions {
    let mut options = config.live_options();
    if let Some(limit) = args.idle_time_limit {
        options.idle_limit = Some(limit);
    }
    options
}

/// The message of the `Errored` event already queued on `events`.
fn startup_error(events: &mut broadcast::Receiver<PlayerEvent>) -> String {
    loop {
        match events.try_recv() {
            Ok(PlayerEvent::Errored { message }) => {
                return message.unwrap_or_else(|| "unknown error".to_string())
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {
                return "unknown error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castplay::cli::{Cli, Commands};
    use castplay::config::LoopSetting;
    use clap::Parser;

    fn args(extra: &[&str]) -> PlayArgs {
        let cli = Cli::try_parse_from(["castplay", "play", "demo.cast"].iter().chain(extra)).unwrap();
        match cli.command {
            Commands::Play(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.playback.idle_time_limit = Some(5.0);
        config.playback.looping = LoopSetting::Enabled(true);

        let options = recording_options(&args(&["-i", "1.5", "--loop=2", "--marker", "3"]), &config);
        assert_eq!(options.idle_time_limit, Some(1.5));
        assert_eq!(options.looping, Loop::Times(2));
        assert_eq!(options.markers.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn config_applies_without_flags() {
        let mut config = Config::default();
        config.playback.idle_time_limit = Some(5.0);
        config.playback.pause_on_markers = true;

        let options = recording_options(&args(&[]), &config);
        assert_eq!(options.idle_time_limit, Some(5.0));
        assert!(options.pause_on_markers);
        assert_eq!(options.looping, Loop::Off);
        assert!(options.markers.is_none());
    }

    #[test]
    fn live_idle_limit_from_flag() {
        let options = live_options(&args(&["--live", "-i", "2"]), &Config::default());
        assert_eq!(options.idle_limit, Some(2.0));
    }

    #[test]
    fn startup_error_finds_message() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(PlayerEvent::Loading).unwrap();
        tx.send(PlayerEvent::Errored {
            message: Some("no such file".into()),
        })
        .unwrap();

        assert_eq!(startup_error(&mut rx), "no such file");
        assert_eq!(startup_error(&mut rx), "unknown error");
    }
}
