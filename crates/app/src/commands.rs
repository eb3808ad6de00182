use anyhow::{bail, Context, Result};
use soundcloudify_core::{artwork_url, PlayerConfig, Track};
use soundcloudify_player::PlayerController;
use std::io::Write;

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Play(usize),
    Pause,
    Resume,
    Toggle(Option<usize>),
    Stop,
    Next,
    Prev,
    Seek(f64),
    Volume(f64),
    Repeat,
    Shuffle,
    Remove(usize),
    Clear,
    Add(Box<Track>),
    PlayNext(Box<Track>),
    PlayAll(Vec<Track>),
    List,
    State,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

const HELP: &str = "\
commands:
  play [i]          play entry i (default 0)
  pause | resume    pause or resume the current entry
  toggle [i]        play/pause, or switch to entry i
  stop              mark playback stopped
  next | prev       ask the background player to advance
  seek <0..1>       jump to a fraction of the track
  vol <0..1>        set the volume
  repeat | shuffle  cycle repeat mode, flip shuffle
  remove <i>        remove entry i
  clear             empty the playlist
  add <json>        add a track and play it
  next-up <json>    queue a track after the current one
  play-all <json>   replace the playlist with a JSON array of tracks
  list | state      show the playlist or the playback state
  quit";

impl UiCommand {
    /// `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "play" => UiCommand::Play(optional_index(rest)?.unwrap_or(0)),
            "pause" => UiCommand::Pause,
            "resume" => UiCommand::Resume,
            "toggle" => UiCommand::Toggle(optional_index(rest)?),
            "stop" => UiCommand::Stop,
            "next" => UiCommand::Next,
            "prev" | "previous" => UiCommand::Prev,
            "seek" => UiCommand::Seek(fraction(rest, "seek")?),
            "vol" | "volume" => UiCommand::Volume(fraction(rest, "vol")?),
            "repeat" => UiCommand::Repeat,
            "shuffle" => UiCommand::Shuffle,
            "remove" | "rm" => match optional_index(rest)? {
                Some(index) => UiCommand::Remove(index),
                None => bail!("remove needs an index"),
            },
            "clear" => UiCommand::Clear,
            "add" => UiCommand::Add(Box::new(track_json(rest)?)),
            "next-up" => UiCommand::PlayNext(Box::new(track_json(rest)?)),
            "play-all" => UiCommand::PlayAll(
                serde_json::from_str(rest).context("play-all expects a JSON array of tracks")?,
            ),
            "list" | "ls" => UiCommand::List,
            "state" => UiCommand::State,
            "help" | "?" => UiCommand::Help,
            "quit" | "exit" => UiCommand::Quit,
            other => bail!("unknown command {other:?}; try help"),
        };
        Ok(Some(command))
    }
}

fn optional_index(arg: &str) -> Result<Option<usize>> {
    if arg.is_empty() {
        return Ok(None);
    }
    arg.parse()
        .map(Some)
        .with_context(|| format!("{arg:?} is not a playlist index"))
}

fn fraction(arg: &str, what: &str) -> Result<f64> {
    let value: f64 = arg
        .parse()
        .with_context(|| format!("{what} expects a number between 0 and 1"))?;
    if !(0.0..=1.0).contains(&value) {
        bail!("{what} expects a number between 0 and 1, got {value}");
    }
    Ok(value)
}

fn track_json(arg: &str) -> Result<Track> {
    if arg.is_empty() {
        bail!("expected a track as JSON, e.g. {{\"id\": 1, \"title\": \"...\"}}");
    }
    serde_json::from_str(arg).context("not a valid track")
}

pub fn execute(
    player: &mut PlayerController,
    command: UiCommand,
    cfg: &PlayerConfig,
    out: &mut impl Write,
) -> Result<Outcome> {
    match command {
        UiCommand::Play(index) => player.play(index)?,
        UiCommand::Pause => player.pause(),
        UiCommand::Resume => player.resume(),
        UiCommand::Toggle(index) => player.play_pause(index)?,
        UiCommand::Stop => player.stop(),
        UiCommand::Next => player.next(),
        UiCommand::Prev => player.previous(),
        UiCommand::Seek(xpos) => player.seek(xpos),
        UiCommand::Volume(volume) => player.set_volume(volume),
        UiCommand::Repeat => {
            let mode = player.toggle_repeat();
            writeln!(out, "repeat: {}", mode.as_str())?;
        }
        UiCommand::Shuffle => {
            let on = player.toggle_shuffle();
            writeln!(out, "shuffle: {}", if on { "on" } else { "off" })?;
        }
        UiCommand::Remove(index) => player.remove(index),
        UiCommand::Clear => player.clear(),
        UiCommand::Add(track) => player.add(&track, true),
        UiCommand::PlayNext(track) => player.play_next(&track),
        UiCommand::PlayAll(tracks) => player.play_all(tracks)?,
        UiCommand::List => write_list(player, cfg, out)?,
        UiCommand::State => write_state(player, out)?,
        UiCommand::Help => writeln!(out, "{HELP}")?,
        UiCommand::Quit => return Ok(Outcome::Quit),
    }
    Ok(Outcome::Continue)
}

fn write_list(player: &PlayerController, cfg: &PlayerConfig, out: &mut impl Write) -> Result<()> {
    let state = player.state();
    if player.tracks().is_empty() {
        writeln!(out, "playlist is empty")?;
        return Ok(());
    }
    for (index, track) in player.tracks().iter().enumerate() {
        let marker = match &state.current_track {
            Some(current) if index == state.current_index && current.same_entry(track) => {
                if state.playing {
                    ">"
                } else {
                    "="
                }
            }
            _ => " ",
        };
        writeln!(
            out,
            "{marker} {index:>3}  {}{}  {}",
            track.title,
            if track.error { " (error)" } else { "" },
            artwork_url(track.artwork_url.as_deref(), &cfg.artwork_placeholder),
        )?;
    }
    Ok(())
}

fn write_state(player: &PlayerController, out: &mut impl Write) -> Result<()> {
    let state = player.state();
    let title = state
        .current_track
        .as_ref()
        .map(|t| t.title.as_str())
        .unwrap_or("<none>");
    writeln!(
        out,
        "{} [{}] {}  {:.1}/{:.1}s  volume {:.2}  repeat {}  shuffle {}",
        if state.playing { "playing" } else { "paused" },
        state.current_index,
        title,
        state.current_time,
        state.duration,
        state.volume,
        state.repeat.as_str(),
        if state.shuffle { "on" } else { "off" },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{execute, Outcome, UiCommand};
    use soundcloudify_channel::Command;
    use soundcloudify_core::{PlaybackState, PlayerConfig, RemoteId, Track};
    use soundcloudify_player::PlayerController;
    use soundcloudify_store::{Persistence, Session};
    use tokio::sync::mpsc;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(UiCommand::parse("  ").unwrap(), None);
        assert_eq!(UiCommand::parse("play").unwrap(), Some(UiCommand::Play(0)));
        assert_eq!(UiCommand::parse("play 3").unwrap(), Some(UiCommand::Play(3)));
        assert_eq!(UiCommand::parse("toggle").unwrap(), Some(UiCommand::Toggle(None)));
        assert_eq!(
            UiCommand::parse("vol 0.25").unwrap(),
            Some(UiCommand::Volume(0.25))
        );
        assert_eq!(UiCommand::parse("rm 1").unwrap(), Some(UiCommand::Remove(1)));

        let Some(UiCommand::Add(track)) =
            UiCommand::parse(r#"add {"id": 5, "title": "Five"}"#).unwrap()
        else {
            panic!("expected add");
        };
        assert_eq!(track.id, RemoteId::Num(5));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(UiCommand::parse("seek 1.5").is_err());
        assert!(UiCommand::parse("vol loud").is_err());
        assert!(UiCommand::parse("remove").is_err());
        assert!(UiCommand::parse("play -1").is_err());
        assert!(UiCommand::parse("add {oops").is_err());
        assert!(UiCommand::parse("dance").is_err());
    }

    #[test]
    fn executes_against_the_player() {
        let (command_tx, mut commands) = mpsc::unbounded_channel::<Command>();
        let (persistence, _saves) = Persistence::channel();
        let mut player = PlayerController::new(
            Session {
                tracks: Vec::new(),
                state: PlaybackState::default(),
            },
            command_tx,
            persistence,
        );
        let cfg = PlayerConfig::default();
        let mut out = Vec::new();

        let add = UiCommand::Add(Box::new(Track::new(1, "First")));
        assert_eq!(
            execute(&mut player, add, &cfg, &mut out).unwrap(),
            Outcome::Continue
        );
        assert!(matches!(commands.try_recv(), Ok(Command::Play { .. })));

        execute(&mut player, UiCommand::List, &cfg, &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains(">   0  First  images/artwork-default.jpg"));

        assert!(execute(&mut player, UiCommand::Play(4), &cfg, &mut out).is_err());
        assert_eq!(
            execute(&mut player, UiCommand::Quit, &cfg, &mut out).unwrap(),
            Outcome::Quit
        );
    }
}
