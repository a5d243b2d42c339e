//! Renderer and encoder command construction.

use std::path::{Path, PathBuf};

use histweave_model::options::SinkConfig;

/// Frame rate the renderer emits to the encoder.
pub const ENCODER_INPUT_FPS: u32 = 60;

/// A program and its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Subprocess chain for a rendering sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPlan {
    /// Reads events on stdin.
    pub renderer: CommandSpec,

    /// Reads the renderer's stdout when an output file is configured.
    pub encoder: Option<CommandSpec>,
}

impl ProcessPlan {
    /// Plan for `config`, or `None` when rendering is disabled.
    pub fn from_config(config: &SinkConfig) -> Option<Self> {
        if !config.gource {
            return None;
        }
        Some(Self {
            renderer: renderer_command(&config.gource_arguments, config.output.is_some()),
            encoder: config
                .output
                .as_deref()
                .map(|output| encoder_command(&config.ffmpeg_arguments, output)),
        })
    }
}

/// Which kind of sink a config selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Stdout,
    File,
    Renderer,
    RendererWithEncoder,
}

impl SinkKind {
    pub fn for_config(config: &SinkConfig) -> Self {
        match (config.gource, config.output.is_some()) {
            (false, false) => Self::Stdout,
            (false, true) => Self::File,
            (true, false) => Self::Renderer,
            (true, true) => Self::RendererWithEncoder,
        }
    }
}

fn renderer_command(extra: &[String], to_stdout: bool) -> CommandSpec {
    let cmd = CommandSpec::new("gource")
        .args(["--log-format", "custom", "--path", "-"])
        .args(extra.iter().cloned());
    if to_stdout {
        cmd.args(["-o", "-"])
    } else {
        cmd
    }
}

fn encoder_command(extra: &[String], output: &Path) -> CommandSpec {
    CommandSpec::new("ffmpeg")
        .arg("-r")
        .arg(ENCODER_INPUT_FPS.to_string())
        .args(["-f", "image2pipe", "-vcodec", "ppm", "-i", "-"])
        .args(extra.iter().cloned())
        .arg("-y")
        .arg(output.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_sinks_have_no_plan() {
        assert_eq!(ProcessPlan::from_config(&SinkConfig::stdout()), None);
        assert_eq!(ProcessPlan::from_config(&SinkConfig::text_file("/tmp/x.log")), None);
    }

    #[test]
    fn test_interactive_renderer_args() {
        let config = SinkConfig {
            gource_arguments: vec!["--seconds-per-day".into(), "0.1".into()],
            ..SinkConfig::default()
        };
        let plan = ProcessPlan::from_config(&config).unwrap();
        assert_eq!(plan.renderer.program, PathBuf::from("gource"));
        assert_eq!(
            plan.renderer.args,
            vec!["--log-format", "custom", "--path", "-", "--seconds-per-day", "0.1"]
        );
        assert_eq!(plan.encoder, None);
    }

    #[test]
    fn test_encoder_chain_args() {
        let config = SinkConfig {
            output: Some(PathBuf::from("/videos/out.mp4")),
            ffmpeg_arguments: vec!["-vcodec".into(), "libx264".into()],
            ..SinkConfig::default()
        };
        let plan = ProcessPlan::from_config(&config).unwrap();
        assert_eq!(
            plan.renderer.args,
            vec!["--log-format", "custom", "--path", "-", "-o", "-"]
        );

        let encoder = plan.encoder.unwrap();
        assert_eq!(encoder.program, PathBuf::from("ffmpeg"));
        assert_eq!(
            encoder.args,
            vec![
                "-r", "60", "-f", "image2pipe", "-vcodec", "ppm", "-i", "-", "-vcodec", "libx264",
                "-y", "/videos/out.mp4"
            ]
        );
    }

    #[test]
    fn test_sink_kind_selection() {
        assert_eq!(SinkKind::for_config(&SinkConfig::stdout()), SinkKind::Stdout);
        assert_eq!(
            SinkKind::for_config(&SinkConfig::text_file("a.log")),
            SinkKind::File
        );
        assert_eq!(SinkKind::for_config(&SinkConfig::default()), SinkKind::Renderer);
        let config = SinkConfig {
            output: Some(PathBuf::from("a.mp4")),
            ..SinkConfig::default()
        };
        assert_eq!(SinkKind::for_config(&config), SinkKind::RendererWithEncoder);
    }
}
