//! Headless model viewer
//!
//! Mounts a viewer on the software renderer, loads one model file, runs a
//! number of frames and saves the screenshot as `model.png`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use modelview::viewer_core::ViewerConfig;
use modelview::viewer_widget::{ModelViewer, ViewerEvent, ViewerParts};

/// Timestamp step of one display refresh at 60 Hz
const FRAME_MS: f64 = 1000.0 / 60.0;

#[derive(Debug, Parser)]
#[command(name = "modelview")]
#[command(about = "Render a model headlessly and save a screenshot", long_about = None)]
struct CliArgs {
    /// Model file (.glb, .gltf, .fbx, .obj)
    model: PathBuf,

    /// JSON file with viewer properties
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames to render after the model is shown
    #[arg(short, long, default_value_t = 60)]
    frames: u32,

    /// Directory the screenshot is written to
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ViewerConfig::from_json(&json)?
        }
        None => ViewerConfig::default(),
    };
    config.model_url = Some(args.model.display().to_string());
    fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let parts = ViewerParts::headless(&config, &args.out);
    let mut viewer = ModelViewer::new(config, parts, runtime.handle().clone());

    let screenshot = runtime.block_on(async {
        viewer.mount();

        let mut now_ms = 0.0;
        let mut loaded = false;
        while !loaded {
            // nothing to animate until the loader reports back
            if viewer.overlay().visible && !viewer.is_fading() && !viewer.next_load_event().await {
                bail!("load channel closed");
            }
            viewer.advance_frame(now_ms);
            now_ms += FRAME_MS;
            loaded = viewer
                .drain_events()
                .iter()
                .any(|event| matches!(event, ViewerEvent::ModelLoaded { .. }));
        }

        for _ in 0..args.frames {
            viewer.advance_frame(now_ms);
            now_ms += FRAME_MS;
        }
        tracing::info!(
            frames = viewer.renderer().frame_count(),
            "rendered {} after load",
            args.frames
        );
        Ok::<_, anyhow::Error>(viewer.capture_screenshot()?)
    })?;

    if let Some(screenshot) = screenshot {
        println!("{}", args.out.join(&screenshot.file_name).display());
    }
    viewer.unmount();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("modelview").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_apply_without_flags() {
        let args = parse(&["dish.glb"]).unwrap();
        assert_eq!(args.model, PathBuf::from("dish.glb"));
        assert_eq!(args.frames, 60);
        assert_eq!(args.out, PathBuf::from("."));
        assert!(args.config.is_none());
    }

    #[test]
    fn flags_are_read_in_any_order() {
        let args = parse(&["--frames", "5", "soup.obj", "-o", "shots", "--config", "p.json"]).unwrap();
        assert_eq!(args.model, PathBuf::from("soup.obj"));
        assert_eq!(args.frames, 5);
        assert_eq!(args.out, PathBuf::from("shots"));
        assert_eq!(args.config, Some(PathBuf::from("p.json")));
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.glb", "b.glb"]).is_err());
        assert!(parse(&["a.glb", "--frames", "many"]).is_err());
        assert!(parse(&["a.glb", "--verbose"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
