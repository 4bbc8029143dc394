use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use hybrid_upscale::config::UpscaleConfig;
use sr_scale::presets::QualityMode;

/// Upscale an image by any factor from 1x to 6x.
///
/// Registered neural backends run first, then a platform scaler if present,
/// then classical resampling covers whatever scale is left.
#[derive(Parser, Debug)]
#[command(name = "upscale")]
#[command(about = "Upscale an image with tiled multi-backend super-resolution")]
#[command(long_about = "Upscale an image by an arbitrary factor (clamped to 1.0-6.0).
The output size is always round(width*scale) x round(height*scale).")]
struct Args {
    /// Input image path
    #[arg(help = "Input image (any format the image crate decodes)")]
    input: String,

    /// Output image path
    #[arg(short, long, default_value = "upscaled.png",
          help = "Output image path; the extension selects the format")]
    output: String,

    /// Magnification factor
    #[arg(short, long, default_value_t = 2.0,
          help = "Magnification factor, clamped to 1.0-6.0")]
    scale: f64,

    /// Quality mode
    #[arg(short, long, value_enum, default_value_t = QualityMode::Balanced,
          help = "fast (1 run), balanced (restore + 2 TTA runs), ultra (restore + 4 TTA runs)")]
    quality: QualityMode,

    /// Apply an unsharp mask after scaling
    #[arg(long)]
    sharpen: bool,

    /// Engine constants JSON file
    #[arg(long, help = "JSON file overriding tile sizes, pass limits and backend preferences")]
    config: Option<String>,

    /// Register the built-in nearest-neighbor 2x reference model
    #[arg(long)]
    builtin_model: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = UpscaleConfig {
        input: args.input,
        output: args.output,
        scale: args.scale,
        quality: args.quality,
        sharpen: args.sharpen,
        engine_config: args.config,
        builtin_model: args.builtin_model,
    };

    let output = hybrid_upscale::upscale_file(&config).await?;
    let size = output.size();
    println!("Wrote {} ({}x{})", config.output, size.w, size.h);
    println!("Pipeline: {}", output.trace);
    if let Some(models) = output.model_summary() {
        println!(
            "Models: {} ({} inference passes)",
            models,
            output.inference_pass_count()
        );
    }
    Ok(())
}

fn init_tracing() {
    let ansi_enabled = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(ansi_enabled)
        .init();
}
