// Still-image runner for the color half of the engine: sample one or more points
// from an image, exactly as a drag across the live preview would, and write the
// highlighted result.
//
// Usage: blob_vision <input_image> <output_png> <x,y> [<x,y> ...]
// Set BLOB_VISION_CONFIG to a TOML file to override the defaults.

use anyhow::{Context, Result, bail};
use blob_vision::core_modules::mask_engine::mask_engine;
use blob_vision::core_modules::point_sampler::PointSampler;
use blob_vision::core_modules::utils::image_helper::image_helper;
use blob_vision::{ColorPredicate, Frame, PipelineConfig, SurfaceRect};
use log::info;
use std::env;

fn parse_point(token: &str) -> Result<(f64, f64)> {
    let (x, y) = token.split_once(',').with_context(|| format!("expected x,y but got '{token}'"))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        bail!("Usage: blob_vision <input_image> <output_png> <x,y> [<x,y> ...]");
    }

    let config = match env::var("BLOB_VISION_CONFIG") {
        Ok(path) => PipelineConfig::load(&path)?,
        Err(_) => PipelineConfig::default(),
    };

    let image = image_helper::load(&args[1]).with_context(|| format!("cannot open {}", args[1]))?;
    let frame = Frame::from(&image);
    let size = (frame.width, frame.height);
    // The image is shown 1:1, so device coordinates are buffer coordinates.
    let surface = SurfaceRect::from_size(frame.width as f64, frame.height as f64);

    let mut sampler = PointSampler::new(config.mirrored);
    sampler.on_drag_start();
    for token in &args[3..] {
        let (x, y) = parse_point(token)?;
        sampler.on_drag_move(x, y, surface, size);
    }
    sampler.on_drag_end();

    let mut predicate = ColorPredicate::reset();
    let samples = sampler.drain_into(&frame, &mut predicate);
    info!("applied {} sample(s), discarded {}", samples.applied, samples.discarded);
    info!("predicate: {:?}", predicate);

    let rendered = mask_engine::render(&frame, &predicate, config.mask_options(), config.composite_options())?;
    image_helper::save(&args[2], rendered.image.width(), rendered.image.height(), rendered.image.as_raw())
        .with_context(|| format!("cannot write {}", args[2]))?;

    println!(
        "{} of {} pixels matched; output saved to {}",
        rendered.matched_pixels,
        frame.width as usize * frame.height as usize,
        args[2]
    );
    Ok(())
}
