// Minimal smoke run of the two-stage pipeline on synthetic frames, no ffmpeg needed

use rand::{rngs::SmallRng, Rng, SeedableRng};

use frame_enhancer::{
    config::PipelineConfig,
    pipeline::{CancellationToken, Pipeline},
    transforms::TransformRegistry,
    video::{Frame, FrameStore, WindowBuilder},
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const FRAMES: usize = 12;

fn noisy_frame(index: usize, rng: &mut SmallRng) -> Result<Frame, Box<dyn std::error::Error>> {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 3) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let base = [(x * 4) as i32, (y * 5) as i32, 128];
            for value in base {
                data.push((value + rng.gen_range(-12..=12)).clamp(0, 255) as u8);
            }
        }
    }
    Ok(Frame::from_rgb_bytes(index, WIDTH, HEIGHT, data)?)
}

fn mean_noise(frame: &Frame) -> f64 {
    let mut total = 0.0;
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            let [r, g, b] = frame.get_pixel(x, y);
            let scale = frame.width() / WIDTH;
            let expected = [((x / scale) * 4) as f64, ((y / scale) * 5) as f64, 128.0];
            total += (r as f64 - expected[0]).abs() + (g as f64 - expected[1]).abs() + (b as f64 - expected[2]).abs();
        }
    }
    total / (frame.width() * frame.height() * 3) as f64
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎬 Testing Frame-Enhancer Core Functionality");

    // Test 1: Transform Registry
    println!("\n1. Testing Transform Registry...");
    let registry = TransformRegistry::new();
    println!("   Available kinds: {:?}", registry.available_kinds());

    // Test 2: Synthetic frames
    println!("\n2. Generating {} noisy {}x{} frames...", FRAMES, WIDTH, HEIGHT);
    let mut rng = SmallRng::seed_from_u64(7);
    let frames = (0..FRAMES)
        .map(|i| noisy_frame(i, &mut rng))
        .collect::<Result<Vec<_>, _>>()?;
    let store = FrameStore::new(frames, 24.0)?;

    // Test 3: Reflection windows
    println!("\n3. Testing reflection windows...");
    for center in [0, 1, FRAMES - 1] {
        let window = WindowBuilder::build(&store, center, 2)?;
        println!("   center {:>2}: {:?}", center, window.indices());
    }

    // Test 4: Pipeline
    println!("\n4. Running denoise -> upscale...");
    let config = PipelineConfig::default();
    let pipeline = Pipeline::from_config(&config, &registry, CancellationToken::new())?;
    for stage in pipeline.stages() {
        let transform = stage.transform();
        let metadata = transform.metadata();
        println!("   Stage '{}': {}", stage.name(), transform.description());
        println!(
            "      fallback: {}, backend: {}, cost: {:.1}",
            metadata.fallback, metadata.uses_backend, metadata.performance_impact
        );
        for (parameter, description) in &metadata.optional_parameters {
            println!("      {} - {}", parameter, description);
        }
    }
    let output = pipeline.run(store.clone())?;

    let first_out = output.store.get(FRAMES / 2).ok_or("missing output frame")?;
    println!("   Frames: {} -> {}", store.len(), output.store.len());
    println!("   Resolution: {:?} -> {:?}", store.resolution(), output.store.resolution());
    println!("   Frame rate: {} -> {}", store.frame_rate(), output.store.frame_rate());
    println!("   Fallback events: {}", output.fallback_events.len());
    println!(
        "   Mean noise at centre frame: {:.2} -> {:.2}",
        mean_noise(&store.frames()[FRAMES / 2]),
        mean_noise(first_out)
    );

    match first_out.save_png("minimal_enhanced_output.png") {
        Ok(()) => println!("   📁 Output saved to: minimal_enhanced_output.png"),
        Err(e) => println!("   ⚠️  Could not save file: {}", e),
    }

    if output.store.len() != store.len() {
        return Err("frame count changed".into());
    }

    println!("\n🎉 All checks passed! Frame-Enhancer core is working.");
    Ok(())
}
