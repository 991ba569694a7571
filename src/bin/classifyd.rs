//! classifyd - live classification daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by LIVE_CLASSIFY_CONFIG, then env overrides)
//! 2. Builds the classifier (failure here is fatal; nothing is classified)
//! 3. Configures the stream geometry and orientation once
//! 4. Delivers frames from producer threads into the single-flight pipeline
//! 5. Prints published recognitions on the main thread
//! 6. On Ctrl-C or timeout, stops producers and shuts the pipeline down

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use live_classify::config::ClassifydConfig;
use live_classify::ingest::SourceStats;
use live_classify::{
    format_recognitions, FramePipeline, LatestSink, StubClassifier, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run for this many seconds (0 runs until interrupted).
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Override the configured frame rate.
    #[arg(long)]
    fps: Option<u32>,
    /// Artificial classifier latency. The gate only drops frames when several
    /// producers deliver concurrently, so pair this with `--producers 2` or more.
    #[arg(long, default_value_t = 0)]
    classify_delay_ms: u64,
    /// Number of threads delivering frames concurrently.
    #[arg(long, default_value_t = 1)]
    producers: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ClassifydConfig::load()?;
    if let Some(fps) = args.fps {
        if fps == 0 {
            bail!("fps must be >= 1");
        }
        cfg.source.target_fps = fps;
    }
    if args.producers == 0 {
        bail!("producers must be >= 1");
    }

    let classifier = match StubClassifier::new(cfg.classifier.input_size) {
        Ok(classifier) => classifier
            .with_top_k(cfg.classifier.top_k)
            .with_delay(Duration::from_millis(args.classify_delay_ms)),
        Err(e) => {
            log::error!("failed to initialise classifier: {:#}", e);
            return Err(e);
        }
    };
    let (sink, results) = LatestSink::new();
    let pipeline = Arc::new(FramePipeline::new(Box::new(classifier), Arc::new(sink))?);
    pipeline.on_stream_configured(
        cfg.source.width,
        cfg.source.height,
        cfg.orientation.sensor_degrees,
        cfg.orientation.screen_degrees,
    )?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let frame_interval = Duration::from_secs(1) / cfg.source.target_fps;
    let mut producers: Vec<JoinHandle<SourceStats>> = Vec::with_capacity(args.producers);
    for _ in 0..args.producers {
        let mut source = SyntheticSource::new(cfg.source.clone())?;
        source.connect()?;
        let pipeline = Arc::clone(&pipeline);
        let running = Arc::clone(&running);
        producers.push(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                pipeline.on_frame_available(&mut source);
                std::thread::sleep(frame_interval);
            }
            source.stats()
        }));
    }

    log::info!(
        "classifyd running: source={} {}x{} @ {} fps, {} producer(s)",
        cfg.source.url,
        cfg.source.width,
        cfg.source.height,
        cfg.source.target_fps,
        args.producers
    );

    let started = Instant::now();
    let deadline = (args.seconds > 0).then(|| Duration::from_secs(args.seconds));
    let mut last_health_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        match results.recv_timeout(Duration::from_millis(100)) {
            Ok(recognitions) => println!("{}", format_recognitions(&recognitions)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            running.store(false, Ordering::SeqCst);
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = pipeline.stats();
            log::info!(
                "pipeline admitted={} dropped={} published={} failed={}",
                stats.admitted,
                stats.dropped,
                stats.published,
                stats.failed
            );
            last_health_log = Instant::now();
        }
    }
    running.store(false, Ordering::SeqCst);

    for handle in producers {
        let stats = handle
            .join()
            .map_err(|_| anyhow!("frame producer thread panicked"))?;
        log::info!(
            "source {} captured={} released={}",
            stats.url,
            stats.frames_captured,
            stats.frames_released
        );
    }

    let pipeline = Arc::try_unwrap(pipeline)
        .map_err(|_| anyhow!("pipeline still shared after producers stopped"))?;
    pipeline.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn classify_delay_help_names_concurrent_producers() {
        let command = Args::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "classify_delay_ms")
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .expect("classify-delay-ms help");
        assert!(help.contains("--producers"), "help was: {help}");
    }

    #[test]
    fn defaults_to_one_producer() {
        let args = Args::parse_from(["classifyd"]);
        assert_eq!(args.producers, 1);
        assert_eq!(args.classify_delay_ms, 0);
    }
}
