use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use movenet_decode::{
    decode,
    model::{self, HeadOutputs, ModelType},
    synthetic::SyntheticPose,
    tensor_file, Decoded, Decoder, Error,
};
use num_traits::cast::ToPrimitive;
use std::{
    path::PathBuf,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use structopt::StructOpt;
use tracing::{debug, info, trace};
use tracing_subscriber::layer::SubscriberExt;

/// Distinct synthetic frames cycled through by the benchmark.
const FRAME_POOL: usize = 16;

#[derive(Debug, Clone, Copy)]
enum Layout {
    Chw,
    Hwc,
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chw" => Ok(Self::Chw),
            "hwc" => Ok(Self::Hwc),
            _ => Err(Error::ParseOption {
                kind: "layout",
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(structopt::StructOpt)]
struct DecodeOpt {
    /// Center heatmap logits (`hm`).
    #[structopt(long)]
    center: PathBuf,

    /// Keypoint heatmap logits (`hm_hp`).
    #[structopt(long)]
    heatmap: PathBuf,

    /// Center-to-keypoint regression (`hps`).
    #[structopt(long)]
    regress: PathBuf,

    /// Keypoint sub-cell offsets (`hp_offset`).
    #[structopt(long)]
    offset: PathBuf,

    /// Memory layout of every file: chw as emitted by the network, or hwc.
    #[structopt(short = "-L", long, default_value = "chw")]
    layout: Layout,

    /// Use the grid size of this model instead of --feature-size.
    #[structopt(short, long)]
    model_type: Option<ModelType>,

    #[structopt(flatten)]
    options: decode::Options,
}

#[derive(structopt::StructOpt)]
struct BenchOpt {
    /// Number of threads sharing the decoder.
    #[structopt(short, long, default_value = "4")]
    threads: usize,

    /// Total number of decode calls.
    #[structopt(short = "-n", long, default_value = "10000")]
    iterations: usize,

    #[structopt(short, long)]
    show_progress: bool,

    #[structopt(flatten)]
    options: decode::Options,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Decode raw little-endian f32 tensors dumped from a MoveNet model.
    Decode(DecodeOpt),
    /// Decode synthetic outputs from several threads sharing one decoder.
    Bench(BenchOpt),
}

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(subcommand)]
    command: Command,
}

fn load_heads(opt: &DecodeOpt, feature_size: usize) -> Result<HeadOutputs> {
    let joints = opt.options.num_joints;
    let heads = [
        (model::HM, &opt.center, 1),
        (model::HM_HP, &opt.heatmap, joints),
        (model::HPS, &opt.regress, 2 * joints),
        (model::HP_OFFSET, &opt.offset, 2 * joints),
    ];

    let mut outputs = HeadOutputs::new();
    for (name, path, channels) in heads {
        let shape = match opt.layout {
            Layout::Chw => (channels, feature_size, feature_size),
            Layout::Hwc => (feature_size, feature_size, channels),
        };
        let tensor = tensor_file::read_tensor(path, shape)
            .with_context(|| format!("failed reading head {} from {:?}", name, path))?;
        match opt.layout {
            Layout::Chw => outputs.insert_chw(name, tensor.view()),
            Layout::Hwc => outputs.insert_hwc(name, tensor),
        }
        debug!(message = "loaded head", head = name, ?path, ?shape);
    }
    Ok(outputs)
}

fn print_decoded(decoded: &Decoded) {
    for (label, pose) in ["primary", "alternate"].iter().zip(decoded.poses()) {
        println!("{} (mean score {:.4})", label, pose.score());
        for (i, keypoint) in pose.keypoints.iter().enumerate() {
            let name = keypoint
                .kind
                .map(|kind| format!("{:?}", kind))
                .unwrap_or_else(|| format!("joint {}", i));
            println!(
                "  {:<14} y={:.4} x={:.4} score={:.4}",
                name, keypoint.y, keypoint.x, keypoint.score
            );
        }
    }
}

fn run_decode(opt: DecodeOpt) -> Result<()> {
    let mut options = opt.options;
    if let Some(model_type) = opt.model_type {
        options.feature_size = model_type.feature_size();
    }
    let decoder = Decoder::with_options(options).context("failed constructing decoder")?;

    let outputs = load_heads(&opt, options.feature_size)?;
    let decoded = decoder
        .decode(outputs.tensors()?)
        .context("failed decoding keypoints")?;

    let center = decoder.grid().cell(decoded.center);
    info!(
        message = "decoded pose",
        center_row = center.row,
        center_col = center.col,
        score = decoded.primary.score()
    );
    print_decoded(&decoded);
    Ok(())
}

fn run_bench(opt: BenchOpt) -> Result<()> {
    let options = opt.options;
    let threads = opt.threads.max(1);
    let iterations = opt.iterations;
    let decoder = Decoder::with_options(options).context("failed constructing decoder")?;

    let frames = (0..FRAME_POOL)
        .map(|i| {
            let phase = i.to_f32().ok_or(Error::ConvertToF32)? * 0.1;
            SyntheticPose::ring(options.feature_size, options.num_joints, phase)?.render()
        })
        .collect::<Result<Vec<_>, Error>>()
        .context("failed rendering synthetic frames")?;

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrl_c = running.clone();

    ctrlc::set_handler(move || {
        running_ctrl_c.store(false, Ordering::SeqCst);
    })
    .context("failed setting Ctrl-C handler")?;

    let progress = if opt.show_progress {
        Some(
            ProgressBar::new(iterations.to_u64().context("iteration count too large")?)
                .with_style(
                    ProgressStyle::default_bar()
                        .template("{prefix:.bold.dim} {bar:40} {pos}/{len} {wide_msg}"),
                ),
        )
    } else {
        None
    };

    info!(
        message = "starting benchmark",
        threads,
        iterations,
        feature_size = options.feature_size,
        num_joints = options.num_joints
    );

    let completed = AtomicUsize::new(0);
    let start = Instant::now();

    let shared_decoder = &decoder;
    let shared_frames = &frames;
    let shared_running = &*running;
    let shared_completed = &completed;
    let shared_progress = progress.as_ref();

    let decode_times = crossbeam::thread::scope(|scope| {
        let handles = (0..threads)
            .map(|thread| {
                let decoder = shared_decoder;
                let frames = shared_frames;
                let running = shared_running;
                let completed = shared_completed;
                let progress = shared_progress;
                scope.spawn(move |_| {
                    let mut busy = Duration::default();
                    for i in (thread..iterations).step_by(threads) {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        let tensors = frames[i % frames.len()].tensors()?;
                        let decode_start = Instant::now();
                        let decoded = decoder.decode(tensors)?;
                        busy += decode_start.elapsed();
                        trace!(thread, iteration = i, center = decoded.center);
                        completed.fetch_add(1, Ordering::SeqCst);
                        if let Some(progress) = progress {
                            progress.inc(1);
                        }
                    }
                    Ok::<_, anyhow::Error>(busy)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| -> Result<Duration> {
                handle
                    .join()
                    .map_err(|_| anyhow!("decode thread panicked"))?
            })
            .collect::<Result<Vec<_>>>()
    })
    .map_err(|_| anyhow!("decode thread panicked"))??;

    let elapsed = start.elapsed();
    let completed = completed.load(Ordering::SeqCst);
    if let Some(progress) = progress {
        progress.finish_with_message(format!("{} decodes", completed));
    }

    let completed_f64 = completed.to_f64().context("decode count too large")?;
    let busy = decode_times.iter().sum::<Duration>();
    info!(
        message = "benchmark finished",
        completed,
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        decodes_per_second = completed_f64 / elapsed.as_secs_f64(),
        mean_decode_us = busy.as_secs_f64() * 1e6 / completed_f64.max(1.0)
    );
    Ok(())
}

fn main() -> Result<()> {
    let Opt { log_level, command } = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(log_level),
    )?;

    match command {
        Command::Decode(opt) => run_decode(opt),
        Command::Bench(opt) => run_bench(opt),
    }
}
