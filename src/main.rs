//! Cell Replay CLI - Inspect simulation archives and reconstructed reactions.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cell_replay::{
    ReplayConfig, ReplaySession,
    archive::{WriterConfig, pack_directory},
    reaction::ReactionCache,
    schema::DEFAULT_PARTICLE_CAPACITY,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 3 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    if args[1] == "pack" {
        run_pack(&args[2..]);
        return;
    }

    let config = load_config(Path::new(&args[1]));
    let rest = &args[3..];

    match args[2].as_str() {
        "info" => run_info(config),
        "frame" => run_frame(config, rest),
        "reactions" => run_reactions(config),
        "trajectory" => run_trajectory(config, rest),
        "clear-cache" => run_clear_cache(config),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <config.json | run_dir> <command> [args]", program);
    eprintln!("       {} pack <frame_dir> <out_dir> [capacity] [max_frames]", program);
    eprintln!();
    eprintln!("Replay a particle simulation archive and its reaction log.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  info                              Archive and reaction summary");
    eprintln!("  frame <n> [tracked_id]            Display buffers of frame n");
    eprintln!("  reactions                         Reconstructed reaction table");
    eprintln!("  trajectory <id> <start> <end> [lod]  Particle path over frames start..end");
    eprintln!("  clear-cache                       Remove cached reaction tables");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("Error {}: {}", context, err);
    std::process::exit(1);
}

fn parse_arg<T: std::str::FromStr>(args: &[String], i: usize, name: &str) -> T
where
    T::Err: Display,
{
    match args.get(i) {
        Some(s) => s.parse().unwrap_or_else(|e| fail(&format!("parsing {}", name), e)),
        None => fail("reading arguments", format!("missing <{}>", name)),
    }
}

/// A directory is taken as a run root with default layout.
fn load_config(path: &Path) -> ReplayConfig {
    if path.is_dir() {
        return ReplayConfig::in_dir(path);
    }

    let config_str =
        fs::read_to_string(path).unwrap_or_else(|e| fail("reading config file", e));
    serde_json::from_str(&config_str).unwrap_or_else(|e| fail("parsing config", e))
}

fn open_session(config: ReplayConfig) -> ReplaySession {
    let start = Instant::now();
    let session = ReplaySession::open(config).unwrap_or_else(|e| fail("opening replay", e));
    log::info!("Session opened in {:.2}s", start.elapsed().as_secs_f32());
    session
}

fn run_info(config: ReplayConfig) {
    let session = open_session(config);
    let config = session.config();
    let frames = session.frame_count();

    println!("Cell Replay");
    println!("===========");
    println!("Archive: {}", config.data_path.display());
    println!("Frames: {}", frames);
    println!("Particle capacity: {}", config.particle_capacity);
    println!(
        "Duration: {:.3e}s ({:.1e}s per frame)",
        session.time_of(frames),
        config.time_step
    );
    println!();
    println!("Reactions: {}", session.reactions().len());
    println!(
        "  Fully resolved: {}",
        session.reactions().all().iter().filter(|r| r.is_resolved()).count()
    );
    println!(
        "  Frames with reactions: {}",
        session.reactions().frames_with_reactions().count()
    );
    println!("  Cache: {:?}", session.cache_status());
    println!("  Diagnostics: {}", session.diagnostics().len());
}

fn run_frame(config: ReplayConfig, args: &[String]) {
    let frame: usize = parse_arg(args, 0, "n");
    let tracked = args.get(1).map(|_| parse_arg(args, 1, "tracked_id"));

    let mut session = open_session(config);
    session.seek(frame).unwrap_or_else(|e| fail("seeking", e));
    let display = session
        .display_frame(tracked)
        .unwrap_or_else(|e| fail("loading frame", e));

    println!("Frame {} (t = {:.3e}s): {} particles", frame, session.time_of(frame), display.len());
    for i in 0..display.len() {
        let [x, y, z, _] = display.positions[i];
        let [qx, qy, qz, qw] = display.rotations[i];
        println!(
            "  {:>6}  pos=({:.3}, {:.3}, {:.3})  rot=({:.3}, {:.3}, {:.3}, {:.3})  hl={}",
            display.ids[i], x, y, z, qx, qy, qz, qw, display.highlights[i]
        );
    }
}

fn run_reactions(config: ReplayConfig) {
    let session = open_session(config);

    for reaction in session.reactions().all() {
        println!("{}", reaction);
    }
    for diagnostic in session.diagnostics() {
        eprintln!("warning: {}", diagnostic);
    }
}

fn run_trajectory(config: ReplayConfig, args: &[String]) {
    let id = parse_arg(args, 0, "id");
    let start = parse_arg(args, 1, "start");
    let end = parse_arg(args, 2, "end");
    let lod: f32 = args.get(3).map_or(0.0, |_| parse_arg(args, 3, "lod"));

    let mut session = open_session(config);
    let trajectory = session
        .trajectory(id, start, end, lod)
        .unwrap_or_else(|e| fail("building trajectory", e));

    println!(
        "Particle {} frames {}..{} (lod {:.2}):",
        trajectory.id, trajectory.start, trajectory.end, trajectory.lod
    );
    for (frame, v) in (trajectory.start..).zip(&trajectory.vertices) {
        println!("  {:>6}  ({:.3}, {:.3}, {:.3})", frame, v.x, v.y, v.z);
    }
}

fn run_clear_cache(config: ReplayConfig) {
    let cache = ReactionCache::new(&config.cache_dir);
    let removed = cache.clear().unwrap_or_else(|e| fail("clearing cache", e));
    println!("Removed {} cache entries from {}", removed, cache.dir().display());
}

fn run_pack(args: &[String]) {
    let src_dir = PathBuf::from(&args[0]);
    let out_dir = match args.get(1) {
        Some(dir) => PathBuf::from(dir),
        None => fail("reading arguments", "missing <out_dir>"),
    };
    let capacity = args
        .get(2)
        .map_or(DEFAULT_PARTICLE_CAPACITY, |_| parse_arg(args, 2, "capacity"));
    let max_frames = args.get(3).map_or(0, |_| parse_arg(args, 3, "max_frames"));

    fs::create_dir_all(&out_dir).unwrap_or_else(|e| fail("creating output directory", e));
    let data_path = out_dir.join("data.bin");
    let index_path = out_dir.join("index.bin");

    println!("Packing {} -> {}", src_dir.display(), data_path.display());
    let start = Instant::now();
    let stats = pack_directory(
        &src_dir,
        &data_path,
        &index_path,
        WriterConfig {
            capacity,
            max_frames,
        },
    )
    .unwrap_or_else(|e| fail("packing frames", e));

    println!("Packed {}", stats);
    println!("Time: {:.2}s", start.elapsed().as_secs_f32());
}

fn print_example_config() {
    let config = ReplayConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("serializing config", e),
    }
}
