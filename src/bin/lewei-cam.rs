//! Command-line controller for a `lewei_cam` drone camera.
//!
//! A thin adapter over [`lewei_cam::camera::Camera`]: translates shell
//! invocations into typed API calls, writes binary results (pictures,
//! video, downloaded files) to timestamped or caller-chosen files, and
//! maps every [`CamError`] to exit code 1. The library itself never
//! touches argv, the filesystem, or a logger — all of that lives here.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use lewei_cam::camera::Camera;
use lewei_cam::config::ClientConfig;
use lewei_cam::error::CamError;
use lewei_cam::records::{CameraFlip, ConfigWiFiSec, RecordPlan};

#[derive(Parser)]
#[command(name = "lewei-cam", version, about = "lewei_cam drone camera controller")]
struct Cli {
    /// IP address of the camera.
    #[arg(long, global = true, default_value = "192.168.0.1")]
    ip: std::net::IpAddr,
    /// Camera command port.
    #[arg(long = "command-port", global = true, default_value_t = 7060, value_name = "PORT")]
    command_port: u16,
    /// Camera stream port.
    #[arg(long = "stream-port", global = true, default_value_t = 8060, value_name = "PORT")]
    stream_port: u16,
    /// Don't print success/failure messages.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Control baud rate for the drone's flight control.
    Baud {
        #[command(subcommand)]
        cmd: BaudCmd,
    },
    /// Control camera image orientation.
    Camflip {
        #[command(subcommand)]
        cmd: CamflipCmd,
    },
    /// Get or set camera config.
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
    /// Remote file commands.
    File {
        #[command(subcommand)]
        cmd: FileCmd,
    },
    /// Send a heartbeat and print status information.
    Heartbeat,
    /// List saved pictures or take a picture.
    Pic {
        #[command(subcommand)]
        cmd: PicCmd,
    },
    /// List saved pictures or take a picture (additional control).
    Pic2 {
        #[command(subcommand)]
        cmd: Pic2Cmd,
    },
    /// Control video recording to the SD card.
    Rec {
        #[command(subcommand)]
        cmd: RecCmd,
    },
    /// Reformat the SD card.
    Reformat,
    /// Get or set camera resolution.
    Res {
        #[command(subcommand)]
        cmd: ResCmd,
    },
    /// Control video streaming.
    Stream {
        #[command(subcommand)]
        cmd: StreamCmd,
    },
    /// Get or set remote time.
    Time {
        #[command(subcommand)]
        cmd: TimeCmd,
    },
    /// Control the camera's WiFi.
    Wifi {
        #[command(subcommand)]
        cmd: WifiCmd,
    },
}

#[derive(Subcommand)]
enum BaudCmd {
    /// Get baud rate.
    Get,
    /// Set baud rate.
    Set {
        #[arg(value_parser = parse_baud_rate)]
        rate: u32,
    },
}

#[derive(Subcommand)]
enum CamflipCmd {
    /// Get image flip mode.
    Get,
    /// Set image flip mode.
    Set { mode: CameraFlip },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Get config.
    Get,
    /// Set config. Unspecified fields keep their current value.
    Set {
        #[arg(long = "wifi-channel", value_name = "CHAN", value_parser = clap::value_parser!(u8).range(1..=13))]
        wifi_channel: Option<u8>,
        #[arg(long = "wifi-name", value_name = "NAME")]
        wifi_name: Option<String>,
        #[arg(long = "wifi-password", value_name = "PASS")]
        wifi_password: Option<String>,
        #[arg(long = "wifi-security")]
        wifi_security: Option<ConfigWiFiSec>,
        #[arg(long)]
        camflip: Option<CameraFlip>,
    },
}

#[derive(Subcommand)]
enum FileCmd {
    /// Delete a remote file.
    Delete {
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Download one or more remote files.
    Get {
        #[arg(long, value_name = "PATH", default_value = ".")]
        saveroot: PathBuf,
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PicCmd {
    /// List saved pictures.
    List,
    /// Take and download a picture.
    Take {
        #[arg(long = "out-file", value_name = "FILE")]
        out_file: Option<String>,
    },
}

#[derive(Subcommand)]
enum Pic2Cmd {
    /// List saved pictures.
    List {
        #[arg(long, value_name = "MAX", default_value_t = 512)]
        count: u32,
    },
    /// Take and download a picture.
    Take {
        #[arg(long = "out-file", value_name = "FILE")]
        out_file: Option<String>,
        /// Also remotely save the picture on the SD card.
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
enum RecCmd {
    /// List recordings.
    List,
    /// Play a saved recording.
    Play {
        #[arg(long = "out-file", value_name = "FILE")]
        out_file: Option<String>,
        /// File index # to play (from "rec list").
        index: usize,
    },
    /// Start recording.
    Start {
        /// Day abbreviations (Sun, Mon, Tues, Wed, Thurs, Fri, Sat); repeatable.
        #[arg(long, value_name = "DAY", num_args = 1..)]
        days: Vec<String>,
        #[arg(long = "max-duration", value_name = "MINS")]
        max_duration: Option<u32>,
        #[arg(long = "rotate-duration", value_name = "MINS")]
        rotate_duration: Option<u32>,
        #[arg(long = "start-time", value_name = "HH:MM")]
        start_time: Option<String>,
        #[arg(long = "stop-time", value_name = "HH:MM")]
        stop_time: Option<String>,
    },
    /// Get recording status.
    Status,
    /// Stop recording.
    Stop,
}

#[derive(Subcommand)]
enum ResCmd {
    /// Get resolution mode.
    Get,
    /// Set resolution mode.
    Set { mode: ResMode },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResMode {
    #[value(name = "720p")]
    R720p,
    #[value(name = "1080p")]
    R1080p,
}

#[derive(Subcommand)]
enum StreamCmd {
    /// Start streaming.
    Start {
        /// Stream at lower fps/bps and smaller resolution.
        #[arg(long = "low-def")]
        low_def: bool,
        #[arg(long = "out-file", value_name = "FILE")]
        out_file: Option<String>,
    },
}

#[derive(Subcommand)]
enum TimeCmd {
    /// Get remote time.
    Get,
    /// Set remote time.
    Set {
        /// Format YYYY-MM-DD[THH:MM:SS] (default: current time).
        #[arg(long)]
        time: Option<String>,
    },
}

#[derive(Subcommand)]
enum WifiCmd {
    /// Restart WiFi.
    Restart,
    /// Set wifi channel.
    SetChannel {
        #[arg(value_name = "CHAN", value_parser = clap::value_parser!(u8).range(1..=13))]
        channel: u8,
    },
    /// Restore wifi defaults.
    SetDefaults,
    /// Set wifi name.
    SetName {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Set wifi password.
    SetPassword {
        #[arg(value_name = "PASS")]
        password: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let quiet = cli.quiet;
    let cfg = ClientConfig {
        cam_ip: cli.ip,
        cmd_port: cli.command_port,
        stream_port: cli.stream_port,
        ..ClientConfig::default()
    };
    let camera = Camera::new(cfg);

    let result = run(&camera, cli.command);
    report(result, quiet)
}

fn report(result: Result<bool, CamError>, quiet: bool) -> ExitCode {
    match result {
        Ok(true) => {
            if !quiet {
                let _ = io::stdout().flush();
                eprintln!("success");
            }
            ExitCode::SUCCESS
        }
        Ok(false) => {
            if !quiet {
                eprintln!("failure");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            if !quiet {
                eprintln!("failure");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cam: &Camera, cmd: Command) -> Result<bool, CamError> {
    match cmd {
        Command::Baud { cmd } => match cmd {
            BaudCmd::Get => {
                println!("{}", cam.get_baudrate()?);
                Ok(true)
            }
            BaudCmd::Set { rate } => {
                cam.set_baudrate(rate)?;
                Ok(true)
            }
        },
        Command::Camflip { cmd } => match cmd {
            CamflipCmd::Get => {
                println!("{}", cam.get_camera_flip()?.name());
                Ok(true)
            }
            CamflipCmd::Set { mode } => {
                cam.set_camera_flip(mode)?;
                Ok(true)
            }
        },
        Command::Config { cmd } => cmd_config(cam, cmd),
        Command::File { cmd } => cmd_file(cam, cmd),
        Command::Heartbeat => {
            let hb = cam.get_heartbeat()?;
            println!("SD card ready: {}", hb.sdcard_ismounted);
            println!("SD card size:  {} MiB", hb.sdcard_size / 1024 / 1024);
            println!("SD card free:  {} MiB", hb.sdcard_free / 1024 / 1024);
            println!("Client count:  {}", hb.client_count);
            println!("Current time:  {} UTC", hb.time.to_rfc3339());
            Ok(true)
        }
        Command::Pic { cmd } => cmd_pic(cam, cmd),
        Command::Pic2 { cmd } => cmd_pic2(cam, cmd),
        Command::Rec { cmd } => cmd_rec(cam, cmd),
        Command::Reformat => {
            cam.reformat_sd()?;
            Ok(true)
        }
        Command::Res { cmd } => match cmd {
            ResCmd::Get => {
                let mode = if cam.get_resolution_1080p()? { "1080p" } else { "720p" };
                println!("{mode}");
                Ok(true)
            }
            ResCmd::Set { mode } => {
                cam.set_resolution_1080p(matches!(mode, ResMode::R1080p))?;
                Ok(true)
            }
        },
        Command::Stream { cmd } => cmd_stream(cam, cmd),
        Command::Time { cmd } => cmd_time(cam, cmd),
        Command::Wifi { cmd } => cmd_wifi(cam, cmd),
    }
}

fn cmd_config(cam: &Camera, cmd: ConfigCmd) -> Result<bool, CamError> {
    match cmd {
        ConfigCmd::Get => {
            let config = cam.get_config()?;
            println!("Camera flip:    {}", config.camera_flip.name());
            println!("WiFi Channel:   {}", config.wifi_channel);
            println!("WiFi Security:  {}", config.wifi_security.name());
            println!("WiFi Name:      {}", config.wifi_name);
            println!("WiFi Password:  {}", config.wifi_password);
            println!("SD card ready:  {}", config.sdcard_ismounted);
            println!("SD card size:   {} MiB", config.sdcard_size / 1024 / 1024);
            println!("SD card free:   {} MiB", config.sdcard_free / 1024 / 1024);
            println!("Version:        {}", config.version);
            println!("Current time:   {}", config.time.to_rfc3339());
            Ok(true)
        }
        ConfigCmd::Set { wifi_channel, wifi_name, wifi_password, wifi_security, camflip } => {
            cam.set_config(
                wifi_channel,
                wifi_name.as_deref(),
                wifi_password.as_deref(),
                wifi_security,
                camflip,
            )?;
            Ok(true)
        }
    }
}

fn cmd_file(cam: &Camera, cmd: FileCmd) -> Result<bool, CamError> {
    match cmd {
        FileCmd::Delete { file } => {
            cam.delete_file(&file)?;
            Ok(true)
        }
        FileCmd::Get { saveroot, files } => {
            let mut all_ok = true;
            for remote in &files {
                let dest = saveroot.join(remote.trim_start_matches('/'));
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                rotate_file(&dest)?;
                let mut f = File::create(&dest)?;
                let outcome = cam.get_file(remote, &mut f);
                drop(f);
                match outcome {
                    Ok(true) => println!("file saved: {}", dest.display()),
                    Ok(false) => {
                        all_ok = false;
                        let _ = std::fs::remove_file(&dest);
                        eprintln!("download failed: {remote}");
                    }
                    Err(e) => {
                        all_ok = false;
                        let _ = std::fs::remove_file(&dest);
                        eprintln!("{e}");
                        eprintln!("download failed: {remote}");
                    }
                }
            }
            Ok(all_ok)
        }
    }
}

fn cmd_pic(cam: &Camera, cmd: PicCmd) -> Result<bool, CamError> {
    match cmd {
        PicCmd::List => {
            let pics = cam.list_pictures()?;
            println!("      size  path");
            for entry in pics {
                println!("{:10}  {}", entry.size, entry.path);
            }
            Ok(true)
        }
        PicCmd::Take { out_file } => {
            let pic = cam.take_picture()?;
            let out_file = out_file.unwrap_or_else(|| date_filename("jpg"));
            write_output(&out_file, &pic.data)?;
            if out_file != "-" {
                println!("{out_file}");
            }
            Ok(true)
        }
    }
}

fn cmd_pic2(cam: &Camera, cmd: Pic2Cmd) -> Result<bool, CamError> {
    match cmd {
        Pic2Cmd::List { count } => {
            let pics = cam.list_pictures2(count)?;
            println!("      size  path");
            for entry in pics {
                println!("{:10}  {}", entry.size, entry.path);
            }
            Ok(true)
        }
        Pic2Cmd::Take { out_file, save } => {
            let pic = cam.take_picture2(save)?;
            let out_file = out_file.unwrap_or_else(|| date_filename("jpg"));
            write_output(&out_file, &pic.data)?;
            if out_file != "-" {
                println!("{out_file}");
            }
            Ok(true)
        }
    }
}

fn cmd_rec(cam: &Camera, cmd: RecCmd) -> Result<bool, CamError> {
    match cmd {
        RecCmd::List => {
            println!("index  start                duration  path");
            for (i, entry) in cam.get_recordings()?.iter().enumerate() {
                let local = entry.start_time.with_timezone(&Local);
                println!(
                    "[{i:3}]  {}    {:6}  {}",
                    local.format("%Y%m%d_%H:%M:%S"),
                    entry.time_length,
                    entry.path
                );
            }
            Ok(true)
        }
        RecCmd::Play { out_file, index } => {
            let out_file = out_file.unwrap_or_else(|| date_filename("h264"));
            if out_file != "-" {
                println!("streaming to: {out_file}");
            }
            let cam_for_ctrlc = cam.clone();
            let _ = ctrlc::set_handler(move || {
                cam_for_ctrlc.stop_recording_replay();
            });
            let mut out = open_output(&out_file)?;
            for frame in cam.start_recording_replay(index)? {
                out.write_all(&frame.frame_bytes)?;
            }
            Ok(true)
        }
        RecCmd::Start { days, max_duration, rotate_duration, start_time, stop_time } => {
            if let Some(mins) = rotate_duration {
                cam.set_record_rotate_duration(mins * 60)?;
            }
            let mut plan = RecordPlan::default_now();
            if !days.is_empty() {
                plan.day_flags = 0;
                for day in &days {
                    let idx = RecordPlan::DAY_ABBRS
                        .iter()
                        .position(|d| d.eq_ignore_ascii_case(day))
                        .ok_or(CamError::InvalidArgument(
                            "unknown day, expected one of Sun/Mon/Tues/Wed/Thurs/Fri/Sat",
                        ))?;
                    plan.day_flags |= 1 << idx;
                }
            }
            if let Some(hhmm) = start_time {
                plan.start_secs = parse_hhmm(&hhmm)?;
            }
            if let Some(hhmm) = stop_time {
                plan.end_secs = parse_hhmm(&hhmm)?;
            }
            if let Some(mins) = max_duration {
                plan.max_duration_secs = mins * 60;
            }
            cam.set_record_plan(&plan)?;
            Ok(true)
        }
        RecCmd::Status => {
            let plan = cam.get_record_plan()?;
            let max_file = cam.get_record_rotate_duration()?;
            let active_days: Vec<&str> = (0..7u8)
                .filter(|i| plan.day_flags & (1 << i) != 0)
                .map(|i| RecordPlan::DAY_ABBRS[i as usize])
                .collect();
            println!("Active:       {}", plan.active);
            println!("Active Days:  {}", active_days.join(", "));
            println!("Start Time:   {}", fmt_hhmmss(plan.start_secs));
            println!("End Time:     {}", fmt_hhmmss(plan.end_secs));
            println!("Max Duration: {} secs", plan.max_duration_secs);
            println!("Max Per File: {max_file} secs");
            Ok(true)
        }
        RecCmd::Stop => {
            cam.set_record_plan(&RecordPlan::stopped())?;
            Ok(true)
        }
    }
}

fn cmd_stream(cam: &Camera, cmd: StreamCmd) -> Result<bool, CamError> {
    match cmd {
        StreamCmd::Start { low_def, out_file } => {
            let out_file = out_file.unwrap_or_else(|| date_filename("h264"));
            if out_file != "-" {
                println!("streaming to: {out_file}");
            }
            let cam_for_ctrlc = cam.clone();
            let _ = ctrlc::set_handler(move || {
                cam_for_ctrlc.stop_video_stream();
            });
            let mut out = open_output(&out_file)?;
            for frame in cam.start_video_stream(!low_def)? {
                out.write_all(&frame.frame_bytes)?;
            }
            Ok(true)
        }
    }
}

fn cmd_time(cam: &Camera, cmd: TimeCmd) -> Result<bool, CamError> {
    match cmd {
        TimeCmd::Get => {
            println!("{}", cam.get_time()?.with_timezone(&Local));
            Ok(true)
        }
        TimeCmd::Set { time } => {
            let when = time.map(|s| parse_datetime(&s)).transpose()?;
            cam.set_time(when)?;
            Ok(true)
        }
    }
}

fn cmd_wifi(cam: &Camera, cmd: WifiCmd) -> Result<bool, CamError> {
    match cmd {
        WifiCmd::Restart => {
            cam.restart_wifi()?;
            Ok(true)
        }
        WifiCmd::SetChannel { channel } => {
            cam.set_wifi_channel(channel)?;
            Ok(true)
        }
        WifiCmd::SetDefaults => {
            cam.set_wifi_defaults()?;
            Ok(true)
        }
        WifiCmd::SetName { name } => {
            cam.set_wifi_name(&name)?;
            Ok(true)
        }
        WifiCmd::SetPassword { password } => {
            cam.set_wifi_password(&password)?;
            Ok(true)
        }
    }
}

// ---------------------------------------------------------------------------
// Small adapter helpers: none of this is protocol logic, just filesystem and
// time-formatting glue around the typed camera API.
// ---------------------------------------------------------------------------

fn parse_baud_rate(s: &str) -> Result<u32, String> {
    const RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];
    let v: u32 = s.parse().map_err(|_| "not a number".to_string())?;
    if RATES.contains(&v) {
        Ok(v)
    } else {
        Err(format!("must be one of {RATES:?}"))
    }
}

fn parse_hhmm(s: &str) -> Result<u32, CamError> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| CamError::InvalidArgument("time must be HH:MM"))?;
    let h: u32 = h.parse().map_err(|_| CamError::InvalidArgument("invalid hour"))?;
    let m: u32 = m.parse().map_err(|_| CamError::InvalidArgument("invalid minute"))?;
    if h >= 24 || m >= 60 {
        return Err(CamError::InvalidArgument("time out of range"));
    }
    Ok(h * 3600 + m * 60)
}

fn fmt_hhmmss(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Parse `--time`: a full `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS`
/// timestamp, or a bare `YYYY-MM-DD` date at midnight. Interpreted as UTC.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CamError> {
    let bad = || CamError::InvalidArgument("time must be YYYY-MM-DD[THH:MM:SS]");
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0).ok_or_else(bad)?;
        return Ok(Utc.from_utc_datetime(&dt));
    }
    Err(bad())
}

/// Return a filename named with the current local datetime, matching the
/// camera's own `YYYYMMDD-HHMMSS.ffffff.ext` convention.
fn date_filename(ext: &str) -> String {
    format!("{}.{ext}", Local::now().format("%Y%m%d-%H%M%S%.6f"))
}

/// Move an existing file aside to `<name>.NNN` so a fresh write never
/// clobbers prior output.
fn rotate_file(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut i = 1u32;
    loop {
        let candidate = path.with_extension(format!(
            "{}.{i:03}",
            path.extension().and_then(|e| e.to_str()).unwrap_or_default()
        ));
        if !candidate.exists() {
            std::fs::rename(path, candidate)?;
            return Ok(());
        }
        i += 1;
    }
}

/// Open `path` for binary writing, or stdout if `path == "-"`. Rotates an
/// existing file out of the way first (stdout is never rotated).
fn open_output(path: &str) -> io::Result<Box<dyn Write>> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        let p = Path::new(path);
        rotate_file(p)?;
        Ok(Box::new(File::create(p)?))
    }
}

fn write_output(path: &str, data: &[u8]) -> io::Result<()> {
    open_output(path)?.write_all(data)
}
