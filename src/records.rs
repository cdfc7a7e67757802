//! Response record parsers (Component B): fixed-layout domain records
//! decoded from command bodies, plus the small closed enums that appear
//! as scalar fields inside them.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::codec;
use crate::error::{CamError, Result};

/// Camera orientation. `Up` is the default; `Down` is flipped vertically,
/// the `*Mirror` variants are flipped horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CameraFlip {
    Up = 0,
    UpMirror = 1,
    DownMirror = 2,
    Down = 3,
}

impl CameraFlip {
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::Up,
            1 => Self::UpMirror,
            2 => Self::DownMirror,
            3 => Self::Down,
            other => return Err(CamError::unsupported("CameraFlip", other as u32)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::UpMirror => "up_mirror",
            Self::DownMirror => "down_mirror",
            Self::Down => "down",
        }
    }
}

impl std::str::FromStr for CameraFlip {
    type Err = CamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "up_mirror" => Ok(Self::UpMirror),
            "down_mirror" => Ok(Self::DownMirror),
            "down" => Ok(Self::Down),
            _ => Err(CamError::invalid_argument("unknown camera flip mode")),
        }
    }
}

/// WiFi security mode advertised by [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum ConfigWiFiSec {
    Open = 0,
    Wpa2Psk = 1,
}

impl ConfigWiFiSec {
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::Open,
            1 => Self::Wpa2Psk,
            other => return Err(CamError::unsupported("ConfigWiFiSec", other as u32)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Wpa2Psk => "WPA2-PSK",
        }
    }
}

impl std::str::FromStr for ConfigWiFiSec {
    type Err = CamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "wpa2_psk" => Ok(Self::Wpa2Psk),
            _ => Err(CamError::invalid_argument("unknown wifi security mode")),
        }
    }
}

/// Frame-type tag used while downloading a file over the stream socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileFrameFlag {
    NotFound = 0,
    Start = 1,
    Frame = 2,
    End = 3,
}

impl FileFrameFlag {
    pub fn from_u32(v: u32) -> Result<Self> {
        Ok(match v {
            0 => Self::NotFound,
            1 => Self::Start,
            2 => Self::Frame,
            3 => Self::End,
            other => return Err(CamError::unsupported("FileFrameFlag", other)),
        })
    }
}

/// Re-anchor a device timestamp from its GMT+8-labeled encoding to the true
/// UTC instant: the device stores unix seconds but treats them as wall-clock
/// time in GMT+8, so the client must subtract eight hours to recover UTC.
pub fn gmt8_reanchor(epoch_secs: u64) -> Result<DateTime<Utc>> {
    let dt = Utc
        .timestamp_opt(epoch_secs as i64, 0)
        .single()
        .ok_or_else(|| CamError::framing("timestamp out of range"))?;
    Ok(dt - chrono::Duration::hours(8))
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Camera configuration (140-byte body).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Config {
    pub wifi_channel: u8,
    pub camera_flip: CameraFlip,
    pub wifi_security: ConfigWiFiSec,
    pub wifi_name: String,
    pub wifi_password: String,
    /// Raw unix seconds as reported by the device. Substituted with the
    /// Unix epoch if the raw value overflowed the host's representable
    /// range (observed on some firmware builds) rather than failing.
    pub time: DateTime<Utc>,
    pub sdcard_ismounted: bool,
    pub sdcard_size: u64,
    pub sdcard_free: u64,
    pub version: String,
}

impl Config {
    pub const LEN: usize = 140;
    pub const MAX_WIFI_NAME_LEN: usize = 32;
    pub const MAX_WIFI_PASS_LEN: usize = 32;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(CamError::framing(format!(
                "Config needs exactly {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }
        let wifi_channel = data[0];
        let camera_flip = CameraFlip::from_u8(data[1])?;
        let wifi_security = ConfigWiFiSec::from_u8(data[2])?;
        let wifi_name = codec::read_cstr(&data[3..35]);
        let wifi_password = codec::read_cstr(&data[35..67]);
        let time_raw = codec::read_u64(data, 67)?;
        let epoch_zero = || Utc.timestamp_opt(0, 0).single().expect("unix epoch is representable");
        let time = Utc.timestamp_opt(time_raw as i64, 0).single().unwrap_or_else(epoch_zero);
        let sdcard_ismounted = data[75] == 1;
        let sdcard_size = codec::read_u64(data, 76)?;
        let sdcard_free = codec::read_u64(data, 84)?;
        let version = codec::read_cstr(&data[92..140]);
        Ok(Self {
            wifi_channel,
            camera_flip,
            wifi_security,
            wifi_name,
            wifi_password,
            time,
            sdcard_ismounted,
            sdcard_size,
            sdcard_free,
            version,
        })
    }

    /// Encode the writable subset of fields (wifi channel, flip, security,
    /// name, password). The remaining, server-owned fields are zero-padded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !(1..=13).contains(&self.wifi_channel) {
            return Err(CamError::invalid_argument("wifi_channel must be in 1..=13"));
        }
        let mut buf = vec![0u8; Self::LEN];
        buf[0] = self.wifi_channel;
        buf[1] = self.camera_flip as u8;
        buf[2] = self.wifi_security as u8;
        let mut name_buf = Vec::new();
        codec::write_cstr(&mut name_buf, &self.wifi_name, Self::MAX_WIFI_NAME_LEN)?;
        buf[3..35].copy_from_slice(&name_buf);
        let mut pass_buf = Vec::new();
        codec::write_cstr(&mut pass_buf, &self.wifi_password, Self::MAX_WIFI_PASS_LEN)?;
        buf[35..67].copy_from_slice(&pass_buf);
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Heartbeat response (64-byte body).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Heartbeat {
    pub sdcard_ismounted: bool,
    pub sdcard_size: u64,
    pub sdcard_free: u64,
    pub client_count: u32,
    pub time: DateTime<Utc>,
}

impl Heartbeat {
    pub const LEN: usize = 64;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(CamError::framing(format!(
                "Heartbeat needs exactly {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }
        let mounted = codec::read_u32(data, 0)?;
        let sdcard_size = codec::read_u64(data, 4)?;
        let sdcard_free = codec::read_u64(data, 12)?;
        let client_count = codec::read_u32(data, 20)?;
        let time_raw = codec::read_u64(data, 24)?;
        Ok(Self {
            sdcard_ismounted: mounted == 1,
            sdcard_size,
            sdcard_free,
            client_count,
            time: gmt8_reanchor(time_raw)?,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordPlan
// ---------------------------------------------------------------------------

/// A recording schedule for the SD card (20-byte body).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecordPlan {
    pub active: bool,
    /// Bit `i` set means day `i` is active, Sun=0..Sat=6.
    pub day_flags: u8,
    /// Seconds within a day, `0..86400`.
    pub start_secs: u32,
    /// Seconds within a day, `0..86400`.
    pub end_secs: u32,
    pub max_duration_secs: u32,
}

impl RecordPlan {
    pub const LEN: usize = 20;
    /// Day abbreviations in wire order, `day_flags` bit 0 first (Sunday).
    pub const DAY_ABBRS: [&'static str; 7] =
        ["Sun", "Mon", "Tues", "Wed", "Thurs", "Fri", "Sat"];

    /// A plan that starts recording now for five minutes: active, today's
    /// day bit set (reckoned in the camera's own GMT+8 clock, so "today"
    /// matches the device regardless of the caller's local timezone),
    /// covering the full day so it includes "now" under any timezone.
    pub fn default_now() -> Self {
        let cam_local = Utc::now() + chrono::Duration::hours(8);
        let day_flags = 1u8 << cam_local.weekday().num_days_from_sunday();
        Self { active: true, day_flags, start_secs: 0, end_secs: 86399, max_duration_secs: 300 }
    }

    /// [`Self::default_now`] with recording disabled, for a `stop` request.
    pub fn stopped() -> Self {
        Self { active: false, ..Self::default_now() }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(CamError::framing(format!(
                "RecordPlan needs exactly {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }
        let active = codec::read_u32(data, 0)? != 0;
        let day_flags = codec::read_u32(data, 4)? as u8;
        let start_secs = codec::read_u32(data, 8)?;
        let end_secs = codec::read_u32(data, 12)?;
        let max_duration_secs = codec::read_u32(data, 16)?;
        Ok(Self { active, day_flags, start_secs, end_secs, max_duration_secs })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        codec::write_u32(&mut buf, self.active as u32);
        codec::write_u32(&mut buf, self.day_flags as u32);
        codec::write_u32(&mut buf, self.start_secs);
        codec::write_u32(&mut buf, self.end_secs);
        codec::write_u32(&mut buf, self.max_duration_secs);
        buf
    }
}

// ---------------------------------------------------------------------------
// RecordListItem
// ---------------------------------------------------------------------------

/// One entry in a recordings listing (116-byte entries).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecordListItem {
    pub start_time: DateTime<Utc>,
    pub time_length: u32,
    pub path: String,
}

impl RecordListItem {
    pub const LEN: usize = 116;

    /// Parse a buffer of concatenated entries. Fails if the length is not a
    /// multiple of [`Self::LEN`].
    pub fn list_from_bytes(data: &[u8]) -> Result<Vec<Self>> {
        if data.len() % Self::LEN != 0 {
            return Err(CamError::framing("record list length not a multiple of entry size"));
        }
        data.chunks_exact(Self::LEN).map(Self::entry_from_bytes).collect()
    }

    fn entry_from_bytes(data: &[u8]) -> Result<Self> {
        let start_raw = codec::read_u32(data, 0)?;
        let time_length = codec::read_u32(data, 4)?;
        let path = codec::read_cstr(&data[16..116]);
        Ok(Self {
            start_time: gmt8_reanchor(start_raw as u64)?,
            time_length,
            path,
        })
    }
}

// ---------------------------------------------------------------------------
// PictureListItem
// ---------------------------------------------------------------------------

/// One entry in a pictures listing (124-byte entries).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PictureListItem {
    pub size: u32,
    pub path: String,
}

impl PictureListItem {
    pub const LEN: usize = 124;

    pub fn list_from_bytes(data: &[u8]) -> Result<Vec<Self>> {
        if data.len() % Self::LEN != 0 {
            return Err(CamError::framing("picture list length not a multiple of entry size"));
        }
        data.chunks_exact(Self::LEN).map(Self::entry_from_bytes).collect()
    }

    fn entry_from_bytes(data: &[u8]) -> Result<Self> {
        let flag = codec::read_u32(data, 0)?;
        if flag != 1 {
            return Err(CamError::protocol(format!("invalid picture list entry flag {flag}")));
        }
        let size = codec::read_u32(data, 4)?;
        let path = codec::read_cstr(&data[24..124]);
        Ok(Self { size, path })
    }
}

// ---------------------------------------------------------------------------
// Picture
// ---------------------------------------------------------------------------

/// A JPEG picture (128-byte header plus `size` bytes of JPEG data).
#[derive(Clone)]
pub struct Picture {
    pub size: u32,
    pub time: DateTime<Utc>,
    pub path: String,
    pub data: Vec<u8>,
}

impl Picture {
    pub const HDR_LEN: usize = 128;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::HDR_LEN {
            return Err(CamError::framing("picture header truncated"));
        }
        let size = codec::read_u32(data, 0)?;
        let time_ms = codec::read_u32(data, 4)?;
        let path = codec::read_cstr(&data[12..112]);
        let payload = &data[Self::HDR_LEN..];
        if payload.len() as u32 != size {
            return Err(CamError::framing("picture payload size mismatch"));
        }
        let time = Utc
            .timestamp_opt((time_ms / 1000) as i64, 0)
            .single()
            .ok_or_else(|| CamError::framing("picture timestamp out of range"))?;
        Ok(Self { size, time, path, data: payload.to_vec() })
    }
}

impl std::fmt::Debug for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picture")
            .field("size", &self.size)
            .field("time", &self.time)
            .field("path", &self.path)
            .field("data_len", &self.data.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FileFrame
// ---------------------------------------------------------------------------

/// One chunk of a file transferred over the stream socket (196-byte header
/// plus `size` payload bytes).
#[derive(Clone)]
pub struct FileFrame {
    pub flag: FileFrameFlag,
    pub size: u32,
    pub total_size: u32,
    pub path: String,
    /// Only populated on the terminal `End` frame.
    pub md5_hash: String,
    pub file_bytes: Vec<u8>,
}

impl FileFrame {
    pub const HDR_LEN: usize = 196;
    const PATH_OFF: usize = 16;
    const PATH_MAX: usize = 100;
    const MD5_OFF: usize = Self::PATH_OFF + Self::PATH_MAX;
    const MD5_LEN: usize = 32;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::HDR_LEN {
            return Err(CamError::framing("file frame header truncated"));
        }
        let flag = FileFrameFlag::from_u32(codec::read_u32(data, 0)?)?;
        let size = codec::read_u32(data, 4)?;
        let total_size = codec::read_u32(data, 8)?;
        let path = codec::read_cstr(&data[Self::PATH_OFF..Self::PATH_OFF + Self::PATH_MAX]);
        let md5_hash = codec::read_cstr(&data[Self::MD5_OFF..Self::MD5_OFF + Self::MD5_LEN]);
        let file_bytes = data[Self::HDR_LEN..].to_vec();
        if file_bytes.len() as u32 != size {
            return Err(CamError::framing("incomplete file segment"));
        }
        Ok(Self { flag, size, total_size, path, md5_hash, file_bytes })
    }

    /// Build the request header for starting a file download of `path`.
    pub fn request_header(path: &str) -> Result<Vec<u8>> {
        let path_bytes = path.as_bytes();
        if path_bytes.len() > Self::PATH_MAX {
            return Err(CamError::invalid_argument("file path too long"));
        }
        let mut buf = vec![0u8; Self::HDR_LEN];
        buf[Self::PATH_OFF..Self::PATH_OFF + path_bytes.len()].copy_from_slice(path_bytes);
        Ok(buf)
    }
}

impl std::fmt::Debug for FileFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFrame")
            .field("flag", &self.flag)
            .field("size", &self.size)
            .field("total_size", &self.total_size)
            .field("path", &self.path)
            .field("md5_hash", &self.md5_hash)
            .field("file_bytes_len", &self.file_bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// VideoFrame / ReplayFrame
// ---------------------------------------------------------------------------

/// An H.264 frame received while streaming live video.
#[derive(Clone)]
pub struct VideoFrame {
    pub flag: u32,
    pub size: u32,
    pub count: u64,
    pub gphoto: u32,
    pub frame_bytes: Vec<u8>,
}

impl VideoFrame {
    const SUBHDR_LEN: usize = 32;

    /// Parse a stream payload into a `VideoFrame`, without applying the
    /// unmunge transform (the caller applies it via [`crate::unmunge`]).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SUBHDR_LEN {
            return Err(CamError::framing("video frame subheader truncated"));
        }
        let flag = codec::read_u32(data, 0)?;
        let size = codec::read_u32(data, 4)?;
        let count = codec::read_u64(data, 8)?;
        let gphoto = codec::read_u32(data, 16)?;
        let frame_bytes = data[Self::SUBHDR_LEN..].to_vec();
        if frame_bytes.len() as u32 != size {
            return Err(CamError::framing("incomplete video frame"));
        }
        Ok(Self { flag, size, count, gphoto, frame_bytes })
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("flag", &self.flag)
            .field("size", &self.size)
            .field("count", &self.count)
            .field("gphoto", &self.gphoto)
            .field("frame_bytes_len", &self.frame_bytes.len())
            .finish()
    }
}

/// An H.264 frame received while replaying a saved recording. Carries the
/// same subheader as [`VideoFrame`] plus a leading `{frame_num, count2}`
/// pair inside the frame payload.
#[derive(Clone)]
pub struct ReplayFrame {
    pub frame_num: u32,
    pub count: u64,
    pub gphoto: u32,
    pub frame_bytes: Vec<u8>,
}

impl ReplayFrame {
    /// Parse a raw (not yet unmunged) stream payload directly. Exposed for
    /// tests; the stream engine instead unmunges the embedded [`VideoFrame`]
    /// first and calls [`Self::from_video`], since the `{frame_num, count2}`
    /// pair sits inside the munged region.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_video(VideoFrame::from_bytes(data)?)
    }

    /// Strip the leading `{frame_num:u32, count2:u32}` pair from an
    /// already-unmunged [`VideoFrame`]'s payload.
    pub fn from_video(video: VideoFrame) -> Result<Self> {
        if video.frame_bytes.len() < 8 {
            return Err(CamError::framing("replay frame header truncated"));
        }
        let frame_num = codec::read_u32(&video.frame_bytes, 0)?;
        let frame_bytes = video.frame_bytes[8..].to_vec();
        Ok(Self { frame_num, count: video.count, gphoto: video.gphoto, frame_bytes })
    }
}

impl std::fmt::Debug for ReplayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayFrame")
            .field("frame_num", &self.frame_num)
            .field("count", &self.count)
            .field("gphoto", &self.gphoto)
            .field("frame_bytes_len", &self.frame_bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(mut v: Vec<u8>, len: usize) -> Vec<u8> {
        v.resize(len, 0);
        v
    }

    #[test]
    fn config_round_trip_writable_fields() {
        let mut body = vec![0u8; Config::LEN];
        body[0] = 6;
        body[1] = CameraFlip::DownMirror as u8;
        body[2] = ConfigWiFiSec::Wpa2Psk as u8;
        body[3..3 + 5].copy_from_slice(b"drone");
        body[35..35 + 8].copy_from_slice(b"abc12345");
        // time=0
        body[75] = 1; // mounted
        body[76..84].copy_from_slice(&1_073_741_824u64.to_le_bytes());
        body[84..92].copy_from_slice(&536_870_912u64.to_le_bytes());
        body[92..92 + 4].copy_from_slice(b"V202");

        let cfg = Config::from_bytes(&body).unwrap();
        assert_eq!(cfg.wifi_channel, 6);
        assert_eq!(cfg.camera_flip, CameraFlip::DownMirror);
        assert_eq!(cfg.wifi_security, ConfigWiFiSec::Wpa2Psk);
        assert_eq!(cfg.wifi_name, "drone");
        assert_eq!(cfg.wifi_password, "abc12345");
        assert!(cfg.sdcard_ismounted);
        assert_eq!(cfg.sdcard_size, 1_073_741_824);
        assert_eq!(cfg.sdcard_free, 536_870_912);
        assert_eq!(cfg.version, "V202");
        assert_eq!(cfg.time.timestamp(), 0);
    }

    #[test]
    fn config_time_overflow_substitutes_epoch_zero() {
        let mut body = vec![0u8; Config::LEN];
        body[2] = ConfigWiFiSec::Open as u8;
        body[67..75].copy_from_slice(&u64::MAX.to_le_bytes());
        let cfg = Config::from_bytes(&body).unwrap();
        assert_eq!(cfg.time.timestamp(), 0);
    }

    #[test]
    fn config_rejects_wrong_length() {
        assert!(Config::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn heartbeat_timezone_reanchor() {
        let mut body = vec![0u8; Heartbeat::LEN];
        body[0..4].copy_from_slice(&1u32.to_le_bytes());
        body[24..32].copy_from_slice(&1_700_000_000u64.to_le_bytes());
        let hb = Heartbeat::from_bytes(&body).unwrap();
        assert!(hb.sdcard_ismounted);
        // 1_700_000_000 is 2023-11-14T22:13:20Z; re-anchored minus 8h.
        assert_eq!(hb.time.to_rfc3339(), "2023-11-14T14:13:20+00:00");
    }

    #[test]
    fn heartbeat_rejects_wrong_length() {
        assert!(Heartbeat::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn record_plan_day_flags_round_trip() {
        for m in 0u8..128 {
            let plan = RecordPlan {
                active: true,
                day_flags: m,
                start_secs: 0,
                end_secs: 86399,
                max_duration_secs: 300,
            };
            let bytes = plan.to_bytes();
            let decoded = RecordPlan::from_bytes(&bytes).unwrap();
            assert_eq!(decoded.day_flags, m);
        }
    }

    #[test]
    fn default_now_sets_exactly_one_day_bit() {
        let plan = RecordPlan::default_now();
        assert!(plan.active);
        assert_eq!(plan.day_flags.count_ones(), 1);
        assert_eq!(plan.start_secs, 0);
        assert_eq!(plan.end_secs, 86399);
        assert_eq!(plan.max_duration_secs, 300);
    }

    #[test]
    fn stopped_keeps_schedule_but_clears_active() {
        let plan = RecordPlan::stopped();
        assert!(!plan.active);
        assert_eq!(plan.day_flags.count_ones(), 1);
    }

    #[test]
    fn record_list_item_residue_is_rejected() {
        let data = pad(vec![0u8; RecordListItem::LEN + 1], RecordListItem::LEN + 1);
        assert!(RecordListItem::list_from_bytes(&data).is_err());
    }

    #[test]
    fn record_list_item_count_matches_buffer() {
        let mut data = vec![0u8; RecordListItem::LEN * 2];
        for i in 0..2 {
            let off = i * RecordListItem::LEN;
            data[off..off + 4].copy_from_slice(&1_700_000_000u32.to_le_bytes());
            data[off + 4..off + 8].copy_from_slice(&120u32.to_le_bytes());
        }
        let items = RecordListItem::list_from_bytes(&data).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].time_length, 120);
    }

    #[test]
    fn picture_list_item_rejects_bad_flag() {
        let mut data = vec![0u8; PictureListItem::LEN];
        data[0..4].copy_from_slice(&2u32.to_le_bytes());
        assert!(PictureListItem::list_from_bytes(&data).is_err());
    }

    #[test]
    fn picture_list_item_parses_valid_entries() {
        let mut data = vec![0u8; PictureListItem::LEN];
        data[0..4].copy_from_slice(&1u32.to_le_bytes());
        data[4..8].copy_from_slice(&4096u32.to_le_bytes());
        data[24..24 + 4].copy_from_slice(b"a.jpg");
        let items = PictureListItem::list_from_bytes(&data).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].size, 4096);
    }

    #[test]
    fn cstr_never_includes_bytes_after_nul() {
        let slot = b"abc\0xyz";
        assert_eq!(codec::read_cstr(slot), "abc");
    }
}
