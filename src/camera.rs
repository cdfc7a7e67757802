//! High-level camera API (Component F): typed operations composing the
//! framing codec (A), record parsers (B), unmunge engine (C), command
//! socket client (D), and stream session engine (E).
//!
//! Every operation here is a thin composition — build a [`Command`], send
//! it over the command socket or hand it to the stream engine, parse the
//! result. Mutator commands follow one uniform rule: `arg1 == 0` in the
//! response means the device accepted the request, any other value is
//! surfaced as [`CamError::Protocol`] with the code preserved for
//! diagnostics.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

use crate::codec;
use crate::command::{Command, CommandType, HDR_ARG_ARG1};
use crate::config::ClientConfig;
use crate::error::{CamError, Result};
use crate::net;
use crate::records::{
    CameraFlip, Config, ConfigWiFiSec, Heartbeat, Picture, PictureListItem, RecordListItem,
    RecordPlan,
};
use crate::stream::{self, LiveVideoKind, ReplayKind, StreamFrames, StreamGuard};

/// Maximum number of entries `list_pictures2` may request.
pub const MAX_PICLIST2_COUNT: u32 = 512;
/// Valid range for `set_record_rotate_duration`.
pub const RECORD_ROTATE_RANGE: std::ops::RangeInclusive<u32> = 60..=600;
/// Valid WiFi channel range.
pub const WIFI_CHANNEL_RANGE: std::ops::RangeInclusive<u8> = 1..=13;

/// A client connection to one `lewei_cam` camera.
///
/// Cloning shares the streaming guard (at most one active stream across all
/// clones), but every RPC opens its own fresh TCP connection — there is no
/// persistent command-socket connection to share.
#[derive(Clone)]
pub struct Camera {
    cfg: ClientConfig,
    guard: Arc<StreamGuard>,
}

impl Camera {
    pub fn new(cfg: ClientConfig) -> Self {
        Self { cfg, guard: Arc::new(StreamGuard::new()) }
    }

    fn cmd_addr(&self) -> SocketAddr {
        SocketAddr::new(self.cfg.cam_ip, self.cfg.cmd_port)
    }

    fn stream_addr(&self) -> SocketAddr {
        SocketAddr::new(self.cfg.cam_ip, self.cfg.stream_port)
    }

    fn rpc(&self, cmd: Command) -> Result<Command> {
        net::send_cmd(self.cmd_addr(), &self.cfg, &cmd)
    }

    /// Map the uniform mutator success rule (`arg1 == 0`) to `Result<()>`.
    fn check_success(resp: &Command) -> Result<()> {
        let code = resp.arg(HDR_ARG_ARG1);
        if code == 0 {
            Ok(())
        } else {
            Err(CamError::protocol(format!("device refused request (code {code})")))
        }
    }

    // -----------------------------------------------------------------
    // Config / time
    // -----------------------------------------------------------------

    pub fn get_config(&self) -> Result<Config> {
        let resp = self.rpc(Command::new(CommandType::GetConfig))?;
        Config::from_bytes(&resp.body)
    }

    /// Set only the fields supplied; unset fields keep their current
    /// on-device value (the getter is called first to fill them in).
    pub fn set_config(
        &self,
        wifi_channel: Option<u8>,
        wifi_name: Option<&str>,
        wifi_password: Option<&str>,
        wifi_security: Option<ConfigWiFiSec>,
        camera_flip: Option<CameraFlip>,
    ) -> Result<()> {
        if let Some(chan) = wifi_channel {
            if !WIFI_CHANNEL_RANGE.contains(&chan) {
                return Err(CamError::invalid_argument("wifi_channel must be in 1..=13"));
            }
        }
        if let Some(name) = wifi_name {
            if name.len() > Config::MAX_WIFI_NAME_LEN {
                return Err(CamError::invalid_argument("wifi name too long"));
            }
        }
        if let Some(pass) = wifi_password {
            if pass.len() > Config::MAX_WIFI_PASS_LEN {
                return Err(CamError::invalid_argument("wifi password too long"));
            }
        }

        let mut config = self.get_config()?;
        if let Some(chan) = wifi_channel {
            config.wifi_channel = chan;
        }
        if let Some(name) = wifi_name {
            config.wifi_name = name.to_string();
        }
        if let Some(pass) = wifi_password {
            config.wifi_password = pass.to_string();
            // Setting a password implies enabling WPA2, matching the
            // device's own requirement that open networks carry none.
            config.wifi_security = ConfigWiFiSec::Wpa2Psk;
        } else if let Some(sec) = wifi_security {
            config.wifi_security = sec;
        }
        if let Some(flip) = camera_flip {
            config.camera_flip = flip;
        }
        let body = config.to_bytes()?;
        let resp = self.rpc(Command::with_body(CommandType::SetConfig, body))?;
        Self::check_success(&resp)
    }

    pub fn get_heartbeat(&self) -> Result<Heartbeat> {
        let resp = self.rpc(Command::new(CommandType::Heartbeat))?;
        Heartbeat::from_bytes(&resp.body)
    }

    /// Camera's current time, as a raw (non-re-anchored) UTC instant — the
    /// device's `gettime`/`settime` pair round-trips unix seconds directly,
    /// unlike `Heartbeat`/`RecordListItem`'s GMT+8-labeled encoding.
    pub fn get_time(&self) -> Result<DateTime<Utc>> {
        let resp = self.rpc(Command::new(CommandType::GetTime))?;
        let secs = codec::read_u64(&resp.body, 0)?;
        Utc.timestamp_opt(secs as i64, 0)
            .single()
            .ok_or_else(|| CamError::framing("camera time out of range"))
    }

    pub fn set_time(&self, when: Option<DateTime<Utc>>) -> Result<()> {
        let secs = match when {
            Some(dt) => dt.timestamp() as u64,
            None => SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs(),
        };
        let mut body = Vec::new();
        codec::write_u64(&mut body, secs);
        let resp = self.rpc(Command::with_body(CommandType::SetTime, body))?;
        Self::check_success(&resp)
    }

    // -----------------------------------------------------------------
    // Recording plan
    // -----------------------------------------------------------------

    pub fn get_record_plan(&self) -> Result<RecordPlan> {
        let resp = self.rpc(Command::new(CommandType::GetRecPlan))?;
        RecordPlan::from_bytes(&resp.body)
    }

    pub fn set_record_plan(&self, plan: &RecordPlan) -> Result<()> {
        let resp = self.rpc(Command::with_body(CommandType::SetRecPlan, plan.to_bytes()))?;
        Self::check_success(&resp)
    }

    pub fn get_record_rotate_duration(&self) -> Result<u32> {
        let resp = self.rpc(Command::new(CommandType::GetRecTime))?;
        Ok(resp.arg(HDR_ARG_ARG1) * 60)
    }

    pub fn set_record_rotate_duration(&self, secs: u32) -> Result<()> {
        if !RECORD_ROTATE_RANGE.contains(&secs) {
            return Err(CamError::invalid_argument("rotate duration must be in 60..=600 seconds"));
        }
        let mut cmd = Command::new(CommandType::SetRecTime);
        cmd.set_arg(HDR_ARG_ARG1, secs / 60);
        let resp = self.rpc(cmd)?;
        Self::check_success(&resp)
    }

    pub fn get_recordings(&self) -> Result<Vec<RecordListItem>> {
        let max_date = (Utc::now() + chrono::Duration::days(365 * 10)).timestamp() as u32;
        let mut body = Vec::new();
        codec::write_u32(&mut body, 1); // channel
        codec::write_u32(&mut body, 1); // type
        codec::write_u32(&mut body, 255); // max
        codec::write_u32(&mut body, max_date);
        codec::write_u32(&mut body, 0);
        let resp = self.rpc(Command::with_body(CommandType::GetRecList, body))?;
        RecordListItem::list_from_bytes(&resp.body)
    }

    /// Start replaying recording `index` (as returned by a fresh
    /// [`Self::get_recordings`] call) over the stream socket.
    pub fn start_recording_replay(&self, index: usize) -> Result<StreamFrames<ReplayKind>> {
        let recordings = self.get_recordings()?;
        let rec = recordings
            .get(index)
            .ok_or_else(|| CamError::invalid_argument("recording index out of range"))?;
        let start = rec.start_time.timestamp() as u32;
        let end = start.wrapping_add(rec.time_length);
        let mut body = Vec::new();
        codec::write_u32(&mut body, start);
        codec::write_u32(&mut body, end);
        body.resize(body.len() + 16, 0);
        codec::write_cstr(&mut body, &rec.path, 100)?;
        let cmd = Command::with_body(CommandType::StartReplay, body);
        StreamFrames::start(self.stream_addr(), &self.cfg, &cmd, self.guard.clone())
    }

    /// Stop an active replay stream. Idempotent; returns whether a stream
    /// was actually active.
    pub fn stop_recording_replay(&self) -> bool {
        self.guard.stop()
    }

    // -----------------------------------------------------------------
    // Pictures
    // -----------------------------------------------------------------

    pub fn list_pictures(&self) -> Result<Vec<PictureListItem>> {
        let resp = self.rpc(Command::new(CommandType::GetPicList))?;
        Self::check_success(&resp)?;
        PictureListItem::list_from_bytes(&resp.body)
    }

    pub fn take_picture(&self) -> Result<Picture> {
        let resp = self.rpc(Command::new(CommandType::TakePic))?;
        Picture::from_bytes(&resp.body)
    }

    pub fn list_pictures2(&self, max_count: u32) -> Result<Vec<PictureListItem>> {
        if max_count > MAX_PICLIST2_COUNT {
            return Err(CamError::invalid_argument("max_count must be in 0..=512"));
        }
        let mut cmd = Command::new(CommandType::GetPicList2);
        cmd.set_arg(HDR_ARG_ARG1, max_count);
        let resp = self.rpc(cmd)?;
        Self::check_success(&resp)?;
        PictureListItem::list_from_bytes(&resp.body)
    }

    /// `save` additionally persists the still to the camera's SD card; the
    /// JPEG bytes are always returned either way.
    pub fn take_picture2(&self, save: bool) -> Result<Picture> {
        let mut cmd = Command::new(CommandType::TakePic2);
        cmd.set_arg(HDR_ARG_ARG1, save as u32);
        let resp = self.rpc(cmd)?;
        Picture::from_bytes(&resp.body)
    }

    // -----------------------------------------------------------------
    // Live video streaming
    // -----------------------------------------------------------------

    pub fn start_video_stream(&self, highdef: bool) -> Result<StreamFrames<LiveVideoKind>> {
        let mut cmd = Command::new(CommandType::StartStream);
        cmd.set_arg(HDR_ARG_ARG1, highdef as u32);
        StreamFrames::start(self.stream_addr(), &self.cfg, &cmd, self.guard.clone())
    }

    /// Stop an active live stream. Idempotent; returns whether a stream was
    /// actually active.
    pub fn stop_video_stream(&self) -> bool {
        self.guard.stop()
    }

    // -----------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------

    pub fn get_file<W: Write>(&self, path: &str, sink: &mut W) -> Result<bool> {
        stream::download_file(self.stream_addr(), &self.cfg, path, &self.guard, sink)
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        let mut body = Vec::new();
        codec::write_cstr(&mut body, path, 100)?;
        let resp = self.rpc(Command::with_body(CommandType::DelFile, body))?;
        Self::check_success(&resp)
    }

    pub fn reformat_sd(&self) -> Result<()> {
        let resp = self.rpc(Command::new(CommandType::ReformatSd))?;
        Self::check_success(&resp)
    }

    // -----------------------------------------------------------------
    // Camera orientation / resolution / baud rate
    // -----------------------------------------------------------------

    pub fn get_camera_flip(&self) -> Result<CameraFlip> {
        let resp = self.rpc(Command::new(CommandType::GetCamFlip))?;
        CameraFlip::from_u8(resp.arg(HDR_ARG_ARG1) as u8)
    }

    pub fn set_camera_flip(&self, flip: CameraFlip) -> Result<()> {
        let mut cmd = Command::new(CommandType::SetCamFlip);
        cmd.set_arg(HDR_ARG_ARG1, flip as u32);
        let resp = self.rpc(cmd)?;
        Self::check_success(&resp)
    }

    pub fn get_baudrate(&self) -> Result<u32> {
        let resp = self.rpc(Command::new(CommandType::GetBaudrate))?;
        Ok(resp.arg(HDR_ARG_ARG1))
    }

    pub fn set_baudrate(&self, rate: u32) -> Result<()> {
        let mut cmd = Command::new(CommandType::SetBaudrate);
        cmd.set_arg(HDR_ARG_ARG1, rate);
        let resp = self.rpc(cmd)?;
        Self::check_success(&resp)
    }

    /// `true` if the camera is set to 1080p, `false` for 720p.
    pub fn get_resolution_1080p(&self) -> Result<bool> {
        let resp = self.rpc(Command::new(CommandType::Get1080p))?;
        Ok(resp.arg(HDR_ARG_ARG1) == 1)
    }

    pub fn set_resolution_1080p(&self, is_1080p: bool) -> Result<()> {
        let mut cmd = Command::new(CommandType::Set1080p);
        cmd.set_arg(HDR_ARG_ARG1, is_1080p as u32);
        let resp = self.rpc(cmd)?;
        Self::check_success(&resp)
    }

    // -----------------------------------------------------------------
    // WiFi
    // -----------------------------------------------------------------

    pub fn restart_wifi(&self) -> Result<()> {
        let resp = self.rpc(Command::new(CommandType::RestartWifi))?;
        Self::check_success(&resp)
    }

    pub fn set_wifi_channel(&self, channel: u8) -> Result<()> {
        if !WIFI_CHANNEL_RANGE.contains(&channel) {
            return Err(CamError::invalid_argument("wifi channel must be in 1..=13"));
        }
        let mut cmd = Command::new(CommandType::SetWifiChan);
        cmd.set_arg(HDR_ARG_ARG1, channel as u32);
        let resp = self.rpc(cmd)?;
        Self::check_success(&resp)
    }

    pub fn set_wifi_defaults(&self) -> Result<()> {
        let resp = self.rpc(Command::new(CommandType::SetWifiDefs))?;
        Self::check_success(&resp)
    }

    pub fn set_wifi_name(&self, name: &str) -> Result<()> {
        if name.len() > Config::MAX_WIFI_NAME_LEN {
            return Err(CamError::invalid_argument("wifi name too long"));
        }
        let resp = self.rpc(Command::with_body(CommandType::SetWifiName, name.as_bytes().to_vec()))?;
        Self::check_success(&resp)
    }

    /// The wire body prepends a dummy byte the device discards before the
    /// 64-byte password slot.
    pub fn set_wifi_password(&self, password: &str) -> Result<()> {
        if password.len() > Config::MAX_WIFI_PASS_LEN {
            return Err(CamError::invalid_argument("wifi password too long"));
        }
        let mut body = vec![0u8];
        codec::write_cstr(&mut body, password, 64)?;
        let resp = self.rpc(Command::with_body(CommandType::SetWifiPass, body))?;
        Self::check_success(&resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_success_accepts_zero_arg1() {
        let resp = Command::new(CommandType::SetTime);
        assert!(Camera::check_success(&resp).is_ok());
    }

    #[test]
    fn check_success_rejects_nonzero_arg1() {
        let mut resp = Command::new(CommandType::SetTime);
        resp.set_arg(HDR_ARG_ARG1, 7);
        assert!(Camera::check_success(&resp).is_err());
    }

    #[test]
    fn wifi_channel_bounds_enforced_before_io() {
        let cam = Camera::new(ClientConfig::new("127.0.0.1".parse().unwrap()));
        assert!(matches!(cam.set_wifi_channel(0), Err(CamError::InvalidArgument(_))));
        assert!(matches!(cam.set_wifi_channel(14), Err(CamError::InvalidArgument(_))));
    }

    #[test]
    fn set_config_validates_wifi_fields_before_io() {
        // A bogus, unroutable address would hang/fail in get_config's RPC;
        // validation must reject these before any socket is touched.
        let cam = Camera::new(ClientConfig::new("127.0.0.1".parse().unwrap()));
        let too_long_name = "x".repeat(Config::MAX_WIFI_NAME_LEN + 1);
        assert!(matches!(
            cam.set_config(None, Some(&too_long_name), None, None, None),
            Err(CamError::InvalidArgument(_))
        ));
        let too_long_pass = "x".repeat(Config::MAX_WIFI_PASS_LEN + 1);
        assert!(matches!(
            cam.set_config(None, None, Some(&too_long_pass), None, None),
            Err(CamError::InvalidArgument(_))
        ));
        assert!(matches!(
            cam.set_config(Some(14), None, None, None, None),
            Err(CamError::InvalidArgument(_))
        ));
    }

    #[test]
    fn record_rotate_duration_bounds_enforced_before_io() {
        let cam = Camera::new(ClientConfig::new("127.0.0.1".parse().unwrap()));
        assert!(matches!(
            cam.set_record_rotate_duration(59),
            Err(CamError::InvalidArgument(_))
        ));
        assert!(matches!(
            cam.set_record_rotate_duration(601),
            Err(CamError::InvalidArgument(_))
        ));
    }

    #[test]
    fn list_pictures2_bounds_enforced_before_io() {
        let cam = Camera::new(ClientConfig::new("127.0.0.1".parse().unwrap()));
        assert!(matches!(cam.list_pictures2(513), Err(CamError::InvalidArgument(_))));
    }

    #[test]
    fn wifi_password_length_enforced_before_io() {
        let cam = Camera::new(ClientConfig::new("127.0.0.1".parse().unwrap()));
        let too_long = "x".repeat(33);
        assert!(matches!(cam.set_wifi_password(&too_long), Err(CamError::InvalidArgument(_))));
    }
}
