//! The framed command header (Component A): encode/decode of the fixed
//! 46-byte request/response header used on both the command and stream
//! sockets.
//!
//! Wire format: a 10-byte magic `lewei_cmd\0` followed by nine little-endian
//! uint32s — `cmd_type` then eight command-specific args.

use crate::codec;
use crate::error::{CamError, Result};

const HDR_MAGIC: &[u8; 10] = b"lewei_cmd\0";
const HDR_NUM_INTS: usize = 9;

/// Length of the fixed header, magic plus nine uint32s.
pub const HDR_LEN: usize = HDR_MAGIC.len() + HDR_NUM_INTS * 4;

/// Index (within the 8-element arg array) of the generic scalar argument.
pub const HDR_ARG_ARG1: usize = 0;
/// Index of the body-size argument; must mirror `body.len()`.
pub const HDR_ARG_BODYSZ: usize = 2;
/// Index of the stream-type argument (unmunge engine selector).
pub const HDR_ARG_STREAM_TYPE: usize = 3;
/// Index of the first unmunge key.
pub const HDR_ARG_STREAM_DEC1: usize = 4;
/// Index of the second unmunge key.
pub const HDR_ARG_STREAM_DEC2: usize = 5;

/// Commands supported by the camera's lewei_cam server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandType {
    Heartbeat = 1,
    StartStream = 2,
    StopStream = 3,
    SetTime = 4,
    GetTime = 5,
    GetRecPlan = 6,
    GetRecList = 8,
    StartReplay = 9,
    StopReplay = 16,
    SetRecPlan = 17,
    GetFile = 18,
    TakePic = 19,
    DelFile = 20,
    ReformatSd = 21,
    SetWifiName = 22,
    SetWifiPass = 23,
    SetWifiChan = 24,
    RestartWifi = 25,
    SetWifiDefs = 32,
    GetCamFlip = 33,
    SetCamFlip = 34,
    GetBaudrate = 35,
    SetBaudrate = 36,
    GetConfig = 37,
    SetConfig = 38,
    GetPicList = 39,
    Get1080p = 40,
    Set1080p = 41,
    GetPicList2 = 42,
    TakePic2 = 43,
    GetRecTime = 48,
    SetRecTime = 49,
    RetStream = 257,
    RetReplay = 259,
    RetReplayEnd = 261,
    RetGetFile = 262,
}

impl CommandType {
    pub fn from_u32(v: u32) -> Result<Self> {
        Ok(match v {
            1 => Self::Heartbeat,
            2 => Self::StartStream,
            3 => Self::StopStream,
            4 => Self::SetTime,
            5 => Self::GetTime,
            6 => Self::GetRecPlan,
            8 => Self::GetRecList,
            9 => Self::StartReplay,
            16 => Self::StopReplay,
            17 => Self::SetRecPlan,
            18 => Self::GetFile,
            19 => Self::TakePic,
            20 => Self::DelFile,
            21 => Self::ReformatSd,
            22 => Self::SetWifiName,
            23 => Self::SetWifiPass,
            24 => Self::SetWifiChan,
            25 => Self::RestartWifi,
            32 => Self::SetWifiDefs,
            33 => Self::GetCamFlip,
            34 => Self::SetCamFlip,
            35 => Self::GetBaudrate,
            36 => Self::SetBaudrate,
            37 => Self::GetConfig,
            38 => Self::SetConfig,
            39 => Self::GetPicList,
            40 => Self::Get1080p,
            41 => Self::Set1080p,
            42 => Self::GetPicList2,
            43 => Self::TakePic2,
            48 => Self::GetRecTime,
            49 => Self::SetRecTime,
            257 => Self::RetStream,
            259 => Self::RetReplay,
            261 => Self::RetReplayEnd,
            262 => Self::RetGetFile,
            other => return Err(CamError::unsupported("CommandType", other)),
        })
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// A request or response on the lewei_cam wire: a typed header plus body.
#[derive(Debug, Clone)]
pub struct Command {
    pub cmd_type: CommandType,
    /// The eight header args following `cmd_type`, indexed by `HDR_ARG_*`.
    pub args: [u32; 8],
    pub body: Vec<u8>,
}

impl Command {
    /// Create a command with an empty body and all-zero args.
    pub fn new(cmd_type: CommandType) -> Self {
        Self { cmd_type, args: [0; 8], body: Vec::new() }
    }

    /// Create a command with the given body; `args[HDR_ARG_BODYSZ]` is set
    /// to the body length.
    pub fn with_body(cmd_type: CommandType, body: Vec<u8>) -> Self {
        let mut args = [0u32; 8];
        args[HDR_ARG_BODYSZ] = body.len() as u32;
        Self { cmd_type, args, body }
    }

    pub fn set_arg(&mut self, idx: usize, val: u32) {
        self.args[idx] = val;
    }

    pub fn arg(&self, idx: usize) -> u32 {
        self.args[idx]
    }

    /// Encode the full wire representation: header followed by body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HDR_LEN + self.body.len());
        buf.extend_from_slice(HDR_MAGIC);
        codec::write_u32(&mut buf, self.cmd_type.as_u32());
        for a in self.args {
            codec::write_u32(&mut buf, a);
        }
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Decode a fixed 46-byte header. The body, if any, must be read
    /// separately (its length is `args[HDR_ARG_BODYSZ]`) and attached
    /// with [`Command::attach_body`].
    pub fn decode_header(hdr: &[u8]) -> Result<Self> {
        if hdr.len() < HDR_LEN {
            return Err(CamError::framing(format!(
                "header needs {HDR_LEN} bytes, got {}",
                hdr.len()
            )));
        }
        if &hdr[..10] != HDR_MAGIC.as_slice() {
            return Err(CamError::framing("bad magic bytes"));
        }
        let cmd_type = CommandType::from_u32(codec::read_u32(hdr, 10)?)?;
        let mut args = [0u32; 8];
        for (i, a) in args.iter_mut().enumerate() {
            *a = codec::read_u32(hdr, 14 + i * 4)?;
        }
        Ok(Self { cmd_type, args, body: Vec::new() })
    }

    /// Body size declared in the header (`HDR_ARG_BODYSZ` slot).
    pub fn body_size(&self) -> usize {
        self.args[HDR_ARG_BODYSZ] as usize
    }

    pub fn attach_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_heartbeat() {
        let cmd = Command::new(CommandType::Heartbeat);
        let wire = cmd.encode();
        assert_eq!(wire.len(), HDR_LEN);
        assert_eq!(&wire[..10], b"lewei_cmd\0");
        assert_eq!(&wire[10..14], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&wire[14..], &[0u8; 32][..]);

        let decoded = Command::decode_header(&wire).unwrap();
        assert_eq!(decoded.cmd_type, CommandType::Heartbeat);
        assert_eq!(decoded.body_size(), 0);
    }

    #[test]
    fn encode_decode_with_body() {
        let body = vec![1, 2, 3, 4, 5];
        let cmd = Command::with_body(CommandType::TakePic, body.clone());
        let wire = cmd.encode();
        let hdr = &wire[..HDR_LEN];
        let mut decoded = Command::decode_header(hdr).unwrap();
        assert_eq!(decoded.body_size(), body.len());
        decoded.attach_body(wire[HDR_LEN..].to_vec());
        assert_eq!(decoded.body, body);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut wire = Command::new(CommandType::Heartbeat).encode();
        wire[0] = b'X';
        assert!(Command::decode_header(&wire).is_err());
    }

    #[test]
    fn short_header_rejected() {
        assert!(Command::decode_header(&[0u8; 10]).is_err());
    }

    #[test]
    fn unknown_cmd_type_rejected() {
        let mut wire = Command::new(CommandType::Heartbeat).encode();
        wire[10..14].copy_from_slice(&999999u32.to_le_bytes());
        assert!(Command::decode_header(&wire).is_err());
    }
}
