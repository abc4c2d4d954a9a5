//! STOMP frame codec (protocol versions 1.0 through 1.2).
//!
//! A frame is a command line, header lines, a blank line, a body and a NUL
//! terminator:
//!
//! ```text
//! SEND\n
//! destination:/app/room/sync/abc\n
//! content-length:4\n
//! \n
//! AQID\0
//! ```
//!
//! Bodies are opaque bytes. When `content-length` is present it delimits
//! the body (which may then contain NUL bytes); otherwise the body runs to
//! the first NUL. Bare end-of-line sequences between frames are heart-beats
//! and carry nothing.

use std::fmt;

use bytes::Bytes;

pub const HEADER_CONTENT_LENGTH: &str = "content-length";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_DESTINATION: &str = "destination";
pub const HEADER_ID: &str = "id";
pub const HEADER_RECEIPT: &str = "receipt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames.
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames.
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        })
    }

    /// CONNECT, STOMP and CONNECTED headers are sent verbatim, without
    /// the 1.1+ escape sequences.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Negotiated protocol version of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    V1_0,
    V1_1,
    V1_2,
}

impl Version {
    /// Highest first.
    pub const SUPPORTED: [Version; 3] = [Version::V1_2, Version::V1_1, Version::V1_0];

    pub fn as_str(self) -> &'static str {
        match self {
            Version::V1_0 => "1.0",
            Version::V1_1 => "1.1",
            Version::V1_2 => "1.2",
        }
    }

    /// 1.0 has no header escape sequences; values travel verbatim.
    fn escapes_headers(self) -> bool {
        self != Version::V1_0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is truncated")]
    Truncated,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("frame {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("malformed header line '{0}'")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header '{0}'")]
    InvalidEscape(String),

    #[error("invalid content-length '{0}'")]
    InvalidContentLength(String),

    #[error("frame body is not terminated by NUL")]
    MissingNul,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header. Repeated names are kept; lookups see the first.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serialize to wire bytes using 1.1+ header escaping. No headers are
    /// added implicitly.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_for(Version::V1_2)
    }

    /// Serialize for a peer speaking `version`.
    pub fn encode_for(&self, version: Version) -> Vec<u8> {
        let escape = version.escapes_headers() && self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                push_escaped(&mut out, name);
                out.push(b':');
                push_escaped(&mut out, value);
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Decode every frame in `input`, skipping heart-beats. Header values
    /// are unescaped by the 1.1+ rules.
    pub fn decode_all(input: &[u8]) -> Result<Vec<Frame>, FrameError> {
        Self::decode_all_for(input, Version::V1_2)
    }

    /// Decode frames sent by a peer speaking `version`.
    pub fn decode_all_for(input: &[u8], version: Version) -> Result<Vec<Frame>, FrameError> {
        let mut frames = Vec::new();
        let mut pos = 0;
        while let Some(frame) = decode_next(input, &mut pos, version)? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

fn push_escaped(out: &mut Vec<u8>, s: &str) {
    for b in s.bytes() {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b':' => out.extend_from_slice(b"\\c"),
            _ => out.push(b),
        }
    }
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

/// Read one line starting at `*pos`, without its `\n` / `\r\n` terminator.
fn read_line<'a>(input: &'a [u8], pos: &mut usize) -> Result<&'a [u8], FrameError> {
    let rest = &input[*pos..];
    let end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(FrameError::Truncated)?;
    *pos += end + 1;
    let line = &rest[..end];
    Ok(line.strip_suffix(b"\r").unwrap_or(line))
}

fn decode_next(
    input: &[u8],
    pos: &mut usize,
    version: Version,
) -> Result<Option<Frame>, FrameError> {
    // Heart-beats and trailing EOLs after the previous NUL.
    loop {
        match &input[*pos..] {
            [b'\n', ..] => *pos += 1,
            [b'\r', b'\n', ..] => *pos += 2,
            [] => return Ok(None),
            _ => break,
        }
    }

    let line = read_line(input, pos)?;
    let name = std::str::from_utf8(line).map_err(|_| FrameError::InvalidUtf8("command"))?;
    let command =
        Command::parse(name).ok_or_else(|| FrameError::UnknownCommand(name.to_string()))?;

    let mut frame = Frame::new(command);
    loop {
        let line = read_line(input, pos)?;
        if line.is_empty() {
            break;
        }
        let line = std::str::from_utf8(line).map_err(|_| FrameError::InvalidUtf8("header"))?;
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        let (name, value) = if version.escapes_headers() && command.escapes_headers() {
            (unescape(name)?, unescape(value)?)
        } else {
            (name.to_string(), value.to_string())
        };
        frame.headers.push((name, value));
    }

    let rest = &input[*pos..];
    let body_len = match frame.get(HEADER_CONTENT_LENGTH) {
        Some(raw) => {
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|_| FrameError::InvalidContentLength(raw.to_string()))?;
            if rest.len() <= len {
                return Err(FrameError::Truncated);
            }
            if rest[len] != 0 {
                return Err(FrameError::MissingNul);
            }
            len
        }
        None => rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FrameError::MissingNul)?,
    };

    frame.body = Bytes::copy_from_slice(&rest[..body_len]);
    *pos += body_len + 1;
    Ok(Some(frame))
}
